//! Redis key layout for token records.
//!
//! ```text
//! {prefix}:refresh:{namespace}:{uid}
//! {prefix}:access:{uid}
//! ```
//!
//! Un-namespaced refresh records use an empty namespace segment.

/// Builds keys and SCAN patterns under one prefix.
#[derive(Clone, Debug)]
pub struct KeySpace {
    prefix: String,
}

impl KeySpace {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn refresh(&self, uid: &str, namespace: Option<&str>) -> String {
        format!("{}:refresh:{}:{}", self.prefix, namespace.unwrap_or(""), uid)
    }

    pub fn access(&self, uid: &str) -> String {
        format!("{}:access:{}", self.prefix, uid)
    }

    /// Pattern matching `uid` in any namespace.
    pub fn refresh_any_namespace(&self, uid: &str) -> String {
        format!("{}:refresh:*:{}", escape(&self.prefix), escape(uid))
    }

    /// Pattern matching every record in `namespace`.
    ///
    /// Namespaces containing `:` can overlap; callers filter on the record's
    /// own namespace.
    pub fn refresh_namespace(&self, namespace: Option<&str>) -> String {
        format!(
            "{}:refresh:{}:*",
            escape(&self.prefix),
            escape(namespace.unwrap_or(""))
        )
    }

    pub fn refresh_all(&self) -> String {
        format!("{}:refresh:*", escape(&self.prefix))
    }
}

/// The uid segment of a refresh key.
pub fn uid_from_refresh_key(key: &str) -> Option<&str> {
    key.rsplit_once(':').map(|(_, uid)| uid).filter(|uid| !uid.is_empty())
}

/// Escapes Redis glob metacharacters.
fn escape(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
