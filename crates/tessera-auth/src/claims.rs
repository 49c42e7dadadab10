//! Claim sets carried by access and refresh tokens.
//!
//! A claim set is a JSON object that always carries `uid` (the token's own
//! id) and `exp` (absolute expiration, epoch seconds). Access tokens also
//! carry `ruid` (the issuing refresh token's uid) and `csrf`. Application
//! payload fields are merged in verbatim and may not reuse a reserved key.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use tessera_core::{TokenError, TokenResult};

/// Application payload: the claims a caller attaches to a session.
pub type Payload = Map<String, Value>;

pub const UID: &str = "uid";
pub const EXP: &str = "exp";
pub const RUID: &str = "ruid";
pub const CSRF: &str = "csrf";
pub const ISS: &str = "iss";

/// Keys an application payload may not use.
pub const RESERVED_CLAIMS: [&str; 4] = [UID, EXP, RUID, CSRF];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClaimSet(Map<String, Value>);

impl ClaimSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a claim set from an application payload.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::InvalidPayload`] if the payload uses a reserved key.
    pub fn from_payload(payload: &Payload) -> TokenResult<Self> {
        validate_payload(payload)?;
        Ok(Self(payload.clone()))
    }

    pub fn insert(&mut self, key: &str, value: impl Into<Value>) {
        self.0.insert(key.to_string(), value.into());
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// A required string claim.
    pub fn str_claim(&self, key: &str) -> TokenResult<&str> {
        self.0
            .get(key)
            .and_then(Value::as_str)
            .ok_or_else(|| TokenError::invalid_payload(format!("missing `{key}` claim")))
    }

    /// A required integer claim.
    pub fn int_claim(&self, key: &str) -> TokenResult<i64> {
        self.0
            .get(key)
            .and_then(Value::as_i64)
            .ok_or_else(|| TokenError::invalid_payload(format!("missing `{key}` claim")))
    }

    pub fn uid(&self) -> TokenResult<&str> {
        self.str_claim(UID)
    }

    pub fn exp(&self) -> TokenResult<i64> {
        self.int_claim(EXP)
    }

    pub fn ruid(&self) -> TokenResult<&str> {
        self.str_claim(RUID)
    }

    pub fn csrf(&self) -> TokenResult<&str> {
        self.str_claim(CSRF)
    }

    /// The application payload, with reserved claims and `iss` stripped.
    pub fn payload(&self) -> Payload {
        self.0
            .iter()
            .filter(|(key, _)| !is_reserved(key) && key.as_str() != ISS)
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

impl From<ClaimSet> for Value {
    fn from(claims: ClaimSet) -> Self {
        Value::Object(claims.0)
    }
}

pub fn is_reserved(key: &str) -> bool {
    RESERVED_CLAIMS.contains(&key)
}

/// Rejects payloads that would overwrite a reserved claim.
pub fn validate_payload(payload: &Payload) -> TokenResult<()> {
    match payload.keys().find(|key| is_reserved(key)) {
        Some(key) => Err(TokenError::invalid_payload(format!(
            "`{key}` is a reserved claim"
        ))),
        None => Ok(()),
    }
}
