use chrono::Utc;

/// Current time as integer seconds since the Unix epoch.
pub fn now() -> i64 {
    Utc::now().timestamp()
}

/// Absolute expiration `ttl` seconds after `from`, clamped at the `i64` range.
pub fn expires_at(from: i64, ttl: i64) -> i64 {
    from.saturating_add(ttl)
}

/// Absolute expiration `ttl` seconds from now.
pub fn expires_in(ttl: i64) -> i64 {
    expires_at(now(), ttl)
}

/// True while `expiration` has not passed, tolerating `leeway` seconds.
pub fn within_leeway(expiration: i64, leeway: u64) -> bool {
    let leeway = i64::try_from(leeway).unwrap_or(i64::MAX);
    expiration.saturating_add(leeway) > now()
}
