//! Session counters, emitted through the `metrics` facade.
//!
//! The library installs no recorder; counters are no-ops until the host
//! application installs one (for example a Prometheus exporter).

use metrics::counter;

/// A token was minted. `kind` is `"access"` or `"refresh"`.
pub fn track_token_issued(kind: &'static str) {
    counter!("tessera_tokens_issued_total", "kind" => kind).increment(1);
}

/// A refresh attempt finished. `path` is `"refresh_token"` or `"access_payload"`.
pub fn track_refresh(path: &'static str, outcome: &'static str) {
    counter!("tessera_refresh_total", "path" => path, "outcome" => outcome).increment(1);
}

/// Refresh records removed by a flush.
pub fn track_flush(scope: &'static str, count: usize) {
    counter!("tessera_flush_total", "scope" => scope).increment(count as u64);
}
