//! CSRF values shared by a token pair.
//!
//! The raw value is 32 random bytes, base64 encoded. Responses can hand out
//! a masked form instead: a fresh one-time pad followed by the pad XOR the
//! raw bytes, so the value rendered into a page differs on every request
//! while still verifying against the same raw value.

use data_encoding::BASE64;
use subtle::ConstantTimeEq;

use tessera_core::ids::{CSRF_LENGTH, new_csrf_bytes};
use tessera_core::{TokenError, TokenResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsrfToken {
    raw: [u8; CSRF_LENGTH],
}

impl CsrfToken {
    pub fn generate() -> Self {
        Self {
            raw: new_csrf_bytes(),
        }
    }

    /// Parses a raw (unmasked) encoded value.
    pub fn from_encoded(encoded: &str) -> TokenResult<Self> {
        let bytes = BASE64
            .decode(encoded.as_bytes())
            .map_err(|e| TokenError::invalid_payload(format!("malformed csrf value: {e}")))?;
        let raw = bytes
            .try_into()
            .map_err(|_| TokenError::invalid_payload("csrf value has the wrong length"))?;
        Ok(Self { raw })
    }

    /// The raw value, as stored in tokens and records.
    pub fn encoded(&self) -> String {
        BASE64.encode(&self.raw)
    }

    /// A freshly masked form of the raw value.
    pub fn masked(&self) -> String {
        let pad = new_csrf_bytes();
        let mut out = Vec::with_capacity(CSRF_LENGTH * 2);
        out.extend_from_slice(&pad);
        out.extend(pad.iter().zip(self.raw.iter()).map(|(p, r)| p ^ r));
        BASE64.encode(&out)
    }

    /// Checks a presented value, raw or masked, against `raw_encoded`.
    pub fn verify(raw_encoded: &str, presented: &str) -> bool {
        let Ok(expected) = Self::from_encoded(raw_encoded) else {
            return false;
        };
        let Ok(bytes) = BASE64.decode(presented.as_bytes()) else {
            return false;
        };

        let candidate: Vec<u8> = match bytes.len() {
            CSRF_LENGTH => bytes,
            len if len == CSRF_LENGTH * 2 => {
                let (pad, masked) = bytes.split_at(CSRF_LENGTH);
                pad.iter().zip(masked).map(|(p, m)| p ^ m).collect()
            }
            _ => return false,
        };

        candidate.ct_eq(expected.raw.as_slice()).into()
    }
}
