//! Signed claim codec.
//!
//! Turns a [`ClaimSet`] into a compact signed JWT and back. Decoding always
//! checks the signature (and the issuer, when one is configured); checking
//! `exp` can be skipped for the replay-protection path, which has to read an
//! access token's claims after it has expired.
//!
//! # Example
//!
//! ```ignore
//! use tessera_auth::{ClaimCodec, ClaimSet};
//! use tessera_config::SessionConfig;
//!
//! let codec = ClaimCodec::new(&SessionConfig::from_env())?;
//!
//! let token = codec.encode(&ClaimSet::new().with("uid", "abc").with("exp", exp))?;
//! let claims = codec.decode(&token)?;
//! ```

use std::collections::HashSet;
use std::str::FromStr;

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};

use tessera_config::SessionConfig;
use tessera_core::{TokenError, TokenResult};

use crate::claims::{ClaimSet, EXP, ISS, Payload, validate_payload};

pub struct ClaimCodec {
    algorithm: Algorithm,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: Option<String>,
    leeway: u64,
}

impl std::fmt::Debug for ClaimCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClaimCodec")
            .field("algorithm", &self.algorithm)
            .field("issuer", &self.issuer)
            .field("leeway", &self.leeway)
            .finish_non_exhaustive()
    }
}

impl ClaimCodec {
    /// Builds a codec from the signing settings in `config`.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Malconfigured`] if the algorithm is unknown, the
    /// HMAC secret is empty, or a PEM key cannot be parsed.
    pub fn new(config: &SessionConfig) -> TokenResult<Self> {
        let algorithm = Algorithm::from_str(config.algorithm.trim()).map_err(|_| {
            TokenError::Malconfigured(format!("unknown algorithm `{}`", config.algorithm))
        })?;
        let (encoding_key, decoding_key) = build_keys(algorithm, config)?;

        Ok(Self {
            algorithm,
            encoding_key,
            decoding_key,
            issuer: config.issuer.clone(),
            leeway: config.leeway,
        })
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Checks an application payload against the reserved claims, and
    /// against `iss` when an issuer is configured.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::InvalidPayload`] naming the offending key.
    pub fn validate_payload(&self, payload: &Payload) -> TokenResult<()> {
        validate_payload(payload)?;
        if self.issuer.is_some() && payload.contains_key(ISS) {
            return Err(TokenError::invalid_payload(format!(
                "`{ISS}` is set by the configured issuer"
            )));
        }
        Ok(())
    }

    /// Signs `claims`, adding `iss` when an issuer is configured.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::InvalidPayload`] if `claims` already carry an
    /// `iss` while an issuer is configured.
    pub fn encode(&self, claims: &ClaimSet) -> TokenResult<String> {
        let claims = match &self.issuer {
            Some(_) if claims.contains(ISS) => {
                return Err(TokenError::invalid_payload(format!(
                    "`{ISS}` is set by the configured issuer"
                )));
            }
            Some(issuer) => claims.clone().with(ISS, issuer.as_str()),
            None => claims.clone(),
        };

        encode(&Header::new(self.algorithm), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Encoding(e.to_string()))
    }

    /// Decodes and verifies `token`, including its expiration.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::ClaimsVerification`] if the token is malformed,
    /// the signature or issuer is wrong, or `exp` has elapsed.
    pub fn decode(&self, token: &str) -> TokenResult<ClaimSet> {
        self.decode_with(token, true)
    }

    /// Decodes `token` verifying its signature but not its expiration.
    pub fn decode_claimless(&self, token: &str) -> TokenResult<ClaimSet> {
        self.decode_with(token, false)
    }

    pub fn decode_with(&self, token: &str, verify_expiration: bool) -> TokenResult<ClaimSet> {
        decode::<ClaimSet>(token, &self.decoding_key, &self.validation(verify_expiration))
            .map(|data| data.claims)
            .map_err(|e| TokenError::ClaimsVerification(e.to_string()))
    }

    fn validation(&self, verify_expiration: bool) -> Validation {
        let mut validation = Validation::new(self.algorithm);
        validation.leeway = self.leeway;
        validation.validate_exp = verify_expiration;
        validation.validate_aud = false;
        validation.required_spec_claims = if verify_expiration {
            HashSet::from([EXP.to_string()])
        } else {
            HashSet::new()
        };
        if let Some(issuer) = &self.issuer {
            validation.set_issuer(&[issuer.as_str()]);
        }
        validation
    }
}

fn build_keys(
    algorithm: Algorithm,
    config: &SessionConfig,
) -> TokenResult<(EncodingKey, DecodingKey)> {
    let malconfigured = |e: jsonwebtoken::errors::Error| TokenError::Malconfigured(e.to_string());

    if matches!(algorithm, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512) {
        if config.signing_key.is_empty() {
            return Err(TokenError::Malconfigured("signing key is empty".to_string()));
        }
        let secret = config.signing_key.as_bytes();
        return Ok((EncodingKey::from_secret(secret), DecodingKey::from_secret(secret)));
    }

    let private = config.signing_key.as_bytes();
    let public = config
        .verify_key
        .as_deref()
        .ok_or_else(|| {
            TokenError::Malconfigured(format!("{algorithm:?} requires a verification key"))
        })?
        .as_bytes();

    match algorithm {
        Algorithm::ES256 | Algorithm::ES384 => Ok((
            EncodingKey::from_ec_pem(private).map_err(malconfigured)?,
            DecodingKey::from_ec_pem(public).map_err(malconfigured)?,
        )),
        Algorithm::EdDSA => Ok((
            EncodingKey::from_ed_pem(private).map_err(malconfigured)?,
            DecodingKey::from_ed_pem(public).map_err(malconfigured)?,
        )),
        _ => Ok((
            EncodingKey::from_rsa_pem(private).map_err(malconfigured)?,
            DecodingKey::from_rsa_pem(public).map_err(malconfigured)?,
        )),
    }
}
