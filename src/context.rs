//! Shared dependencies of every session.

use std::sync::Arc;

use tessera_auth::ClaimCodec;
use tessera_config::SessionConfig;
use tessera_core::TokenResult;
use tessera_store::TokenStore;

/// Configuration, codec and store, shared by all sessions of a process.
///
/// Cloning is cheap; every field is reference counted.
#[derive(Clone)]
pub struct SessionContext {
    config: Arc<SessionConfig>,
    codec: Arc<ClaimCodec>,
    store: Arc<dyn TokenStore>,
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("codec", &self.codec)
            .field("access_exp_time", &self.config.access_exp_time)
            .field("refresh_exp_time", &self.config.refresh_exp_time)
            .finish_non_exhaustive()
    }
}

impl SessionContext {
    /// # Errors
    ///
    /// Returns `TokenError::Malconfigured` if the signing settings are unusable.
    pub fn new(config: SessionConfig, store: Arc<dyn TokenStore>) -> TokenResult<Self> {
        let codec = ClaimCodec::new(&config)?;
        Ok(Self {
            config: Arc::new(config),
            codec: Arc::new(codec),
            store,
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn codec(&self) -> &ClaimCodec {
        &self.codec
    }

    pub fn store(&self) -> &dyn TokenStore {
        self.store.as_ref()
    }
}
