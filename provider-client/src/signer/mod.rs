//! Request signing.
//!
//! The signing capability itself lives outside this crate (a wallet or
//! ledger client). [`RequestSigner`] owns the parts the provider protocol
//! fixes: how a message is digested, and which signing method a chain uses.

pub mod digest;
pub mod messages;
pub mod mock;

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::{ProviderConfig, DEVELOPMENT_CHAIN_ID};
use crate::error::Result;

pub use digest::{DigestScheme, Keccak256Digest, Sha256Digest};
pub use mock::{MockSigner, PassthroughDigest};

/// Errors reported by a signing capability.
#[derive(Debug, thiserror::Error)]
pub enum SignerError {
    /// The capability does not implement this signing method
    #[error("Signing method not supported")]
    Unsupported,

    /// Signing failed
    #[error("{0}")]
    Failed(String),
}

/// External account capability able to sign provider requests.
#[async_trait]
pub trait MessageSigner: Send + Sync {
    /// Account address the signatures belong to.
    async fn address(&self) -> std::result::Result<String, SignerError>;

    /// Chain the account is connected to.
    async fn chain_id(&self) -> std::result::Result<u64, SignerError>;

    /// Standard message signature over `digest`, hex encoded.
    async fn sign_message(&self, digest: &[u8]) -> std::result::Result<String, SignerError>;

    /// Legacy, non-standard message signature used by development chains.
    async fn sign_legacy(&self, _digest: &[u8]) -> std::result::Result<String, SignerError> {
        Err(SignerError::Unsupported)
    }
}

/// Which signing method a chain uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigningStrategy {
    /// Standard message signing only
    Standard,
    /// Standard signing, falling back to the legacy method when the
    /// capability reports it unsupported
    LegacyFallback,
}

/// Digests signed-message recipes and applies them to a signing capability.
#[derive(Clone)]
pub struct RequestSigner {
    digest: Arc<dyn DigestScheme>,
    legacy_chain_ids: Vec<u64>,
}

impl std::fmt::Debug for RequestSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestSigner")
            .field("digest", &self.digest.name())
            .field("legacy_chain_ids", &self.legacy_chain_ids)
            .finish()
    }
}

impl Default for RequestSigner {
    fn default() -> Self {
        Self {
            digest: Arc::new(Keccak256Digest),
            legacy_chain_ids: vec![DEVELOPMENT_CHAIN_ID],
        }
    }
}

impl RequestSigner {
    /// Build from client configuration, with the default digest.
    pub fn from_config(config: &ProviderConfig) -> Self {
        Self {
            legacy_chain_ids: config.legacy_signing_chain_ids.clone(),
            ..Default::default()
        }
    }

    /// Replace the digest scheme.
    pub fn with_digest(mut self, digest: Arc<dyn DigestScheme>) -> Self {
        self.digest = digest;
        self
    }

    /// Replace the set of chains that use the legacy fallback.
    pub fn with_legacy_chains(mut self, chain_ids: Vec<u64>) -> Self {
        self.legacy_chain_ids = chain_ids;
        self
    }

    /// Strategy for a chain id.
    pub fn strategy_for(&self, chain_id: u64) -> SigningStrategy {
        if self.legacy_chain_ids.contains(&chain_id) {
            SigningStrategy::LegacyFallback
        } else {
            SigningStrategy::Standard
        }
    }

    /// Digest `message` and sign it with `signer`.
    pub async fn sign(&self, signer: &dyn MessageSigner, message: &str) -> Result<String> {
        let digest = self.digest.digest(message);
        let chain_id = signer.chain_id().await?;
        let strategy = self.strategy_for(chain_id);
        debug!(chain_id, digest = self.digest.name(), ?strategy, "Signing provider request");

        match strategy {
            SigningStrategy::Standard => Ok(signer.sign_message(&digest).await?),
            SigningStrategy::LegacyFallback => match signer.sign_message(&digest).await {
                Err(SignerError::Unsupported) => {
                    warn!(chain_id, "Standard signing unavailable, using legacy signing");
                    Ok(signer.sign_legacy(&digest).await?)
                }
                other => Ok(other?),
            },
        }
    }
}
