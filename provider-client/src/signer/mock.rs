//! Mock signing capability for testing.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;

use super::{DigestScheme, MessageSigner, SignerError};

/// Mock signer for testing.
///
/// Signatures are `sig:<hex digest>` (or `legacy:<hex digest>`), so they are
/// deterministic and differ for every distinct digest. Every digest handed
/// to the signer is recorded.
pub struct MockSigner {
    address: String,
    chain_id: u64,
    standard_signing: AtomicBool,
    address_calls: AtomicU32,
    sign_calls: AtomicU32,
    legacy_calls: AtomicU32,
    digests: Mutex<Vec<Vec<u8>>>,
}

impl MockSigner {
    /// Create a new mock signer for `address` on chain 1.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            chain_id: 1,
            standard_signing: AtomicBool::new(true),
            address_calls: AtomicU32::new(0),
            sign_calls: AtomicU32::new(0),
            legacy_calls: AtomicU32::new(0),
            digests: Mutex::new(Vec::new()),
        }
    }

    /// Set the chain id.
    pub fn with_chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = chain_id;
        self
    }

    /// Enable or disable the standard signing method.
    pub fn with_standard_signing(self, enabled: bool) -> Self {
        self.standard_signing.store(enabled, Ordering::SeqCst);
        self
    }

    /// Canned signature for a digest.
    pub fn signature_for(digest: &[u8]) -> String {
        format!("sig:{}", hex::encode(digest))
    }

    /// Number of standard and legacy signing calls.
    pub fn sign_count(&self) -> u32 {
        self.sign_calls.load(Ordering::SeqCst)
    }

    /// Number of legacy signing calls.
    pub fn legacy_sign_count(&self) -> u32 {
        self.legacy_calls.load(Ordering::SeqCst)
    }

    /// Number of address lookups.
    pub fn address_count(&self) -> u32 {
        self.address_calls.load(Ordering::SeqCst)
    }

    /// Digests signed so far, in order.
    pub fn signed_digests(&self) -> Vec<Vec<u8>> {
        self.digests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Digests signed so far, read as UTF-8.
    ///
    /// Meaningful with [`PassthroughDigest`], where the digest is the message.
    pub fn signed_messages(&self) -> Vec<String> {
        self.signed_digests()
            .iter()
            .map(|d| String::from_utf8_lossy(d).into_owned())
            .collect()
    }

    fn record(&self, digest: &[u8]) {
        self.sign_calls.fetch_add(1, Ordering::SeqCst);
        self.digests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(digest.to_vec());
    }
}

#[async_trait]
impl MessageSigner for MockSigner {
    async fn address(&self) -> Result<String, SignerError> {
        self.address_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.address.clone())
    }

    async fn chain_id(&self) -> Result<u64, SignerError> {
        Ok(self.chain_id)
    }

    async fn sign_message(&self, digest: &[u8]) -> Result<String, SignerError> {
        if !self.standard_signing.load(Ordering::SeqCst) {
            return Err(SignerError::Unsupported);
        }
        self.record(digest);
        Ok(Self::signature_for(digest))
    }

    async fn sign_legacy(&self, digest: &[u8]) -> Result<String, SignerError> {
        self.legacy_calls.fetch_add(1, Ordering::SeqCst);
        self.record(digest);
        Ok(format!("legacy:{}", hex::encode(digest)))
    }
}

/// Digest scheme that hands the raw UTF-8 message to the signer.
///
/// Lets tests observe the exact signed-message recipe.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughDigest;

impl DigestScheme for PassthroughDigest {
    fn name(&self) -> &'static str {
        "passthrough"
    }

    fn digest(&self, message: &str) -> Vec<u8> {
        message.as_bytes().to_vec()
    }
}
