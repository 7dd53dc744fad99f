//! Message digest schemes.
//!
//! A signed request never signs its raw message string. The message is
//! encoded as UTF-8 and hashed with the scheme the provider re-derives, and
//! the digest bytes are what the signing capability receives.

use sha2::Sha256;
use sha3::{Digest, Keccak256};

/// Encoding and hashing applied to a message before it is signed.
pub trait DigestScheme: Send + Sync {
    /// Short identifier for logs.
    fn name(&self) -> &'static str;

    /// Digest of the UTF-8 encoded message.
    fn digest(&self, message: &str) -> Vec<u8>;
}

/// Keccak-256 over the UTF-8 bytes of the message (provider default).
#[derive(Debug, Clone, Copy, Default)]
pub struct Keccak256Digest;

impl DigestScheme for Keccak256Digest {
    fn name(&self) -> &'static str {
        "keccak256"
    }

    fn digest(&self, message: &str) -> Vec<u8> {
        Keccak256::digest(message.as_bytes()).to_vec()
    }
}

/// SHA-256 over the UTF-8 bytes of the message.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Digest;

impl DigestScheme for Sha256Digest {
    fn name(&self) -> &'static str {
        "sha256"
    }

    fn digest(&self, message: &str) -> Vec<u8> {
        Sha256::digest(message.as_bytes()).to_vec()
    }
}
