//! Provider Client - protocol layer for a data Provider service
//!
//! Talks to a Provider over HTTP to:
//! - Discover the provider's named service routes
//! - Authenticate privileged calls with nonce-protected signatures or bearer tokens
//! - Drive compute jobs from initialization through result retrieval
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │          ComputeOrchestrator            │
//! │  (initialize / start / poll / stop ...) │
//! └────────────────┬────────────────────────┘
//!                  ▼
//! ┌─────────────────────────────────────────┐
//! │            ProviderClient               │
//! │  (encrypt / fileinfo / download / auth) │
//! └──────┬───────────────────────┬──────────┘
//!        ▼                       ▼
//! ┌─────────────┐        ┌──────────────────┐
//! │RequestSigner│───────▶│EndpointDirectory │
//! │ (nonce+sig) │ nonce  │ (route table)    │
//! └─────────────┘        └──────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use provider_client::{Credential, DownloadOptions, MockSigner, ProviderClient, ProviderConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = ProviderClient::new(ProviderConfig::default())?;
//! let cancel = CancellationToken::new();
//!
//! let credential = Credential::signed(Arc::new(MockSigner::new("0xabc")));
//! let url = client
//!     .get_download_url(
//!         "https://provider.example",
//!         "did:op:1",
//!         "0",
//!         0,
//!         "0xTX",
//!         &credential,
//!         &DownloadOptions::default(),
//!         &cancel,
//!     )
//!     .await?;
//!
//! if let Some(url) = url {
//!     println!("fetch {url}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod compute;
pub mod config;
pub mod credential;
pub mod endpoints;
pub mod error;
pub mod signer;
mod transport;
pub mod types;

// Re-export main types for convenience
pub use client::{DownloadOptions, InitializeOptions, ProviderClient};
pub use compute::{ComputeOrchestrator, ComputeStartRequest, InitializeComputeRequest, LogStream};
pub use config::{PollConfig, ProviderConfig};
pub use credential::{AuthMaterial, ConsumableUrl, Credential};
pub use endpoints::{EndpointDirectory, ProviderInfo, ServiceEndpoint, ServiceEndpoints};
pub use error::{ProviderError, Result};
pub use signer::{
    DigestScheme, Keccak256Digest, MessageSigner, MockSigner, PassthroughDigest, RequestSigner,
    Sha256Digest, SignerError, SigningStrategy,
};
pub use types::*;
