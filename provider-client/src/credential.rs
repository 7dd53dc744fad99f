//! Credentials for privileged provider calls.
//!
//! A call is authenticated either by a per-request signature over a fresh
//! nonce, or by a provider-issued bearer token. [`AuthMaterial`] is the
//! resolved form attached to one request; it always holds exactly one of the
//! two.

use reqwest::{header, RequestBuilder};
use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::signer::MessageSigner;

/// Caller-supplied credential.
#[derive(Clone)]
pub enum Credential {
    /// Sign every request with the account's signing capability
    Signed(Arc<dyn MessageSigner>),
    /// Present a previously issued bearer token
    Bearer {
        /// Opaque token from `generate_auth_token`
        token: String,
        /// Consumer address the token was issued to
        address: String,
    },
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::Signed(_) => f.write_str("Credential::Signed"),
            Credential::Bearer { address, .. } => f
                .debug_struct("Credential::Bearer")
                .field("address", address)
                .finish_non_exhaustive(),
        }
    }
}

impl Credential {
    pub fn signed(signer: Arc<dyn MessageSigner>) -> Self {
        Credential::Signed(signer)
    }

    pub fn bearer(token: impl Into<String>, address: impl Into<String>) -> Self {
        Credential::Bearer {
            token: token.into(),
            address: address.into(),
        }
    }

    /// Consumer address this credential acts for.
    pub async fn address(&self) -> Result<String> {
        match self {
            Credential::Signed(signer) => Ok(signer.address().await?),
            Credential::Bearer { address, .. } => Ok(address.clone()),
        }
    }

    pub fn is_bearer(&self) -> bool {
        matches!(self, Credential::Bearer { .. })
    }
}

/// Authentication attached to a single request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthMaterial {
    /// Signature over the operation's message, with the nonce it embeds
    Signature { signature: String, nonce: u64 },
    /// Bearer token sent as the `Authorization` header
    Bearer { token: String },
}

impl AuthMaterial {
    pub fn signature(&self) -> Option<&str> {
        match self {
            AuthMaterial::Signature { signature, .. } => Some(signature),
            AuthMaterial::Bearer { .. } => None,
        }
    }

    pub fn nonce(&self) -> Option<u64> {
        match self {
            AuthMaterial::Signature { nonce, .. } => Some(*nonce),
            AuthMaterial::Bearer { .. } => None,
        }
    }

    pub fn token(&self) -> Option<&str> {
        match self {
            AuthMaterial::Bearer { token } => Some(token),
            AuthMaterial::Signature { .. } => None,
        }
    }

    /// Add the `Authorization` header in bearer mode; signatures travel in
    /// the query or body instead.
    pub fn apply(&self, request: RequestBuilder) -> RequestBuilder {
        match self {
            AuthMaterial::Bearer { token } => request.header(header::AUTHORIZATION, token.as_str()),
            AuthMaterial::Signature { .. } => request,
        }
    }

    /// Append `nonce` and `signature` query pairs in signature mode.
    pub(crate) fn push_query(&self, params: &mut Vec<(&'static str, String)>) {
        if let AuthMaterial::Signature { signature, nonce } = self {
            params.push(("nonce", nonce.to_string()));
            params.push(("signature", signature.clone()));
        }
    }
}

/// A URL assembled client-side for the caller to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumableUrl {
    /// Fully qualified URL
    pub url: String,
    /// `Authorization` header value the fetch must carry (bearer mode only)
    pub authorization: Option<String>,
}

impl ConsumableUrl {
    pub fn as_str(&self) -> &str {
        &self.url
    }
}

impl fmt::Display for ConsumableUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}
