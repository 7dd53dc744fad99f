//! HTTP client for the provider API
//!
//! One method per provider RPC. Every method resolves its named route
//! through the [`EndpointDirectory`], attaches authentication when the route
//! is privileged, and surfaces non-success responses with the provider's
//! error body attached.

use chrono::{DateTime, Utc};
use reqwest::{header, Client, RequestBuilder};
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::compute::ComputeOrchestrator;
use crate::config::ProviderConfig;
use crate::credential::{AuthMaterial, ConsumableUrl, Credential};
use crate::endpoints::{EndpointDirectory, ProviderInfo, ServiceEndpoint, ServiceEndpoints};
use crate::error::{ProviderError, Result};
use crate::signer::{messages, MessageSigner, RequestSigner};
use crate::transport;
use crate::types::*;

/// Optional parameters for `initialize`.
#[derive(Debug, Clone, Default)]
pub struct InitializeOptions {
    /// Consumer parameters forwarded as `userdata`
    pub user_data: Option<UserCustomParameters>,
    /// Compute environment the access is for
    pub environment: Option<String>,
    /// Requested end of the fee validity window
    pub valid_until: Option<DateTime<Utc>>,
}

/// Optional parameters for `get_download_url`.
#[derive(Debug, Clone, Default)]
pub struct DownloadOptions {
    /// Consumer parameters forwarded as `userdata`
    pub user_data: Option<UserCustomParameters>,
    /// Access policy server payload
    pub policy_server: Option<serde_json::Value>,
}

/// HTTP client for the provider API
///
/// Cheap to clone; clones share the HTTP connection pool and the resolved
/// route tables.
///
/// # Example
///
/// ```rust,no_run
/// use provider_client::{ProviderClient, ProviderConfig};
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = ProviderClient::new(ProviderConfig::default())?;
/// let cancel = CancellationToken::new();
///
/// if client.is_valid_provider("https://provider.example", &cancel).await {
///     let nonce = client.get_nonce("https://provider.example", "0xabc", &cancel).await?;
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ProviderClient {
    config: Arc<ProviderConfig>,
    http: Client,
    directory: Arc<EndpointDirectory>,
    signer: RequestSigner,
}

impl ProviderClient {
    /// Create a new provider client
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let mut builder = Client::builder().user_agent(config.user_agent.clone());
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let http = builder.build()?;

        Ok(Self {
            signer: RequestSigner::from_config(&config),
            directory: Arc::new(EndpointDirectory::new(http.clone())),
            config: Arc::new(config),
            http,
        })
    }

    /// Replace the request signer (digest scheme, legacy chains).
    pub fn with_request_signer(mut self, signer: RequestSigner) -> Self {
        self.signer = signer;
        self
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    pub fn directory(&self) -> &EndpointDirectory {
        &self.directory
    }

    pub fn request_signer(&self) -> &RequestSigner {
        &self.signer
    }

    /// Compute job operations sharing this client.
    pub fn compute(&self) -> ComputeOrchestrator {
        ComputeOrchestrator::new(self.clone())
    }

    // ==================== Routing ====================

    /// Fetch the provider's root self-description.
    pub async fn get_provider_info(
        &self,
        provider_url: &str,
        cancel: &CancellationToken,
    ) -> Result<ProviderInfo> {
        self.directory.fetch_info(provider_url, cancel).await
    }

    /// Resolved route table for a provider.
    pub async fn get_service_endpoints(
        &self,
        provider_url: &str,
        cancel: &CancellationToken,
    ) -> Result<Arc<ServiceEndpoints>> {
        self.directory.resolve(provider_url, cancel).await
    }

    /// Look up one route; `None` when the provider does not offer it.
    pub async fn get_endpoint_url(
        &self,
        provider_url: &str,
        service_name: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<ServiceEndpoint>> {
        let endpoints = self.directory.resolve(provider_url, cancel).await?;
        Ok(endpoints.lookup(service_name).cloned())
    }

    /// Look up one route the current operation cannot do without.
    pub(crate) async fn require_endpoint(
        &self,
        provider_url: &str,
        service_name: &str,
        cancel: &CancellationToken,
    ) -> Result<ServiceEndpoint> {
        let endpoints = self.directory.resolve(provider_url, cancel).await?;
        endpoints.require(service_name).cloned()
    }

    pub(crate) fn request(&self, endpoint: &ServiceEndpoint) -> RequestBuilder {
        debug!(route = %endpoint.service_name, method = %endpoint.method, url = %endpoint.url, "Provider request");
        self.http.request(endpoint.method.clone(), &endpoint.url)
    }

    // ==================== Authentication ====================

    /// Last nonce the provider has seen for `consumer_address` (0 if none).
    ///
    /// The next signed call must use the returned value plus one.
    pub async fn get_nonce(
        &self,
        provider_url: &str,
        consumer_address: &str,
        cancel: &CancellationToken,
    ) -> Result<u64> {
        let endpoint = self.require_endpoint(provider_url, "nonce", cancel).await?;
        let request = self
            .request(&endpoint)
            .query(&[("userAddress", consumer_address)]);

        let body: serde_json::Value = transport::send_json(request, cancel).await?;
        parse_nonce(body.get("nonce"))
    }

    /// Resolve a credential into the material for one request.
    ///
    /// In signature mode the nonce is fetched, incremented, and embedded in
    /// the operation's message before signing, in that order. Bearer mode
    /// touches neither the nonce route nor the signer.
    pub(crate) async fn authorize<F>(
        &self,
        provider_url: &str,
        credential: &Credential,
        consumer_address: &str,
        cancel: &CancellationToken,
        message: F,
    ) -> Result<AuthMaterial>
    where
        F: FnOnce(u64) -> String,
    {
        match credential {
            Credential::Bearer { token, .. } => Ok(AuthMaterial::Bearer {
                token: token.clone(),
            }),
            Credential::Signed(signer) => {
                let nonce = self.get_nonce(provider_url, consumer_address, cancel).await? + 1;
                let signature = self.sign(signer.as_ref(), &message(nonce), cancel).await?;
                Ok(AuthMaterial::Signature { signature, nonce })
            }
        }
    }

    /// Sign a message, honoring cancellation.
    pub(crate) async fn sign(
        &self,
        signer: &dyn MessageSigner,
        message: &str,
        cancel: &CancellationToken,
    ) -> Result<String> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ProviderError::Cancelled),
            signature = self.signer.sign(signer, message) => signature,
        }
    }

    /// Exchange a signature for a long-lived bearer token.
    pub async fn generate_auth_token(
        &self,
        provider_url: &str,
        signer: &dyn MessageSigner,
        expiration: Option<DateTime<Utc>>,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let endpoint = self
            .require_endpoint(provider_url, "generateAuthToken", cancel)
            .await?;
        let address = signer.address().await?;
        let nonce = self.get_nonce(provider_url, &address, cancel).await? + 1;
        let signature = self
            .sign(signer, &messages::auth_token_message(&address, nonce), cancel)
            .await?;

        let body = AuthTokenBody {
            address: &address,
            signature: &signature,
            nonce,
            expiration: expiration.map(|e| e.timestamp()),
            token: None,
        };
        let request = self.request(&endpoint).json(&body);
        let response: AuthTokenResponse = transport::send_json(request, cancel).await?;

        info!(consumer = %address, "Issued provider auth token");
        Ok(response.token)
    }

    /// Invalidate a previously issued bearer token.
    pub async fn invalidate_auth_token(
        &self,
        provider_url: &str,
        signer: &dyn MessageSigner,
        token: &str,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        let endpoint = self
            .require_endpoint(provider_url, "invalidateAuthToken", cancel)
            .await?;
        let address = signer.address().await?;
        let nonce = self.get_nonce(provider_url, &address, cancel).await? + 1;
        let signature = self
            .sign(signer, &messages::auth_token_message(&address, nonce), cancel)
            .await?;

        let body = AuthTokenBody {
            address: &address,
            signature: &signature,
            nonce,
            expiration: None,
            token: Some(token),
        };
        let request = self.request(&endpoint).json(&body);
        let response: InvalidateTokenResponse = transport::send_json(request, cancel).await?;

        info!(consumer = %address, success = response.success, "Invalidated provider auth token");
        Ok(response.success)
    }

    // ==================== Assets ====================

    /// Encrypt a document (file descriptors or a full asset record).
    ///
    /// Returns the opaque ciphertext used as the record's `files` field.
    pub async fn encrypt<T: Serialize + ?Sized>(
        &self,
        provider_url: &str,
        payload: &T,
        chain_id: u64,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let endpoint = self.require_endpoint(provider_url, "encrypt", cancel).await?;
        let body = serde_json::to_vec(payload)?;
        let request = self
            .request(&endpoint)
            .query(&[("chainId", chain_id)])
            .header(header::CONTENT_TYPE, "application/octet-stream")
            .body(body);

        transport::send_text(request, cancel).await
    }

    /// Check reachability and metadata of a single file.
    pub async fn check_file_info(
        &self,
        provider_url: &str,
        file: &FileDescriptor,
        with_checksum: bool,
        cancel: &CancellationToken,
    ) -> Result<Vec<FileInfo>> {
        let mut body = serde_json::to_value(file)?;
        if let serde_json::Value::Object(map) = &mut body {
            map.insert("checksum".into(), serde_json::Value::Bool(with_checksum));
        }
        self.file_info(provider_url, &body, cancel).await
    }

    /// Check the files behind a published asset's service.
    pub async fn check_did_files(
        &self,
        provider_url: &str,
        did: &str,
        service_id: &str,
        with_checksum: bool,
        cancel: &CancellationToken,
    ) -> Result<Vec<FileInfo>> {
        let body = serde_json::json!({
            "did": did,
            "serviceId": service_id,
            "checksum": with_checksum,
        });
        self.file_info(provider_url, &body, cancel).await
    }

    async fn file_info(
        &self,
        provider_url: &str,
        body: &serde_json::Value,
        cancel: &CancellationToken,
    ) -> Result<Vec<FileInfo>> {
        let endpoint = self.require_endpoint(provider_url, "fileinfo", cancel).await?;
        let request = self.request(&endpoint).json(body);
        transport::send_json(request, cancel).await
    }

    /// Compute environments offered by the provider; `None` without the route.
    pub async fn get_compute_environments(
        &self,
        provider_url: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<Vec<ComputeEnvironment>>> {
        let Some(endpoint) = self
            .get_endpoint_url(provider_url, "computeEnvironments", cancel)
            .await?
        else {
            return Ok(None);
        };

        let request = self.request(&endpoint);
        Ok(Some(transport::send_json(request, cancel).await?))
    }

    /// Fee quote the consumer must satisfy on-chain before downloading.
    #[allow(clippy::too_many_arguments)]
    pub async fn initialize(
        &self,
        provider_url: &str,
        did: &str,
        service_id: &str,
        file_index: u32,
        consumer_address: &str,
        options: &InitializeOptions,
        cancel: &CancellationToken,
    ) -> Result<ProviderInitialize> {
        let endpoint = self.require_endpoint(provider_url, "initialize", cancel).await?;

        let mut params: Vec<(&str, String)> = vec![
            ("documentId", did.to_string()),
            ("serviceId", service_id.to_string()),
            ("fileIndex", file_index.to_string()),
            ("consumerAddress", consumer_address.to_string()),
        ];
        if let Some(user_data) = &options.user_data {
            params.push(("userdata", serde_json::to_string(user_data)?));
        }
        if let Some(environment) = &options.environment {
            params.push(("environment", environment.clone()));
        }
        if let Some(valid_until) = options.valid_until {
            params.push(("validUntil", valid_until.timestamp().to_string()));
        }

        let request = self.request(&endpoint).query(&params);
        transport::send_json(request, cancel).await
    }

    /// Assemble a one-shot download URL for a file.
    ///
    /// Returns `None` when the provider offers no download route. The URL is
    /// built, not fetched.
    #[allow(clippy::too_many_arguments)]
    pub async fn get_download_url(
        &self,
        provider_url: &str,
        did: &str,
        service_id: &str,
        file_index: u32,
        transfer_tx_id: &str,
        credential: &Credential,
        options: &DownloadOptions,
        cancel: &CancellationToken,
    ) -> Result<Option<ConsumableUrl>> {
        let endpoints = self.directory.resolve(provider_url, cancel).await?;
        let Some(endpoint) = endpoints.lookup("download") else {
            return Ok(None);
        };

        let consumer = credential.address().await?;
        let auth = self
            .authorize(provider_url, credential, &consumer, cancel, |nonce| {
                messages::download_message(did, nonce)
            })
            .await?;

        let mut params: Vec<(&str, String)> = vec![
            ("fileIndex", file_index.to_string()),
            ("documentId", did.to_string()),
            ("transferTxId", transfer_tx_id.to_string()),
            ("serviceId", service_id.to_string()),
            ("consumerAddress", consumer),
        ];
        auth.push_query(&mut params);
        if let Some(user_data) = &options.user_data {
            params.push(("userdata", serde_json::to_string(user_data)?));
        }
        if let Some(policy_server) = &options.policy_server {
            params.push(("policyServer", serde_json::to_string(policy_server)?));
        }

        Ok(Some(ConsumableUrl {
            url: transport::build_url(&endpoint.url, &params),
            authorization: auth.token().map(String::from),
        }))
    }

    // ==================== Probes ====================

    /// Whether `url` answers like a provider.
    ///
    /// True only for a success response whose JSON body names a provider
    /// address. Every failure reads as `false`.
    pub async fn is_valid_provider(&self, url: &str, cancel: &CancellationToken) -> bool {
        let request = self.http.get(url);
        match transport::send_json::<serde_json::Value>(request, cancel).await {
            Ok(body) => {
                let has_address = ["providerAddress", "providerAddresses"]
                    .iter()
                    .any(|key| body.get(key).is_some_and(|v| !v.is_null()));
                debug!(url = %url, valid = has_address, "Provider probe answered");
                has_address
            }
            Err(e) => {
                debug!(url = %url, error = %e, "Provider probe failed");
                false
            }
        }
    }
}

#[derive(Serialize)]
struct AuthTokenBody<'a> {
    address: &'a str,
    signature: &'a str,
    nonce: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    expiration: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    token: Option<&'a str>,
}

fn parse_nonce(value: Option<&serde_json::Value>) -> Result<u64> {
    match value {
        None | Some(serde_json::Value::Null) => Ok(0),
        Some(serde_json::Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .ok_or_else(|| ProviderError::MalformedResponse(format!("Invalid nonce: {n}"))),
        Some(serde_json::Value::String(s)) if s.is_empty() => Ok(0),
        Some(serde_json::Value::String(s)) => s
            .parse::<u64>()
            .map_err(|_| ProviderError::MalformedResponse(format!("Invalid nonce: {s}"))),
        Some(other) => Err(ProviderError::MalformedResponse(format!(
            "Invalid nonce: {other}"
        ))),
    }
}
