//! Endpoint directory
//!
//! A provider describes itself at its root URL with a map of logical service
//! names to `[method, pathSuffix]` pairs. The directory turns that document
//! into absolute, typed routes and caches them per base URL. Cached tables
//! are immutable and shared across concurrent calls.

use dashmap::DashMap;
use reqwest::{Client, Method};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{ProviderError, Result};
use crate::transport;

/// Root self-description document served at the provider base URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderInfo {
    /// Logical service name to `[method, pathSuffix]`
    pub service_endpoints: BTreeMap<String, (String, String)>,
    /// Single provider signing address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_address: Option<serde_json::Value>,
    /// Per-chain provider signing addresses
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_addresses: Option<serde_json::Value>,
    /// Chains the provider serves
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub chain_ids: Vec<serde_json::Value>,
    /// Provider software version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl ProviderInfo {
    /// Whether the document names a provider address.
    pub fn has_provider_address(&self) -> bool {
        self.provider_address.as_ref().is_some_and(|v| !v.is_null())
            || self.provider_addresses.as_ref().is_some_and(|v| !v.is_null())
    }
}

/// A single named provider route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEndpoint {
    /// Logical service name as advertised by the provider
    pub service_name: String,
    /// HTTP method for the route
    pub method: Method,
    /// Absolute URL of the route
    pub url: String,
}

/// Resolved route table for one provider.
#[derive(Debug, Clone, Default)]
pub struct ServiceEndpoints {
    base_url: String,
    endpoints: Vec<ServiceEndpoint>,
}

impl ServiceEndpoints {
    /// Build the table from a self-description, joining every path suffix onto `base_url`.
    pub fn from_info(base_url: &str, info: &ProviderInfo) -> Result<Self> {
        let mut endpoints = Vec::with_capacity(info.service_endpoints.len());

        for (name, (method, suffix)) in &info.service_endpoints {
            let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes()).map_err(|_| {
                ProviderError::MalformedResponse(format!(
                    "Invalid HTTP method {method:?} for route {name}"
                ))
            })?;

            endpoints.push(ServiceEndpoint {
                service_name: name.clone(),
                method,
                url: join_url(base_url, suffix),
            });
        }

        Ok(Self {
            base_url: base_url.to_string(),
            endpoints,
        })
    }

    /// Case-insensitive exact match on the service name.
    pub fn lookup(&self, name: &str) -> Option<&ServiceEndpoint> {
        self.endpoints
            .iter()
            .find(|e| e.service_name.eq_ignore_ascii_case(name))
    }

    /// Like [`lookup`](Self::lookup), but absence is an error.
    pub fn require(&self, name: &str) -> Result<&ServiceEndpoint> {
        self.lookup(name).ok_or_else(|| ProviderError::RouteNotSupported {
            route: name.to_string(),
        })
    }

    /// Provider base URL the table was resolved from.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn iter(&self) -> impl Iterator<Item = &ServiceEndpoint> {
        self.endpoints.iter()
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}

/// Join a base URL and a path suffix with exactly one `/` between them.
pub fn join_url(base: &str, suffix: &str) -> String {
    let base = base.trim_end_matches('/');
    let suffix = suffix.trim_start_matches('/');
    if suffix.is_empty() {
        return base.to_string();
    }
    format!("{}/{}", base, suffix)
}

/// Resolves and caches provider route tables.
#[derive(Debug)]
pub struct EndpointDirectory {
    client: Client,
    cache: DashMap<String, Arc<ServiceEndpoints>>,
}

impl EndpointDirectory {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            cache: DashMap::new(),
        }
    }

    /// Fetch the provider's root self-description.
    ///
    /// Never cached; every call hits the provider.
    pub async fn fetch_info(&self, provider_url: &str, cancel: &CancellationToken) -> Result<ProviderInfo> {
        url::Url::parse(provider_url)?;
        debug!(provider = %provider_url, "Fetching provider self-description");

        let request = self
            .client
            .get(provider_url)
            .header(reqwest::header::ACCEPT, "application/json");

        transport::send_json(request, cancel).await
    }

    /// Resolve the route table for `provider_url`, using the cache when possible.
    ///
    /// Failures are surfaced and never cached.
    pub async fn resolve(
        &self,
        provider_url: &str,
        cancel: &CancellationToken,
    ) -> Result<Arc<ServiceEndpoints>> {
        let key = provider_url.trim_end_matches('/');
        if let Some(cached) = self.cache.get(key) {
            return Ok(Arc::clone(cached.value()));
        }

        let info = self.fetch_info(provider_url, cancel).await?;
        let endpoints = Arc::new(ServiceEndpoints::from_info(key, &info)?);
        debug!(provider = %key, routes = endpoints.len(), "Resolved provider routes");

        self.cache.insert(key.to_string(), Arc::clone(&endpoints));
        Ok(endpoints)
    }

    /// Drop the cached table for `provider_url`.
    pub fn invalidate(&self, provider_url: &str) {
        self.cache.remove(provider_url.trim_end_matches('/'));
    }
}
