//! Shared fixtures for provider integration tests

#![allow(dead_code)]

use provider_client::{
    Credential, MockSigner, PassthroughDigest, ProviderClient, ProviderConfig, RequestSigner,
};
use serde_json::{json, Value};
use std::sync::Arc;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const CONSUMER: &str = "0x8f5a3c1e2b9d4f6a7c8e0b1d2f3a4c5e6b7d8f9a";
pub const PROVIDER_ADDRESS: &str = "0x00c6a0bc5cd0078d6fd0b659e8038aaae1b8b5e5";

/// Route table advertised by the mock provider.
pub fn service_endpoints() -> Value {
    json!({
        "nonce": ["GET", "/api/services/nonce"],
        "encrypt": ["POST", "/api/services/encrypt"],
        "fileinfo": ["POST", "/api/services/fileinfo"],
        "initialize": ["GET", "/api/services/initialize"],
        "download": ["GET", "/api/services/download"],
        "computeEnvironments": ["GET", "/api/services/computeEnvironments"],
        "initializeCompute": ["POST", "/api/services/initializeCompute"],
        "computeStart": ["POST", "/api/services/compute"],
        "freeCompute": ["POST", "/api/services/freeCompute"],
        "computeStatus": ["GET", "/api/services/compute"],
        "computeStop": ["PUT", "/api/services/compute"],
        "computeDelete": ["DELETE", "/api/services/compute"],
        "computeResult": ["GET", "/api/services/computeResult"],
        "computeStreamableLogs": ["GET", "/api/services/computeStreamableLogs"],
        "generateAuthToken": ["POST", "/api/services/auth/token"],
        "invalidateAuthToken": ["POST", "/api/services/auth/token/invalidate"],
    })
}

/// Mount the root self-description with the given routes.
pub async fn mount_root(server: &MockServer, routes: Value) {
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "serviceEndpoints": routes,
            "providerAddress": PROVIDER_ADDRESS,
            "chainIds": [8996],
            "version": "2.1.0",
        })))
        .mount(server)
        .await;
}

/// Mount the nonce route answering `nonce` for `address`.
pub async fn mount_nonce(server: &MockServer, address: &str, nonce: Value) {
    Mock::given(method("GET"))
        .and(path("/api/services/nonce"))
        .and(query_param("userAddress", address))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "nonce": nonce })))
        .mount(server)
        .await;
}

/// Mock provider with the full route table and a zero nonce for [`CONSUMER`].
pub async fn provider() -> MockServer {
    let server = MockServer::start().await;
    mount_root(&server, service_endpoints()).await;
    mount_nonce(&server, CONSUMER, json!(0)).await;
    server
}

pub fn client() -> ProviderClient {
    ProviderClient::new(ProviderConfig::default()).expect("client build")
}

/// Client whose signer sees the raw signed message instead of its digest.
pub fn passthrough_client() -> ProviderClient {
    client().with_request_signer(RequestSigner::default().with_digest(Arc::new(PassthroughDigest)))
}

pub fn signer() -> Arc<MockSigner> {
    Arc::new(MockSigner::new(CONSUMER))
}

pub fn signed(signer: &Arc<MockSigner>) -> Credential {
    Credential::signed(signer.clone())
}

pub fn job_json(job_id: &str, status: i64, status_text: &str) -> Value {
    json!({
        "jobId": job_id,
        "owner": CONSUMER,
        "status": status,
        "statusText": status_text,
        "dateCreated": "1718000000.123",
        "dateFinished": null,
        "results": null,
        "agreementId": "0xagreement",
    })
}
