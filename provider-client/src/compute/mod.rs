//! Compute job orchestration.
//!
//! Sequences the provider calls behind a compute job's lifecycle:
//!
//! ```text
//! initialize ─▶ start ─▶ status (poll) ─▶ result URL
//!                 │            │
//!                 │            ├─▶ logs (stream)
//!                 │            └─▶ stop
//!                 └──────────────────────▶ delete
//! ```
//!
//! The provider owns job state; this module never caches it. No step is
//! retried here: repeating a start could bill twice, so retry policy is the
//! caller's.

mod stream;

pub use stream::LogStream;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::client::ProviderClient;
use crate::credential::{ConsumableUrl, Credential};
use crate::endpoints::ServiceEndpoints;
use crate::error::{ProviderError, Result};
use crate::signer::messages;
use crate::transport;
use crate::types::*;

/// Compute quote request.
#[derive(Debug, Clone)]
pub struct InitializeComputeRequest {
    pub datasets: Vec<ComputeAsset>,
    pub algorithm: ComputeAlgorithm,
    /// Environment id
    pub environment: String,
    pub payment: ComputePayment,
    pub policy_server: Option<serde_json::Value>,
}

/// Compute start request, shared by paid and free starts.
#[derive(Debug, Clone, Default)]
pub struct ComputeStartRequest {
    /// Environment id
    pub environment: String,
    pub datasets: Vec<ComputeAsset>,
    pub algorithm: ComputeAlgorithm,
    pub resources: Option<Vec<ComputeResourceRequest>>,
    /// Payment terms (ignored by free starts)
    pub payment: Option<ComputePayment>,
    /// Where results should be published
    pub output: Option<serde_json::Value>,
    pub policy_server: Option<serde_json::Value>,
    pub metadata: Option<serde_json::Value>,
    /// Addresses allowed to read the job besides the owner
    pub additional_viewers: Vec<String>,
}

impl ComputeStartRequest {
    pub fn new(
        environment: impl Into<String>,
        datasets: Vec<ComputeAsset>,
        algorithm: ComputeAlgorithm,
    ) -> Self {
        Self {
            environment: environment.into(),
            datasets,
            algorithm,
            ..Default::default()
        }
    }

    pub fn with_payment(mut self, payment: ComputePayment) -> Self {
        self.payment = Some(payment);
        self
    }

    pub fn with_resources(mut self, resources: Vec<ComputeResourceRequest>) -> Self {
        self.resources = Some(resources);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StartKind {
    Paid,
    Free,
}

impl StartKind {
    fn route(self) -> &'static str {
        match self {
            StartKind::Paid => "computeStart",
            StartKind::Free => "freeCompute",
        }
    }
}

/// Compute job operations against a provider.
#[derive(Debug, Clone)]
pub struct ComputeOrchestrator {
    client: ProviderClient,
}

impl ComputeOrchestrator {
    pub fn new(client: ProviderClient) -> Self {
        Self { client }
    }

    /// Request a quote for running `algorithm` over `datasets`.
    ///
    /// Signs `consumer + firstDataset + nonce`, since the quote may gate
    /// access to confidential files.
    pub async fn initialize_compute(
        &self,
        provider_url: &str,
        request: &InitializeComputeRequest,
        credential: &Credential,
        cancel: &CancellationToken,
    ) -> Result<ProviderComputeInitializeResults> {
        let endpoint = self
            .client
            .require_endpoint(provider_url, "initializeCompute", cancel)
            .await?;
        let first = first_dataset(&request.datasets)?;

        let consumer = credential.address().await?;
        let auth = self
            .client
            .authorize(provider_url, credential, &consumer, cancel, |nonce| {
                messages::initialize_compute_message(&consumer, &first.document_id, nonce)
            })
            .await?;

        let body = InitializeComputeBody {
            datasets: &request.datasets,
            algorithm: &request.algorithm,
            environment: &request.environment,
            payment: &request.payment,
            consumer_address: &consumer,
            signature: auth.signature(),
            nonce: auth.nonce(),
            policy_server: request.policy_server.as_ref(),
        };
        let http = auth.apply(self.client.request(&endpoint).json(&body));

        transport::send_json(http, cancel).await
    }

    /// Legacy quote request with positional payment fields.
    ///
    /// Unsigned. Kept for providers that predate [`initialize_compute`](Self::initialize_compute);
    /// new integrations should not use it.
    #[allow(clippy::too_many_arguments)]
    pub async fn initialize_compute_v1(
        &self,
        provider_url: &str,
        datasets: &[ComputeAsset],
        algorithm: &ComputeAlgorithm,
        environment: &str,
        valid_until: DateTime<Utc>,
        consumer_address: &str,
        cancel: &CancellationToken,
    ) -> Result<ProviderComputeInitializeResults> {
        let endpoint = self
            .client
            .require_endpoint(provider_url, "initializeCompute", cancel)
            .await?;

        let body = serde_json::json!({
            "datasets": datasets,
            "algorithm": algorithm,
            "compute": {
                "env": environment,
                "validUntil": valid_until.timestamp(),
            },
            "consumerAddress": consumer_address,
        });
        let http = self.client.request(&endpoint).json(&body);

        transport::send_json(http, cancel).await
    }

    /// Start a paid compute job.
    ///
    /// Signs `consumer + firstDataset + nonce`. Never retried: a repeated
    /// start may be billed again.
    pub async fn compute_start(
        &self,
        provider_url: &str,
        credential: &Credential,
        request: &ComputeStartRequest,
        cancel: &CancellationToken,
    ) -> Result<JobResponse> {
        self.start(StartKind::Paid, provider_url, credential, request, cancel)
            .await
    }

    /// Start a free compute job.
    ///
    /// Signs the nonce alone; there is no payment proof to bind the
    /// datasets to.
    pub async fn free_compute_start(
        &self,
        provider_url: &str,
        credential: &Credential,
        request: &ComputeStartRequest,
        cancel: &CancellationToken,
    ) -> Result<JobResponse> {
        self.start(StartKind::Free, provider_url, credential, request, cancel)
            .await
    }

    async fn start(
        &self,
        kind: StartKind,
        provider_url: &str,
        credential: &Credential,
        request: &ComputeStartRequest,
        cancel: &CancellationToken,
    ) -> Result<JobResponse> {
        let endpoint = self
            .client
            .require_endpoint(provider_url, kind.route(), cancel)
            .await?;

        let consumer = credential.address().await?;
        let auth = match kind {
            StartKind::Paid => {
                let first = first_dataset(&request.datasets)?;
                self.client
                    .authorize(provider_url, credential, &consumer, cancel, |nonce| {
                        messages::start_message(&consumer, &first.document_id, nonce)
                    })
                    .await?
            }
            StartKind::Free => {
                self.client
                    .authorize(provider_url, credential, &consumer, cancel, messages::free_start_message)
                    .await?
            }
        };

        let body = StartBody {
            consumer_address: &consumer,
            signature: auth.signature(),
            nonce: auth.nonce(),
            environment: &request.environment,
            datasets: &request.datasets,
            algorithm: &request.algorithm,
            resources: request.resources.as_deref(),
            payment: match kind {
                StartKind::Paid => request.payment.as_ref(),
                StartKind::Free => None,
            },
            output: request.output.as_ref(),
            policy_server: request.policy_server.as_ref(),
            metadata: request.metadata.as_ref(),
            additional_viewers: &request.additional_viewers,
        };
        let http = auth.apply(self.client.request(&endpoint).json(&body));

        let jobs: JobResponse = transport::send_json(http, cancel).await?;
        info!(
            consumer = %consumer,
            route = kind.route(),
            job_id = jobs.first().map(|j| j.job_id.as_str()).unwrap_or_default(),
            "Compute job started"
        );
        Ok(jobs)
    }

    /// Current status of the consumer's jobs.
    ///
    /// Idempotent and unsigned; the only way to observe a job's progress.
    pub async fn compute_status(
        &self,
        provider_url: &str,
        consumer_address: &str,
        job_id: Option<&str>,
        agreement_id: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<JobResponse> {
        let endpoint = self
            .client
            .require_endpoint(provider_url, "computeStatus", cancel)
            .await?;

        let mut params = vec![("consumerAddress", consumer_address)];
        if let Some(job_id) = job_id {
            params.push(("jobId", job_id));
        }
        if let Some(agreement_id) = agreement_id {
            params.push(("agreementId", agreement_id));
        }

        let http = self.client.request(&endpoint).query(&params);
        transport::send_json(http, cancel).await
    }

    /// Poll a job until it reaches a terminal phase.
    ///
    /// Waits between polls follow the client's capped exponential backoff.
    /// A failed status read ends the wait with that error.
    ///
    /// A status response that does not list `job_id` ends the wait with
    /// [`ProviderError::MalformedResponse`], including right after a start
    /// when the provider has not registered the job yet. Callers that start
    /// and wait back to back should retry on that error themselves.
    pub async fn wait_for_job(
        &self,
        provider_url: &str,
        consumer_address: &str,
        job_id: &str,
        cancel: &CancellationToken,
    ) -> Result<ComputeJob> {
        let poll = self.client.config().poll.clone();
        let mut attempt = 0u32;

        loop {
            let jobs = self
                .compute_status(provider_url, consumer_address, Some(job_id), None, cancel)
                .await?
                .into_jobs();
            let job = jobs
                .into_iter()
                .find(|j| j.job_id == job_id)
                .ok_or_else(|| {
                    ProviderError::MalformedResponse(format!("Job {job_id} missing from status response"))
                })?;

            let phase = job.phase();
            if phase.is_terminal() {
                return Ok(job);
            }

            let delay = poll.delay_for(attempt);
            debug!(job_id, ?phase, delay_ms = delay.as_millis() as u64, "Job not finished");
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
            attempt = attempt.saturating_add(1);
        }
    }

    /// Open the job's log stream.
    ///
    /// Signs `consumer + jobId + nonce`. The returned stream stays open until
    /// the provider closes it or `cancel` fires.
    pub async fn compute_streamable_logs(
        &self,
        provider_url: &str,
        credential: &Credential,
        job_id: &str,
        cancel: &CancellationToken,
    ) -> Result<LogStream> {
        let endpoint = self
            .client
            .require_endpoint(provider_url, "computeStreamableLogs", cancel)
            .await?;

        let consumer = credential.address().await?;
        let auth = self
            .client
            .authorize(provider_url, credential, &consumer, cancel, |nonce| {
                messages::logs_message(&consumer, job_id, nonce)
            })
            .await?;

        let mut params: Vec<(&str, String)> =
            vec![("consumerAddress", consumer.clone()), ("jobId", job_id.to_string())];
        auth.push_query(&mut params);

        let http = auth.apply(self.client.request(&endpoint).query(&params));
        let stream = LogStream::open(http, cancel.clone()).await?;

        debug!(job_id, "Opened compute log stream");
        Ok(stream)
    }

    /// Ask the provider to stop a running job.
    ///
    /// Signs `consumer + jobId`. Providers do not verify this signature yet;
    /// it is sent so the request stays valid once they do.
    pub async fn compute_stop(
        &self,
        provider_url: &str,
        credential: &Credential,
        job_id: &str,
        agreement_id: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<JobResponse> {
        let endpoint = self
            .client
            .require_endpoint(provider_url, "computeStop", cancel)
            .await?;

        let consumer = credential.address().await?;
        let auth = self
            .client
            .authorize(provider_url, credential, &consumer, cancel, |_nonce| {
                messages::stop_message(&consumer, job_id)
            })
            .await?;

        let mut params: Vec<(&str, String)> = vec![("consumerAddress", consumer.clone())];
        auth.push_query(&mut params);
        params.push(("jobId", job_id.to_string()));
        if let Some(agreement_id) = agreement_id {
            params.push(("agreementId", agreement_id.to_string()));
        }

        let http = auth.apply(self.client.request(&endpoint).query(&params));
        let jobs = transport::send_json(http, cancel).await?;

        info!(consumer = %consumer, job_id, "Compute job stop requested");
        Ok(jobs)
    }

    /// Delete a finished job and its results. Irreversible.
    ///
    /// Signs `consumer + jobId + did + nonce`.
    pub async fn compute_delete(
        &self,
        provider_url: &str,
        did: &str,
        credential: &Credential,
        job_id: &str,
        cancel: &CancellationToken,
    ) -> Result<JobResponse> {
        let endpoint = self
            .client
            .require_endpoint(provider_url, "computeDelete", cancel)
            .await?;

        let consumer = credential.address().await?;
        let auth = self
            .client
            .authorize(provider_url, credential, &consumer, cancel, |nonce| {
                messages::delete_message(&consumer, job_id, did, nonce)
            })
            .await?;

        let body = DeleteBody {
            document_id: did,
            consumer_address: &consumer,
            job_id,
            signature: auth.signature(),
            nonce: auth.nonce(),
        };
        let http = auth.apply(self.client.request(&endpoint).json(&body));
        let jobs = transport::send_json(http, cancel).await?;

        info!(consumer = %consumer, job_id, "Compute job deleted");
        Ok(jobs)
    }

    /// URL of one result artifact; `None` without a result route.
    ///
    /// Resolves the route table (cached after first use) and defers to
    /// [`build_compute_result_url`](Self::build_compute_result_url).
    pub async fn get_compute_result_url(
        &self,
        provider_url: &str,
        credential: &Credential,
        job_id: &str,
        index: u32,
        cancel: &CancellationToken,
    ) -> Result<Option<ConsumableUrl>> {
        let endpoints = self.client.get_service_endpoints(provider_url, cancel).await?;
        self.build_compute_result_url(&endpoints, credential, job_id, index, cancel)
            .await
    }

    /// Assemble a result URL from a resolved route table without any HTTP call.
    ///
    /// In signature mode the nonce is the current Unix time in milliseconds
    /// and `consumer + jobId + index + nonce` is signed. In bearer mode the
    /// URL carries no nonce or signature and the token is returned as the
    /// authorization to present.
    pub async fn build_compute_result_url(
        &self,
        endpoints: &ServiceEndpoints,
        credential: &Credential,
        job_id: &str,
        index: u32,
        cancel: &CancellationToken,
    ) -> Result<Option<ConsumableUrl>> {
        let Some(endpoint) = endpoints.lookup("computeResult") else {
            return Ok(None);
        };

        let consumer = credential.address().await?;
        let mut params: Vec<(&str, String)> = vec![
            ("consumerAddress", consumer.clone()),
            ("jobId", job_id.to_string()),
            ("index", index.to_string()),
        ];

        let authorization = match credential {
            Credential::Bearer { token, .. } => Some(token.clone()),
            Credential::Signed(signer) => {
                let nonce = Utc::now().timestamp_millis().max(0) as u64;
                let message = messages::result_message(&consumer, job_id, index, nonce);
                let signature = self.client.sign(signer.as_ref(), &message, cancel).await?;
                params.push(("nonce", nonce.to_string()));
                params.push(("signature", signature));
                None
            }
        };

        Ok(Some(ConsumableUrl {
            url: transport::build_url(&endpoint.url, &params),
            authorization,
        }))
    }
}

fn first_dataset(datasets: &[ComputeAsset]) -> Result<&ComputeAsset> {
    datasets
        .first()
        .ok_or_else(|| ProviderError::InvalidInput("at least one dataset is required".to_string()))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InitializeComputeBody<'a> {
    datasets: &'a [ComputeAsset],
    algorithm: &'a ComputeAlgorithm,
    environment: &'a str,
    payment: &'a ComputePayment,
    consumer_address: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    signature: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    nonce: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    policy_server: Option<&'a serde_json::Value>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StartBody<'a> {
    consumer_address: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    signature: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    nonce: Option<u64>,
    environment: &'a str,
    datasets: &'a [ComputeAsset],
    algorithm: &'a ComputeAlgorithm,
    #[serde(skip_serializing_if = "Option::is_none")]
    resources: Option<&'a [ComputeResourceRequest]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    payment: Option<&'a ComputePayment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    output: Option<&'a serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    policy_server: Option<&'a serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<&'a serde_json::Value>,
    #[serde(skip_serializing_if = "no_viewers")]
    additional_viewers: &'a [String],
}

fn no_viewers(viewers: &&[String]) -> bool {
    viewers.is_empty()
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DeleteBody<'a> {
    document_id: &'a str,
    consumer_address: &'a str,
    job_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    signature: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    nonce: Option<u64>,
}
