//! Wire types for the provider API

use serde::{Deserialize, Deserializer, Serialize};

/// Free-form user parameters forwarded to the provider as `userdata`.
pub type UserCustomParameters = serde_json::Map<String, serde_json::Value>;

/// File descriptor checked through `fileinfo`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileDescriptor {
    /// Storage type (e.g. "url", "ipfs", "arweave")
    #[serde(rename = "type")]
    pub file_type: String,
    /// Type-specific fields (url, method, headers, hash ...)
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl FileDescriptor {
    /// Plain URL file.
    pub fn url(url: impl Into<String>) -> Self {
        let mut fields = serde_json::Map::new();
        fields.insert("url".into(), serde_json::Value::String(url.into()));
        fields.insert("method".into(), serde_json::Value::String("GET".into()));
        Self {
            file_type: "url".to_string(),
            fields,
        }
    }
}

/// Per-file validity record returned by `fileinfo`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
    /// Whether the provider could reach the file
    #[serde(default)]
    pub valid: bool,
    /// File index within the asset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_length: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// Present when a checksum was requested
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub file_type: Option<String>,
}

/// Provider fee quote attached to an access or compute order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderFees {
    #[serde(default)]
    pub provider_fee_address: Option<String>,
    #[serde(default)]
    pub provider_fee_token: Option<String>,
    /// Amount in the token's smallest unit
    #[serde(default, deserialize_with = "string_or_number")]
    pub provider_fee_amount: Option<String>,
    #[serde(default)]
    pub v: Option<serde_json::Value>,
    #[serde(default)]
    pub r: Option<String>,
    #[serde(default)]
    pub s: Option<String>,
    #[serde(default)]
    pub provider_data: Option<String>,
    /// Unix timestamp after which the quote is void
    #[serde(default)]
    pub valid_until: Option<i64>,
}

/// Result of `initialize` for a downloadable asset.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderInitialize {
    #[serde(default)]
    pub datatoken: Option<String>,
    #[serde(default)]
    pub nonce: Option<serde_json::Value>,
    #[serde(default)]
    pub compute_address: Option<String>,
    pub provider_fee: ProviderFees,
}

/// Reference to a previously placed order that can be reused.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidOrder {
    /// Transaction id of the reusable order
    #[serde(default)]
    pub tx_id: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Per-asset quote inside a compute initialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderComputeInitialize {
    #[serde(default)]
    pub datatoken: Option<String>,
    /// Existing order that still satisfies the quote
    #[serde(default, deserialize_with = "valid_order")]
    pub valid_order: Option<ValidOrder>,
    #[serde(default)]
    pub provider_fee: Option<ProviderFees>,
}

/// Result of `initializeCompute`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderComputeInitializeResults {
    #[serde(default)]
    pub algorithm: Option<ProviderComputeInitialize>,
    #[serde(default)]
    pub datasets: Vec<ProviderComputeInitialize>,
    /// Resource quote for the environment (escrow amount, token, cost)
    #[serde(default)]
    pub payment: Option<serde_json::Value>,
}

/// Dataset reference for compute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputeAsset {
    pub document_id: String,
    pub service_id: String,
    /// Transaction proving the order was paid
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transfer_tx_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_data: Option<UserCustomParameters>,
}

impl ComputeAsset {
    pub fn new(document_id: impl Into<String>, service_id: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
            service_id: service_id.into(),
            transfer_tx_id: None,
            user_data: None,
        }
    }

    pub fn with_transfer_tx(mut self, tx_id: impl Into<String>) -> Self {
        self.transfer_tx_id = Some(tx_id.into());
        self
    }
}

/// Algorithm for compute: a published asset or raw code.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputeAlgorithm {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transfer_tx_id: Option<String>,
    /// Inline algorithm definition used instead of a published asset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub algocustomdata: Option<UserCustomParameters>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_data: Option<UserCustomParameters>,
}

impl ComputeAlgorithm {
    /// Published algorithm asset.
    pub fn published(document_id: impl Into<String>, service_id: impl Into<String>) -> Self {
        Self {
            document_id: Some(document_id.into()),
            service_id: Some(service_id.into()),
            ..Default::default()
        }
    }

    /// Raw algorithm code.
    pub fn raw(meta: serde_json::Value) -> Self {
        Self {
            meta: Some(meta),
            ..Default::default()
        }
    }
}

/// Server-advertised compute environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputeEnvironment {
    pub id: String,
    /// Remaining descriptor fields (resources, fees, limits ...)
    #[serde(flatten)]
    pub details: serde_json::Map<String, serde_json::Value>,
}

/// Resource amount requested from an environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputeResourceRequest {
    pub id: String,
    pub amount: u64,
}

/// Payment terms for a compute job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputePayment {
    pub chain_id: u64,
    pub token: String,
    /// Maximum job duration in seconds
    pub max_job_duration: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<Vec<ComputeResourceRequest>>,
}

/// One result artifact of a compute job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputeResult {
    pub filename: String,
    #[serde(default)]
    pub filesize: u64,
    #[serde(rename = "type", default)]
    pub result_type: String,
    #[serde(default)]
    pub index: Option<u32>,
}

/// Server-owned compute job, as observed by polling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputeJob {
    pub job_id: String,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub status: i64,
    #[serde(default)]
    pub status_text: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub date_created: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub date_finished: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub results: Vec<ComputeResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agreement_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
}

/// Lifecycle phase derived from a job's `status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobPhase {
    /// Accepted and waiting for, or provisioning, resources
    Queued,
    /// Algorithm running or results being published
    Running,
    Succeeded,
    Failed,
    Stopped,
    /// Status code this client does not recognize
    Unknown(i64),
}

impl JobPhase {
    /// Map a provider status code and text onto the lifecycle.
    ///
    /// A status text containing the word "stopped" always wins, since
    /// providers report stopped jobs with their last numeric status. In-flight
    /// texts such as "Stopping job" keep the code's phase.
    pub fn from_status(code: i64, text: &str) -> Self {
        let stopped = text
            .split(|c: char| !c.is_ascii_alphanumeric())
            .any(|word| word.eq_ignore_ascii_case("stopped"));
        if stopped {
            return JobPhase::Stopped;
        }
        match code {
            0 | 1 | 10 | 20 | 30 => JobPhase::Queued,
            40 | 50 | 60 => JobPhase::Running,
            70 => JobPhase::Succeeded,
            11 | 21 | 31 | 32 | 33 | 41 | 61 | 62 => JobPhase::Failed,
            other => JobPhase::Unknown(other),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobPhase::Succeeded | JobPhase::Failed | JobPhase::Stopped)
    }
}

impl ComputeJob {
    pub fn phase(&self) -> JobPhase {
        JobPhase::from_status(self.status, &self.status_text)
    }
}

/// Compute endpoints answer with one job or an array of jobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JobResponse {
    Many(Vec<ComputeJob>),
    Single(Box<ComputeJob>),
}

impl JobResponse {
    pub fn into_jobs(self) -> Vec<ComputeJob> {
        match self {
            JobResponse::Many(jobs) => jobs,
            JobResponse::Single(job) => vec![*job],
        }
    }

    pub fn first(&self) -> Option<&ComputeJob> {
        match self {
            JobResponse::Many(jobs) => jobs.first(),
            JobResponse::Single(job) => Some(job),
        }
    }
}

/// Response of `generateAuthToken`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct AuthTokenResponse {
    pub token: String,
}

/// Response of `invalidateAuthToken`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct InvalidateTokenResponse {
    #[serde(default)]
    pub success: bool,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// Providers send `validOrder: false` when no reusable order exists.
fn valid_order<'de, D>(deserializer: D) -> Result<Option<ValidOrder>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    match value {
        None | Some(serde_json::Value::Null) | Some(serde_json::Value::Bool(false)) => Ok(None),
        Some(serde_json::Value::String(tx_id)) => Ok(Some(ValidOrder {
            tx_id: Some(tx_id),
            extra: serde_json::Map::new(),
        })),
        Some(other) => serde_json::from_value(other)
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_job_response_shapes() {
        let single: JobResponse = serde_json::from_value(json!({
            "jobId": "a", "owner": "0x1", "status": 40, "statusText": "Running algorithm",
            "dateCreated": "1683045732.0", "dateFinished": null, "results": null
        }))
        .unwrap();
        assert_eq!(single.first().unwrap().job_id, "a");
        assert_eq!(single.clone().into_jobs().len(), 1);

        let many: JobResponse = serde_json::from_value(json!([
            { "jobId": "a", "status": 1, "statusText": "Warming up", "dateCreated": 1683045732 },
            { "jobId": "b", "status": 70, "statusText": "Job finished", "results": [
                { "filename": "out.log", "filesize": 12, "type": "output", "index": 0 }
            ]}
        ]))
        .unwrap();
        let jobs = many.into_jobs();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].date_created.as_deref(), Some("1683045732"));
        assert_eq!(jobs[1].results[0].filename, "out.log");
    }

    #[test]
    fn test_job_phases() {
        assert_eq!(JobPhase::from_status(1, "Warming up"), JobPhase::Queued);
        assert_eq!(JobPhase::from_status(40, "Running algorithm"), JobPhase::Running);
        assert_eq!(JobPhase::from_status(70, "Job finished"), JobPhase::Succeeded);
        assert_eq!(JobPhase::from_status(32, "Algorithm provisioning failed"), JobPhase::Failed);
        assert_eq!(JobPhase::from_status(70, "Job stopped"), JobPhase::Stopped);
        assert_eq!(JobPhase::from_status(99, ""), JobPhase::Unknown(99));

        assert!(JobPhase::Stopped.is_terminal());
        assert!(!JobPhase::Running.is_terminal());
        assert!(!JobPhase::Unknown(99).is_terminal());
    }

    #[test]
    fn test_stopping_job_is_not_terminal() {
        assert_eq!(JobPhase::from_status(40, "Stopping job"), JobPhase::Running);
        assert!(!JobPhase::from_status(40, "Stopping job").is_terminal());
        assert_eq!(JobPhase::from_status(40, "Job STOPPED by user"), JobPhase::Stopped);
        assert_eq!(JobPhase::from_status(60, "Unstoppable"), JobPhase::Running);
    }

    #[test]
    fn test_valid_order_shapes() {
        let none: ProviderComputeInitialize =
            serde_json::from_value(json!({ "datatoken": "0xdt", "validOrder": false })).unwrap();
        assert!(none.valid_order.is_none());

        let tx: ProviderComputeInitialize =
            serde_json::from_value(json!({ "validOrder": "0xorder" })).unwrap();
        assert_eq!(tx.valid_order.unwrap().tx_id.as_deref(), Some("0xorder"));
    }

    #[test]
    fn test_compute_asset_serialization() {
        let asset = ComputeAsset::new("did:op:data", "svc").with_transfer_tx("0xtx");
        assert_eq!(
            serde_json::to_value(&asset).unwrap(),
            json!({ "documentId": "did:op:data", "serviceId": "svc", "transferTxId": "0xtx" })
        );
    }

    #[test]
    fn test_provider_fee_amount_accepts_numbers() {
        let fees: ProviderFees =
            serde_json::from_value(json!({ "providerFeeAmount": 0, "validUntil": 1700000000 })).unwrap();
        assert_eq!(fees.provider_fee_amount.as_deref(), Some("0"));
        assert_eq!(fees.valid_until, Some(1_700_000_000));
    }
}
