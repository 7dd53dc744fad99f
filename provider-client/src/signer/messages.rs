//! Signed-message recipes.
//!
//! Each privileged provider operation signs a fixed concatenation of its
//! fields. The provider re-derives the same string byte for byte, so field
//! order and formatting here are part of the wire contract.

/// File download grant: `did + nonce`.
pub fn download_message(did: &str, nonce: u64) -> String {
    format!("{did}{nonce}")
}

/// Compute quote: `consumer + firstDatasetDid + nonce`.
pub fn initialize_compute_message(consumer: &str, dataset_did: &str, nonce: u64) -> String {
    format!("{consumer}{dataset_did}{nonce}")
}

/// Paid compute start: `consumer + firstDatasetDid + nonce`.
pub fn start_message(consumer: &str, dataset_did: &str, nonce: u64) -> String {
    format!("{consumer}{dataset_did}{nonce}")
}

/// Free compute start: `nonce` alone.
///
/// Unlike paid start there is no dataset binding; free jobs carry no payment
/// proof to bind against.
pub fn free_start_message(nonce: u64) -> String {
    nonce.to_string()
}

/// Compute stop: `consumer + jobId`.
///
/// Providers do not verify this signature yet.
pub fn stop_message(consumer: &str, job_id: &str) -> String {
    format!("{consumer}{job_id}")
}

/// Compute delete: `consumer + jobId + did + nonce`.
pub fn delete_message(consumer: &str, job_id: &str, did: &str, nonce: u64) -> String {
    format!("{consumer}{job_id}{did}{nonce}")
}

/// Compute result download: `consumer + jobId + index + nonce`.
pub fn result_message(consumer: &str, job_id: &str, index: u32, nonce: u64) -> String {
    format!("{consumer}{job_id}{index}{nonce}")
}

/// Streamed compute logs: `consumer + jobId + nonce`.
pub fn logs_message(consumer: &str, job_id: &str, nonce: u64) -> String {
    format!("{consumer}{job_id}{nonce}")
}

/// Auth token issuance and invalidation: `consumer + nonce`.
pub fn auth_token_message(consumer: &str, nonce: u64) -> String {
    format!("{consumer}{nonce}")
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONSUMER: &str = "0xBE5449a6A97aD46c8558A3356267Ee5D2731ab5e";

    #[test]
    fn test_fixed_vectors() {
        assert_eq!(download_message("did:op:abc", 1), "did:op:abc1");
        assert_eq!(
            start_message(CONSUMER, "did:op:data", 7),
            "0xBE5449a6A97aD46c8558A3356267Ee5D2731ab5edid:op:data7"
        );
        assert_eq!(free_start_message(7), "7");
        assert_eq!(
            stop_message(CONSUMER, "job-1"),
            "0xBE5449a6A97aD46c8558A3356267Ee5D2731ab5ejob-1"
        );
        assert_eq!(
            delete_message(CONSUMER, "job-1", "did:op:data", 3),
            "0xBE5449a6A97aD46c8558A3356267Ee5D2731ab5ejob-1did:op:data3"
        );
        assert_eq!(
            result_message(CONSUMER, "job-1", 2, 9),
            "0xBE5449a6A97aD46c8558A3356267Ee5D2731ab5ejob-129"
        );
        assert_eq!(auth_token_message("0xabc", 12), "0xabc12");
    }

    #[test]
    fn test_paid_and_free_start_differ() {
        assert_ne!(start_message(CONSUMER, "did:op:data", 5), free_start_message(5));
    }
}
