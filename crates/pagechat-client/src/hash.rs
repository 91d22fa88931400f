use sha2::{Digest, Sha256};

/// Deterministic content hash used by the backend to deduplicate pages:
/// lowercase hex SHA-256 of the extracted text.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}
