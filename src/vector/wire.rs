//! Byte layout shared with remote key-value backends and weight artifacts.
//!
//! A record is a hash with two fields:
//! - `vector`: raw little-endian `f32` bytes
//! - `metadata`: JSON object text
//!
//! Record keys carry a fixed prefix (default `vec:`) so the store's keys can
//! share a backend with unrelated data.

use super::Metadata;

pub const VECTOR_FIELD: &str = "vector";
pub const METADATA_FIELD: &str = "metadata";
pub const DEFAULT_KEY_PREFIX: &str = "vec:";

/// Serialize floats as consecutive little-endian `f32` values.
pub fn encode_vector(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vector.len() * 4);
    for value in vector {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Inverse of [`encode_vector`]. Fails when the length is not a multiple of 4.
pub fn decode_vector(bytes: &[u8]) -> Result<Vec<f32>, String> {
    if bytes.len() % 4 != 0 {
        return Err(format!(
            "vector blob of {} bytes is not a whole number of f32 values",
            bytes.len()
        ));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

pub fn encode_metadata(metadata: &Metadata) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(metadata)
}

/// Parse metadata text; anything that is not a JSON object reads as empty.
pub fn decode_metadata(bytes: &[u8]) -> Metadata {
    serde_json::from_slice(bytes).unwrap_or_default()
}

/// Backend key for record `id`.
pub fn record_key(prefix: &str, id: &str) -> String {
    format!("{prefix}{id}")
}

/// Record id for a backend key, or `None` for keys outside the namespace.
pub fn id_from_key<'a>(prefix: &str, key: &'a str) -> Option<&'a str> {
    key.strip_prefix(prefix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_vector_bytes_are_little_endian_f32() {
        let bytes = encode_vector(&[1.0, -2.5]);
        assert_eq!(bytes.len(), 8);
        assert_eq!(&bytes[0..4], &[0x00, 0x00, 0x80, 0x3f]);
        assert_eq!(&bytes[4..8], &(-2.5f32).to_le_bytes());
        assert_eq!(decode_vector(&bytes).unwrap(), vec![1.0, -2.5]);
    }

    #[test]
    fn test_truncated_blob_rejected() {
        assert!(decode_vector(&[0, 0, 128]).is_err());
        assert!(decode_vector(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_metadata_text() {
        let mut metadata = Metadata::new();
        metadata.insert("document_id".into(), json!("d1"));
        metadata.insert("chunk_index".into(), json!(3));

        let bytes = encode_metadata(&metadata).unwrap();
        assert_eq!(decode_metadata(&bytes), metadata);

        // Garbage decodes to empty metadata
        assert!(decode_metadata(b"not json").is_empty());
        assert!(decode_metadata(b"[1,2]").is_empty());
    }

    #[test]
    fn test_keys_are_namespaced() {
        let key = record_key("vec:", "doc_chunk_0");
        assert_eq!(key, "vec:doc_chunk_0");
        assert_eq!(id_from_key("vec:", &key), Some("doc_chunk_0"));
        assert_eq!(id_from_key("vec:", "session:42"), None);
    }
}
