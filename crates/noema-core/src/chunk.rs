use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::hash::sha256_hex;

/// One unit of raw entropy. Immutable once produced; only its hash
/// outlives the cycle (in the trace and the reproducibility key).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoiseChunk {
    pub id: Uuid,
    pub bytes: Vec<u8>,
    pub sequence: u64,
    pub timestamp_ticks: u64,
    pub hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<Vec<u8>>,
}

impl NoiseChunk {
    pub fn new(bytes: Vec<u8>, sequence: u64, timestamp_ticks: u64, seed: Option<Vec<u8>>) -> Self {
        let hash = Self::compute_hash(seed.as_deref(), &bytes, timestamp_ticks);
        Self {
            id: Uuid::new_v4(),
            bytes,
            sequence,
            timestamp_ticks,
            hash,
            seed,
        }
    }

    /// hash(seed ‖ bytes ‖ ticks). Pure: identical inputs give identical output.
    pub fn compute_hash(seed: Option<&[u8]>, bytes: &[u8], timestamp_ticks: u64) -> String {
        sha256_hex(&[
            seed.unwrap_or_default(),
            bytes,
            &timestamp_ticks.to_le_bytes(),
        ])
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_pure() {
        let a = NoiseChunk::compute_hash(Some(b"seed"), &[1, 2, 3], 42);
        let b = NoiseChunk::compute_hash(Some(b"seed"), &[1, 2, 3], 42);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_hash_depends_on_every_input() {
        let base = NoiseChunk::compute_hash(Some(b"seed"), &[1, 2, 3], 42);
        assert_ne!(base, NoiseChunk::compute_hash(Some(b"other"), &[1, 2, 3], 42));
        assert_ne!(base, NoiseChunk::compute_hash(Some(b"seed"), &[1, 2, 4], 42));
        assert_ne!(base, NoiseChunk::compute_hash(Some(b"seed"), &[1, 2, 3], 43));
    }

    #[test]
    fn test_new_records_hash() {
        let chunk = NoiseChunk::new(vec![9; 8], 3, 100, None);
        assert_eq!(chunk.hash, NoiseChunk::compute_hash(None, &chunk.bytes, 100));
        assert_eq!(chunk.len(), 8);
        assert_eq!(chunk.sequence, 3);
    }
}
