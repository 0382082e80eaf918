//! Entropy source: true-random or seed-expanded byte chunks.
//!
//! Seeded expansion hashes `seed ‖ sequence ‖ counter` block by block, so the
//! bytes for a given (seed, sequence) pair are identical across independent
//! generator instances and processes.

use std::sync::Mutex;

use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::chunk::NoiseChunk;
use crate::hash::sha256;
use crate::time::now_ticks;

/// Process-wide sequence counter shared by every generator.
static SEQUENCE: Mutex<u64> = Mutex::new(0);

fn next_sequence() -> u64 {
    let mut guard = SEQUENCE.lock().unwrap_or_else(|e| e.into_inner());
    *guard += 1;
    *guard
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct EntropyOptions {
    pub chunk_count: usize,
    pub chunk_size: usize,
    /// When set, chunks come from deterministic seed expansion.
    pub seed: Option<String>,
    pub quality_samples: usize,
    pub quality_sample_size: usize,
}

impl Default for EntropyOptions {
    fn default() -> Self {
        Self {
            chunk_count: 16,
            chunk_size: 256,
            seed: None,
            quality_samples: 10,
            quality_sample_size: 1024,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct EntropySource {
    seed: Option<Vec<u8>>,
}

impl EntropySource {
    /// Cryptographic RNG output.
    pub fn new() -> Self {
        Self { seed: None }
    }

    /// Deterministic expansion of `seed`.
    pub fn seeded(seed: impl Into<Vec<u8>>) -> Self {
        Self {
            seed: Some(seed.into()),
        }
    }

    pub fn from_options(options: &EntropyOptions) -> Self {
        match &options.seed {
            Some(seed) => Self::seeded(seed.as_bytes()),
            None => Self::new(),
        }
    }

    pub fn is_seeded(&self) -> bool {
        self.seed.is_some()
    }

    /// Generate `count` chunks, each taking the next process-wide sequence number.
    pub fn generate(&self, count: usize, size: usize) -> Vec<NoiseChunk> {
        (0..count)
            .map(|_| self.generate_chunk_at(size, next_sequence()))
            .collect()
    }

    /// Generate one chunk at the next sequence number.
    pub fn generate_chunk(&self, size: usize) -> NoiseChunk {
        self.generate_chunk_at(size, next_sequence())
    }

    /// Generate one chunk for an explicit sequence number.
    pub fn generate_chunk_at(&self, size: usize, sequence: u64) -> NoiseChunk {
        let bytes = match &self.seed {
            Some(seed) => expand_seed(seed, sequence, size),
            None => {
                let mut buf = vec![0u8; size];
                rand::rng().fill_bytes(&mut buf);
                buf
            }
        };
        NoiseChunk::new(bytes, sequence, now_ticks(), self.seed.clone())
    }

    /// Shannon entropy of the pooled byte histogram of `samples` fresh
    /// chunks, normalized by 8 bits/symbol. 1.0 means uniform bytes.
    pub fn estimate_quality(&self, samples: usize, sample_size: usize) -> f64 {
        let mut pooled = Vec::with_capacity(samples * sample_size);
        for _ in 0..samples {
            pooled.extend(self.generate_chunk(sample_size).bytes);
        }
        shannon_bits(&pooled) / 8.0
    }
}

/// `seed ‖ sequence ‖ counter` hashed block by block, truncated to `size`.
fn expand_seed(seed: &[u8], sequence: u64, size: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(size + 32);
    let mut counter: u64 = 0;
    while out.len() < size {
        let block = sha256(&[seed, &sequence.to_le_bytes(), &counter.to_le_bytes()]);
        out.extend_from_slice(&block);
        counter += 1;
    }
    out.truncate(size);
    out
}

/// Shannon entropy of the byte-value histogram, in bits per symbol (0..=8).
pub fn shannon_bits(bytes: &[u8]) -> f64 {
    if bytes.is_empty() {
        return 0.0;
    }
    let mut histogram = [0usize; 256];
    for &b in bytes {
        histogram[b as usize] += 1;
    }
    let total = bytes.len() as f64;
    histogram
        .iter()
        .filter(|&&count| count > 0)
        .map(|&count| {
            let p = count as f64 / total;
            -p * p.log2()
        })
        .sum()
}
