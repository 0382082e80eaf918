use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::hash::sha256_hex;

/// Clustering strategy tag carried on every emitted cluster.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ClusterAlgorithm {
    /// Batch k-means++ followed by Lloyd iterations.
    #[default]
    KMeans,
    /// Incremental nearest-centroid update, one chunk at a time.
    Online,
}

impl ClusterAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::KMeans => "kmeans",
            Self::Online => "online",
        }
    }

    pub fn from_str_lossy(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "online" | "incremental" => Self::Online,
            _ => Self::KMeans,
        }
    }
}

/// Centroid of similar noise chunks in feature space.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cluster {
    pub id: Uuid,
    pub algorithm: ClusterAlgorithm,
    pub size: usize,
    pub centroid: Vec<f64>,
    /// Normalized Shannon entropy of the member bytes, in [0, 1].
    pub entropy_estimate: f64,
    pub hash: String,
    pub created_at: u64,
}

impl Cluster {
    pub fn new(
        algorithm: ClusterAlgorithm,
        size: usize,
        centroid: Vec<f64>,
        entropy_estimate: f64,
        created_at: u64,
    ) -> Self {
        let hash = Self::compute_hash(&centroid, algorithm, created_at);
        Self {
            id: Uuid::new_v4(),
            algorithm,
            size,
            centroid,
            entropy_estimate: entropy_estimate.clamp(0.0, 1.0),
            hash,
            created_at,
        }
    }

    /// hash(centroid ‖ algorithm ‖ created_at). Pure.
    pub fn compute_hash(centroid: &[f64], algorithm: ClusterAlgorithm, created_at: u64) -> String {
        let centroid_bytes: Vec<u8> = centroid.iter().flat_map(|c| c.to_le_bytes()).collect();
        sha256_hex(&[
            &centroid_bytes,
            algorithm.as_str().as_bytes(),
            &created_at.to_le_bytes(),
        ])
    }

    /// Recompute the hash after the centroid moved.
    pub fn rehash(&mut self) {
        self.hash = Self::compute_hash(&self.centroid, self.algorithm, self.created_at);
    }
}
