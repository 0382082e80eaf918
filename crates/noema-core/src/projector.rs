//! Seeded Gaussian random projection of cluster centroids into the
//! high-dimensional semantic space.
//!
//! The matrix for a (cluster, candidate) pair is derived entirely from the
//! cluster hash, so re-projecting the same cluster reproduces the same
//! vector. Entries are N(0, 1/out) which keeps pairwise distances roughly
//! intact (Johnson-Lindenstrauss).

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::cluster::Cluster;
use crate::error::{CoreError, Result};
use crate::hash::sha256;
use crate::point::ProjectedPoint;
use crate::vector::{gauss_random, l2_normalize, mean, variance};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectionOptions {
    pub output_dim: usize,
    pub candidates: usize,
    /// Scale of the seeded noise added before normalization. 0 disables it.
    pub creativity: f64,
    /// Multiplier on confidence, usually the I-point determinism factor.
    pub determinism: f64,
}

impl Default for ProjectionOptions {
    fn default() -> Self {
        Self {
            output_dim: 64,
            candidates: 2,
            creativity: 0.1,
            determinism: 1.0,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct Projector {
    options: ProjectionOptions,
}

impl Projector {
    pub fn new(options: ProjectionOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ProjectionOptions {
        &self.options
    }

    /// `candidates` points per cluster, in cluster order.
    pub fn project_all(&self, clusters: &[Cluster]) -> Result<Vec<ProjectedPoint>> {
        let mut points = Vec::with_capacity(clusters.len() * self.options.candidates);
        for cluster in clusters {
            points.extend(self.project(cluster)?);
        }
        Ok(points)
    }

    pub fn project(&self, cluster: &Cluster) -> Result<Vec<ProjectedPoint>> {
        if cluster.centroid.is_empty() {
            return Err(CoreError::EmptyInput(format!(
                "cluster {} has an empty centroid",
                cluster.id
            )));
        }
        if self.options.output_dim == 0 {
            return Err(CoreError::InvalidOption("output_dim must be > 0".into()));
        }

        let out = self.options.output_dim;
        let confidence = self.options.determinism * (1.0 - cluster.entropy_estimate);
        let short = &cluster.hash[..cluster.hash.len().min(8)];

        let mut points = Vec::with_capacity(self.options.candidates);
        for idx in 0..self.options.candidates {
            let mut vector = project_vector(&cluster.centroid, &cluster.hash, idx as u64, out);

            if self.options.creativity > 0.0 {
                let seed = sha256(&[
                    cluster.hash.as_bytes(),
                    &(idx as u64).to_le_bytes(),
                    b"creativity",
                ]);
                let mut rng = StdRng::from_seed(seed);
                for v in &mut vector {
                    *v += self.options.creativity * gauss_random(&mut rng);
                }
            }
            l2_normalize(&mut vector);

            let tag = semantic_tag(&vector);
            points.push(ProjectedPoint::new(
                cluster.id,
                vector,
                confidence,
                tag,
                format!("cluster:{short}/candidate:{idx}/dim:{out}"),
            ));
        }
        Ok(points)
    }
}

/// `M · centroid` where M is an `out × centroid.len()` matrix drawn from a
/// StdRng seeded with SHA-256(cluster hash ‖ candidate index).
fn project_vector(centroid: &[f64], cluster_hash: &str, candidate: u64, out: usize) -> Vec<f64> {
    let seed = sha256(&[cluster_hash.as_bytes(), &candidate.to_le_bytes()]);
    let mut rng = StdRng::from_seed(seed);
    let scale = 1.0 / (out as f64).sqrt();

    (0..out)
        .map(|_| {
            centroid
                .iter()
                .map(|c| gauss_random(&mut rng) * scale * c)
                .sum()
        })
        .collect()
}

/// `<mean bucket>-<spread bucket>` for a unit vector. For a normalized
/// vector `variance·dim = 1 − dim·mean²`, so the spread bucket reads how
/// much of the energy is carried by the common offset.
pub fn semantic_tag(vector: &[f64]) -> String {
    let m = mean(vector);
    let mean_bucket = if m.abs() < 0.01 {
        "neutral"
    } else if m > 0.0 {
        "positive"
    } else {
        "negative"
    };
    let spread = variance(vector) * vector.len() as f64;
    let spread_bucket = if spread < 0.5 {
        "low"
    } else if spread < 0.95 {
        "mid"
    } else {
        "high"
    };
    format!("{mean_bucket}-{spread_bucket}")
}
