//! Groups noise chunks into centroids in a 12-dimensional byte-statistics
//! feature space: k-means++ seeding, Lloyd iterations, and an online
//! nearest-centroid update for streaming use.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::chunk::NoiseChunk;
use crate::cluster::{Cluster, ClusterAlgorithm};
use crate::entropy::shannon_bits;
use crate::error::{CoreError, Result};
use crate::time::now_ticks;
use crate::vector::euclidean_distance;

/// mean, stddev, min, max + 8 histogram bins.
pub const FEATURE_DIM: usize = 12;
const HISTOGRAM_BINS: usize = 8;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterOptions {
    pub algorithm: String,
    pub k: usize,
    pub max_iterations: usize,
}

impl Default for ClusterOptions {
    fn default() -> Self {
        Self {
            algorithm: "kmeans".to_string(),
            k: 5,
            max_iterations: 100,
        }
    }
}

/// Fixed-length feature vector for one chunk, every component in [0, 1].
pub fn extract_features(bytes: &[u8]) -> Vec<f64> {
    let mut features = vec![0.0; FEATURE_DIM];
    if bytes.is_empty() {
        return features;
    }
    let n = bytes.len() as f64;
    let mean = bytes.iter().map(|&b| f64::from(b)).sum::<f64>() / n;
    let var = bytes
        .iter()
        .map(|&b| (f64::from(b) - mean).powi(2))
        .sum::<f64>()
        / n;
    let min = bytes.iter().copied().min().unwrap_or(0);
    let max = bytes.iter().copied().max().unwrap_or(0);

    features[0] = mean / 255.0;
    features[1] = var.sqrt() / 255.0;
    features[2] = f64::from(min) / 255.0;
    features[3] = f64::from(max) / 255.0;

    let bin_width = 256 / HISTOGRAM_BINS;
    for &b in bytes {
        features[4 + b as usize / bin_width] += 1.0;
    }
    for bin in &mut features[4..] {
        *bin /= n;
    }
    features
}

#[derive(Clone, Debug, Default)]
pub struct Clusterer {
    options: ClusterOptions,
}

impl Clusterer {
    pub fn new(options: ClusterOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ClusterOptions {
        &self.options
    }

    pub fn algorithm(&self) -> ClusterAlgorithm {
        ClusterAlgorithm::from_str_lossy(&self.options.algorithm)
    }

    /// Cluster a batch of chunks. Emits one cluster per non-empty partition.
    /// The online algorithm feeds chunks one by one through `update_online`.
    pub fn cluster(&self, chunks: &[NoiseChunk], rng: &mut impl Rng) -> Result<Vec<Cluster>> {
        if chunks.is_empty() {
            return Ok(Vec::new());
        }
        if self.options.k == 0 {
            return Err(CoreError::InvalidOption("cluster count k must be > 0".into()));
        }

        if self.algorithm() == ClusterAlgorithm::Online {
            let mut clusters = Vec::new();
            for chunk in chunks {
                self.update_online(&mut clusters, chunk)?;
            }
            return Ok(clusters);
        }

        let features: Vec<Vec<f64>> = chunks.iter().map(|c| extract_features(&c.bytes)).collect();
        let k = self.options.k.min(features.len());
        let mut centroids = kmeans_plus_plus(&features, k, rng)?;
        let mut assignment = vec![usize::MAX; features.len()];

        for _ in 0..self.options.max_iterations.max(1) {
            let mut changed = false;
            for (i, f) in features.iter().enumerate() {
                let nearest = nearest_centroid(f, &centroids)?;
                if assignment[i] != nearest {
                    assignment[i] = nearest;
                    changed = true;
                }
            }
            if !changed {
                break;
            }
            centroids = recompute_centroids(&features, &assignment, &centroids);
        }

        let created_at = now_ticks();
        let mut clusters = Vec::with_capacity(k);
        for (c, centroid) in centroids.into_iter().enumerate() {
            let members: Vec<usize> = (0..features.len()).filter(|&i| assignment[i] == c).collect();
            if members.is_empty() {
                continue;
            }
            let pooled: Vec<u8> = members
                .iter()
                .flat_map(|&i| chunks[i].bytes.iter().copied())
                .collect();
            clusters.push(Cluster::new(
                ClusterAlgorithm::KMeans,
                members.len(),
                centroid,
                shannon_bits(&pooled) / 8.0,
                created_at,
            ));
        }
        Ok(clusters)
    }

    /// Assign one chunk to its nearest centroid and move that centroid by
    /// an incremental mean step (learning rate 1/(size+1)). Creates the
    /// first cluster only when none exist.
    pub fn update_online(&self, clusters: &mut Vec<Cluster>, chunk: &NoiseChunk) -> Result<usize> {
        let features = extract_features(&chunk.bytes);
        let chunk_entropy = shannon_bits(&chunk.bytes) / 8.0;

        if clusters.is_empty() {
            clusters.push(Cluster::new(
                ClusterAlgorithm::Online,
                1,
                features,
                chunk_entropy,
                now_ticks(),
            ));
            return Ok(0);
        }

        let centroids: Vec<&[f64]> = clusters.iter().map(|c| c.centroid.as_slice()).collect();
        let idx = nearest_centroid_ref(&features, &centroids)?;
        let cluster = &mut clusters[idx];
        let rate = 1.0 / (cluster.size as f64 + 1.0);
        for (c, f) in cluster.centroid.iter_mut().zip(&features) {
            *c += rate * (f - *c);
        }
        cluster.entropy_estimate += rate * (chunk_entropy - cluster.entropy_estimate);
        cluster.size += 1;
        cluster.rehash();
        Ok(idx)
    }
}

/// k-means++: first centroid uniform, later ones weighted by squared
/// distance to the nearest chosen centroid.
fn kmeans_plus_plus(features: &[Vec<f64>], k: usize, rng: &mut impl Rng) -> Result<Vec<Vec<f64>>> {
    let mut centroids: Vec<Vec<f64>> = Vec::with_capacity(k);
    centroids.push(features[rng.random_range(0..features.len())].clone());

    while centroids.len() < k {
        let mut d2 = Vec::with_capacity(features.len());
        for f in features {
            let mut best = f64::INFINITY;
            for c in &centroids {
                best = best.min(euclidean_distance(f, c)?.powi(2));
            }
            d2.push(best);
        }
        let total: f64 = d2.iter().sum();
        if total <= 0.0 {
            // Every remaining point coincides with a centroid
            centroids.push(features[rng.random_range(0..features.len())].clone());
            continue;
        }
        let mut target = rng.random::<f64>() * total;
        let mut chosen = features.len() - 1;
        for (i, w) in d2.iter().enumerate() {
            if target < *w {
                chosen = i;
                break;
            }
            target -= w;
        }
        centroids.push(features[chosen].clone());
    }
    Ok(centroids)
}

fn nearest_centroid(point: &[f64], centroids: &[Vec<f64>]) -> Result<usize> {
    let refs: Vec<&[f64]> = centroids.iter().map(Vec::as_slice).collect();
    nearest_centroid_ref(point, &refs)
}

fn nearest_centroid_ref(point: &[f64], centroids: &[&[f64]]) -> Result<usize> {
    let mut best = 0;
    let mut best_dist = f64::INFINITY;
    for (i, c) in centroids.iter().enumerate() {
        let d = euclidean_distance(point, c)?;
        if d < best_dist {
            best_dist = d;
            best = i;
        }
    }
    Ok(best)
}

/// Mean of assigned members; an empty partition keeps its previous centroid.
fn recompute_centroids(
    features: &[Vec<f64>],
    assignment: &[usize],
    previous: &[Vec<f64>],
) -> Vec<Vec<f64>> {
    let dim = previous.first().map(Vec::len).unwrap_or(0);
    let mut sums = vec![vec![0.0; dim]; previous.len()];
    let mut counts = vec![0usize; previous.len()];
    for (f, &a) in features.iter().zip(assignment) {
        counts[a] += 1;
        for (s, x) in sums[a].iter_mut().zip(f) {
            *s += x;
        }
    }
    sums.into_iter()
        .zip(counts)
        .enumerate()
        .map(|(i, (sum, count))| {
            if count == 0 {
                previous[i].clone()
            } else {
                sum.into_iter().map(|s| s / count as f64).collect()
            }
        })
        .collect()
}
