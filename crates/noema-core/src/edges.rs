//! Edge construction over an ordered list of low-dimensional points.
//!
//! Three additive families: temporal (index proximity), semantic (cosine
//! similarity, top-K per source) and novelty (weakly connected points reach
//! out to near neighbours). Point order is the order the reducer emitted.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::edge::{EdgeMetadata, EdgeType, EmergentEdge};
use crate::error::Result;
use crate::point::ProjectedPoint;
use crate::vector::{cosine_similarity, euclidean_distance};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeOptions {
    pub temporal_window: usize,
    pub semantic_threshold: f64,
    pub semantic_top_k: usize,
    pub novelty_neighborhood: usize,
    pub novelty_min_weight: f64,
    pub min_weight: f64,
}

impl Default for EdgeOptions {
    fn default() -> Self {
        Self {
            temporal_window: 3,
            semantic_threshold: 0.5,
            semantic_top_k: 3,
            novelty_neighborhood: 3,
            novelty_min_weight: 0.1,
            min_weight: 0.05,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct EdgeBuilder {
    options: EdgeOptions,
}

impl EdgeBuilder {
    pub fn new(options: EdgeOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &EdgeOptions {
        &self.options
    }

    /// All three families in order, then pruned below `min_weight`.
    pub fn build(&self, points: &[ProjectedPoint]) -> Result<Vec<EmergentEdge>> {
        let mut edges = self.temporal(points);
        edges.extend(self.semantic(points)?);
        let novelty = self.novelty(points, &edges)?;
        edges.extend(novelty);
        Ok(prune(edges, self.options.min_weight))
    }

    /// Forward edges to the next `temporal_window` points, weight
    /// `1 − d/(window+1)`.
    pub fn temporal(&self, points: &[ProjectedPoint]) -> Vec<EmergentEdge> {
        let window = self.options.temporal_window;
        let mut edges = Vec::new();
        for (i, from) in points.iter().enumerate() {
            for d in 1..=window {
                let Some(to) = points.get(i + d) else {
                    break;
                };
                let weight = 1.0 - d as f64 / (window as f64 + 1.0);
                edges.push(
                    EmergentEdge::new(from.id, to.id, weight, EdgeType::Temporal).with_metadata(
                        EdgeMetadata {
                            distance: Some(d as f64),
                            ..Default::default()
                        },
                    ),
                );
            }
        }
        edges
    }

    /// For each source keep the `semantic_top_k` most similar other points
    /// with cosine ≥ threshold.
    pub fn semantic(&self, points: &[ProjectedPoint]) -> Result<Vec<EmergentEdge>> {
        let mut edges = Vec::new();
        for (i, from) in points.iter().enumerate() {
            let mut candidates: Vec<(usize, f64)> = Vec::new();
            for (j, to) in points.iter().enumerate() {
                if i == j {
                    continue;
                }
                let sim = cosine_similarity(&from.vector, &to.vector)?;
                if sim >= self.options.semantic_threshold {
                    candidates.push((j, sim));
                }
            }
            candidates.sort_by(|a, b| b.1.total_cmp(&a.1));
            candidates.truncate(self.options.semantic_top_k);
            for (j, sim) in candidates {
                edges.push(
                    EmergentEdge::new(from.id, points[j].id, sim, EdgeType::Semantic)
                        .with_metadata(EdgeMetadata {
                            similarity: Some(sim),
                            ..Default::default()
                        }),
                );
            }
        }
        Ok(edges)
    }

    /// Points with total degree < 2 in `existing` connect to every point
    /// within `novelty_neighborhood` index positions they have no edge to
    /// yet. Weight `exp(−euclidean)`, kept only above `novelty_min_weight`.
    pub fn novelty(
        &self,
        points: &[ProjectedPoint],
        existing: &[EmergentEdge],
    ) -> Result<Vec<EmergentEdge>> {
        let mut degree: HashMap<Uuid, usize> = HashMap::new();
        let mut linked: HashSet<(Uuid, Uuid)> = HashSet::new();
        for e in existing {
            *degree.entry(e.from).or_default() += 1;
            *degree.entry(e.to).or_default() += 1;
            linked.insert((e.from, e.to));
        }

        let reach = self.options.novelty_neighborhood;
        let mut edges = Vec::new();
        for (i, from) in points.iter().enumerate() {
            if degree.get(&from.id).copied().unwrap_or(0) >= 2 {
                continue;
            }
            let lo = i.saturating_sub(reach);
            let hi = (i + reach).min(points.len().saturating_sub(1));
            for (j, to) in points.iter().enumerate().take(hi + 1).skip(lo) {
                if i == j || linked.contains(&(from.id, to.id)) {
                    continue;
                }
                let distance = euclidean_distance(&from.vector, &to.vector)?;
                let weight = (-distance).exp();
                if weight > self.options.novelty_min_weight {
                    linked.insert((from.id, to.id));
                    edges.push(
                        EmergentEdge::new(from.id, to.id, weight, EdgeType::Novelty)
                            .with_metadata(EdgeMetadata {
                                distance: Some(distance),
                                ..Default::default()
                            }),
                    );
                }
            }
        }
        Ok(edges)
    }
}

/// Drop edges whose weight is below `min_weight`.
pub fn prune(edges: Vec<EmergentEdge>, min_weight: f64) -> Vec<EmergentEdge> {
    edges.into_iter().filter(|e| e.weight >= min_weight).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn point(vector: Vec<f64>) -> ProjectedPoint {
        ProjectedPoint::new(Uuid::new_v4(), vector, 1.0, String::new(), String::new())
    }

    #[test]
    fn test_temporal_linear_decay() {
        let points: Vec<ProjectedPoint> = (0..5).map(|i| point(vec![i as f64, 1.0])).collect();
        let edges = EdgeBuilder::default().temporal(&points);
        // 3 + 3 + 2 + 1 + 0
        assert_eq!(edges.len(), 9);
        let first: Vec<f64> = edges.iter().take(3).map(|e| e.weight).collect();
        assert_relative_eq!(first[0], 0.75);
        assert_relative_eq!(first[1], 0.5);
        assert_relative_eq!(first[2], 0.25);
        assert!(edges.iter().all(|e| e.edge_type == EdgeType::Temporal));
        assert_eq!(edges[1].metadata.distance, Some(2.0));
    }

    #[test]
    fn test_semantic_threshold_and_top_k() {
        let points = vec![
            point(vec![1.0, 0.0]),
            point(vec![0.9, 0.1]),
            point(vec![0.8, 0.2]),
            point(vec![0.7, 0.3]),
            point(vec![0.6, 0.4]),
            point(vec![0.0, 1.0]),
        ];
        let builder = EdgeBuilder::new(EdgeOptions {
            semantic_threshold: 0.9,
            semantic_top_k: 2,
            ..Default::default()
        });
        let edges = builder.semantic(&points).unwrap();
        let from_first: Vec<&EmergentEdge> =
            edges.iter().filter(|e| e.from == points[0].id).collect();
        assert_eq!(from_first.len(), 2);
        assert_eq!(from_first[0].to, points[1].id);
        assert!(edges.iter().all(|e| e.weight >= 0.9));
        assert!(edges.iter().all(|e| e.from != points[5].id));
    }

    #[test]
    fn test_mutual_semantic_matches_both_directions() {
        let points = vec![point(vec![1.0, 0.0]), point(vec![1.0, 0.01])];
        let edges = EdgeBuilder::default().semantic(&points).unwrap();
        assert_eq!(edges.len(), 2);
        assert_ne!(edges[0].key(), edges[1].key());
    }

    #[test]
    fn test_novelty_for_isolated_points() {
        let points = vec![point(vec![0.0, 0.0]), point(vec![0.5, 0.0]), point(vec![9.0, 9.0])];
        let builder = EdgeBuilder::default();
        let edges = builder.novelty(&points, &[]).unwrap();
        assert!(edges.iter().all(|e| e.edge_type == EdgeType::Novelty));
        // exp(-0.5) kept in both directions, the far point is dropped
        assert_eq!(edges.len(), 2);
        assert_relative_eq!(edges[0].weight, (-0.5f64).exp(), epsilon = 1e-12);
    }

    #[test]
    fn test_novelty_skips_well_connected() {
        let points = vec![point(vec![0.0]), point(vec![0.1]), point(vec![0.2])];
        let existing = vec![
            EmergentEdge::new(points[0].id, points[1].id, 0.5, EdgeType::Temporal),
            EmergentEdge::new(points[0].id, points[2].id, 0.5, EdgeType::Temporal),
            EmergentEdge::new(points[1].id, points[2].id, 0.5, EdgeType::Temporal),
        ];
        let edges = EdgeBuilder::default().novelty(&points, &existing).unwrap();
        assert!(edges.is_empty());
    }

    #[test]
    fn test_prune_threshold() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let edges = vec![
            EmergentEdge::new(a, b, 0.04, EdgeType::Novelty),
            EmergentEdge::new(a, b, 0.05, EdgeType::Novelty),
        ];
        assert_eq!(prune(edges, 0.05).len(), 1);
    }

    #[test]
    fn test_build_rejects_mixed_dimensions() {
        let points = vec![point(vec![1.0, 0.0]), point(vec![1.0])];
        assert!(EdgeBuilder::default().build(&points).is_err());
    }
}
