//! Activation propagation over the point graph and extraction of
//! connected components as shapes.

use std::collections::{HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::edge::{EdgeType, EmergentEdge};
use crate::point::ProjectedPoint;
use crate::shape::{EmergentShape, ShapeMetadata};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphOptions {
    pub steps: usize,
    /// Share of the old activation kept each step.
    pub decay: f64,
    pub activation_threshold: f64,
}

impl Default for GraphOptions {
    fn default() -> Self {
        Self {
            steps: 5,
            decay: 0.5,
            activation_threshold: 0.3,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct GraphProcessor {
    options: GraphOptions,
}

impl GraphProcessor {
    pub fn new(options: GraphOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &GraphOptions {
        &self.options
    }

    /// Synchronous propagation from activation 1.0 everywhere.
    ///
    /// `a' = decay·a + (1−decay)·Σ w·a_src`, with bidirectional edges also
    /// feeding `0.5·w·a_dst` back to the source. Fan-in may lift an
    /// activation above 1.
    pub fn propagate(&self, points: &[ProjectedPoint], edges: &[EmergentEdge]) -> HashMap<Uuid, f64> {
        let mut activation: HashMap<Uuid, f64> = points.iter().map(|p| (p.id, 1.0)).collect();
        let decay = self.options.decay;

        for _ in 0..self.options.steps {
            let mut incoming: HashMap<Uuid, f64> = HashMap::with_capacity(activation.len());
            for e in edges {
                let (Some(&a_from), Some(&a_to)) = (activation.get(&e.from), activation.get(&e.to))
                else {
                    continue;
                };
                *incoming.entry(e.to).or_default() += e.weight * a_from;
                if e.metadata.bidirectional {
                    *incoming.entry(e.from).or_default() += 0.5 * e.weight * a_to;
                }
            }
            activation = activation
                .iter()
                .map(|(id, a)| {
                    let sum = incoming.get(id).copied().unwrap_or(0.0);
                    (*id, decay * a + (1.0 - decay) * sum)
                })
                .collect();
        }
        activation
    }

    /// Propagate, filter by threshold, and split into connected shapes.
    pub fn process(&self, points: &[ProjectedPoint], edges: &[EmergentEdge]) -> Vec<EmergentShape> {
        if points.is_empty() {
            return Vec::new();
        }
        let activation = self.propagate(points, edges);

        let mut active: Vec<Uuid> = points
            .iter()
            .map(|p| p.id)
            .filter(|id| activation[id] >= self.options.activation_threshold)
            .collect();
        if active.is_empty() {
            active = points.iter().map(|p| p.id).collect();
        }
        let active_set: HashSet<Uuid> = active.iter().copied().collect();

        // Undirected view restricted to active points; first edge per pair wins.
        let mut seen_pairs: HashSet<(Uuid, Uuid)> = HashSet::new();
        let mut kept: Vec<&EmergentEdge> = Vec::new();
        let mut adjacency: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
        for e in edges {
            if e.from == e.to || !active_set.contains(&e.from) || !active_set.contains(&e.to) {
                continue;
            }
            if seen_pairs.insert(e.undirected_pair()) {
                kept.push(e);
                adjacency.entry(e.from).or_default().push(e.to);
                adjacency.entry(e.to).or_default().push(e.from);
            }
        }

        let mut visited: HashSet<Uuid> = HashSet::new();
        let mut shapes = Vec::new();
        for &start in &active {
            if !visited.insert(start) {
                continue;
            }
            let mut component = vec![start];
            let mut queue = VecDeque::from([start]);
            while let Some(node) = queue.pop_front() {
                for &next in adjacency.get(&node).map(Vec::as_slice).unwrap_or(&[]) {
                    if visited.insert(next) {
                        component.push(next);
                        queue.push_back(next);
                    }
                }
            }

            let members: HashSet<Uuid> = component.iter().copied().collect();
            let component_edges: Vec<EmergentEdge> = kept
                .iter()
                .filter(|e| members.contains(&e.from))
                .map(|e| (*e).clone())
                .collect();
            let metadata = self.shape_metadata(&component, &component_edges, &activation);
            shapes.push(EmergentShape::new(component, component_edges, metadata));
        }
        shapes
    }

    fn shape_metadata(
        &self,
        ids: &[Uuid],
        edges: &[EmergentEdge],
        activation: &HashMap<Uuid, f64>,
    ) -> ShapeMetadata {
        let n = ids.len();
        let e = edges.len();
        let density = if n > 1 {
            (2.0 * e as f64 / (n * (n - 1)) as f64).min(1.0)
        } else {
            0.0
        };
        let novelty = if e > 0 {
            edges.iter().filter(|x| x.edge_type == EdgeType::Novelty).count() as f64 / e as f64
        } else {
            0.0
        };
        let acts: Vec<f64> = ids.iter().map(|id| activation.get(id).copied().unwrap_or(0.0)).collect();
        let avg = acts.iter().sum::<f64>() / n.max(1) as f64;
        let min = acts.iter().copied().fold(f64::INFINITY, f64::min);
        let max = acts.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        ShapeMetadata {
            component_size: n,
            density,
            novelty,
            avg_activation: avg,
            min_activation: if min.is_finite() { min } else { 0.0 },
            max_activation: if max.is_finite() { max } else { 0.0 },
            propagation_steps: self.options.steps,
        }
    }
}
