use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::edge::{EdgeType, EmergentEdge};

/// Statistics recorded by the graph processor for one component.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShapeMetadata {
    pub component_size: usize,
    /// Undirected density 2E / (N(N-1)); 0 for singletons.
    pub density: f64,
    /// Fraction of edges of novelty type.
    pub novelty: f64,
    pub avg_activation: f64,
    pub min_activation: f64,
    pub max_activation: f64,
    pub propagation_steps: usize,
}

/// A connected subgraph discovered after activation propagation.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergentShape {
    pub id: Uuid,
    pub point_ids: Vec<Uuid>,
    pub edges: Vec<EmergentEdge>,
    pub metadata: ShapeMetadata,
}

impl EmergentShape {
    pub fn new(point_ids: Vec<Uuid>, edges: Vec<EmergentEdge>, metadata: ShapeMetadata) -> Self {
        Self {
            id: Uuid::new_v4(),
            point_ids,
            edges,
            metadata,
        }
    }

    pub fn size(&self) -> usize {
        self.point_ids.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn avg_edge_weight(&self) -> f64 {
        if self.edges.is_empty() {
            return 0.0;
        }
        self.edges.iter().map(|e| e.weight).sum::<f64>() / self.edges.len() as f64
    }

    /// Edge count per type, for tag derivation.
    pub fn edge_type_counts(&self) -> Vec<(EdgeType, usize)> {
        let mut counts: Vec<(EdgeType, usize)> = Vec::new();
        for edge in &self.edges {
            match counts.iter_mut().find(|(t, _)| *t == edge.edge_type) {
                Some((_, n)) => *n += 1,
                None => counts.push((edge.edge_type, 1)),
            }
        }
        counts
    }
}
