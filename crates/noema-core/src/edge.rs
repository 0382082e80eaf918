use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeType {
    Temporal,
    Semantic,
    Causal,
    Similarity,
    Novelty,
}

impl EdgeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Temporal => "temporal",
            Self::Semantic => "semantic",
            Self::Causal => "causal",
            Self::Similarity => "similarity",
            Self::Novelty => "novelty",
        }
    }
}

/// The fixed set of annotations an edge can carry.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeMetadata {
    /// Index distance (temporal) or euclidean distance (novelty).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f64>,
    /// Propagation also flows target → source at half weight.
    #[serde(default)]
    pub bidirectional: bool,
}

/// Weighted directed link between two projected points.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergentEdge {
    pub from: Uuid,
    pub to: Uuid,
    pub weight: f64,
    pub edge_type: EdgeType,
    #[serde(default)]
    pub metadata: EdgeMetadata,
}

impl EmergentEdge {
    pub fn new(from: Uuid, to: Uuid, weight: f64, edge_type: EdgeType) -> Self {
        Self {
            from,
            to,
            weight: weight.clamp(0.0, 1.0),
            edge_type,
            metadata: EdgeMetadata::default(),
        }
    }

    pub fn with_metadata(mut self, metadata: EdgeMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Directional storage key: `a→b` and `b→a` are distinct entries.
    pub fn key(&self) -> String {
        format!("{}:{}", self.from, self.to)
    }

    /// Unordered endpoint pair, for deduplicating an undirected view.
    pub fn undirected_pair(&self) -> (Uuid, Uuid) {
        if self.from <= self.to {
            (self.from, self.to)
        } else {
            (self.to, self.from)
        }
    }
}
