use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A vector in projected semantic space. High- and low-dimensional
/// variants share this type and are stored in separate memories.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectedPoint {
    pub id: Uuid,
    pub cluster_id: Uuid,
    pub dimensionality: usize,
    pub vector: Vec<f64>,
    pub confidence: f64,
    pub semantic_tag: String,
    pub trace: String,
}

impl ProjectedPoint {
    pub fn new(
        cluster_id: Uuid,
        vector: Vec<f64>,
        confidence: f64,
        semantic_tag: String,
        trace: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            cluster_id,
            dimensionality: vector.len(),
            vector,
            confidence: confidence.clamp(0.0, 1.0),
            semantic_tag,
            trace,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.vector.iter().all(|x| x.is_finite())
    }
}
