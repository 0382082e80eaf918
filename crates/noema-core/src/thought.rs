use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::time::now_ticks;

/// Associative text unit generated from a subjective state.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thought {
    pub id: Uuid,
    pub content: String,
    /// [0, 1]
    pub relevance: f64,
    pub source_state_id: Uuid,
    /// Ids of stored thoughts this one was associated with.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub memory_hits: Vec<Uuid>,
    pub created_at: u64,
}

impl Thought {
    pub fn new(content: String, relevance: f64, source_state_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            content,
            relevance: relevance.clamp(0.0, 1.0),
            source_state_id,
            memory_hits: Vec::new(),
            created_at: now_ticks(),
        }
    }

    pub fn with_memory_hits(mut self, hits: Vec<Uuid>) -> Self {
        self.memory_hits = hits;
        self
    }
}
