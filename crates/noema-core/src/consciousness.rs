//! The session's durable weighted memory.
//!
//! Six weighted storages keyed by entity id (edges by `from:to`). Weights
//! live in [0, 1]; decay and reinforcement are driven by `StateMerger`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cluster::Cluster;
use crate::edge::EmergentEdge;
use crate::point::ProjectedPoint;
use crate::shape::EmergentShape;
use crate::state::SubjectiveState;
use crate::time::{now_iso8601, now_unix_millis};

/// An entity plus its influence weight.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Weighted<T> {
    pub item: T,
    pub weight: f64,
    /// Unix millis of first insertion.
    pub added_at: u64,
}

impl<T> Weighted<T> {
    pub fn new(item: T, weight: f64) -> Self {
        Self {
            item,
            weight: weight.clamp(0.0, 1.0),
            added_at: now_unix_millis(),
        }
    }

    pub fn reinforce(&mut self, amount: f64) {
        self.weight = (self.weight + amount).clamp(0.0, 1.0);
    }

    pub fn decay(&mut self, factor: f64) {
        self.weight = (self.weight * factor).clamp(0.0, 1.0);
    }
}

/// Key → weighted entity. Serialized as a plain JSON object.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeightedStore<T> {
    entries: HashMap<String, Weighted<T>>,
}

impl<T> Default for WeightedStore<T> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<T> WeightedStore<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&Weighted<T>> {
        self.entries.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Weighted<T>> {
        self.entries.get_mut(key)
    }

    pub fn insert(&mut self, key: String, item: T, weight: f64) {
        self.entries.insert(key, Weighted::new(item, weight));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Weighted<T>)> {
        self.entries.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&String, &mut Weighted<T>)> {
        self.entries.iter_mut()
    }

    pub fn weights(&self) -> impl Iterator<Item = f64> + '_ {
        self.entries.values().map(|w| w.weight)
    }

    pub fn total_weight(&self) -> f64 {
        self.weights().sum()
    }

    /// Drop entries below `min_weight`; returns how many were removed.
    pub fn retain_above(&mut self, min_weight: f64) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, w| w.weight >= min_weight);
        before - self.entries.len()
    }

    /// Keep the `max` highest-weight entries; returns how many were removed.
    pub fn cap(&mut self, max: usize) -> usize {
        if self.entries.len() <= max {
            return 0;
        }
        let mut ranked: Vec<(String, f64)> = self
            .entries
            .iter()
            .map(|(k, w)| (k.clone(), w.weight))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        let removed = ranked.len() - max;
        for (key, _) in ranked.into_iter().skip(max) {
            self.entries.remove(&key);
        }
        removed
    }
}

/// One cycle's output, handed to the merger.
#[derive(Clone, Debug, Default)]
pub struct CycleArtifacts {
    pub clusters: Vec<Cluster>,
    pub high_dim_points: Vec<ProjectedPoint>,
    pub low_dim_points: Vec<ProjectedPoint>,
    pub edges: Vec<EmergentEdge>,
    pub shapes: Vec<EmergentShape>,
    pub states: Vec<SubjectiveState>,
}

impl CycleArtifacts {
    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
            && self.high_dim_points.is_empty()
            && self.low_dim_points.is_empty()
            && self.edges.is_empty()
            && self.shapes.is_empty()
            && self.states.is_empty()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageCounts {
    pub clusters: usize,
    pub high_dim_points: usize,
    pub low_dim_points: usize,
    pub edges: usize,
    pub shapes: usize,
    pub states: usize,
}

impl StorageCounts {
    pub fn total(&self) -> usize {
        self.clusters + self.high_dim_points + self.low_dim_points + self.edges + self.shapes + self.states
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsciousnessState {
    pub id: Uuid,
    pub session_id: String,
    pub version: u64,
    pub clusters: WeightedStore<Cluster>,
    pub high_dim_points: WeightedStore<ProjectedPoint>,
    pub low_dim_points: WeightedStore<ProjectedPoint>,
    pub edges: WeightedStore<EmergentEdge>,
    pub shapes: WeightedStore<EmergentShape>,
    pub states: WeightedStore<SubjectiveState>,
    pub last_ipoint_position: f64,
    pub is_initialized: bool,
    pub created_at: String,
    pub modified_at: String,
}

impl ConsciousnessState {
    pub fn new(session_id: &str) -> Self {
        let now = now_iso8601();
        Self {
            id: Uuid::new_v4(),
            session_id: session_id.to_string(),
            version: 0,
            clusters: WeightedStore::new(),
            high_dim_points: WeightedStore::new(),
            low_dim_points: WeightedStore::new(),
            edges: WeightedStore::new(),
            shapes: WeightedStore::new(),
            states: WeightedStore::new(),
            last_ipoint_position: 0.0,
            is_initialized: false,
            created_at: now.clone(),
            modified_at: now,
        }
    }

    pub fn counts(&self) -> StorageCounts {
        StorageCounts {
            clusters: self.clusters.len(),
            high_dim_points: self.high_dim_points.len(),
            low_dim_points: self.low_dim_points.len(),
            edges: self.edges.len(),
            shapes: self.shapes.len(),
            states: self.states.len(),
        }
    }

    /// Bump the version and modified timestamp.
    pub fn touch(&mut self) {
        self.version += 1;
        self.modified_at = now_iso8601();
    }

    /// Every weight in every storage.
    pub fn all_weights(&self) -> Vec<f64> {
        let mut weights = Vec::with_capacity(self.counts().total());
        weights.extend(self.clusters.weights());
        weights.extend(self.high_dim_points.weights());
        weights.extend(self.low_dim_points.weights());
        weights.extend(self.edges.weights());
        weights.extend(self.shapes.weights());
        weights.extend(self.states.weights());
        weights
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weighted_clamps() {
        let mut w = Weighted::new("x", 1.5);
        assert_eq!(w.weight, 1.0);
        w.decay(0.5);
        assert_eq!(w.weight, 0.5);
        w.reinforce(0.8);
        assert_eq!(w.weight, 1.0);
        w.reinforce(-3.0);
        assert_eq!(w.weight, 0.0);
    }

    #[test]
    fn test_store_cap_keeps_heaviest() {
        let mut store = WeightedStore::new();
        for i in 0..5 {
            store.insert(format!("k{i}"), i, 0.1 * (i + 1) as f64);
        }
        assert_eq!(store.cap(2), 3);
        assert!(store.contains_key("k4"));
        assert!(store.contains_key("k3"));
        assert!(!store.contains_key("k0"));
        assert_eq!(store.cap(10), 0);
    }

    #[test]
    fn test_store_retain_above() {
        let mut store = WeightedStore::new();
        store.insert("a".into(), (), 0.005);
        store.insert("b".into(), (), 0.01);
        assert_eq!(store.retain_above(0.01), 1);
        assert!(store.contains_key("b"));
    }

    #[test]
    fn test_new_state_is_empty_and_uninitialized() {
        let state = ConsciousnessState::new("s1");
        assert!(!state.is_initialized);
        assert_eq!(state.version, 0);
        assert_eq!(state.counts().total(), 0);
        assert_eq!(state.last_ipoint_position, 0.0);
    }

    #[test]
    fn test_serializes_storages_as_keyed_objects() {
        let mut state = ConsciousnessState::new("s1");
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let edge = EmergentEdge::new(a, b, 0.5, crate::edge::EdgeType::Temporal);
        state.edges.insert(edge.key(), edge, 0.7);

        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["sessionId"], "s1");
        assert_eq!(json["isInitialized"], false);
        let key = format!("{a}:{b}");
        assert_eq!(json["edges"][&key]["weight"], 0.7);
        assert!(json["highDimPoints"].as_object().unwrap().is_empty());

        let back: ConsciousnessState = serde_json::from_value(json).unwrap();
        assert_eq!(back.counts(), state.counts());
    }
}
