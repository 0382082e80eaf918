//! Folds each cycle's artifacts into the session's weighted memory.
//!
//! Lifecycle of one `ConsciousnessState`: empty → initialized (once) →
//! merged (repeatable). Initialization is all-or-nothing across the six
//! storages; merging decays what is there, then reinforces or inserts.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::cluster::Cluster;
use crate::consciousness::{ConsciousnessState, CycleArtifacts, WeightedStore};
use crate::constants::{
    MAX_CLUSTERS, MAX_EDGES, MAX_POINTS, MAX_SHAPES, MAX_STATES, MIN_WEIGHT, SIMILARITY_THRESHOLD,
};
use crate::edge::EmergentEdge;
use crate::error::{CoreError, Result};
use crate::point::ProjectedPoint;
use crate::shape::EmergentShape;
use crate::state::{StateKind, SubjectiveState};
use crate::vector::cosine_similarity;

/// Reinforcement share for an exact id match.
const ID_REINFORCE: f64 = 0.5;
/// Reinforcement share for the best similar entry.
const SIMILAR_REINFORCE: f64 = 0.3;

/// Derived per-merge coefficients for one I-point position.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeFactors {
    pub entropy_factor: f64,
    pub determinism_factor: f64,
    pub decay: f64,
    pub new_weight: f64,
}

impl MergeFactors {
    pub fn at(position: f64) -> Self {
        let position = position.clamp(-1.0, 1.0);
        let entropy_factor = 0.1 + 0.9 * (position + 1.0) / 2.0;
        let determinism_factor = 0.1 + 0.9 * (1.0 - position) / 2.0;
        Self {
            entropy_factor,
            determinism_factor,
            decay: 0.95 * (0.5 + 0.5 * determinism_factor),
            new_weight: 0.5 * entropy_factor,
        }
    }
}

/// How an entity takes part in merging.
pub trait Mergeable {
    /// Storage key.
    fn merge_key(&self) -> String;

    /// Similarity in [0, 1] to an existing entry, or `None` when the two
    /// are never comparable.
    fn similarity(&self, other: &Self) -> Option<f64>;

    /// Per-entry decay multiplier.
    fn decay_factor(&self, factors: &MergeFactors) -> f64 {
        factors.decay
    }
}

fn vector_similarity(a: &[f64], b: &[f64]) -> Option<f64> {
    if a.is_empty() || a.len() != b.len() {
        return None;
    }
    cosine_similarity(a, b).ok()
}

fn jaccard<T: Eq + std::hash::Hash>(a: &HashSet<T>, b: &HashSet<T>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 1.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

impl Mergeable for Cluster {
    fn merge_key(&self) -> String {
        self.id.to_string()
    }

    fn similarity(&self, other: &Self) -> Option<f64> {
        vector_similarity(&self.centroid, &other.centroid)
    }
}

impl Mergeable for ProjectedPoint {
    fn merge_key(&self) -> String {
        self.id.to_string()
    }

    fn similarity(&self, other: &Self) -> Option<f64> {
        vector_similarity(&self.vector, &other.vector)
    }
}

impl Mergeable for EmergentEdge {
    fn merge_key(&self) -> String {
        self.key()
    }

    /// Edges only ever match by exact directional key.
    fn similarity(&self, _other: &Self) -> Option<f64> {
        None
    }
}

impl Mergeable for EmergentShape {
    fn merge_key(&self) -> String {
        self.id.to_string()
    }

    fn similarity(&self, other: &Self) -> Option<f64> {
        if self.point_ids.is_empty() || other.point_ids.is_empty() {
            return None;
        }
        let a: HashSet<_> = self.point_ids.iter().collect();
        let b: HashSet<_> = other.point_ids.iter().collect();
        Some(jaccard(&a, &b))
    }
}

impl Mergeable for SubjectiveState {
    fn merge_key(&self) -> String {
        self.id.to_string()
    }

    fn similarity(&self, other: &Self) -> Option<f64> {
        if self.kind != other.kind {
            return None;
        }
        let a: HashSet<&String> = self.semantic_tags.iter().collect();
        let b: HashSet<&String> = other.semantic_tags.iter().collect();
        Some(
            0.5 * jaccard(&a, &b)
                + 0.25 * (1.0 - (self.valence - other.valence).abs() / 2.0)
                + 0.25 * (1.0 - (self.arousal - other.arousal).abs()),
        )
    }

    /// Thought states keep more weight the more deterministic the regime.
    fn decay_factor(&self, factors: &MergeFactors) -> f64 {
        if self.kind == StateKind::Thought {
            factors.decay + (1.0 - factors.decay) * 0.5 * factors.determinism_factor
        } else {
            factors.decay
        }
    }
}

/// Per-storage outcome counts for one merge.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeTally {
    pub decayed_out: usize,
    pub reinforced_by_id: usize,
    pub reinforced_by_similarity: usize,
    pub inserted: usize,
}

impl MergeTally {
    fn absorb(&mut self, other: MergeTally) {
        self.decayed_out += other.decayed_out;
        self.reinforced_by_id += other.reinforced_by_id;
        self.reinforced_by_similarity += other.reinforced_by_similarity;
        self.inserted += other.inserted;
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeOptions {
    pub similarity_threshold: f64,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            similarity_threshold: SIMILARITY_THRESHOLD,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct StateMerger {
    options: MergeOptions,
}

impl StateMerger {
    pub fn new(options: MergeOptions) -> Self {
        Self { options }
    }

    /// Store every incoming item at weight 1.0 and flip the state to
    /// initialized. Fails if it already is.
    pub fn initialize(&self, state: &mut ConsciousnessState, artifacts: CycleArtifacts) -> Result<()> {
        if state.is_initialized {
            return Err(CoreError::AlreadyInitialized(state.session_id.clone()));
        }
        // Build all six first so the state is never half-populated.
        let CycleArtifacts {
            clusters,
            high_dim_points,
            low_dim_points,
            edges,
            shapes,
            states,
        } = artifacts;
        let clusters = seeded_store(clusters);
        let high_dim_points = seeded_store(high_dim_points);
        let low_dim_points = seeded_store(low_dim_points);
        let edges = seeded_store(edges);
        let shapes = seeded_store(shapes);
        let states = seeded_store(states);

        state.clusters = clusters;
        state.high_dim_points = high_dim_points;
        state.low_dim_points = low_dim_points;
        state.edges = edges;
        state.shapes = shapes;
        state.states = states;
        state.last_ipoint_position = 0.0;
        state.is_initialized = true;
        state.touch();
        Ok(())
    }

    /// Decay, then reinforce or insert, across all six storages.
    pub fn merge(
        &self,
        state: &mut ConsciousnessState,
        position: f64,
        artifacts: CycleArtifacts,
    ) -> Result<MergeTally> {
        if !state.is_initialized {
            return Err(CoreError::NotInitialized(state.session_id.clone()));
        }
        let factors = MergeFactors::at(position);
        let threshold = self.options.similarity_threshold;

        let mut tally = MergeTally::default();
        tally.absorb(merge_store(&mut state.clusters, artifacts.clusters, &factors, threshold));
        tally.absorb(merge_store(
            &mut state.high_dim_points,
            artifacts.high_dim_points,
            &factors,
            threshold,
        ));
        tally.absorb(merge_store(
            &mut state.low_dim_points,
            artifacts.low_dim_points,
            &factors,
            threshold,
        ));
        tally.absorb(merge_store(&mut state.edges, artifacts.edges, &factors, threshold));
        tally.absorb(merge_store(&mut state.shapes, artifacts.shapes, &factors, threshold));
        tally.absorb(merge_store(&mut state.states, artifacts.states, &factors, threshold));

        state.last_ipoint_position = position.clamp(-1.0, 1.0);
        state.touch();
        Ok(tally)
    }

    /// Drop entries under the minimum weight, then cap each storage.
    /// Returns the number of entries removed.
    pub fn prune(&self, state: &mut ConsciousnessState) -> usize {
        let mut removed = 0;
        removed += state.clusters.retain_above(MIN_WEIGHT) + state.clusters.cap(MAX_CLUSTERS);
        removed += state.high_dim_points.retain_above(MIN_WEIGHT) + state.high_dim_points.cap(MAX_POINTS);
        removed += state.low_dim_points.retain_above(MIN_WEIGHT) + state.low_dim_points.cap(MAX_POINTS);
        removed += state.edges.retain_above(MIN_WEIGHT) + state.edges.cap(MAX_EDGES);
        removed += state.shapes.retain_above(MIN_WEIGHT) + state.shapes.cap(MAX_SHAPES);
        removed += state.states.retain_above(MIN_WEIGHT) + state.states.cap(MAX_STATES);
        removed
    }
}

fn seeded_store<T: Mergeable>(items: Vec<T>) -> WeightedStore<T> {
    let mut store = WeightedStore::new();
    for item in items {
        store.insert(item.merge_key(), item, 1.0);
    }
    store
}

fn merge_store<T: Mergeable>(
    store: &mut WeightedStore<T>,
    incoming: Vec<T>,
    factors: &MergeFactors,
    threshold: f64,
) -> MergeTally {
    let mut tally = MergeTally::default();

    for (_, entry) in store.iter_mut() {
        let factor = entry.item.decay_factor(factors);
        entry.decay(factor);
    }
    tally.decayed_out = store.retain_above(MIN_WEIGHT);

    for item in incoming {
        let key = item.merge_key();
        if let Some(existing) = store.get_mut(&key) {
            existing.reinforce(factors.new_weight * ID_REINFORCE);
            tally.reinforced_by_id += 1;
            continue;
        }

        let best = store
            .iter()
            .filter_map(|(k, w)| item.similarity(&w.item).map(|s| (k, s)))
            .filter(|(_, s)| *s >= threshold)
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(k, _)| k.clone());
        match best {
            Some(similar_key) => {
                if let Some(similar) = store.get_mut(&similar_key) {
                    similar.reinforce(factors.new_weight * SIMILAR_REINFORCE);
                }
                tally.reinforced_by_similarity += 1;
            }
            None => {
                store.insert(key, item, factors.new_weight);
                tally.inserted += 1;
            }
        }
    }
    tally
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::ClusterAlgorithm;
    use crate::edge::EdgeType;
    use approx::assert_relative_eq;
    use uuid::Uuid;

    fn cluster(centroid: Vec<f64>) -> Cluster {
        Cluster::new(ClusterAlgorithm::KMeans, 1, centroid, 0.5, 0)
    }

    fn state_of(kind: StateKind, tags: &[&str]) -> SubjectiveState {
        SubjectiveState::new(
            kind,
            0.2,
            0.4,
            0.5,
            String::new(),
            tags.iter().map(|t| t.to_string()).collect(),
            String::new(),
        )
    }

    fn artifacts() -> CycleArtifacts {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let p = ProjectedPoint::new(Uuid::new_v4(), vec![1.0, 0.0], 0.9, String::new(), String::new());
        CycleArtifacts {
            clusters: vec![cluster(vec![1.0, 0.0, 0.0])],
            high_dim_points: vec![p.clone()],
            low_dim_points: vec![p],
            edges: vec![EmergentEdge::new(a, b, 0.5, EdgeType::Temporal)],
            shapes: vec![EmergentShape::new(vec![a, b], vec![], Default::default())],
            states: vec![state_of(StateKind::Mood, &["calm"])],
        }
    }

    fn initialized() -> ConsciousnessState {
        let mut state = ConsciousnessState::new("s");
        StateMerger::default().initialize(&mut state, artifacts()).unwrap();
        state
    }

    #[test]
    fn test_factors_at_poles() {
        let f = MergeFactors::at(1.0);
        assert_relative_eq!(f.entropy_factor, 1.0);
        assert_relative_eq!(f.determinism_factor, 0.1);
        assert_relative_eq!(f.new_weight, 0.5);
        let f = MergeFactors::at(-1.0);
        assert_relative_eq!(f.decay, 0.95);
        assert_relative_eq!(f.new_weight, 0.05);
    }

    #[test]
    fn test_initialize_populates_all_storages() {
        let state = initialized();
        assert!(state.is_initialized);
        let counts = state.counts();
        assert_eq!(counts.clusters, 1);
        assert_eq!(counts.high_dim_points, 1);
        assert_eq!(counts.low_dim_points, 1);
        assert_eq!(counts.edges, 1);
        assert_eq!(counts.shapes, 1);
        assert_eq!(counts.states, 1);
        assert!(state.all_weights().iter().all(|w| *w == 1.0));
        assert_eq!(state.version, 1);
    }

    #[test]
    fn test_initialize_is_one_shot() {
        let mut state = initialized();
        let err = StateMerger::default().initialize(&mut state, artifacts()).unwrap_err();
        assert!(matches!(err, CoreError::AlreadyInitialized(_)));
    }

    #[test]
    fn test_merge_requires_initialization() {
        let mut state = ConsciousnessState::new("s");
        let err = StateMerger::default().merge(&mut state, 0.0, artifacts()).unwrap_err();
        assert!(matches!(err, CoreError::NotInitialized(_)));
    }

    #[test]
    fn test_empty_merge_only_decays() {
        let mut state = initialized();
        let before = state.counts();
        let tally = StateMerger::default()
            .merge(&mut state, 0.0, CycleArtifacts::default())
            .unwrap();
        assert_eq!(tally.inserted, 0);
        assert_eq!(state.counts(), before);
        assert!(state.all_weights().iter().all(|w| *w < 1.0));
        assert_eq!(state.version, 2);
    }

    #[test]
    fn test_entropic_merge_forgets_faster() {
        let merger = StateMerger::default();
        let mut entropic = initialized();
        let mut deterministic = entropic.clone();
        merger.merge(&mut entropic, 0.8, CycleArtifacts::default()).unwrap();
        merger.merge(&mut deterministic, -0.8, CycleArtifacts::default()).unwrap();
        let w = |s: &ConsciousnessState| s.clusters.iter().next().unwrap().1.weight;
        assert!(w(&entropic) < w(&deterministic));
        assert!(w(&deterministic) < 1.0);
        assert_eq!(entropic.last_ipoint_position, 0.8);
    }

    #[test]
    fn test_thought_states_decay_slower() {
        let mut state = ConsciousnessState::new("s");
        let merger = StateMerger::default();
        merger
            .initialize(
                &mut state,
                CycleArtifacts {
                    states: vec![state_of(StateKind::Thought, &["a"]), state_of(StateKind::Mood, &["b"])],
                    ..Default::default()
                },
            )
            .unwrap();
        merger.merge(&mut state, 0.0, CycleArtifacts::default()).unwrap();
        let thought = state.states.iter().find(|(_, w)| w.item.kind == StateKind::Thought).unwrap().1.weight;
        let mood = state.states.iter().find(|(_, w)| w.item.kind == StateKind::Mood).unwrap().1.weight;
        assert!(thought > mood);
    }

    #[test]
    fn test_same_id_reinforces() {
        let mut state = ConsciousnessState::new("s");
        let merger = StateMerger::default();
        let c = cluster(vec![1.0, 0.0]);
        merger
            .initialize(
                &mut state,
                CycleArtifacts {
                    clusters: vec![c.clone()],
                    ..Default::default()
                },
            )
            .unwrap();
        let tally = merger
            .merge(
                &mut state,
                0.0,
                CycleArtifacts {
                    clusters: vec![c.clone()],
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(tally.reinforced_by_id, 1);
        let f = MergeFactors::at(0.0);
        let expected = (f.decay + f.new_weight * 0.5).min(1.0);
        assert_relative_eq!(state.clusters.get(&c.id.to_string()).unwrap().weight, expected);
    }

    #[test]
    fn test_similar_cluster_reinforces_instead_of_inserting() {
        let mut state = initialized();
        let tally = StateMerger::default()
            .merge(
                &mut state,
                0.0,
                CycleArtifacts {
                    clusters: vec![cluster(vec![0.99, 0.05, 0.0]), cluster(vec![0.0, 1.0, 0.0])],
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(tally.reinforced_by_similarity, 1);
        assert_eq!(tally.inserted, 1);
        assert_eq!(state.clusters.len(), 2);
    }

    #[test]
    fn test_different_dimensions_never_similar() {
        let a = cluster(vec![1.0, 0.0]);
        let b = cluster(vec![1.0, 0.0, 0.0]);
        assert_eq!(a.similarity(&b), None);
    }

    #[test]
    fn test_edges_match_only_by_direction() {
        let mut state = initialized();
        let (key, edge) = {
            let (k, w) = state.edges.iter().next().unwrap();
            (k.clone(), w.item.clone())
        };
        let reversed = EmergentEdge::new(edge.to, edge.from, edge.weight, edge.edge_type);
        StateMerger::default()
            .merge(
                &mut state,
                0.0,
                CycleArtifacts {
                    edges: vec![reversed.clone()],
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(state.edges.len(), 2);
        assert!(state.edges.contains_key(&key));
        assert!(state.edges.contains_key(&reversed.key()));
    }

    #[test]
    fn test_state_similarity_requires_same_kind() {
        let a = state_of(StateKind::Mood, &["calm", "dense"]);
        let b = state_of(StateKind::Mood, &["calm", "dense"]);
        let c = state_of(StateKind::Emotion, &["calm", "dense"]);
        assert_relative_eq!(a.similarity(&b).unwrap(), 1.0);
        assert_eq!(a.similarity(&c), None);
    }

    #[test]
    fn test_prune_drops_light_entries_and_caps() {
        let mut state = initialized();
        let merger = StateMerger::default();
        for (_, w) in state.clusters.iter_mut() {
            w.weight = 0.005;
        }
        for i in 0..(MAX_EDGES + 5) {
            let e = EmergentEdge::new(Uuid::new_v4(), Uuid::new_v4(), 0.5, EdgeType::Novelty);
            state.edges.insert(e.key(), e, 0.5 + (i % 10) as f64 * 0.01);
        }
        let removed = merger.prune(&mut state);
        assert_eq!(state.clusters.len(), 0);
        assert_eq!(state.edges.len(), MAX_EDGES);
        assert_eq!(removed, 1 + 6);
        assert!(state.all_weights().iter().all(|w| *w >= MIN_WEIGHT));
    }
}
