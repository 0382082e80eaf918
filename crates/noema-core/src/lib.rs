//! Noise-to-affect pipeline engine.
//!
//! Cryptographic noise is clustered, projected into a semantic space,
//! reduced, linked into a graph and read back as affect-labelled states.
//! Each cycle is folded into a decaying weighted memory whose blend is
//! steered by the I-point oscillator.
//!
//! Zero I/O: persistence and transport live in `noema-store` and `noema-cli`.

pub mod chunk;
pub mod cluster;
pub mod clusterer;
pub mod consciousness;
pub mod constants;
pub mod edge;
pub mod edges;
pub mod entropy;
pub mod error;
pub mod graph;
pub mod hash;
pub mod ipoint;
pub mod merger;
pub mod oscillator;
pub mod point;
pub mod projector;
pub mod reducer;
pub mod safety;
pub mod semantic;
pub mod shape;
pub mod shaper;
pub mod solver;
pub mod state;
pub mod thought;
pub mod time;
pub mod tokenizer;
pub mod vector;

pub use chunk::NoiseChunk;
pub use cluster::{Cluster, ClusterAlgorithm};
pub use clusterer::{ClusterOptions, Clusterer, extract_features};
pub use consciousness::{
    ConsciousnessState, CycleArtifacts, StorageCounts, Weighted, WeightedStore,
};
pub use constants::{
    ASSOCIATIVE_MEMORY_CAP, EMBEDDING_DIM, MAX_RECENT_PERCEPTS, MAX_ACTIVE_TAGS, MIN_WEIGHT,
    PROJECTOR_VERSION, PRUNE_INTERVAL,
};
pub use edge::{EdgeMetadata, EdgeType, EmergentEdge};
pub use edges::{EdgeBuilder, EdgeOptions};
pub use entropy::{EntropyOptions, EntropySource, shannon_bits};
pub use error::{CoreError, Result};
pub use graph::{GraphOptions, GraphProcessor};
pub use hash::{sha256, sha256_hex};
pub use ipoint::{IPointRegion, IPointState};
pub use merger::{MergeFactors, MergeOptions, MergeTally, Mergeable, StateMerger};
pub use oscillator::{Oscillator, OscillatorOptions, Waveform};
pub use point::ProjectedPoint;
pub use projector::{ProjectionOptions, Projector};
pub use reducer::{Reducer, ReductionOptions};
pub use safety::{SafetyFilter, SafetyOptions, SafetyReport};
pub use semantic::{SemanticOptions, SemanticProcessor, embed_state};
pub use shape::{EmergentShape, ShapeMetadata};
pub use shaper::Shaper;
pub use solver::{Solution, Solver, SolverOptions};
pub use state::{StateKind, SubjectiveState};
pub use thought::Thought;
pub use tokenizer::tokenize;
