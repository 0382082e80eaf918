/// Weights below this are dropped during decay and pruning.
pub const MIN_WEIGHT: f64 = 0.01;

/// Numerical epsilon for near-zero comparisons
pub const EPSILON: f64 = 1e-10;

/// Storage caps applied by `StateMerger::prune`.
pub const MAX_CLUSTERS: usize = 1000;
pub const MAX_POINTS: usize = 1000;
pub const MAX_SHAPES: usize = 1000;
pub const MAX_STATES: usize = 1000;
pub const MAX_EDGES: usize = 2000;

/// Bounded associative memory size (oldest evicted first).
pub const ASSOCIATIVE_MEMORY_CAP: usize = 1000;

/// Cosine / composite similarity at or above which an incoming item
/// reinforces an existing entry instead of being inserted.
pub const SIMILARITY_THRESHOLD: f64 = 0.8;

/// Prune the session memory every N process-wide cycles.
pub const PRUNE_INTERVAL: u64 = 10;

/// Rolling window limits for per-session context.
pub const MAX_RECENT_PERCEPTS: usize = 10;
pub const MAX_ACTIVE_TAGS: usize = 10;

/// Past I-point ids retained on the oscillator state.
pub const MAX_IPOINT_HISTORY: usize = 100;

/// Version identifier of the random projection scheme. Part of the
/// reproducibility key, so bump it whenever projection output changes.
pub const PROJECTOR_VERSION: &str = "gauss-rp/1";

/// Fixed state embedding length.
pub const EMBEDDING_DIM: usize = 64;

/// Axis region boundaries for the I-point.
pub const DETERMINISTIC_BOUND: f64 = -0.3;
pub const ENTROPIC_BOUND: f64 = 0.3;
