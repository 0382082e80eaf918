//! Percept processing: sequences the noise-to-affect pipeline, folds each
//! cycle into the session's persisted memory and runs the optional
//! background flow.
//!
//! Each session owns one async mutex around its I-point and context, so
//! cycles for the same session never interleave. Sessions only contend on
//! the repository lock while saving.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use noema_core::time::millis_to_iso8601;
use noema_core::vector::l2_normalize;
use noema_core::{
    Cluster, Clusterer, CycleArtifacts, EMBEDDING_DIM, EdgeBuilder, EntropySource,
    GraphProcessor, IPointRegion, IPointState, MAX_ACTIVE_TAGS, MAX_RECENT_PERCEPTS,
    Oscillator, PROJECTOR_VERSION, PRUNE_INTERVAL, ProjectionOptions, Projector, Reducer,
    SafetyFilter, SafetyReport, SemanticProcessor, Shaper, Solution, Solver, StateMerger,
    StorageCounts, SubjectiveState, Thought, embed_state, sha256, sha256_hex, shannon_bits,
};
use noema_store::{NoemaConfig, StateRepository};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Seed used by `sample_entropy` when a seeded sample is requested but the
/// configuration carries no seed.
const DEFAULT_SAMPLE_SEED: &str = "noema-sample";
const MAX_SAMPLE_SIZE: usize = 1 << 20;

/// 100 ns ticks per millisecond.
const TICKS_PER_MILLI: u64 = 10_000;

/// A cycle observed its cancellation token and stopped between stages.
#[derive(Debug)]
pub struct Cancelled;

impl fmt::Display for Cancelled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cycle cancelled")
    }
}

impl std::error::Error for Cancelled {}

fn checkpoint(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(Cancelled.into());
    }
    Ok(())
}

// --- Contract types ---

/// One unit of external input.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Percept {
    pub id: Uuid,
    pub source: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub content: String,
    pub timestamp_utc: String,
    /// Recognized keys: `goal` (re-ranks solutions) and `constraints`
    /// (`;`-separated `not:`, `avoid:`, `must:` or `require:` rules for the solver).
    #[serde(default)]
    pub meta: HashMap<String, String>,
}

impl Percept {
    pub fn new(source: impl Into<String>, kind: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            source: source.into(),
            kind: kind.into(),
            content: content.into(),
            timestamp_utc: noema_core::time::now_iso8601(),
            meta: HashMap::new(),
        }
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    /// Self-generated percept for background cycle `n`.
    pub fn internal(n: u64) -> Self {
        Self::new("flow", "internal", format!("autonomous cycle {n}"))
    }

    fn constraints(&self) -> Vec<String> {
        self.meta
            .get("constraints")
            .map(|raw| {
                raw.split(';')
                    .map(str::trim)
                    .filter(|c| !c.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionContext {
    pub session_id: String,
    pub user_id: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl SessionContext {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            ..Default::default()
        }
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IPointSnapshot {
    pub axis_position: f64,
    pub region: IPointRegion,
    pub is_deterministic: bool,
    pub is_entropic: bool,
    pub is_balanced: bool,
    pub determinism_factor: f64,
    pub entropy_factor: f64,
    pub velocity: f64,
    pub phase: f64,
    pub past_states_count: usize,
}

impl From<&IPointState> for IPointSnapshot {
    fn from(ipoint: &IPointState) -> Self {
        Self {
            axis_position: ipoint.axis_position,
            region: ipoint.region(),
            is_deterministic: ipoint.is_deterministic(),
            is_entropic: ipoint.is_entropic(),
            is_balanced: ipoint.is_balanced(),
            determinism_factor: ipoint.determinism_factor(),
            entropy_factor: ipoint.entropy_factor(),
            velocity: ipoint.velocity,
            phase: ipoint.phase,
            past_states_count: ipoint.past_state_ids.len(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextSnapshot {
    pub active_tags: Vec<String>,
    pub embedding_dimension: usize,
    pub recent_percept_count: usize,
    pub user_id: Option<String>,
    pub cycles: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntropySample {
    pub id: Uuid,
    pub size: usize,
    pub noise_hash: String,
    /// Shannon entropy of the sample, bits per byte (0..=8).
    pub entropy_bits: f64,
    pub timestamp: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryStats {
    pub session_id: String,
    pub version: u64,
    pub is_initialized: bool,
    pub last_ipoint_position: f64,
    pub counts: StorageCounts,
    pub total: usize,
    pub modified_at: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleTrace {
    pub percept_id: Uuid,
    pub noise_hashes: Vec<String>,
    pub cluster_count: usize,
    pub point_count: usize,
    pub edge_count: usize,
    pub shape_count: usize,
    pub state_count: usize,
    pub thought_count: usize,
    pub solution_count: usize,
    pub pruned: usize,
    pub deterministic_key: String,
    pub elapsed_ms: u64,
}

/// Everything one cycle produced.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerceptOutcome {
    pub session_id: String,
    pub states: Vec<SubjectiveState>,
    pub thoughts: Vec<Thought>,
    pub solutions: Vec<Solution>,
    pub ipoint: IPointSnapshot,
    pub trace: CycleTrace,
}

/// The compact result returned to callers of `process_percept`.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub session_id: String,
    pub states: Vec<SubjectiveState>,
    pub thought_count: usize,
    pub solution_count: usize,
    pub i_point_position: f64,
    pub processing_time_ms: u64,
    pub deterministic_key: String,
}

impl PerceptOutcome {
    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            session_id: self.session_id.clone(),
            states: self.states.clone(),
            thought_count: self.thoughts.len(),
            solution_count: self.solutions.len(),
            i_point_position: self.ipoint.axis_position,
            processing_time_ms: self.trace.elapsed_ms,
            deterministic_key: self.trace.deterministic_key.clone(),
        }
    }
}

// --- Session control state ---

struct SessionState {
    ipoint: IPointState,
    user_id: Option<String>,
    active_tags: VecDeque<String>,
    recent_percepts: VecDeque<Percept>,
    embedding: Vec<f64>,
    cycles: u64,
}

impl SessionState {
    fn new() -> Self {
        Self {
            ipoint: IPointState::new(),
            user_id: None,
            active_tags: VecDeque::new(),
            recent_percepts: VecDeque::new(),
            embedding: Vec::new(),
            cycles: 0,
        }
    }

    /// Active tags first, then caller tags not already active.
    fn context_tags(&self, extra: &[String]) -> Vec<String> {
        let mut tags: Vec<String> = self.active_tags.iter().cloned().collect();
        for tag in extra {
            if !tags.contains(tag) {
                tags.push(tag.clone());
            }
        }
        tags
    }

    fn observe(&mut self, percept: &Percept, states: &[SubjectiveState]) {
        self.recent_percepts.push_back(percept.clone());
        while self.recent_percepts.len() > MAX_RECENT_PERCEPTS {
            self.recent_percepts.pop_front();
        }

        // Most recently seen tags live at the back.
        for tag in states.iter().flat_map(|s| s.semantic_tags.iter()) {
            if let Some(pos) = self.active_tags.iter().position(|t| t == tag) {
                self.active_tags.remove(pos);
            }
            self.active_tags.push_back(tag.clone());
        }
        while self.active_tags.len() > MAX_ACTIVE_TAGS {
            self.active_tags.pop_front();
        }

        if !states.is_empty() {
            let mut embedding = vec![0.0; EMBEDDING_DIM];
            for state in states {
                for (acc, x) in embedding.iter_mut().zip(embed_state(state)) {
                    *acc += x;
                }
            }
            l2_normalize(&mut embedding);
            self.embedding = embedding;
        }
        self.cycles += 1;
    }

    fn snapshot(&self) -> ContextSnapshot {
        ContextSnapshot {
            active_tags: self.active_tags.iter().cloned().collect(),
            embedding_dimension: self.embedding.len(),
            recent_percept_count: self.recent_percepts.len(),
            user_id: self.user_id.clone(),
            cycles: self.cycles,
        }
    }
}

struct FlowHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
    completed: Arc<AtomicU64>,
}

/// Stages 4.1 to 4.8 of one cycle, before anything touches memory.
struct Perception {
    noise_hashes: Vec<String>,
    deterministic_key: String,
    artifacts: CycleArtifacts,
    rng: StdRng,
}

/// Reproducibility key: hash of every noise hash, every cluster hash and
/// the projector version, in that order.
pub fn deterministic_key(noise_hashes: &[String], clusters: &[Cluster]) -> String {
    let mut parts: Vec<&[u8]> = Vec::with_capacity(noise_hashes.len() + clusters.len() + 1);
    parts.extend(noise_hashes.iter().map(|h| h.as_bytes()));
    parts.extend(clusters.iter().map(|c| c.hash.as_bytes()));
    parts.push(PROJECTOR_VERSION.as_bytes());
    sha256_hex(&parts)
}

pub struct Orchestrator {
    config: NoemaConfig,
    entropy: EntropySource,
    clusterer: Clusterer,
    edges: EdgeBuilder,
    graph: GraphProcessor,
    shaper: Shaper,
    safety: SafetyFilter,
    semantic: SemanticProcessor,
    solver: Solver,
    oscillator: Oscillator,
    merger: StateMerger,
    repository: StateRepository,
    sessions: StdMutex<HashMap<String, Arc<Mutex<SessionState>>>>,
    flows: Mutex<HashMap<String, FlowHandle>>,
    /// Process-wide cycle counter driving the periodic prune.
    cycle_count: AtomicU64,
}

impl Orchestrator {
    pub fn new(config: NoemaConfig, repository: StateRepository) -> Self {
        Self {
            entropy: EntropySource::from_options(&config.entropy),
            clusterer: Clusterer::new(config.clustering.clone()),
            edges: EdgeBuilder::new(config.edges.clone()),
            graph: GraphProcessor::new(config.graph.clone()),
            shaper: Shaper::new(),
            safety: SafetyFilter::new(&config.safety),
            semantic: SemanticProcessor::new(config.semantic.clone()),
            solver: Solver::new(config.solver.clone()),
            oscillator: Oscillator::new(&config.oscillator),
            merger: StateMerger::new(config.merge.clone()),
            repository,
            sessions: StdMutex::new(HashMap::new()),
            flows: Mutex::new(HashMap::new()),
            cycle_count: AtomicU64::new(0),
            config,
        }
    }

    /// Open the state repository under `base_dir` and build the pipeline.
    pub fn open(config: NoemaConfig, base_dir: &Path) -> Result<Self> {
        let path = config.state_path(base_dir);
        let repository = StateRepository::open(&path)
            .with_context(|| format!("failed to open state file {}", path.display()))?;
        Ok(Self::new(config, repository))
    }

    pub fn config(&self) -> &NoemaConfig {
        &self.config
    }

    pub fn repository(&self) -> &StateRepository {
        &self.repository
    }

    fn session(&self, session_id: &str) -> Arc<Mutex<SessionState>> {
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(
            sessions
                .entry(session_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(SessionState::new()))),
        )
    }

    fn existing_session(&self, session_id: &str) -> Option<Arc<Mutex<SessionState>>> {
        let sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        sessions.get(session_id).map(Arc::clone)
    }

    /// Run one full cycle for `percept` in the given session.
    pub async fn process_percept(&self, percept: &Percept, context: &SessionContext) -> Result<PerceptOutcome> {
        self.run_cycle(percept, context, &CancellationToken::new()).await
    }

    async fn run_cycle(
        &self,
        percept: &Percept,
        context: &SessionContext,
        cancel: &CancellationToken,
    ) -> Result<PerceptOutcome> {
        anyhow::ensure!(!context.session_id.trim().is_empty(), "session id must not be empty");
        let started = Instant::now();
        let handle = self.session(&context.session_id);
        let mut session = handle.lock().await;
        checkpoint(cancel)?;
        if context.user_id.is_some() {
            session.user_id = context.user_id.clone();
        }
        let context_tags = session.context_tags(&context.tags);

        let Perception {
            noise_hashes,
            deterministic_key,
            artifacts,
            mut rng,
        } = self.perceive(&session.ipoint, &context_tags, cancel)?;
        let mut trace = CycleTrace {
            percept_id: percept.id,
            noise_hashes,
            cluster_count: artifacts.clusters.len(),
            point_count: artifacts.low_dim_points.len(),
            edge_count: artifacts.edges.len(),
            shape_count: artifacts.shapes.len(),
            state_count: artifacts.states.len(),
            thought_count: 0,
            solution_count: 0,
            pruned: 0,
            deterministic_key,
            elapsed_ms: 0,
        };
        let states = artifacts.states.clone();

        checkpoint(cancel)?;
        trace.pruned = self.consolidate(&context.session_id, session.ipoint.axis_position, artifacts)?;

        checkpoint(cancel)?;
        let thoughts = self.safety.filter_thoughts(self.semantic.generate(&states));
        self.semantic.remember(&thoughts);

        checkpoint(cancel)?;
        let mut solutions = self
            .solver
            .solve(&states, &context_tags, &percept.constraints(), &mut rng);
        if let Some(goal) = percept.meta.get("goal")
            && let Some(best) = self.solver.select_best(&solutions, goal).map(|s| s.id)
            && let Some(pos) = solutions.iter().position(|s| s.id == best)
        {
            let best = solutions.remove(pos);
            solutions.insert(0, best);
        }

        checkpoint(cancel)?;
        self.oscillator.pulse(&mut session.ipoint, &states);
        session.observe(percept, &states);

        trace.thought_count = thoughts.len();
        trace.solution_count = solutions.len();
        trace.elapsed_ms = started.elapsed().as_millis() as u64;
        tracing::debug!(
            "session {} cycle {}: {} states, {} thoughts, {} solutions, position {:.3}, {}ms",
            context.session_id,
            session.cycles,
            states.len(),
            thoughts.len(),
            solutions.len(),
            session.ipoint.axis_position,
            trace.elapsed_ms
        );

        Ok(PerceptOutcome {
            session_id: context.session_id.clone(),
            states,
            thoughts,
            solutions,
            ipoint: IPointSnapshot::from(&session.ipoint),
            trace,
        })
    }

    /// Noise through safety-filtered states. Pure CPU work.
    fn perceive(
        &self,
        ipoint: &IPointState,
        context_tags: &[String],
        cancel: &CancellationToken,
    ) -> Result<Perception> {
        let opts = &self.config.entropy;
        let chunks = self.entropy.generate(opts.chunk_count, opts.chunk_size);
        let noise_hashes: Vec<String> = chunks.iter().map(|c| c.hash.clone()).collect();
        let seed_parts: Vec<&[u8]> = noise_hashes.iter().map(|h| h.as_bytes()).collect();
        let mut rng = StdRng::from_seed(sha256(&seed_parts));

        checkpoint(cancel)?;
        let clusters = self.clusterer.cluster(&chunks, &mut rng)?;

        checkpoint(cancel)?;
        let projector = Projector::new(ProjectionOptions {
            creativity: self.config.projection.creativity * ipoint.entropy_factor(),
            determinism: ipoint.determinism_factor(),
            ..self.config.projection.clone()
        });
        let mut high = projector.project_all(&clusters)?;
        high.retain(|p| self.safety.validate_point(p).is_valid);

        checkpoint(cancel)?;
        let mut reducer = Reducer::new(self.config.reduction.clone());
        if high.len() > reducer.target_dim() {
            let samples: Vec<Vec<f64>> = high.iter().map(|p| p.vector.clone()).collect();
            reducer.train(&samples)?;
        }
        let mut low = reducer.reduce_all(&high)?;
        low.retain(|p| self.safety.validate_point(p).is_valid);

        checkpoint(cancel)?;
        let edges = self.edges.build(&low)?;
        let shapes = self.graph.process(&low, &edges);

        checkpoint(cancel)?;
        let shaped: Vec<SubjectiveState> = self
            .shaper
            .shape_all(&shapes)
            .into_iter()
            .map(|mut state| {
                state.narrative = self.shaper.narrate_with_context(&state, context_tags);
                state
            })
            .collect();
        let states = self.safety.filter_states(shaped);

        let deterministic_key = deterministic_key(&noise_hashes, &clusters);
        Ok(Perception {
            noise_hashes,
            deterministic_key,
            artifacts: CycleArtifacts {
                clusters,
                high_dim_points: high,
                low_dim_points: low,
                edges,
                shapes,
                states,
            },
            rng,
        })
    }

    /// Initialize or merge the session memory, prune on schedule, persist.
    /// Returns the number of entries pruned.
    fn consolidate(&self, session_id: &str, position: f64, artifacts: CycleArtifacts) -> Result<usize> {
        let mut memory = self.repository.get_or_create(session_id);
        if memory.is_initialized {
            self.merger.merge(&mut memory, position, artifacts)?;
        } else {
            self.merger.initialize(&mut memory, artifacts)?;
        }

        let cycle = self.cycle_count.fetch_add(1, Ordering::SeqCst) + 1;
        let pruned = if cycle % PRUNE_INTERVAL == 0 {
            let pruned = self.merger.prune(&mut memory);
            tracing::debug!("prune pass at cycle {cycle} removed {pruned} entries from {session_id}");
            pruned
        } else {
            0
        };

        self.repository
            .save(&mut memory)
            .context("failed to persist consciousness state")?;
        Ok(pruned)
    }

    // --- Background flow ---

    /// Start the autonomous loop for a session. A running loop is cancelled
    /// and replaced. Returns whether one was replaced.
    pub async fn start_flow(self: &Arc<Self>, context: SessionContext) -> Result<bool> {
        anyhow::ensure!(!context.session_id.trim().is_empty(), "session id must not be empty");
        let replaced = self.stop_flow(&context.session_id).await;

        let cancel = CancellationToken::new();
        let completed = Arc::new(AtomicU64::new(0));
        let task = tokio::spawn(flow_loop(
            Arc::clone(self),
            context.clone(),
            cancel.clone(),
            Arc::clone(&completed),
        ));
        let previous = self.flows.lock().await.insert(
            context.session_id.clone(),
            FlowHandle {
                cancel,
                task,
                completed,
            },
        );
        if let Some(previous) = previous {
            previous.cancel.cancel();
        }
        tracing::info!("flow started for session {}", context.session_id);
        Ok(replaced)
    }

    /// Cancel the session's loop and wait for it to exit. Returns whether a
    /// loop was running.
    pub async fn stop_flow(&self, session_id: &str) -> bool {
        let Some(handle) = self.flows.lock().await.remove(session_id) else {
            return false;
        };
        handle.cancel.cancel();
        if let Err(e) = handle.task.await {
            tracing::warn!("flow task for session {session_id} ended abnormally: {e}");
        }
        tracing::info!(
            "flow stopped for session {session_id} after {} cycles",
            handle.completed.load(Ordering::SeqCst)
        );
        true
    }

    pub async fn flow_running(&self, session_id: &str) -> bool {
        self.flows
            .lock()
            .await
            .get(session_id)
            .is_some_and(|h| !h.task.is_finished())
    }

    /// Completed background cycles for a running flow.
    pub async fn flow_cycles(&self, session_id: &str) -> Option<u64> {
        self.flows
            .lock()
            .await
            .get(session_id)
            .map(|h| h.completed.load(Ordering::SeqCst))
    }

    /// Stop every running flow.
    pub async fn shutdown(&self) {
        let ids: Vec<String> = self.flows.lock().await.keys().cloned().collect();
        for id in ids {
            self.stop_flow(&id).await;
        }
    }

    // --- Introspection and utilities ---

    pub async fn ipoint_snapshot(&self, session_id: &str) -> Option<IPointSnapshot> {
        let session = self.existing_session(session_id)?;
        let session = session.lock().await;
        Some(IPointSnapshot::from(&session.ipoint))
    }

    pub async fn context_snapshot(&self, session_id: &str) -> Option<ContextSnapshot> {
        let session = self.existing_session(session_id)?;
        let session = session.lock().await;
        Some(session.snapshot())
    }

    /// One fresh chunk. Seeded samples use the configured seed (or a fixed
    /// fallback) at sequence 0, so their bytes repeat across calls.
    pub fn sample_entropy(&self, size: Option<usize>, use_seed: bool) -> EntropySample {
        let size = size.unwrap_or(self.config.entropy.chunk_size).min(MAX_SAMPLE_SIZE);
        let chunk = if use_seed {
            let seed = self.config.entropy.seed.as_deref().unwrap_or(DEFAULT_SAMPLE_SEED);
            EntropySource::seeded(seed).generate_chunk_at(size, 0)
        } else {
            self.entropy.generate_chunk(size)
        };
        EntropySample {
            id: chunk.id,
            size: chunk.len(),
            noise_hash: chunk.hash.clone(),
            entropy_bits: shannon_bits(&chunk.bytes),
            timestamp: millis_to_iso8601(chunk.timestamp_ticks / TICKS_PER_MILLI),
        }
    }

    /// Quality score in [0, 1] over fresh unseeded samples.
    pub fn entropy_quality(&self) -> f64 {
        let opts = &self.config.entropy;
        EntropySource::new().estimate_quality(opts.quality_samples, opts.quality_sample_size)
    }

    pub fn validate_content(&self, text: &str) -> SafetyReport {
        self.safety.validate_text(text)
    }

    /// Persisted sessions plus any live only in this process, sorted.
    pub fn list_sessions(&self) -> Vec<String> {
        let mut ids = self.repository.list();
        {
            let sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
            ids.extend(sessions.keys().cloned());
        }
        ids.sort();
        ids.dedup();
        ids
    }

    pub fn memory_stats(&self, session_id: &str) -> Option<MemoryStats> {
        let memory = self.repository.get(session_id)?;
        let counts = memory.counts();
        Some(MemoryStats {
            session_id: memory.session_id,
            version: memory.version,
            is_initialized: memory.is_initialized,
            last_ipoint_position: memory.last_ipoint_position,
            total: counts.total(),
            counts,
            modified_at: memory.modified_at,
        })
    }
}

async fn flow_loop(
    orchestrator: Arc<Orchestrator>,
    context: SessionContext,
    cancel: CancellationToken,
    completed: Arc<AtomicU64>,
) {
    let interval = Duration::from_millis(orchestrator.config.flow.interval_ms);
    let backoff = Duration::from_millis(orchestrator.config.flow.backoff_ms);
    let mut n: u64 = 0;

    while !cancel.is_cancelled() {
        n += 1;
        let percept = Percept::internal(n);
        let delay = match orchestrator.run_cycle(&percept, &context, &cancel).await {
            Ok(outcome) => {
                completed.fetch_add(1, Ordering::SeqCst);
                tracing::debug!(
                    "flow cycle {n} for session {}: key {}",
                    context.session_id,
                    outcome.trace.deterministic_key
                );
                interval
            }
            Err(e) if e.is::<Cancelled>() => break,
            Err(e) => {
                tracing::warn!(
                    "flow cycle {n} for session {} failed: {e:#}; retrying in {}ms",
                    context.session_id,
                    backoff.as_millis()
                );
                backoff
            }
        };
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }
    }
}
