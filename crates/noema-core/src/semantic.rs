//! Thought generation and bounded associative memory.
//!
//! Narrative text is template-filled; a language-model backend could sit
//! behind the same `generate` contract.

use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::{ASSOCIATIVE_MEMORY_CAP, EMBEDDING_DIM};
use crate::hash::fnv1a;
use crate::state::{StateKind, SubjectiveState};
use crate::thought::Thought;
use crate::time::{now_ticks, ticks_to_hours};
use crate::tokenizer::keywords;
use crate::vector::l2_normalize;

const AFFECT_SLOTS: usize = 3;
const KIND_SLOTS: usize = 7;
const HASH_SLOTS: usize = (EMBEDDING_DIM - AFFECT_SLOTS - KIND_SLOTS) / 2;
const TAG_OFFSET: usize = AFFECT_SLOTS + KIND_SLOTS;
const NARRATIVE_OFFSET: usize = TAG_OFFSET + HASH_SLOTS;

/// Words shorter than this carry no associative signal.
const MIN_KEYWORD_LEN: usize = 3;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SemanticOptions {
    pub capacity: usize,
    pub memory_top_k: usize,
    pub half_life_hours: f64,
}

impl Default for SemanticOptions {
    fn default() -> Self {
        Self {
            capacity: ASSOCIATIVE_MEMORY_CAP,
            memory_top_k: 2,
            half_life_hours: 24.0,
        }
    }
}

#[derive(Clone, Debug)]
pub struct MemoryHit {
    pub thought: Thought,
    pub score: f64,
}

#[derive(Debug, Default)]
pub struct SemanticProcessor {
    options: SemanticOptions,
    memory: Mutex<VecDeque<Thought>>,
}

impl SemanticProcessor {
    pub fn new(options: SemanticOptions) -> Self {
        Self {
            options,
            memory: Mutex::new(VecDeque::new()),
        }
    }

    pub fn options(&self) -> &SemanticOptions {
        &self.options
    }

    /// One templated thought per state, followed by one echo thought per
    /// associated memory.
    pub fn generate(&self, states: &[SubjectiveState]) -> Vec<Thought> {
        let mut thoughts = Vec::new();
        for state in states {
            let hits = self.recall(state, self.options.memory_top_k);
            let hit_ids: Vec<Uuid> = hits.iter().map(|h| h.thought.id).collect();
            let relevance = 0.6 * state.intensity + 0.4 * state.arousal;
            thoughts.push(Thought::new(template(state), relevance, state.id).with_memory_hits(hit_ids));
            for hit in hits {
                thoughts.push(
                    Thought::new(
                        format!("Echo of earlier: {}", hit.thought.content),
                        hit.score,
                        state.id,
                    )
                    .with_memory_hits(vec![hit.thought.id]),
                );
            }
        }
        thoughts
    }

    /// Append to associative memory, evicting the oldest past capacity.
    pub fn remember(&self, thoughts: &[Thought]) {
        let mut memory = self.memory.lock().unwrap_or_else(|e| e.into_inner());
        for t in thoughts {
            memory.push_back(t.clone());
        }
        while memory.len() > self.options.capacity {
            memory.pop_front();
        }
    }

    pub fn memory_len(&self) -> usize {
        self.memory.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Top-k stored thoughts by
    /// `0.5·overlap + 0.3·0.5^(age/half_life) + 0.2·relevance`.
    /// Entries sharing no keyword with the state are never returned.
    pub fn recall(&self, state: &SubjectiveState, top_k: usize) -> Vec<MemoryHit> {
        if top_k == 0 {
            return Vec::new();
        }
        let query = state_keywords(state);
        if query.is_empty() {
            return Vec::new();
        }
        let now = now_ticks();
        let half_life = self.options.half_life_hours.max(f64::MIN_POSITIVE);

        let memory = self.memory.lock().unwrap_or_else(|e| e.into_inner());
        let mut hits: Vec<MemoryHit> = memory
            .iter()
            .filter_map(|t| {
                let words = keywords(&t.content, MIN_KEYWORD_LEN);
                let shared = query.intersection(&words).count();
                if shared == 0 {
                    return None;
                }
                let overlap = shared as f64 / query.len() as f64;
                let recency = 0.5f64.powf(ticks_to_hours(t.created_at, now) / half_life);
                Some(MemoryHit {
                    thought: t.clone(),
                    score: 0.5 * overlap + 0.3 * recency + 0.2 * t.relevance,
                })
            })
            .collect();
        drop(memory);

        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(top_k);
        hits
    }
}

fn state_keywords(state: &SubjectiveState) -> HashSet<String> {
    let mut words = keywords(&state.narrative, MIN_KEYWORD_LEN);
    for tag in &state.semantic_tags {
        words.extend(keywords(tag, MIN_KEYWORD_LEN));
    }
    words.insert(state.kind.as_str().to_string());
    words
}

fn valence_word(valence: f64) -> &'static str {
    if valence >= 0.3 {
        "bright"
    } else if valence <= -0.3 {
        "shadowed"
    } else {
        "even"
    }
}

fn intensity_word(intensity: f64) -> &'static str {
    if intensity >= 0.7 {
        "strongly"
    } else if intensity >= 0.4 {
        "clearly"
    } else {
        "faintly"
    }
}

fn template(state: &SubjectiveState) -> String {
    let v = valence_word(state.valence);
    let i = intensity_word(state.intensity);
    let tag = state.leading_tag();
    match state.kind {
        StateKind::Mood => format!("Something {v} hangs in the background, {i} {tag}."),
        StateKind::Emotion => format!("A {v} reaction registers {i}, colored {tag}."),
        StateKind::Thought => format!("A {v} idea forms {i} around {tag} structure."),
        StateKind::Feeling => format!("It feels {v}, {i} tinged with {tag}."),
        StateKind::Intention => format!("A {v} aim emerges {i}: lean into the {tag} pattern."),
        StateKind::Curiosity => format!("What lies behind this {tag} signal? The question pulls {i} and {v}."),
        StateKind::Creativity => format!("A {v} recombination sparks {i} from {tag} fragments."),
    }
}

/// Fixed-length hand-crafted embedding: valence/arousal/intensity, one-hot
/// kind, FNV-1a buckets of tags and narrative words. L2-normalized.
pub fn embed_state(state: &SubjectiveState) -> Vec<f64> {
    let mut v = vec![0.0; EMBEDDING_DIM];
    v[0] = state.valence;
    v[1] = state.arousal;
    v[2] = state.intensity;
    v[AFFECT_SLOTS + state.kind.index()] = 1.0;
    for tag in &state.semantic_tags {
        v[TAG_OFFSET + (fnv1a(&tag.to_lowercase()) % HASH_SLOTS as u64) as usize] += 1.0;
    }
    for word in keywords(&state.narrative, MIN_KEYWORD_LEN) {
        v[NARRATIVE_OFFSET + (fnv1a(&word) % HASH_SLOTS as u64) as usize] += 1.0;
    }
    l2_normalize(&mut v);
    v
}
