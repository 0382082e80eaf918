//! Heuristic action proposals from the cycle's subjective states.

use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state::{StateKind, SubjectiveState};
use crate::tokenizer::{keywords, tokenize};

const PRIMARY_BASE: f64 = 0.7;
const ALTERNATIVE_BASE: f64 = 0.5;
const CONTEXT_BONUS: f64 = 0.1;
const GOAL_WEIGHT: f64 = 0.2;
/// Exploit draws only from states above this intensity.
const EXPLOIT_INTENSITY: f64 = 0.5;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverOptions {
    pub exploration_rate: f64,
    pub max_alternatives: usize,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            exploration_rate: 0.2,
            max_alternatives: 3,
        }
    }
}

/// Candidate action. Not persisted across cycles.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Solution {
    pub id: Uuid,
    pub action: String,
    pub confidence: f64,
    pub reasoning: String,
    pub related_state_ids: Vec<Uuid>,
}

/// A parsed `not:` / `avoid:` / `must:` / `require:` constraint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Constraint {
    Exclude(String),
    Require(String),
}

impl Constraint {
    /// `None` for strings without a known prefix.
    pub fn parse(raw: &str) -> Option<Self> {
        let (prefix, term) = raw.split_once(':')?;
        let term = term.trim().to_lowercase();
        if term.is_empty() {
            return None;
        }
        match prefix.trim().to_ascii_lowercase().as_str() {
            "not" | "avoid" => Some(Self::Exclude(term)),
            "must" | "require" => Some(Self::Require(term)),
            _ => None,
        }
    }

    pub fn allows(&self, action: &str) -> bool {
        let action = action.to_lowercase();
        match self {
            Self::Exclude(term) => !action.contains(term.as_str()),
            Self::Require(term) => action.contains(term.as_str()),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct Solver {
    options: SolverOptions,
}

impl Solver {
    pub fn new(options: SolverOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &SolverOptions {
        &self.options
    }

    /// Primary solution from the most intense state, then up to
    /// `max_alternatives` explore/exploit picks. Constraint-violating
    /// actions are dropped.
    pub fn solve(
        &self,
        states: &[SubjectiveState],
        context_tags: &[String],
        constraints: &[String],
        rng: &mut impl Rng,
    ) -> Vec<Solution> {
        let Some(primary) = states
            .iter()
            .max_by(|a, b| a.intensity.total_cmp(&b.intensity))
        else {
            return Vec::new();
        };
        let parsed: Vec<Constraint> = constraints.iter().filter_map(|c| Constraint::parse(c)).collect();

        let mut solutions = vec![propose(primary, PRIMARY_BASE, "primary", context_tags)];
        let strong: Vec<&SubjectiveState> = states
            .iter()
            .filter(|s| s.intensity > EXPLOIT_INTENSITY)
            .collect();
        for _ in 0..self.options.max_alternatives {
            let explore = rng.random::<f64>() < self.options.exploration_rate;
            let pick = if explore || strong.is_empty() {
                &states[rng.random_range(0..states.len())]
            } else {
                strong[rng.random_range(0..strong.len())]
            };
            let mode = if explore { "explore" } else { "exploit" };
            solutions.push(propose(pick, ALTERNATIVE_BASE, mode, context_tags));
        }

        solutions.retain(|s| parsed.iter().all(|c| c.allows(&s.action)));
        solutions
    }

    /// Highest `confidence + 0.2·goal overlap` where overlap is the share of
    /// goal words present in the action.
    pub fn select_best<'a>(&self, solutions: &'a [Solution], goal: &str) -> Option<&'a Solution> {
        let goal_words = keywords(goal, 1);
        let score = |s: &Solution| {
            if goal_words.is_empty() {
                return s.confidence;
            }
            let action: Vec<String> = tokenize(&s.action);
            let hits = goal_words.iter().filter(|w| action.contains(w)).count();
            s.confidence + GOAL_WEIGHT * hits as f64 / goal_words.len() as f64
        };
        solutions.iter().max_by(|a, b| score(a).total_cmp(&score(b)))
    }
}

fn action_for(state: &SubjectiveState) -> String {
    let tag = state.leading_tag();
    match state.kind {
        StateKind::Mood => format!("Pause and let the {tag} mood settle before acting"),
        StateKind::Emotion => format!("Acknowledge the {tag} reaction and respond with care"),
        StateKind::Thought => format!("Reason through the {tag} idea step by step"),
        StateKind::Feeling => format!("Stay with the {tag} feeling and note what it points at"),
        StateKind::Intention => format!("Commit to the next concrete step along the {tag} direction"),
        StateKind::Curiosity => format!("Ask a question that probes the {tag} signal"),
        StateKind::Creativity => format!("Sketch a new combination from the {tag} fragments"),
    }
}

fn propose(state: &SubjectiveState, base: f64, mode: &str, context_tags: &[String]) -> Solution {
    let bonus = if state.semantic_tags.iter().any(|t| context_tags.contains(t)) {
        CONTEXT_BONUS
    } else {
        0.0
    };
    let confidence = (base + 0.15 * state.intensity + 0.1 * state.valence.abs() + bonus).clamp(0.1, 1.0);
    Solution {
        id: Uuid::new_v4(),
        action: action_for(state),
        confidence,
        reasoning: format!(
            "{mode}: {} state at intensity {:.2}, valence {:.2}",
            state.kind.as_str(),
            state.intensity,
            state.valence
        ),
        related_state_ids: vec![state.id],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    fn rng() -> SmallRng {
        SmallRng::seed_from_u64(42)
    }

    fn state(kind: StateKind, intensity: f64, valence: f64, tag: &str) -> SubjectiveState {
        SubjectiveState::new(kind, valence, 0.5, intensity, String::new(), vec![tag.into()], String::new())
    }

    #[test]
    fn test_primary_is_most_intense() {
        let states = vec![
            state(StateKind::Mood, 0.2, 0.0, "calm"),
            state(StateKind::Curiosity, 0.9, 0.5, "dense"),
        ];
        let solutions = Solver::default().solve(&states, &[], &[], &mut rng());
        assert_eq!(solutions.len(), 4);
        assert_eq!(solutions[0].related_state_ids, vec![states[1].id]);
        assert!(solutions[0].action.contains("dense"));
        // 0.7 + 0.15·0.9 + 0.1·0.5
        assert!((solutions[0].confidence - 0.885).abs() < 1e-12);
        assert!(solutions[0].reasoning.starts_with("primary"));
    }

    #[test]
    fn test_no_states_no_solutions() {
        assert!(Solver::default().solve(&[], &[], &[], &mut rng()).is_empty());
    }

    #[test]
    fn test_context_bonus() {
        let states = vec![state(StateKind::Thought, 0.0, 0.0, "greeting")];
        let with = Solver::default().solve(&states, &["greeting".into()], &[], &mut rng());
        let without = Solver::default().solve(&states, &[], &[], &mut rng());
        assert!((with[0].confidence - without[0].confidence - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_confidence_floor_and_ceiling() {
        let states = vec![state(StateKind::Mood, 1.0, 1.0, "x")];
        let s = Solver::default().solve(&states, &["x".into()], &[], &mut rng());
        assert_eq!(s[0].confidence, 1.0);
    }

    #[test]
    fn test_constraints() {
        assert_eq!(Constraint::parse("avoid: Pause"), Some(Constraint::Exclude("pause".into())));
        assert_eq!(Constraint::parse("require:step"), Some(Constraint::Require("step".into())));
        assert_eq!(Constraint::parse("prefer:x"), None);
        assert_eq!(Constraint::parse("no colon"), None);

        let states = vec![
            state(StateKind::Mood, 0.9, 0.0, "calm"),
            state(StateKind::Thought, 0.8, 0.0, "calm"),
        ];
        let solutions = Solver::default().solve(&states, &[], &["not:pause".into()], &mut rng());
        assert!(solutions.iter().all(|s| !s.action.to_lowercase().contains("pause")));

        let required = Solver::default().solve(&states, &[], &["must:step".into()], &mut rng());
        assert!(required.iter().all(|s| s.action.contains("step")));
    }

    #[test]
    fn test_alternatives_bounded() {
        let states = vec![state(StateKind::Intention, 0.7, 0.2, "alert")];
        let solver = Solver::new(SolverOptions {
            exploration_rate: 1.0,
            max_alternatives: 2,
        });
        let solutions = solver.solve(&states, &[], &[], &mut rng());
        assert_eq!(solutions.len(), 3);
        assert!(solutions[1..].iter().all(|s| s.reasoning.starts_with("explore")));
    }

    #[test]
    fn test_select_best_uses_goal_overlap() {
        let solver = Solver::default();
        let mk = |action: &str, confidence: f64| Solution {
            id: Uuid::new_v4(),
            action: action.into(),
            confidence,
            reasoning: String::new(),
            related_state_ids: vec![],
        };
        let solutions = vec![mk("ask a question", 0.6), mk("sketch a plan", 0.7)];
        assert_eq!(solver.select_best(&solutions, "").unwrap().action, "sketch a plan");
        assert_eq!(solver.select_best(&solutions, "ask question").unwrap().action, "ask a question");
        assert!(solver.select_best(&[], "anything").is_none());
    }
}
