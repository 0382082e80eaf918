//! Keyword policy filter applied independently at each pipeline stage.
//!
//! Forbidden terms are hard violations; sandbox terms only mark content for
//! review. Neither path returns an error: unsafe content is reported, and
//! callers drop it.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::point::ProjectedPoint;
use crate::state::SubjectiveState;
use crate::thought::Thought;
use crate::tokenizer::tokenize;

pub const DEFAULT_FORBIDDEN: &[&str] = &[
    "attack", "weapon", "bomb", "kill", "exploit", "malware", "terror", "abuse",
];

pub const DEFAULT_SANDBOX: &[&str] = &[
    "medical",
    "legal",
    "financial",
    "diagnosis",
    "medication",
    "therapy",
    "investment",
    "lawsuit",
];

const VIOLATION_PENALTY: f64 = 0.3;
const RISK_PENALTY: f64 = 0.2;
const FORCE_SANDBOX_INTENSITY: f64 = 0.8;
const FORCE_SANDBOX_VALENCE: f64 = -0.6;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyOptions {
    pub extra_forbidden: Vec<String>,
    pub extra_sandbox: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SafetyReport {
    pub is_valid: bool,
    pub safety_score: f64,
    pub should_sandbox: bool,
    pub violations: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sandbox_terms: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct SafetyFilter {
    forbidden: HashSet<String>,
    sandbox: HashSet<String>,
}

impl Default for SafetyFilter {
    fn default() -> Self {
        Self::new(&SafetyOptions::default())
    }
}

impl SafetyFilter {
    pub fn new(options: &SafetyOptions) -> Self {
        let forbidden = DEFAULT_FORBIDDEN
            .iter()
            .map(|s| normalize_term(s))
            .chain(options.extra_forbidden.iter().map(|s| normalize_term(s)))
            .filter(|s| !s.is_empty())
            .collect();
        let sandbox = DEFAULT_SANDBOX
            .iter()
            .map(|s| normalize_term(s))
            .chain(options.extra_sandbox.iter().map(|s| normalize_term(s)))
            .filter(|s| !s.is_empty())
            .collect();
        Self { forbidden, sandbox }
    }

    /// Raw text with no risk factor.
    pub fn validate_text(&self, text: &str) -> SafetyReport {
        self.report(&[text], 0.0, false)
    }

    pub fn validate_state(&self, state: &SubjectiveState) -> SafetyReport {
        let mut texts: Vec<&str> = vec![state.narrative.as_str()];
        texts.extend(state.semantic_tags.iter().map(String::as_str));
        let forced = state.intensity >= FORCE_SANDBOX_INTENSITY && state.valence <= FORCE_SANDBOX_VALENCE;
        self.report(&texts, state.intensity, forced)
    }

    pub fn validate_thought(&self, thought: &Thought) -> SafetyReport {
        self.report(&[thought.content.as_str()], thought.relevance, false)
    }

    /// Tag scan plus a finiteness check on the vector.
    pub fn validate_point(&self, point: &ProjectedPoint) -> SafetyReport {
        let mut report = self.report(&[point.semantic_tag.as_str()], 1.0 - point.confidence, false);
        if !point.is_finite() {
            report.violations.push("non-finite vector".to_string());
            report.is_valid = false;
            report.safety_score = score(report.violations.len(), 1.0 - point.confidence);
        }
        report
    }

    /// Keep only states with zero violations.
    pub fn filter_states(&self, states: Vec<SubjectiveState>) -> Vec<SubjectiveState> {
        states
            .into_iter()
            .filter(|s| self.validate_state(s).is_valid)
            .collect()
    }

    pub fn filter_thoughts(&self, thoughts: Vec<Thought>) -> Vec<Thought> {
        thoughts
            .into_iter()
            .filter(|t| self.validate_thought(t).is_valid)
            .collect()
    }

    fn report(&self, texts: &[&str], risk: f64, force_sandbox: bool) -> SafetyReport {
        let mut violations = Vec::new();
        let mut sandbox_terms = Vec::new();
        for text in texts {
            for token in tokenize(text) {
                if self.forbidden.contains(&token) && !violations.contains(&token) {
                    violations.push(token);
                } else if self.sandbox.contains(&token) && !sandbox_terms.contains(&token) {
                    sandbox_terms.push(token);
                }
            }
        }
        SafetyReport {
            is_valid: violations.is_empty(),
            safety_score: score(violations.len(), risk),
            should_sandbox: force_sandbox || !sandbox_terms.is_empty(),
            violations,
            sandbox_terms,
        }
    }
}

fn normalize_term(term: &str) -> String {
    term.trim().to_lowercase()
}

fn score(violations: usize, risk: f64) -> f64 {
    let base = 1.0 - VIOLATION_PENALTY * violations as f64;
    (base * (1.0 - RISK_PENALTY * risk.clamp(0.0, 1.0))).clamp(0.0, 1.0)
}
