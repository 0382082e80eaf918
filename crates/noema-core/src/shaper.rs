//! Maps emergent shapes to affect-labelled subjective states.

use std::collections::HashMap;

use uuid::Uuid;

use crate::shape::EmergentShape;
use crate::state::{StateKind, SubjectiveState};

/// Circumplex band edges.
const VALENCE_BAND: f64 = 0.3;
const HIGH_AROUSAL: f64 = 0.6;
const MID_AROUSAL: f64 = 0.3;
const LOW_INTENSITY: f64 = 0.25;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Affect {
    pub valence: f64,
    pub arousal: f64,
    pub intensity: f64,
}

#[derive(Clone, Debug, Default)]
pub struct Shaper;

impl Shaper {
    pub fn new() -> Self {
        Self
    }

    pub fn shape_all(&self, shapes: &[EmergentShape]) -> Vec<SubjectiveState> {
        shapes.iter().map(|s| self.shape(s)).collect()
    }

    pub fn shape(&self, shape: &EmergentShape) -> SubjectiveState {
        let affect = compute_affect(shape);
        let kind = classify(affect);
        let tags = derive_tags(shape, affect);
        let narrative = narrate(kind, affect, &tags);
        SubjectiveState::new(
            kind,
            affect.valence,
            affect.arousal,
            affect.intensity,
            narrative,
            tags,
            format!(
                "shape:{}/points:{}/edges:{}",
                shape.id,
                shape.size(),
                shape.edge_count()
            ),
        )
    }

    /// Narrative that also weaves in caller-supplied context tags.
    pub fn narrate_with_context(&self, state: &SubjectiveState, context_tags: &[String]) -> String {
        let affect = Affect {
            valence: state.valence,
            arousal: state.arousal,
            intensity: state.intensity,
        };
        let base = narrate(state.kind, affect, &state.semantic_tags);
        let fresh: Vec<&str> = context_tags
            .iter()
            .filter(|t| !state.semantic_tags.contains(t))
            .map(String::as_str)
            .take(3)
            .collect();
        if fresh.is_empty() {
            base
        } else {
            format!("{base} It resonates with {}.", fresh.join(", "))
        }
    }
}

pub fn compute_affect(shape: &EmergentShape) -> Affect {
    let n = shape.size();
    let e = shape.edge_count();
    let meta = &shape.metadata;

    // Weighted degree inside the shape
    let mut centrality: HashMap<Uuid, f64> = shape.point_ids.iter().map(|id| (*id, 0.0)).collect();
    for edge in &shape.edges {
        *centrality.entry(edge.from).or_default() += edge.weight;
        *centrality.entry(edge.to).or_default() += edge.weight;
    }
    let values: Vec<f64> = centrality.values().copied().collect();
    let max = values.iter().copied().fold(0.0, f64::max);
    let (balance, norm_var) = if max > 0.0 && !values.is_empty() {
        let avg = values.iter().sum::<f64>() / values.len() as f64;
        let var = values.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / values.len() as f64;
        (avg / max, var / (max * max))
    } else {
        (0.5, 0.0)
    };
    let raw = balance - norm_var + 0.3 * meta.novelty;
    let valence = (2.0 * raw - 1.0).clamp(-1.0, 1.0);

    let ratio = if n > 0 { e as f64 / n as f64 } else { 0.0 };
    let arousal =
        (0.4 * meta.density + 0.4 * shape.avg_edge_weight() + 0.2 * ratio / (1.0 + ratio)).clamp(0.0, 1.0);

    let size_term = 1.0 - (-(n as f64) / 5.0).exp();
    let connectivity = if n > 1 {
        (e as f64 / (n - 1) as f64).min(1.0)
    } else {
        0.0
    };
    let intensity =
        (0.3 * size_term + 0.3 * connectivity + 0.4 * meta.avg_activation).clamp(0.0, 1.0);

    Affect {
        valence,
        arousal,
        intensity,
    }
}

/// Fixed circumplex lookup.
pub fn classify(affect: Affect) -> StateKind {
    if affect.intensity < LOW_INTENSITY {
        return StateKind::Mood;
    }
    let pick = |pos: StateKind, neg: StateKind, neutral: StateKind| {
        if affect.valence >= VALENCE_BAND {
            pos
        } else if affect.valence <= -VALENCE_BAND {
            neg
        } else {
            neutral
        }
    };
    if affect.arousal >= HIGH_AROUSAL {
        pick(StateKind::Creativity, StateKind::Emotion, StateKind::Curiosity)
    } else if affect.arousal >= MID_AROUSAL {
        pick(StateKind::Intention, StateKind::Emotion, StateKind::Thought)
    } else {
        pick(StateKind::Feeling, StateKind::Mood, StateKind::Thought)
    }
}

fn derive_tags(shape: &EmergentShape, affect: Affect) -> Vec<String> {
    let mut tags = Vec::new();
    tags.push(
        if affect.valence >= VALENCE_BAND {
            "positive"
        } else if affect.valence <= -VALENCE_BAND {
            "negative"
        } else {
            "neutral"
        }
        .to_string(),
    );
    tags.push(
        if affect.arousal >= HIGH_AROUSAL {
            "energized"
        } else if affect.arousal >= MID_AROUSAL {
            "alert"
        } else {
            "calm"
        }
        .to_string(),
    );

    let meta = &shape.metadata;
    if meta.density >= 0.5 {
        tags.push("dense".into());
    } else if shape.size() > 1 && meta.density < 0.2 {
        tags.push("sparse".into());
    }
    if shape.size() >= 8 {
        tags.push("large".into());
    } else if shape.size() == 1 {
        tags.push("singular".into());
    }

    let total = shape.edge_count();
    let dominant = shape
        .edge_type_counts()
        .into_iter()
        .max_by_key(|(_, count)| *count)
        .filter(|(_, count)| count * 2 > total);
    if let Some((edge_type, _)) = dominant {
        tags.push(edge_type.as_str().to_string());
    }
    if meta.novelty >= 0.3 {
        tags.push("novel".into());
    }
    tags
}

fn intensity_word(intensity: f64) -> &'static str {
    if intensity >= 0.7 {
        "vivid"
    } else if intensity >= 0.4 {
        "steady"
    } else {
        "faint"
    }
}

fn narrate(kind: StateKind, affect: Affect, tags: &[String]) -> String {
    let word = intensity_word(affect.intensity);
    let lead = tags.first().map(String::as_str).unwrap_or("unnamed");
    let texture = if tags.len() > 2 {
        tags[2..].join(" and ")
    } else {
        "quiet".to_string()
    };
    match kind {
        StateKind::Mood => format!("A {word} {lead} mood settles in, {texture} at its edges."),
        StateKind::Emotion => format!("A {word} surge of {lead} emotion moves through {texture} structure."),
        StateKind::Thought => format!("A {word} line of thought takes form, {lead} and {texture}."),
        StateKind::Feeling => format!("A {word} {lead} feeling lingers over {texture} ground."),
        StateKind::Intention => format!("A {word} intention gathers, {lead} and pointed through {texture} links."),
        StateKind::Curiosity => format!("A {word} curiosity reaches toward {texture} patterns."),
        StateKind::Creativity => format!("A {word} creative spark joins {texture} fragments into something {lead}."),
    }
}
