use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Affect category picked by the shaper's circumplex lookup.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateKind {
    Mood,
    Emotion,
    Thought,
    Feeling,
    Intention,
    Curiosity,
    Creativity,
}

impl StateKind {
    pub const ALL: [StateKind; 7] = [
        Self::Mood,
        Self::Emotion,
        Self::Thought,
        Self::Feeling,
        Self::Intention,
        Self::Curiosity,
        Self::Creativity,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mood => "mood",
            Self::Emotion => "emotion",
            Self::Thought => "thought",
            Self::Feeling => "feeling",
            Self::Intention => "intention",
            Self::Curiosity => "curiosity",
            Self::Creativity => "creativity",
        }
    }

    /// Stable slot for one-hot encodings.
    pub fn index(&self) -> usize {
        Self::ALL.iter().position(|k| k == self).unwrap_or(0)
    }
}

/// Affect descriptor derived from one emergent shape.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectiveState {
    pub id: Uuid,
    pub kind: StateKind,
    /// [-1, 1]
    pub valence: f64,
    /// [0, 1]
    pub arousal: f64,
    /// [0, 1]
    pub intensity: f64,
    pub narrative: String,
    pub semantic_tags: Vec<String>,
    pub trace: String,
}

impl SubjectiveState {
    pub fn new(
        kind: StateKind,
        valence: f64,
        arousal: f64,
        intensity: f64,
        narrative: String,
        semantic_tags: Vec<String>,
        trace: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            valence: valence.clamp(-1.0, 1.0),
            arousal: arousal.clamp(0.0, 1.0),
            intensity: intensity.clamp(0.0, 1.0),
            narrative,
            semantic_tags,
            trace,
        }
    }

    pub fn leading_tag(&self) -> &str {
        self.semantic_tags
            .first()
            .map(String::as_str)
            .unwrap_or("unnamed")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ranges_clamped() {
        let s = SubjectiveState::new(
            StateKind::Mood,
            -3.0,
            1.5,
            -0.2,
            String::new(),
            vec![],
            String::new(),
        );
        assert_eq!(s.valence, -1.0);
        assert_eq!(s.arousal, 1.0);
        assert_eq!(s.intensity, 0.0);
        assert_eq!(s.leading_tag(), "unnamed");
    }

    #[test]
    fn test_kind_indices_unique() {
        let mut seen: Vec<usize> = StateKind::ALL.iter().map(|k| k.index()).collect();
        seen.dedup();
        assert_eq!(seen, (0..7).collect::<Vec<_>>());
    }

    #[test]
    fn test_kind_serializes_lowercase() {
        let json = serde_json::to_string(&StateKind::Curiosity).unwrap();
        assert_eq!(json, "\"curiosity\"");
    }
}
