use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::{DETERMINISTIC_BOUND, ENTROPIC_BOUND};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IPointRegion {
    Deterministic,
    Balanced,
    Entropic,
}

impl IPointRegion {
    pub fn of(position: f64) -> Self {
        if position < DETERMINISTIC_BOUND {
            Self::Deterministic
        } else if position > ENTROPIC_BOUND {
            Self::Entropic
        } else {
            Self::Balanced
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deterministic => "deterministic",
            Self::Balanced => "balanced",
            Self::Entropic => "entropic",
        }
    }
}

/// Oscillator position on the determinism (−1) ↔ entropy (+1) axis.
/// One live instance per session.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IPointState {
    pub id: Uuid,
    pub axis_position: f64,
    pub velocity: f64,
    /// Radians in [0, 2π).
    pub phase: f64,
    pub current_point_id: Option<Uuid>,
    pub past_state_ids: Vec<Uuid>,
    pub trace: String,
}

impl Default for IPointState {
    fn default() -> Self {
        Self::new()
    }
}

impl IPointState {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            axis_position: 0.0,
            velocity: 0.0,
            phase: 0.0,
            current_point_id: None,
            past_state_ids: Vec::new(),
            trace: String::new(),
        }
    }

    pub fn region(&self) -> IPointRegion {
        IPointRegion::of(self.axis_position)
    }

    pub fn is_deterministic(&self) -> bool {
        self.region() == IPointRegion::Deterministic
    }

    pub fn is_entropic(&self) -> bool {
        self.region() == IPointRegion::Entropic
    }

    pub fn is_balanced(&self) -> bool {
        self.region() == IPointRegion::Balanced
    }

    /// `(1 − position) / 2`: 1 at the deterministic pole.
    pub fn determinism_factor(&self) -> f64 {
        (1.0 - self.axis_position) / 2.0
    }

    /// `(1 + position) / 2`: 1 at the entropic pole.
    pub fn entropy_factor(&self) -> f64 {
        (1.0 + self.axis_position) / 2.0
    }

    /// Back to the origin with an empty history. The id is kept.
    pub fn reset(&mut self) {
        self.axis_position = 0.0;
        self.velocity = 0.0;
        self.phase = 0.0;
        self.current_point_id = None;
        self.past_state_ids.clear();
        self.trace.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_thresholds() {
        assert_eq!(IPointRegion::of(-0.31), IPointRegion::Deterministic);
        assert_eq!(IPointRegion::of(-0.3), IPointRegion::Balanced);
        assert_eq!(IPointRegion::of(0.3), IPointRegion::Balanced);
        assert_eq!(IPointRegion::of(0.31), IPointRegion::Entropic);
    }

    #[test]
    fn test_factors() {
        let mut p = IPointState::new();
        p.axis_position = -1.0;
        assert_eq!(p.determinism_factor(), 1.0);
        assert_eq!(p.entropy_factor(), 0.0);
        assert!(p.is_deterministic() && !p.is_balanced() && !p.is_entropic());
    }

    #[test]
    fn test_reset() {
        let mut p = IPointState::new();
        let id = p.id;
        p.axis_position = 0.7;
        p.velocity = 0.1;
        p.phase = 1.0;
        p.past_state_ids.push(Uuid::new_v4());
        p.reset();
        assert_eq!(p.axis_position, 0.0);
        assert_eq!(p.velocity, 0.0);
        assert_eq!(p.phase, 0.0);
        assert!(p.past_state_ids.is_empty());
        assert_eq!(p.id, id);
    }
}
