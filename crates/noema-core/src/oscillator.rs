//! The I-point oscillator: moves the control scalar from the affect of
//! each cycle's states.

use std::f64::consts::TAU;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::constants::MAX_IPOINT_HISTORY;
use crate::ipoint::IPointState;
use crate::state::SubjectiveState;

/// Shared oscillator clock step per pulse.
const TIME_STEP: f64 = 0.01;
const MOMENTUM: f64 = 0.3;
const CENTERING: f64 = 0.1;
const VELOCITY_RETAIN: f64 = 0.9;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Waveform {
    #[default]
    Sine,
    /// Gaussian bump centred in each period.
    Bump,
    Sawtooth,
    Square,
}

impl Waveform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sine => "sine",
            Self::Bump => "bump",
            Self::Sawtooth => "sawtooth",
            Self::Square => "square",
        }
    }

    pub fn from_str_lossy(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "bump" | "exponential" | "exp" => Self::Bump,
            "sawtooth" | "saw" => Self::Sawtooth,
            "square" => Self::Square,
            _ => Self::Sine,
        }
    }

    /// Value in [−1, 1] at `x` periods.
    pub fn sample(&self, x: f64) -> f64 {
        let frac = x.rem_euclid(1.0);
        match self {
            Self::Sine => (TAU * x).sin(),
            Self::Bump => (-(frac - 0.5).powi(2) / 0.02).exp(),
            Self::Sawtooth => 2.0 * frac - 1.0,
            Self::Square => {
                if frac < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct OscillatorOptions {
    pub amplitude: f64,
    pub frequency: f64,
    pub waveform: String,
}

impl Default for OscillatorOptions {
    fn default() -> Self {
        Self {
            amplitude: 0.5,
            frequency: 5.0,
            waveform: "sine".to_string(),
        }
    }
}

#[derive(Debug)]
pub struct Oscillator {
    amplitude: f64,
    frequency: f64,
    waveform: Waveform,
    time: Mutex<f64>,
}

impl Default for Oscillator {
    fn default() -> Self {
        Self::new(&OscillatorOptions::default())
    }
}

impl Oscillator {
    pub fn new(options: &OscillatorOptions) -> Self {
        Self {
            amplitude: options.amplitude,
            frequency: options.frequency,
            waveform: Waveform::from_str_lossy(&options.waveform),
            time: Mutex::new(0.0),
        }
    }

    pub fn waveform(&self) -> Waveform {
        self.waveform
    }

    pub fn time(&self) -> f64 {
        *self.time.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn tick(&self) -> f64 {
        let mut t = self.time.lock().unwrap_or_else(|e| e.into_inner());
        *t += TIME_STEP;
        *t
    }

    /// Advance the clock and move `ipoint` from the cycle's states.
    ///
    /// direction = intensity-weighted mean of `0.5·v + 0.5·a`, plus
    /// `0.3·velocity` and `−0.1·position`, clamped to [−1, 1].
    /// magnitude = amplitude·|wave(t·f)|·sqrt(1 − |position|).
    /// Returns the applied delta.
    pub fn pulse(&self, ipoint: &mut IPointState, states: &[SubjectiveState]) -> f64 {
        let t = self.tick();
        let position = ipoint.axis_position;

        let total_intensity: f64 = states.iter().map(|s| s.intensity).sum();
        let drive = if total_intensity > 0.0 {
            states
                .iter()
                .map(|s| s.intensity * (0.5 * s.valence + 0.5 * s.arousal))
                .sum::<f64>()
                / total_intensity
        } else {
            0.0
        };
        let direction = (drive + MOMENTUM * ipoint.velocity - CENTERING * position).clamp(-1.0, 1.0);
        let wave = self.waveform.sample(t * self.frequency);
        let magnitude = self.amplitude * wave.abs() * (1.0 - position.abs()).max(0.0).sqrt();
        let delta = direction * magnitude;

        ipoint.axis_position = (position + delta).clamp(-1.0, 1.0);
        ipoint.velocity = VELOCITY_RETAIN * ipoint.velocity + (1.0 - VELOCITY_RETAIN) * delta;
        ipoint.phase = (ipoint.phase + self.frequency * TIME_STEP).rem_euclid(TAU);

        if let Some(strongest) = states.iter().max_by(|a, b| a.intensity.total_cmp(&b.intensity)) {
            if let Some(previous) = ipoint.current_point_id.replace(strongest.id) {
                ipoint.past_state_ids.push(previous);
                if ipoint.past_state_ids.len() > MAX_IPOINT_HISTORY {
                    let excess = ipoint.past_state_ids.len() - MAX_IPOINT_HISTORY;
                    ipoint.past_state_ids.drain(..excess);
                }
            }
        }
        ipoint.trace = format!(
            "t:{t:.2}/{}:{wave:.3}/dir:{direction:.3}/pos:{:.3}",
            self.waveform.as_str(),
            ipoint.axis_position
        );
        delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::StateKind;

    fn state(valence: f64, arousal: f64, intensity: f64) -> SubjectiveState {
        SubjectiveState::new(StateKind::Emotion, valence, arousal, intensity, String::new(), vec![], String::new())
    }

    #[test]
    fn test_waveform_samples() {
        assert!((Waveform::Sine.sample(0.25) - 1.0).abs() < 1e-12);
        assert!((Waveform::Bump.sample(0.5) - 1.0).abs() < 1e-12);
        assert!((Waveform::Sawtooth.sample(0.0) + 1.0).abs() < 1e-12);
        assert_eq!(Waveform::Square.sample(0.7), -1.0);
        assert_eq!(Waveform::from_str_lossy("Saw"), Waveform::Sawtooth);
        assert_eq!(Waveform::from_str_lossy("unknown"), Waveform::Sine);
    }

    #[test]
    fn test_positive_affect_pushes_entropic() {
        let osc = Oscillator::new(&OscillatorOptions {
            waveform: "square".into(),
            ..Default::default()
        });
        let mut p = IPointState::new();
        let delta = osc.pulse(&mut p, &[state(1.0, 1.0, 1.0)]);
        assert!(delta > 0.0);
        // square → |wave| = 1; direction 1; magnitude 0.5
        assert!((p.axis_position - 0.5).abs() < 1e-12);
        assert!((p.velocity - 0.05).abs() < 1e-12);
    }

    #[test]
    fn test_no_states_only_centering() {
        let osc = Oscillator::new(&OscillatorOptions {
            waveform: "square".into(),
            ..Default::default()
        });
        let mut p = IPointState::new();
        p.axis_position = 0.5;
        osc.pulse(&mut p, &[]);
        assert!(p.axis_position < 0.5);
    }

    #[test]
    fn test_clock_advances() {
        let osc = Oscillator::new(&OscillatorOptions::default());
        let mut p = IPointState::new();
        osc.pulse(&mut p, &[]);
        osc.pulse(&mut p, &[]);
        assert!((osc.time() - 0.02).abs() < 1e-12);
        assert!((p.phase - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_history_tracks_previous_points() {
        let osc = Oscillator::new(&OscillatorOptions::default());
        let mut p = IPointState::new();
        let first = state(0.1, 0.1, 0.9);
        let second = state(0.1, 0.1, 0.9);
        osc.pulse(&mut p, std::slice::from_ref(&first));
        assert_eq!(p.current_point_id, Some(first.id));
        assert!(p.past_state_ids.is_empty());
        osc.pulse(&mut p, std::slice::from_ref(&second));
        assert_eq!(p.current_point_id, Some(second.id));
        assert_eq!(p.past_state_ids, vec![first.id]);
    }

    #[test]
    fn test_history_capped() {
        let osc = Oscillator::new(&OscillatorOptions::default());
        let mut p = IPointState::new();
        for _ in 0..(MAX_IPOINT_HISTORY + 20) {
            osc.pulse(&mut p, &[state(0.0, 0.0, 0.5)]);
        }
        assert_eq!(p.past_state_ids.len(), MAX_IPOINT_HISTORY);
    }
}
