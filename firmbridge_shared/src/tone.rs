//! Tone bending: a sweep between two frequencies in fixed-size steps.
//!
//! A [`ToneRequest`] is immutable. [`ToneRequest::steps`] builds a fresh lazy
//! sequence every time it is called, so a sweep can be replayed or inspected
//! without any timing involved. Nothing here sleeps; the caller paces each
//! [`ToneStep`] and the trailing silence.

use crate::command::Rejection;
use std::iter::FusedIterator;

/// Frequencies closer than this count as equal when deciding whether the
/// sweep has reached its target.
const LANDING_TOLERANCE_HZ: f64 = 1e-9;

/// Longest sweep accepted. A 1 Hz sweep over the whole note menu is 4963 steps.
pub const MAX_TONE_STEPS: u64 = 10_000;

const NOTE_NAMES: [&str; 12] = [
    "C", "Db", "D", "Eb", "E", "F", "Gb", "G", "Ab", "A", "Bb", "B",
];

/// Equal-tempered note frequencies from C0 to Eb8, as offered by the tone menus.
pub const NOTE_FREQUENCIES: [f64; 100] = [
    16.35, 17.32, 18.35, 19.45, 20.6, 21.83, 23.12, 24.5, 25.96, 27.5, 29.14, 30.87,
    32.7, 34.65, 36.71, 38.89, 41.2, 43.65, 46.25, 49.0, 51.91, 55.0, 58.27, 61.74,
    65.41, 69.3, 73.42, 77.78, 82.41, 87.31, 92.5, 98.0, 103.83, 110.0, 116.54, 123.47,
    130.81, 138.59, 146.83, 155.56, 164.81, 174.61, 185.0, 196.0, 207.65, 220.0, 233.08,
    246.94,
    261.63, 277.18, 293.66, 311.13, 329.63, 349.23, 369.99, 392.0, 415.3, 440.0, 466.16,
    493.88,
    523.25, 554.37, 587.33, 622.25, 659.26, 698.46, 739.99, 783.99, 830.61, 880.0, 932.33,
    987.77,
    1046.5, 1108.73, 1174.66, 1244.51, 1318.51, 1396.91, 1479.98, 1567.98, 1661.22, 1760.0,
    1864.66, 1975.53,
    2093.0, 2217.46, 2349.32, 2489.02, 2637.02, 2793.83, 2959.96, 3135.96, 3322.44, 3520.0,
    3729.31, 3951.07,
    4186.01, 4434.92, 4698.64, 4978.03,
];

/// Menu label for the note at `index` in [`NOTE_FREQUENCIES`], e.g. `"Db0"`.
pub fn note_name(index: usize) -> Option<String> {
    if index >= NOTE_FREQUENCIES.len() {
        return None;
    }
    Some(format!("{}{}", NOTE_NAMES[index % 12], index / 12))
}

/// `(label, frequency)` pairs for every note in the menu.
pub fn notes() -> impl Iterator<Item = (String, f64)> {
    NOTE_FREQUENCIES
        .iter()
        .enumerate()
        .filter_map(|(i, f)| note_name(i).map(|name| (name, *f)))
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToneStep {
    pub frequency_hz: f64,
    pub duration_ms: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToneRequest {
    initial_hz: f64,
    final_hz: f64,
    step_hz: f64,
    step_duration_ms: u32,
    silence_ms: u32,
}

impl ToneRequest {
    pub fn new(
        initial_hz: f64,
        final_hz: f64,
        step_hz: f64,
        step_duration_ms: u32,
        silence_ms: u32,
    ) -> Result<Self, Rejection> {
        let check_frequency = |name: &'static str, hz: f64| {
            if hz.is_finite() && hz > 0.0 {
                Ok(())
            } else {
                Err(Rejection::InvalidArgument {
                    name,
                    value: hz.to_string(),
                })
            }
        };
        check_frequency("INITIALTONE", initial_hz)?;
        check_frequency("FINALTONE", final_hz)?;
        check_frequency("STEP", step_hz)?;
        let step_count = ((final_hz - initial_hz).abs() / step_hz).ceil() + 1.0;
        if step_count > MAX_TONE_STEPS as f64 {
            return Err(Rejection::OutOfRange(step_count as i64));
        }
        Ok(Self {
            initial_hz,
            final_hz,
            step_hz,
            step_duration_ms,
            silence_ms,
        })
    }

    /// A plain tone: one step at `frequency_hz`, then silence.
    pub fn single(frequency_hz: f64, duration_ms: u32, silence_ms: u32) -> Result<Self, Rejection> {
        Self::new(frequency_hz, frequency_hz, 1.0, duration_ms, silence_ms)
    }

    pub fn initial_hz(&self) -> f64 {
        self.initial_hz
    }

    pub fn final_hz(&self) -> f64 {
        self.final_hz
    }

    pub fn step_hz(&self) -> f64 {
        self.step_hz
    }

    /// Silence that follows the last step.
    pub fn trailing_silence_ms(&self) -> u32 {
        self.silence_ms
    }

    pub fn steps(&self) -> ToneSteps {
        let delta = self.final_hz - self.initial_hz;
        let direction = if delta > 0.0 {
            1.0
        } else if delta < 0.0 {
            -1.0
        } else {
            0.0
        };
        ToneSteps {
            request: *self,
            direction,
            index: 0,
            done: false,
        }
    }
}

/// Lazy step sequence of one sweep. The last step is always exactly the
/// final frequency.
#[derive(Debug, Clone)]
pub struct ToneSteps {
    request: ToneRequest,
    direction: f64,
    index: u64,
    done: bool,
}

impl ToneSteps {
    fn step(&self, frequency_hz: f64) -> ToneStep {
        ToneStep {
            frequency_hz,
            duration_ms: self.request.step_duration_ms,
        }
    }
}

impl Iterator for ToneSteps {
    type Item = ToneStep;

    fn next(&mut self) -> Option<ToneStep> {
        if self.done {
            return None;
        }
        let req = &self.request;
        if self.direction == 0.0 {
            self.done = true;
            return Some(self.step(req.initial_hz));
        }
        // Computed from the index rather than accumulated so rounding
        // does not drift over long sweeps.
        let candidate = req.initial_hz + self.direction * req.step_hz * self.index as f64;
        if self.index > 0 && (req.final_hz - candidate) * self.direction <= LANDING_TOLERANCE_HZ {
            self.done = true;
            return Some(self.step(req.final_hz));
        }
        self.index += 1;
        Some(self.step(candidate))
    }
}

impl FusedIterator for ToneSteps {}

pub fn expand(request: &ToneRequest) -> ToneSteps {
    request.steps()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frequencies(req: &ToneRequest) -> Vec<f64> {
        req.steps().map(|s| s.frequency_hz).collect()
    }

    #[test]
    fn test_full_range_sweep_lands_on_target() {
        let req = ToneRequest::new(16.35, 4978.03, 20.0, 100, 0).unwrap();
        let freqs = frequencies(&req);
        assert_eq!(freqs.first().copied(), Some(16.35));
        assert_eq!(freqs.last().copied(), Some(4978.03));
        assert_eq!(freqs.len(), 250);
        let (last_gap, body) = {
            let gaps: Vec<f64> = freqs.windows(2).map(|w| w[1] - w[0]).collect();
            (gaps[gaps.len() - 1], gaps[..gaps.len() - 1].to_vec())
        };
        for gap in body {
            assert!((gap - 20.0).abs() < 1e-6, "gap {}", gap);
        }
        assert!(last_gap > 0.0 && last_gap <= 20.0);
    }

    #[test]
    fn test_descending_sweep() {
        let req = ToneRequest::new(440.0, 220.0, 100.0, 50, 10).unwrap();
        assert_eq!(frequencies(&req), vec![440.0, 340.0, 240.0, 220.0]);
        assert!(req.steps().all(|s| s.duration_ms == 50));
        assert_eq!(req.trailing_silence_ms(), 10);
    }

    #[test]
    fn test_exact_landing_does_not_duplicate_target() {
        let req = ToneRequest::new(100.0, 200.0, 50.0, 10, 0).unwrap();
        assert_eq!(frequencies(&req), vec![100.0, 150.0, 200.0]);
    }

    #[test]
    fn test_large_step_collapses_to_endpoints() {
        let req = ToneRequest::new(261.63, 523.25, 10_000.0, 10, 0).unwrap();
        assert_eq!(frequencies(&req), vec![261.63, 523.25]);
    }

    #[test]
    fn test_equal_endpoints_single_step() {
        let req = ToneRequest::single(523.25, 200, 500).unwrap();
        let steps: Vec<ToneStep> = req.steps().collect();
        assert_eq!(
            steps,
            vec![ToneStep {
                frequency_hz: 523.25,
                duration_ms: 200
            }]
        );
        assert_eq!(req.trailing_silence_ms(), 500);
    }

    #[test]
    fn test_sequence_is_restartable() {
        let req = ToneRequest::new(110.0, 880.0, 33.0, 20, 0).unwrap();
        let mut first = req.steps();
        first.next();
        first.next();
        assert_eq!(frequencies(&req), expand(&req).map(|s| s.frequency_hz).collect::<Vec<_>>());
        assert_eq!(frequencies(&req)[0], 110.0);
    }

    #[test]
    fn test_longest_accepted_sweep() {
        let req = ToneRequest::new(0.5, 9999.5, 1.0, 1, 0).unwrap();
        assert_eq!(req.steps().count() as u64, MAX_TONE_STEPS);
    }

    #[test]
    fn test_invalid_requests() {
        assert!(ToneRequest::new(100.0, 200.0, 0.0, 10, 0).is_err());
        assert!(ToneRequest::new(100.0, 200.0, -5.0, 10, 0).is_err());
        assert!(ToneRequest::new(f64::NAN, 200.0, 5.0, 10, 0).is_err());
        assert_eq!(
            ToneRequest::new(16.35, 4978.03, 0.1, 10, 0),
            Err(Rejection::OutOfRange(49618))
        );
        assert!(matches!(
            ToneRequest::new(0.0, 200.0, 5.0, 10, 0),
            Err(Rejection::InvalidArgument { name: "INITIALTONE", .. })
        ));
    }

    #[test]
    fn test_note_table() {
        assert_eq!(note_name(0).as_deref(), Some("C0"));
        assert_eq!(note_name(1).as_deref(), Some("Db0"));
        assert_eq!(note_name(57).as_deref(), Some("A4"));
        assert_eq!(NOTE_FREQUENCIES[57], 440.0);
        assert_eq!(note_name(99).as_deref(), Some("Eb8"));
        assert_eq!(note_name(100), None);
        assert_eq!(notes().count(), 100);
        assert!(NOTE_FREQUENCIES.windows(2).all(|w| w[0] < w[1]));
    }
}
