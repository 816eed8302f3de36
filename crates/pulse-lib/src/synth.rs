//! Deterministic stand-ins for the device, used by tests and `pulse simulate`.

use crate::signal::SignalKind;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SynthParams {
    pub sample_rate_hz: f64,
    pub bpm: f64,
    /// Height of each beat above the baseline.
    pub amplitude: f64,
    pub baseline: f64,
    /// Peak-to-peak uniform noise added to every sample.
    pub noise: f64,
    pub seed: u64,
}

impl SynthParams {
    pub fn for_kind(kind: SignalKind) -> Self {
        match kind {
            SignalKind::Ppg => Self {
                sample_rate_hz: 8.0,
                bpm: 72.0,
                amplitude: 400.0,
                baseline: 600.0,
                noise: 4.0,
                seed: 1,
            },
            SignalKind::Ecg => Self {
                sample_rate_hz: 500.0,
                bpm: 70.0,
                amplitude: 1.2,
                baseline: 0.0,
                noise: 0.02,
                seed: 1,
            },
        }
    }
}

/// Endless sample source shaped like the requested signal.
pub struct SignalGenerator {
    kind: SignalKind,
    params: SynthParams,
    index: u64,
    rng: StdRng,
}

// First beat lands off the sample grid so peaks never straddle two equal samples.
const FIRST_BEAT_S: f64 = 0.3;

impl SignalGenerator {
    pub fn new(kind: SignalKind, params: SynthParams) -> Self {
        Self {
            kind,
            params,
            index: 0,
            rng: StdRng::seed_from_u64(params.seed),
        }
    }

    pub fn kind(&self) -> SignalKind {
        self.kind
    }

    pub fn sample_rate_hz(&self) -> f64 {
        self.params.sample_rate_hz
    }

    fn value_at(&self, t: f64) -> f64 {
        let p = &self.params;
        let period = 60.0 / p.bpm.max(1.0);
        let phase = (t - FIRST_BEAT_S).rem_euclid(period);
        let dist = phase.min(period - phase);
        match self.kind {
            SignalKind::Ppg => {
                let width = 0.12 * period;
                p.baseline + p.amplitude * (-0.5 * (dist / width).powi(2)).exp()
            }
            SignalKind::Ecg => {
                let wander = 0.05 * (2.0 * PI * t).sin();
                let r_wave = p.amplitude * (-0.5 * (dist / 0.02).powi(2)).exp();
                p.baseline + wander + r_wave
            }
        }
    }
}

impl Iterator for SignalGenerator {
    type Item = f64;

    fn next(&mut self) -> Option<f64> {
        let t = self.index as f64 / self.params.sample_rate_hz.max(f64::EPSILON);
        self.index += 1;
        let mut value = self.value_at(t);
        if self.params.noise > 0.0 {
            let half = self.params.noise / 2.0;
            value += self.rng.gen_range(-half..=half);
        }
        Some(value)
    }
}

pub fn ppg_waveform(params: &SynthParams, samples: usize) -> Vec<f64> {
    SignalGenerator::new(SignalKind::Ppg, *params)
        .take(samples)
        .collect()
}
