use serde::{Deserialize, Serialize};

/// Parameters of the threshold peak detector used for pulse rate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BpmConfig {
    /// Trailing samples considered for each estimate.
    pub window: usize,
    /// Sample rate assumed when converting peak spacing to beats per minute.
    pub sample_rate_hz: f64,
    /// Fraction of the window's range added to its mean to form the peak threshold.
    pub threshold_ratio: f64,
    /// Estimates above this are clamped.
    pub max_bpm: f64,
}

impl Default for BpmConfig {
    fn default() -> Self {
        Self {
            window: 200,
            sample_rate_hz: 8.0,
            threshold_ratio: 0.1,
            max_bpm: 200.0,
        }
    }
}

/// Local maxima that cleared the threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Peaks {
    pub threshold: f64,
    pub indices: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BpmEstimate {
    pub bpm: f64,
    pub peaks: Peaks,
    /// Mean distance between consecutive peaks, in samples.
    pub mean_spacing: f64,
}

/// Single pass over `data` keeping strict local maxima above `mean + ratio * (max - min)`.
pub fn find_peaks(data: &[f64], threshold_ratio: f64) -> Peaks {
    if data.is_empty() {
        return Peaks {
            threshold: 0.0,
            indices: Vec::new(),
        };
    }
    let mean = data.iter().sum::<f64>() / data.len() as f64;
    let (lo, hi) = data
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let threshold = mean + (hi - lo) * threshold_ratio;

    let indices = data
        .windows(3)
        .enumerate()
        .filter(|(_, w)| w[0] < w[1] && w[1] > w[2] && w[1] > threshold)
        .map(|(i, _)| i + 1)
        .collect();
    Peaks { threshold, indices }
}

/// Estimate beats per minute from the spacing of peaks in `data`.
///
/// Returns `None` with fewer than two samples or fewer than two peaks.
pub fn estimate_bpm(data: &[f64], cfg: &BpmConfig) -> Option<BpmEstimate> {
    if data.len() < 2 {
        return None;
    }
    let peaks = find_peaks(data, cfg.threshold_ratio);
    if peaks.indices.len() < 2 {
        return None;
    }
    let spacing: Vec<f64> = peaks
        .indices
        .windows(2)
        .map(|w| (w[1] - w[0]) as f64)
        .collect();
    let mean_spacing = spacing.iter().sum::<f64>() / spacing.len() as f64;
    if mean_spacing <= 0.0 {
        return None;
    }
    let bpm = (cfg.sample_rate_hz * 60.0 / mean_spacing).min(cfg.max_bpm);
    Some(BpmEstimate {
        bpm,
        peaks,
        mean_spacing,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::{ppg_waveform, SynthParams};

    fn pulse_train(period: usize, beats: usize) -> Vec<f64> {
        let mut data = Vec::with_capacity(period * beats);
        for _ in 0..beats {
            for i in 0..period {
                data.push(if i == period / 2 { 10.0 } else { 0.0 });
            }
        }
        data
    }

    #[test]
    fn regular_train_gives_expected_rate() {
        let data = pulse_train(8, 6);
        let cfg = BpmConfig::default();
        let est = estimate_bpm(&data, &cfg).expect("estimate");
        assert_eq!(est.peaks.indices.len(), 6);
        assert_eq!(est.mean_spacing, 8.0);
        assert!((est.bpm - 60.0).abs() < 1e-9);
    }

    #[test]
    fn fast_train_is_capped() {
        let data = [0.0, 10.0, 0.0, 10.0, 0.0, 10.0, 0.0];
        let est = estimate_bpm(&data, &BpmConfig::default()).expect("estimate");
        assert_eq!(est.peaks.indices, vec![1, 3, 5]);
        assert_eq!(est.bpm, 200.0);
    }

    #[test]
    fn flat_or_short_input_has_no_estimate() {
        let cfg = BpmConfig::default();
        assert!(estimate_bpm(&[], &cfg).is_none());
        assert!(estimate_bpm(&[5.0], &cfg).is_none());
        assert!(estimate_bpm(&[3.0; 50], &cfg).is_none());
        assert!(estimate_bpm(&pulse_train(8, 1), &cfg).is_none());
    }

    #[test]
    fn plateaus_and_sub_threshold_bumps_are_ignored() {
        let data = [0.0, 5.0, 5.0, 0.0, 0.0, 100.0, 0.0, 1.0, 0.0];
        let peaks = find_peaks(&data, 0.1);
        assert_eq!(peaks.indices, vec![5]);
        assert!(peaks.threshold > 1.0);
    }

    #[test]
    fn synthetic_ppg_rate_is_recovered() {
        let params = SynthParams {
            sample_rate_hz: 8.0,
            bpm: 72.0,
            amplitude: 400.0,
            baseline: 600.0,
            noise: 0.0,
            seed: 7,
        };
        let data = ppg_waveform(&params, 200);
        let est = estimate_bpm(&data, &BpmConfig::default()).expect("estimate");
        assert!((est.bpm - 72.0).abs() < 4.0, "bpm was {}", est.bpm);
    }
}
