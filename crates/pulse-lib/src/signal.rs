use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Which sensor a stream carries. Selects transport, window and axis defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalKind {
    /// Infrared photoplethysmogram, used for pulse rate.
    Ppg,
    /// Single-lead electrocardiogram.
    Ecg,
}

impl SignalKind {
    pub fn title(&self) -> &'static str {
        match self {
            SignalKind::Ppg => "Real-time IR Signal",
            SignalKind::Ecg => "Real-Time ECG Data",
        }
    }

    pub fn value_label(&self) -> &'static str {
        match self {
            SignalKind::Ppg => "IR Value",
            SignalKind::Ecg => "ECG Amplitude (mV)",
        }
    }

    /// Column header used for the value column of a recording.
    pub fn csv_header(&self) -> &'static str {
        match self {
            SignalKind::Ppg => "IR Value",
            SignalKind::Ecg => "ECG Value",
        }
    }

    pub fn all() -> [SignalKind; 2] {
        [SignalKind::Ppg, SignalKind::Ecg]
    }
}

impl std::fmt::Display for SignalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignalKind::Ppg => f.write_str("ppg"),
            SignalKind::Ecg => f.write_str("ecg"),
        }
    }
}

/// One decoded reading together with the wall-clock time it arrived.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub value: f64,
    pub received_at: DateTime<Local>,
}

impl Sample {
    pub fn now(value: f64) -> Self {
        Self {
            value,
            received_at: Local::now(),
        }
    }
}

/// Fixed-length display buffer. Starts zero-filled; each push drops the oldest value.
#[derive(Debug, Clone)]
pub struct RollingBuffer {
    data: VecDeque<f64>,
    total_pushed: u64,
}

impl RollingBuffer {
    pub fn new(len: usize) -> Self {
        let len = len.max(1);
        Self {
            data: std::iter::repeat(0.0).take(len).collect(),
            total_pushed: 0,
        }
    }

    pub fn push(&mut self, value: f64) {
        self.data.pop_front();
        self.data.push_back(value);
        self.total_pushed += 1;
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of samples pushed since creation or the last reset.
    pub fn total_pushed(&self) -> u64 {
        self.total_pushed
    }

    pub fn latest(&self) -> Option<f64> {
        if self.total_pushed == 0 {
            None
        } else {
            self.data.back().copied()
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.data.iter().copied()
    }

    pub fn to_vec(&self) -> Vec<f64> {
        self.data.iter().copied().collect()
    }

    /// Min and max over the whole window, including the zero fill.
    pub fn min_max(&self) -> (f64, f64) {
        self.data
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            })
    }

    pub fn reset(&mut self) {
        let len = self.data.len();
        *self = Self::new(len);
    }
}

/// Trailing window of the most recent samples, growing up to `capacity`.
#[derive(Debug, Clone)]
pub struct SampleWindow {
    data: VecDeque<f64>,
    capacity: usize,
}

impl SampleWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            data: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, value: f64) {
        if self.data.len() == self.capacity {
            self.data.pop_front();
        }
        self.data.push_back(value);
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// Contiguous view of the window, oldest first.
    pub fn as_slice(&mut self) -> &[f64] {
        self.data.make_contiguous()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rolling_buffer_keeps_length() {
        let mut buf = RollingBuffer::new(4);
        assert_eq!(buf.to_vec(), vec![0.0; 4]);
        assert_eq!(buf.latest(), None);
        for v in 1..=6 {
            buf.push(v as f64);
            assert_eq!(buf.len(), 4);
        }
        assert_eq!(buf.to_vec(), vec![3.0, 4.0, 5.0, 6.0]);
        assert_eq!(buf.latest(), Some(6.0));
        assert_eq!(buf.total_pushed(), 6);
    }

    #[test]
    fn rolling_buffer_min_max_includes_fill() {
        let mut buf = RollingBuffer::new(3);
        buf.push(500.0);
        assert_eq!(buf.min_max(), (0.0, 500.0));
        buf.reset();
        assert_eq!(buf.total_pushed(), 0);
        assert_eq!(buf.len(), 3);
    }

    #[test]
    fn sample_window_evicts_oldest() {
        let mut win = SampleWindow::new(3);
        for v in [1.0, 2.0, 3.0, 4.0] {
            win.push(v);
        }
        assert_eq!(win.len(), 3);
        assert_eq!(win.as_slice(), &[2.0, 3.0, 4.0]);
    }
}
