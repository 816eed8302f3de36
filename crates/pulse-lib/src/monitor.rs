//! Consumer side of a stream: display buffer, pulse rate and recording.

use crate::config::StreamConfig;
use crate::detectors::ppg::{estimate_bpm, BpmEstimate};
use crate::io::record::{Recorder, Recording};
use crate::plot::{decimate_points, Axis, Color, Figure, LineSeries, Series, Style};
use crate::signal::{RollingBuffer, Sample, SampleWindow, SignalKind};
use crate::stream::StreamEvent;
use crossbeam_channel::Receiver;

const PPG_COLOR: u32 = 0x0000FF;
const ECG_COLOR: u32 = 0x1F77B4;

#[derive(Debug, Clone, PartialEq, Default)]
pub enum MonitorStatus {
    #[default]
    Idle,
    Connecting {
        target: String,
    },
    Streaming {
        peer: String,
    },
    Closed {
        reason: Option<String>,
    },
}

impl MonitorStatus {
    pub fn is_running(&self) -> bool {
        matches!(
            self,
            MonitorStatus::Connecting { .. } | MonitorStatus::Streaming { .. }
        )
    }

    pub fn describe(&self) -> String {
        match self {
            MonitorStatus::Idle => "Idle".into(),
            MonitorStatus::Connecting { target } => format!("Connecting to {target}"),
            MonitorStatus::Streaming { peer } => format!("Streaming from {peer}"),
            MonitorStatus::Closed { reason: None } => "Stopped".into(),
            MonitorStatus::Closed {
                reason: Some(reason),
            } => format!("Disconnected: {reason}"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MonitorStats {
    pub received: u64,
    pub rejected: u64,
}

pub struct Monitor {
    cfg: StreamConfig,
    display: RollingBuffer,
    bpm_window: Option<SampleWindow>,
    bpm: Option<BpmEstimate>,
    recorder: Recorder,
    status: MonitorStatus,
    stats: MonitorStats,
}

impl Monitor {
    pub fn new(cfg: StreamConfig) -> Self {
        let bpm_window = cfg.bpm.map(|bpm| SampleWindow::new(bpm.window));
        Self {
            display: RollingBuffer::new(cfg.display_len),
            recorder: Recorder::new(cfg.kind),
            bpm_window,
            bpm: None,
            status: MonitorStatus::Idle,
            stats: MonitorStats::default(),
            cfg,
        }
    }

    pub fn kind(&self) -> SignalKind {
        self.cfg.kind
    }

    pub fn config(&self) -> &StreamConfig {
        &self.cfg
    }

    /// Swap in new settings. Buffers are rebuilt; an active recording is kept.
    pub fn reconfigure(&mut self, cfg: StreamConfig) {
        self.display = RollingBuffer::new(cfg.display_len);
        self.bpm_window = cfg.bpm.map(|bpm| SampleWindow::new(bpm.window));
        self.bpm = None;
        self.cfg = cfg;
    }

    pub fn status(&self) -> &MonitorStatus {
        &self.status
    }

    pub fn stats(&self) -> MonitorStats {
        self.stats
    }

    pub fn set_connecting(&mut self, target: impl Into<String>) {
        self.status = MonitorStatus::Connecting {
            target: target.into(),
        };
    }

    pub fn set_stopped(&mut self) {
        self.status = MonitorStatus::Closed { reason: None };
    }

    /// Consume every pending event without blocking. Returns the number of samples taken.
    pub fn drain(&mut self, events: &Receiver<StreamEvent>) -> usize {
        let mut taken = 0;
        while let Ok(event) = events.try_recv() {
            if let StreamEvent::Samples(samples) = &event {
                taken += samples.len();
            }
            self.apply(event);
        }
        if taken > 0 {
            self.refresh_bpm();
        }
        taken
    }

    pub fn apply(&mut self, event: StreamEvent) {
        match event {
            StreamEvent::Connected { peer } => {
                self.status = MonitorStatus::Streaming { peer };
            }
            StreamEvent::Samples(samples) => {
                for sample in &samples {
                    self.ingest(sample);
                }
            }
            StreamEvent::Rejected { .. } => {
                self.stats.rejected += 1;
            }
            StreamEvent::Closed { reason } => {
                self.status = MonitorStatus::Closed { reason };
            }
        }
    }

    /// Shift one sample into the display and BPM windows and record it if recording.
    pub fn ingest(&mut self, sample: &Sample) {
        self.display.push(sample.value);
        if let Some(window) = self.bpm_window.as_mut() {
            window.push(sample.value);
        }
        self.recorder.record(sample);
        self.stats.received += 1;
    }

    /// Recompute the pulse rate over the current BPM window.
    pub fn refresh_bpm(&mut self) {
        if let (Some(window), Some(cfg)) = (self.bpm_window.as_mut(), self.cfg.bpm.as_ref()) {
            self.bpm = estimate_bpm(window.as_slice(), cfg);
        }
    }

    pub fn bpm(&self) -> Option<f64> {
        self.bpm.as_ref().map(|est| est.bpm)
    }

    pub fn bpm_estimate(&self) -> Option<&BpmEstimate> {
        self.bpm.as_ref()
    }

    /// Label shown next to the plot; zero when there is no estimate.
    pub fn bpm_label(&self) -> String {
        format!("BPM: {:.2}", self.bpm().unwrap_or(0.0))
    }

    pub fn has_bpm(&self) -> bool {
        self.cfg.bpm.is_some()
    }

    pub fn latest(&self) -> Option<f64> {
        self.display.latest()
    }

    pub fn display(&self) -> &RollingBuffer {
        &self.display
    }

    pub fn y_range(&self) -> [f64; 2] {
        if let Some(range) = self.cfg.y_range {
            return range;
        }
        if self.display.total_pushed() == 0 {
            return self.cfg.initial_y_range;
        }
        let (lo, hi) = self.display.min_max();
        [lo - self.cfg.y_padding, hi + self.cfg.y_padding]
    }

    fn x_offset(&self) -> u64 {
        self.display
            .total_pushed()
            .saturating_sub(self.display.len() as u64)
    }

    fn x_scale(&self) -> f64 {
        match self.cfg.kind {
            SignalKind::Ppg => 1.0,
            SignalKind::Ecg => 1.0 / self.cfg.sample_rate_hz.max(f64::EPSILON),
        }
    }

    /// Visible x span: sample index for PPG, seconds for ECG.
    pub fn x_range(&self) -> [f64; 2] {
        let (offset, scale) = match self.cfg.kind {
            SignalKind::Ppg => (0, 1.0),
            SignalKind::Ecg => (self.x_offset(), self.x_scale()),
        };
        let last = (offset + self.display.len() as u64).saturating_sub(1);
        [offset as f64 * scale, last as f64 * scale]
    }

    pub fn points(&self) -> Vec<[f64; 2]> {
        let start = self.x_range()[0];
        let scale = self.x_scale();
        self.display
            .iter()
            .enumerate()
            .map(|(i, v)| [start + i as f64 * scale, v])
            .collect()
    }

    pub fn figure(&self, max_points: usize) -> Figure {
        let kind = self.cfg.kind;
        let (x_label, color) = match kind {
            SignalKind::Ppg => ("Sample", PPG_COLOR),
            SignalKind::Ecg => ("Time (s)", ECG_COLOR),
        };
        let mut fig = Figure::new(Some(kind.title().to_string()));
        fig.x = Axis::new(x_label, Some(self.x_range()));
        fig.y = Axis::new(kind.value_label(), Some(self.y_range()));
        fig.add_series(Series::Line(LineSeries {
            name: kind.csv_header().into(),
            points: decimate_points(&self.points(), max_points),
            style: Style {
                width: 2.0,
                color: Color(color),
            },
        }));
        fig
    }

    pub fn start_recording(&mut self) {
        self.recorder.start();
    }

    pub fn stop_recording(&mut self) -> Recording {
        self.recorder.stop()
    }

    pub fn is_recording(&self) -> bool {
        self.recorder.is_active()
    }

    pub fn recorder(&self) -> &Recorder {
        &self.recorder
    }

    /// Forget plotted data and counters, as when a new stream starts.
    pub fn clear(&mut self) {
        self.display.reset();
        if let Some(window) = self.bpm_window.as_mut() {
            window.clear();
        }
        self.bpm = None;
        self.stats = MonitorStats::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::{ppg_waveform, SynthParams};
    use crossbeam_channel::unbounded;

    fn samples(values: &[f64]) -> Vec<Sample> {
        values.iter().map(|v| Sample::now(*v)).collect()
    }

    #[test]
    fn drain_consumes_all_pending_events() {
        let mut monitor = Monitor::new(StreamConfig::for_kind(SignalKind::Ppg));
        let (tx, rx) = unbounded();
        tx.send(StreamEvent::Connected {
            peer: "tcp://10.0.0.2:80".into(),
        })
        .expect("send");
        tx.send(StreamEvent::Samples(samples(&[600.0, 610.0])))
            .expect("send");
        tx.send(StreamEvent::Rejected { raw: "x".into() })
            .expect("send");
        tx.send(StreamEvent::Samples(samples(&[620.0]))).expect("send");

        assert_eq!(monitor.drain(&rx), 3);
        assert_eq!(monitor.latest(), Some(620.0));
        assert_eq!(monitor.display().len(), 100);
        assert_eq!(
            monitor.stats(),
            MonitorStats {
                received: 3,
                rejected: 1
            }
        );
        assert!(monitor.status().is_running());
        assert_eq!(monitor.drain(&rx), 0);
    }

    #[test]
    fn ppg_axis_autoscales_with_padding() {
        let mut monitor = Monitor::new(StreamConfig::for_kind(SignalKind::Ppg));
        assert_eq!(monitor.y_range(), [0.0, 1024.0]);
        for s in samples(&[700.0, 900.0]) {
            monitor.ingest(&s);
        }
        assert_eq!(monitor.y_range(), [-50.0, 950.0]);
        assert_eq!(monitor.x_range(), [0.0, 99.0]);
    }

    #[test]
    fn ecg_axis_scrolls_in_seconds() {
        let mut cfg = StreamConfig::for_kind(SignalKind::Ecg);
        cfg.display_len = 10;
        cfg.sample_rate_hz = 10.0;
        let mut monitor = Monitor::new(cfg);
        assert_eq!(monitor.y_range(), [-2.0, 2.0]);
        assert_eq!(monitor.x_range(), [0.0, 0.9]);
        for s in samples(&[0.1; 15]) {
            monitor.ingest(&s);
        }
        let [lo, hi] = monitor.x_range();
        assert!((lo - 0.5).abs() < 1e-9);
        assert!((hi - 1.4).abs() < 1e-9);
        let points = monitor.points();
        assert_eq!(points.len(), 10);
        assert!((points[9][0] - 1.4).abs() < 1e-9);
        assert!(!monitor.has_bpm());
        assert_eq!(monitor.bpm(), None);
    }

    #[test]
    fn bpm_updates_after_drain() {
        let mut monitor = Monitor::new(StreamConfig::for_kind(SignalKind::Ppg));
        assert_eq!(monitor.bpm_label(), "BPM: 0.00");
        let params = SynthParams {
            noise: 0.0,
            ..SynthParams::for_kind(SignalKind::Ppg)
        };
        let (tx, rx) = unbounded();
        tx.send(StreamEvent::Samples(samples(&ppg_waveform(&params, 120))))
            .expect("send");
        monitor.drain(&rx);
        let bpm = monitor.bpm().expect("bpm");
        assert!((bpm - params.bpm).abs() < 4.0, "bpm was {bpm}");
    }

    #[test]
    fn recording_captures_only_between_start_and_stop() {
        let mut monitor = Monitor::new(StreamConfig::for_kind(SignalKind::Ppg));
        monitor.ingest(&Sample::now(1.0));
        monitor.start_recording();
        monitor.ingest(&Sample::now(2.0));
        monitor.ingest(&Sample::now(3.0));
        let recording = monitor.stop_recording();
        monitor.ingest(&Sample::now(4.0));
        assert_eq!(recording.values(), vec![2.0, 3.0]);
        assert!(!monitor.is_recording());
    }

    #[test]
    fn closed_event_reports_reason() {
        let mut monitor = Monitor::new(StreamConfig::for_kind(SignalKind::Ecg));
        monitor.apply(StreamEvent::Closed {
            reason: Some("stream closed by peer".into()),
        });
        assert!(!monitor.status().is_running());
        assert_eq!(
            monitor.status().describe(),
            "Disconnected: stream closed by peer"
        );
    }

    #[test]
    fn figure_carries_axis_ranges() {
        let monitor = Monitor::new(StreamConfig::for_kind(SignalKind::Ecg));
        let fig = monitor.figure(1_000);
        assert_eq!(fig.y.range, Some([-2.0, 2.0]));
        assert_eq!(fig.title.as_deref(), Some("Real-Time ECG Data"));
        match &fig.series[0] {
            Series::Line(line) => assert_eq!(line.points.len(), 1_000),
        }
    }
}
