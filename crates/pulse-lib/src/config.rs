use crate::detectors::ppg::BpmConfig;
use crate::error::{PulseError, Result};
use crate::signal::SignalKind;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Socket flavour used to reach the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// Connect to the device and read newline-delimited values.
    Tcp,
    /// Bind locally and accept one value per datagram.
    Udp,
}

/// Fully resolved settings for one stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamConfig {
    pub kind: SignalKind,
    pub transport: Transport,
    /// Device address for TCP, local bind address for UDP.
    pub host: String,
    pub port: u16,
    /// Nominal device sample rate (Hz). Drives the ECG time axis and the BPM formula.
    pub sample_rate_hz: f64,
    /// Number of samples visible in the scrolling plot.
    pub display_len: usize,
    /// Fixed amplitude range; `None` autoscales around the visible window.
    pub y_range: Option<[f64; 2]>,
    /// Range shown before the first sample arrives when autoscaling.
    pub initial_y_range: [f64; 2],
    /// Margin added above and below the data when autoscaling.
    pub y_padding: f64,
    pub bpm: Option<BpmConfig>,
    pub read_timeout_ms: u64,
    pub connect_timeout_ms: u64,
    /// UI redraw period.
    pub tick_ms: u64,
}

impl StreamConfig {
    pub fn for_kind(kind: SignalKind) -> Self {
        match kind {
            SignalKind::Ppg => Self {
                kind,
                transport: Transport::Tcp,
                host: String::new(),
                port: 80,
                sample_rate_hz: 8.0,
                display_len: 100,
                y_range: None,
                initial_y_range: [0.0, 1024.0],
                y_padding: 50.0,
                bpm: Some(BpmConfig::default()),
                read_timeout_ms: 100,
                connect_timeout_ms: 5_000,
                tick_ms: 50,
            },
            SignalKind::Ecg => Self {
                kind,
                transport: Transport::Udp,
                host: "0.0.0.0".into(),
                port: 80,
                sample_rate_hz: 500.0,
                display_len: 2_500,
                y_range: Some([-2.0, 2.0]),
                initial_y_range: [-2.0, 2.0],
                y_padding: 0.0,
                bpm: None,
                read_timeout_ms: 100,
                connect_timeout_ms: 5_000,
                tick_ms: 50,
            },
        }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host.trim(), self.port)
    }

    /// Seconds covered by the display window.
    pub fn window_seconds(&self) -> f64 {
        self.display_len as f64 / self.sample_rate_hz.max(f64::EPSILON)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms.max(1))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms.max(1))
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }

    fn apply(&mut self, file: StreamSection) {
        if let Some(transport) = file.transport {
            self.transport = transport;
        }
        if let Some(host) = file.host {
            self.host = host;
        }
        if let Some(port) = file.port {
            self.port = port;
        }
        if let Some(rate) = file.sample_rate_hz {
            self.sample_rate_hz = rate;
        }
        if let Some(seconds) = file.window_s {
            self.display_len = ((seconds * self.sample_rate_hz).round() as usize).max(1);
        }
        if let Some(len) = file.display_len {
            self.display_len = len.max(1);
        }
        if file.autoscale == Some(true) {
            self.y_range = None;
        }
        if let Some(range) = file.y_range {
            self.y_range = Some(range);
        }
        if let Some(range) = file.initial_y_range {
            self.initial_y_range = range;
        }
        if let Some(padding) = file.y_padding {
            self.y_padding = padding;
        }
        // The BPM window runs at the stream rate unless `[bpm]` names its own.
        if let (Some(rate), Some(cfg)) = (file.sample_rate_hz, self.bpm.as_mut()) {
            cfg.sample_rate_hz = rate;
        }
        if let Some(bpm) = file.bpm {
            let mut cfg = self.bpm.unwrap_or_default();
            cfg.sample_rate_hz = self.sample_rate_hz;
            bpm.apply(&mut cfg);
            self.bpm = Some(cfg);
        }
        if let Some(ms) = file.read_timeout_ms {
            self.read_timeout_ms = ms;
        }
        if let Some(ms) = file.connect_timeout_ms {
            self.connect_timeout_ms = ms;
        }
        if let Some(ms) = file.tick_ms {
            self.tick_ms = ms;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordingConfig {
    /// Directory used when a front end picks the file name itself.
    pub directory: PathBuf,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("."),
        }
    }
}

/// Top-level settings, one section per signal kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PulseConfig {
    pub ppg: StreamConfig,
    pub ecg: StreamConfig,
    pub recording: RecordingConfig,
}

impl Default for PulseConfig {
    fn default() -> Self {
        Self {
            ppg: StreamConfig::for_kind(SignalKind::Ppg),
            ecg: StreamConfig::for_kind(SignalKind::Ecg),
            recording: RecordingConfig::default(),
        }
    }
}

impl PulseConfig {
    pub fn stream(&self, kind: SignalKind) -> &StreamConfig {
        match kind {
            SignalKind::Ppg => &self.ppg,
            SignalKind::Ecg => &self.ecg,
        }
    }

    /// Parse TOML text. Missing sections and keys keep their defaults.
    pub fn from_toml_str(text: &str) -> std::result::Result<Self, toml::de::Error> {
        let file: ConfigFile = toml::from_str(text)?;
        let mut cfg = Self::default();
        if let Some(section) = file.ppg {
            cfg.ppg.apply(section);
        }
        if let Some(section) = file.ecg {
            cfg.ecg.apply(section);
        }
        if let Some(recording) = file.recording {
            if let Some(dir) = recording.directory {
                cfg.recording.directory = dir;
            }
        }
        Ok(cfg)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text).map_err(|source| PulseError::Config {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load `path` when given, defaults otherwise.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let cfg = Self::load(path)?;
                log::info!("loaded config from {}", path.display());
                Ok(cfg)
            }
            None => Ok(Self::default()),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    ppg: Option<StreamSection>,
    ecg: Option<StreamSection>,
    recording: Option<RecordingSection>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct StreamSection {
    transport: Option<Transport>,
    host: Option<String>,
    port: Option<u16>,
    sample_rate_hz: Option<f64>,
    window_s: Option<f64>,
    display_len: Option<usize>,
    autoscale: Option<bool>,
    y_range: Option<[f64; 2]>,
    initial_y_range: Option<[f64; 2]>,
    y_padding: Option<f64>,
    bpm: Option<BpmSection>,
    read_timeout_ms: Option<u64>,
    connect_timeout_ms: Option<u64>,
    tick_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct BpmSection {
    window: Option<usize>,
    sample_rate_hz: Option<f64>,
    threshold_ratio: Option<f64>,
    max_bpm: Option<f64>,
}

impl BpmSection {
    fn apply(self, cfg: &mut BpmConfig) {
        if let Some(window) = self.window {
            cfg.window = window.max(3);
        }
        if let Some(rate) = self.sample_rate_hz {
            cfg.sample_rate_hz = rate;
        }
        if let Some(ratio) = self.threshold_ratio {
            cfg.threshold_ratio = ratio;
        }
        if let Some(max) = self.max_bpm {
            cfg.max_bpm = max;
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RecordingSection {
    directory: Option<PathBuf>,
}
