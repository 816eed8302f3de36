pub mod config;
pub mod detectors;
pub mod error;
pub mod io;
pub mod monitor;
pub mod plot;
pub mod session;
pub mod signal;
pub mod stream;
pub mod synth;

pub use config::{PulseConfig, StreamConfig, Transport};
pub use error::{PulseError, Result};
pub use monitor::{Monitor, MonitorStatus};
pub use session::StreamSession;
pub use signal::*;
pub use stream::{StreamEvent, StreamHandle};
