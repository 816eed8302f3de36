use crate::config::StreamConfig;
use crate::error::Result;
use crate::io::record::Recording;
use crate::monitor::Monitor;
use crate::stream::StreamHandle;
use std::path::Path;

/// One stream as a front end sees it: the reader handle, the monitor it feeds,
/// the editable address and a one-line message for the user.
pub struct StreamSession {
    monitor: Monitor,
    handle: Option<StreamHandle>,
    pub host: String,
    pub port: u16,
    message: Option<String>,
}

impl StreamSession {
    pub fn new(cfg: StreamConfig) -> Self {
        Self {
            host: cfg.host.clone(),
            port: cfg.port,
            monitor: Monitor::new(cfg),
            handle: None,
            message: None,
        }
    }

    pub fn monitor(&self) -> &Monitor {
        &self.monitor
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn set_message(&mut self, message: impl Into<String>) {
        self.message = Some(message.into());
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Spawn a reader for the current `host`/`port`. A running session is left alone.
    pub fn start(&mut self) -> Result<()> {
        if self.handle.is_some() {
            return Ok(());
        }
        let mut cfg = self.monitor.config().clone();
        cfg.host = self.host.trim().to_string();
        cfg.port = self.port;
        let target = cfg.address();
        let handle = match StreamHandle::spawn(cfg.clone()) {
            Ok(handle) => handle,
            Err(err) => {
                log::warn!("{} start refused: {err}", cfg.kind);
                return Err(err);
            }
        };
        self.monitor.reconfigure(cfg);
        self.monitor.clear();
        self.monitor.set_connecting(target);
        self.handle = Some(handle);
        self.message = None;
        Ok(())
    }

    /// Returns without waiting for the reader; the join happens on a helper thread
    /// because a pending connect can hold the reader for the whole connect timeout.
    pub fn stop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        self.monitor.drain(handle.events());
        self.monitor.set_stopped();
        let joiner = std::thread::Builder::new()
            .name(format!("{}-stop", handle.kind()))
            .spawn(move || handle.stop());
        // On spawn failure the closure is dropped and the handle joins inline.
        if let Err(err) = joiner {
            log::warn!("joining reader on the caller's thread: {err}");
        }
    }

    /// Drain pending events; called once per frame or tick.
    pub fn poll(&mut self) -> usize {
        let Some(handle) = self.handle.as_ref() else {
            return 0;
        };
        let taken = self.monitor.drain(handle.events());
        if !self.monitor.status().is_running() && handle.is_finished() {
            self.handle = None;
        }
        taken
    }

    pub fn start_recording(&mut self) {
        self.monitor.start_recording();
        self.message = Some(format!("{} recording started", self.monitor.kind()));
    }

    pub fn stop_recording(&mut self) -> Recording {
        let recording = self.monitor.stop_recording();
        self.message = Some(format!("Recording stopped ({} samples)", recording.len()));
        recording
    }

    pub fn is_recording(&self) -> bool {
        self.monitor.is_recording()
    }

    /// Rows of the most recent recording, available until the next start.
    pub fn last_recording(&self) -> Option<Recording> {
        let recorder = self.monitor.recorder();
        if recorder.is_active() || recorder.is_empty() {
            None
        } else {
            Some(recorder.last_recording())
        }
    }

    pub fn suggested_file_name(&self) -> String {
        self.monitor.recorder().suggested_file_name()
    }

    pub fn save_recording(&mut self, recording: &Recording, path: &Path) {
        self.message = Some(match recording.write_csv(path) {
            Ok(()) => format!(
                "Data saved to {} ({} samples)",
                path.display(),
                recording.len()
            ),
            Err(err) => format!("Save failed: {err}"),
        });
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        self.stop();
    }
}
