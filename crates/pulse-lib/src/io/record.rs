use crate::error::{PulseError, Result};
use crate::signal::{Sample, SignalKind};
use chrono::{DateTime, Local};
use csv::{ReaderBuilder, WriterBuilder};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;

/// Wall-clock format of the timestamp column.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedRow {
    pub timestamp: String,
    pub value: f64,
}

impl RecordedRow {
    pub fn from_sample(sample: &Sample) -> Self {
        Self {
            timestamp: sample.received_at.format(TIMESTAMP_FORMAT).to_string(),
            value: sample.value,
        }
    }
}

/// Captured rows of one recording session.
#[derive(Debug, Clone, PartialEq)]
pub struct Recording {
    pub kind: SignalKind,
    pub rows: Vec<RecordedRow>,
}

impl Recording {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn values(&self) -> Vec<f64> {
        self.rows.iter().map(|row| row.value).collect()
    }

    pub fn write_to<W: Write>(&self, writer: W) -> csv::Result<()> {
        let mut wtr = WriterBuilder::new().has_headers(false).from_writer(writer);
        wtr.write_record(["Timestamp", self.kind.csv_header()])?;
        for row in &self.rows {
            wtr.serialize((&row.timestamp, row.value))?;
        }
        wtr.flush()?;
        Ok(())
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path)?;
        self.write_to(file).map_err(|source| PulseError::Csv {
            path: path.to_path_buf(),
            source,
        })?;
        log::info!("saved {} samples to {}", self.rows.len(), path.display());
        Ok(())
    }

    /// Load a file written by [`Recording::write_csv`]. The value header selects the kind.
    pub fn read_csv(path: &Path) -> Result<Self> {
        let csv_err = |source| PulseError::Csv {
            path: path.to_path_buf(),
            source,
        };
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(csv_err)?;
        let headers = reader.headers().map_err(csv_err)?.clone();
        let kind = match headers.get(1) {
            Some(h) if h.eq_ignore_ascii_case(SignalKind::Ecg.csv_header()) => SignalKind::Ecg,
            _ => SignalKind::Ppg,
        };
        let mut rows = Vec::new();
        for record in reader.deserialize::<(String, f64)>() {
            let (timestamp, value) = record.map_err(csv_err)?;
            if !value.is_finite() {
                return Err(PulseError::Parse {
                    // header is line 1
                    line: rows.len() + 2,
                    value: value.to_string(),
                });
            }
            rows.push(RecordedRow { timestamp, value });
        }
        if rows.is_empty() {
            return Err(PulseError::NoSamples);
        }
        Ok(Self { kind, rows })
    }
}

/// Collects samples between `start` and `stop`.
#[derive(Debug)]
pub struct Recorder {
    kind: SignalKind,
    active: bool,
    started_at: Option<DateTime<Local>>,
    rows: Vec<RecordedRow>,
}

impl Recorder {
    pub fn new(kind: SignalKind) -> Self {
        Self {
            kind,
            active: false,
            started_at: None,
            rows: Vec::new(),
        }
    }

    /// Begin a fresh session, discarding rows from any previous one.
    pub fn start(&mut self) {
        self.rows.clear();
        self.active = true;
        self.started_at = Some(Local::now());
        log::info!("{} recording started", self.kind);
    }

    pub fn record(&mut self, sample: &Sample) {
        if self.active {
            self.rows.push(RecordedRow::from_sample(sample));
        }
    }

    /// End the session and hand back what was captured.
    ///
    /// The rows stay available through [`Recorder::last_recording`] until the next `start`.
    pub fn stop(&mut self) -> Recording {
        self.active = false;
        log::info!("{} recording stopped ({} samples)", self.kind, self.rows.len());
        self.last_recording()
    }

    pub fn last_recording(&self) -> Recording {
        Recording {
            kind: self.kind,
            rows: self.rows.clone(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// File name derived from the session start, or from now if never started.
    pub fn suggested_file_name(&self) -> String {
        default_file_name(self.kind, self.started_at.unwrap_or_else(Local::now))
    }
}

/// File name like `ppg-20240131-101500.csv`.
pub fn default_file_name(kind: SignalKind, at: DateTime<Local>) -> String {
    format!("{}-{}.csv", kind, at.format("%Y%m%d-%H%M%S"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample(value: f64) -> Sample {
        let received_at = Local
            .with_ymd_and_hms(2024, 3, 9, 14, 5, 7)
            .single()
            .expect("valid local time");
        Sample { value, received_at }
    }

    #[test]
    fn records_only_while_active() {
        let mut rec = Recorder::new(SignalKind::Ppg);
        rec.record(&sample(1.0));
        assert!(rec.is_empty());
        rec.start();
        rec.record(&sample(2.0));
        rec.record(&sample(3.0));
        let recording = rec.stop();
        rec.record(&sample(4.0));
        assert_eq!(recording.values(), vec![2.0, 3.0]);
        assert_eq!(recording.rows[0].timestamp, "2024-03-09 14:05:07");
    }

    #[test]
    fn start_clears_previous_session() {
        let mut rec = Recorder::new(SignalKind::Ppg);
        rec.start();
        rec.record(&sample(2.0));
        rec.stop();
        rec.start();
        assert_eq!(rec.len(), 0);
    }

    #[test]
    fn csv_has_header_and_one_row_per_sample() {
        let recording = Recording {
            kind: SignalKind::Ppg,
            rows: vec![
                RecordedRow::from_sample(&sample(512.0)),
                RecordedRow::from_sample(&sample(530.25)),
            ],
        };
        let mut buf = Vec::new();
        recording.write_to(&mut buf).expect("write");
        let text = String::from_utf8(buf).expect("utf8");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Timestamp,IR Value");
        assert_eq!(lines[1], "2024-03-09 14:05:07,512.0");
        assert_eq!(lines[2], "2024-03-09 14:05:07,530.25");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn written_file_reads_back() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("ecg.csv");
        let recording = Recording {
            kind: SignalKind::Ecg,
            rows: vec![RecordedRow::from_sample(&sample(-0.25))],
        };
        recording.write_csv(&path).expect("write");
        let loaded = Recording::read_csv(&path).expect("read");
        assert_eq!(loaded, recording);
    }

    #[test]
    fn non_finite_rows_are_refused() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("ir.csv");
        std::fs::write(
            &path,
            "Timestamp,IR Value\n2024-03-09 14:05:07,512.0\n2024-03-09 14:05:07,NaN\n",
        )
        .expect("write");
        let err = Recording::read_csv(&path).unwrap_err();
        assert!(matches!(err, PulseError::Parse { line: 3, .. }));
    }

    #[test]
    fn default_name_uses_kind_and_time() {
        assert_eq!(
            default_file_name(SignalKind::Ecg, sample(0.0).received_at),
            "ecg-20240309-140507.csv"
        );
    }
}
