use crate::error::{PulseError, Result};
use crate::io::wire::parse_value;
use std::path::Path;

/// Parse newline-delimited floating point series, ignoring blank/comment lines.
pub fn parse_f64_series(text: &str) -> Result<Vec<f64>> {
    let mut out = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let val = parse_value(trimmed).ok_or_else(|| PulseError::Parse {
            line: idx + 1,
            value: trimmed.to_string(),
        })?;
        out.push(val);
    }
    if out.is_empty() {
        return Err(PulseError::NoSamples);
    }
    Ok(out)
}

/// Read a newline-delimited floating point series from disk.
pub fn read_f64_series(path: &Path) -> Result<Vec<f64>> {
    let text = std::fs::read_to_string(path)?;
    parse_f64_series(&text)
}
