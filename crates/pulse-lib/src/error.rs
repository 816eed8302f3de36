use std::path::PathBuf;
use thiserror::Error;

pub type Result<T, E = PulseError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum PulseError {
    #[error("device address cannot be empty")]
    EmptyAddress,
    #[error("failed to resolve {addr}: {source}")]
    Resolve {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("stream closed by peer")]
    Closed,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("csv error in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("invalid config {path}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("line {line} is not a number: {value}")]
    Parse { line: usize, value: String },
    #[error("no samples found")]
    NoSamples,
}
