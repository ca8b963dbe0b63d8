//! Error taxonomy for the pipeline.
//!
//! Three families, mirroring where a failure originates:
//! - [`Error::Config`]   — the caller asked for something inconsistent
//!   (mismatched override lengths, unknown participant id, a trigger label
//!   absent from the recording, ...).  Fixable without touching the data.
//! - [`Error::Input`]    — a file is missing or unreadable; surfaced from
//!   the underlying reader, not wrapped further.
//! - [`Error::Processing`] — an algorithm failed on valid input (singular
//!   regression, degenerate geometry, ...).  Never retried.
//!
//! Any error aborts the current participant's pass; the only sanctioned
//! re-run is the bounded bad-channel restart in [`crate::pipeline`].

use thiserror::Error;

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Invalid or inconsistent configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Missing or unreadable input file.
    #[error("input error: {0}")]
    Input(#[from] std::io::Error),

    /// Algorithm failure on otherwise valid data.
    #[error("processing error: {0}")]
    Processing(String),

    /// Malformed tabular input (behavioral log, coefficient file).
    #[error("table error: {0}")]
    Table(#[from] csv::Error),

    /// Array shape mismatch while assembling data.
    #[error("shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    /// Malformed safetensors / JSON payload.
    #[error("format error: {0}")]
    Format(String),
}

impl Error {
    /// Shorthand for a [`Error::Config`] with a formatted message.
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Shorthand for a [`Error::Processing`] with a formatted message.
    pub fn processing(msg: impl Into<String>) -> Self {
        Error::Processing(msg.into())
    }
}
