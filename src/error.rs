//! Error types for the link codec chain.
//!
//! Only pipeline assembly and the message transport can fail. Bit-level
//! corruption inside a running chain is recovered by the stages themselves
//! and never shows up here.

use thiserror::Error;

/// Rejected stage or link parameters
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A rate parameter was zero
    #[error("{name} must be positive")]
    ZeroRate { name: &'static str },

    /// Sample rate must be strictly above the baud rate
    #[error("sample rate {sample_rate} must exceed baud rate {baud_rate}")]
    RateRatio { baud_rate: u32, sample_rate: u32 },

    /// Derived averaging window came out empty
    #[error(
        "baud rate {baud_rate} is too high for sample rate {sample_rate}: symbol averaging window is empty"
    )]
    EmptyWindow { baud_rate: u32, sample_rate: u32 },

    /// Floating point parameter out of range
    #[error("invalid {name}: {value}")]
    InvalidParameter { name: &'static str, value: f32 },

    /// CIC integrators would overflow 64-bit fixed point
    #[error("CIC factor {factor} with {stages} stages would overflow 64-bit fixed point")]
    CicOverflow { factor: usize, stages: usize },

    /// CIC factor or stage count of zero
    #[error("CIC factor and stage count must be positive (factor {factor}, stages {stages})")]
    CicShape { factor: usize, stages: usize },

    /// Work buffer too small for the widest single step of a stage
    #[error("chunk size {chunk_size} is below the minimum of {min}")]
    ChunkTooSmall { chunk_size: usize, min: usize },

    /// Resampled front end rate does not fit in 32 bits
    #[error("front end rate {sample_rate} Hz x {factor} overflows")]
    FrontEndRate { sample_rate: u32, factor: usize },

    /// IO error while loading a config file
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed JSON config
    #[error("config parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failures of the message queue around the framer and deframer
#[derive(Error, Debug, PartialEq, Eq)]
pub enum TransportError {
    /// Zero-length messages cannot be told apart from idle
    #[error("empty messages cannot be framed")]
    Empty,

    /// A length byte cannot announce more than 255 bytes
    #[error("message of {0} bytes exceeds the 255 byte limit")]
    TooLong(usize),

    /// Queue stayed full (send) or empty (receive) for the whole timeout
    #[error("timed out waiting on the message queue")]
    Timeout,

    /// Other side of the queue was dropped
    #[error("message queue disconnected")]
    Disconnected,
}

pub type Result<T> = std::result::Result<T, ConfigError>;
