//! Error types for region allocation, initialization and configuration
//!
//! Exhaustion and size overflow share one type: both are fed through the
//! same OOM policy decision in [`crate::Arena`].

use thiserror::Error;

/// Allocation failure surfaced by the OOM policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AllocError {
    /// `size * count` (plus padding) does not fit in `usize`
    #[error("allocation size overflow: {size} bytes x {count}")]
    Overflow { size: usize, count: usize },

    /// The backing store cannot satisfy the request, even after growth
    #[error("arena exhausted: requested {requested} bytes, {available} available")]
    Exhausted { requested: usize, available: usize },
}

/// Region construction failure
#[derive(Debug, Error)]
pub enum InitError {
    #[error("failed to reserve {size} bytes of address space: {source}")]
    Reserve {
        size: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to commit {size} bytes: {source}")]
    Commit {
        size: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid buffer layout ({size} bytes)")]
    Layout { size: usize },

    #[error(transparent)]
    InvalidConfig(#[from] ConfigError),
}

/// Configuration loading or validation failure
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

pub type AllocResult<T> = Result<T, AllocError>;
