//! Error types for filter operations

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, FilterError>;

#[derive(Debug, Error)]
pub enum FilterError {
    #[error("Rule table is full ({capacity} rules)")]
    Capacity { capacity: usize },

    #[error("Rule index {index} out of range (table has {len} rules)")]
    Index { index: usize, len: usize },

    #[error("Malformed command: {0}")]
    Parse(#[from] ParseError),

    #[error("Control buffer too small: {len} bytes exceeds limit of {limit}")]
    Copy { len: usize, limit: usize },

    #[error("Configuration validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Failed to load config from {path}: {source}")]
    ConfigLoad {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("empty command")]
    Empty,

    #[error("unknown rule kind: {0:?}")]
    UnknownKind(String),

    #[error("invalid port: {0:?}")]
    InvalidPort(String),

    #[error("invalid rule index: {0:?}")]
    InvalidIndex(String),

    #[error("expected {expected} argument(s), got {got}")]
    WrongArity { expected: usize, got: usize },

    #[error("unknown endpoint: {0:?}")]
    UnknownEndpoint(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Rule table capacity must be at least 1")]
    ZeroCapacity,

    #[error("Invalid proxy address: {addr}")]
    InvalidProxyAddr { addr: String },

    #[error("{field} must be at least 1")]
    ZeroBuffer { field: &'static str },

    #[error("show_buffer_len {len} cannot hold a full table listing of {required} bytes")]
    ShowBufferTooSmall { len: usize, required: usize },

    #[error("Control socket path is empty")]
    EmptySocketPath,

    #[error("Invalid show mode: {mode}")]
    InvalidShowMode { mode: String },
}

/// Reasons a raw buffer cannot be viewed as an IPv4/TCP packet.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PacketError {
    #[error("packet truncated")]
    Truncated,

    #[error("not an IPv4 packet (version {0})")]
    NotIpv4(u8),

    #[error("bad IPv4 header length ({0} words)")]
    BadHeaderLength(u8),

    #[error("not a TCP segment (protocol {0})")]
    NotTcp(u8),
}

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("audit sink unavailable: {0}")]
    Unavailable(String),
}
