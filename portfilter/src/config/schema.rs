//! Configuration schema types

use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::path::PathBuf;

/// Complete daemon configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub control: ControlConfig,
    #[serde(default)]
    pub audit: AuditConfig,
}

/// Rule table and classification settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Maximum number of rules the table holds
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    /// Destination address written into packets matched by a proxy rule
    #[serde(default = "default_proxy_addr")]
    pub proxy_addr: String,
    /// Refresh IPv4 and TCP checksums after a proxy rewrite
    #[serde(default)]
    pub recompute_checksums: bool,
}

pub const DEFAULT_CAPACITY: usize = 50;
pub const DEFAULT_PROXY_ADDR: Ipv4Addr = Ipv4Addr::new(131, 1, 1, 1);
/// Longest show line for a two-digit index, `"49(P) 65535\n"`
pub const MAX_LISTING_LINE: usize = 12;

/// Worst-case show listing for a full table of `capacity` rules
pub fn max_listing_len(capacity: usize) -> usize {
    // "<index>(K) <5-digit port>\n"
    (0..capacity).map(|i| i.to_string().len() + 10).sum()
}

fn default_capacity() -> usize {
    DEFAULT_CAPACITY
}

fn default_proxy_addr() -> String {
    DEFAULT_PROXY_ADDR.to_string()
}

impl EngineConfig {
    /// Parsed proxy address. Falls back to the built-in address if the
    /// configured one is malformed; run the validator to reject that case.
    pub fn proxy_ipv4(&self) -> Ipv4Addr {
        self.proxy_addr.parse().unwrap_or(DEFAULT_PROXY_ADDR)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            proxy_addr: default_proxy_addr(),
            recompute_checksums: false,
        }
    }
}

/// Control endpoint settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ControlConfig {
    #[serde(default = "default_socket_path")]
    pub socket_path: PathBuf,
    /// Longest accepted add/del command, in bytes
    #[serde(default = "default_max_command_len")]
    pub max_command_len: usize,
    /// Largest rule listing returned by show, in bytes
    #[serde(default = "default_show_buffer_len")]
    pub show_buffer_len: usize,
    #[serde(default)]
    pub show_mode: ShowMode,
}

fn default_socket_path() -> PathBuf {
    PathBuf::from("/tmp/portfilter.sock")
}

fn default_max_command_len() -> usize {
    50
}

fn default_show_buffer_len() -> usize {
    DEFAULT_CAPACITY * MAX_LISTING_LINE
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            max_command_len: default_max_command_len(),
            show_buffer_len: default_show_buffer_len(),
            show_mode: ShowMode::default(),
        }
    }
}

/// How repeated show requests behave
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ShowMode {
    /// Alternate between a full listing and an empty one, so a reader that
    /// polls until it sees nothing terminates after one listing.
    #[default]
    Toggle,
    /// Return the full listing on every request
    Always,
}

impl ShowMode {
    pub fn parse(s: &str) -> Result<Self, crate::error::ValidationError> {
        match s {
            "toggle" => Ok(ShowMode::Toggle),
            "always" => Ok(ShowMode::Always),
            _ => Err(crate::error::ValidationError::InvalidShowMode {
                mode: s.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for ShowMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShowMode::Toggle => write!(f, "toggle"),
            ShowMode::Always => write!(f, "always"),
        }
    }
}

/// Audit output settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuditConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
        }
    }
}
