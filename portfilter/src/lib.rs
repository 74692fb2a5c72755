//! Port-based packet filtering and proxy redirection engine
//!
//! Packets are classified at three interception points (pre-routing,
//! forward, post-routing) against an ordered table of `(kind, port)` rules,
//! which operators edit through a small text command protocol.

pub mod config;
pub mod control;
pub mod error;
pub mod filter;

// Re-export commonly used types
pub use config::{Config, ConfigLoader, ShowMode};
pub use control::{ControlServer, ControlServerConfig, RuleCommandProtocol};
pub use error::{FilterError, ParseError, Result, ValidationError};
pub use filter::{
    AuditRecord, AuditSink, Classifier, Disposition, Engine, Hook, PacketView, Rule, RuleKind,
    RuleTable,
};
