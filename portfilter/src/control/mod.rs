//! Operator control path: command protocol and its socket transport

pub mod protocol;
pub mod server;

pub use protocol::{Reply, Request, RuleCommandProtocol};
pub use server::{ControlServer, ControlServerConfig};
