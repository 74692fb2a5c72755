//! Configuration management for the filter daemon

pub mod loader;
pub mod schema;
pub mod validator;

pub use loader::ConfigLoader;
pub use schema::{AuditConfig, Config, ControlConfig, EngineConfig, ShowMode};
pub use validator::ConfigValidator;
