//! Packet classification and rule storage

pub mod audit;
pub mod classifier;
pub mod engine;
pub mod packet;
pub mod rewriter;
pub mod rule_table;

pub use audit::{AuditRecord, AuditRecorder, AuditSink, NullAuditSink, TracingAuditSink};
pub use classifier::{Classifier, Disposition, Hook, Verdict};
pub use engine::Engine;
pub use packet::{PacketView, TcpFlags};
pub use rewriter::ProxyRewriter;
pub use rule_table::{Rule, RuleKind, RuleTable};
