//! Entry point for the hook dispatcher

use super::audit::{AuditSink, NullAuditSink, TracingAuditSink};
use super::classifier::{Classifier, Disposition, Hook};
use super::packet::PacketView;
use super::rewriter::ProxyRewriter;
use super::rule_table::RuleTable;
use crate::config::Config;
use crate::control::RuleCommandProtocol;
use std::sync::Arc;

/// One rule table plus the packet path and control path that share it
#[derive(Debug)]
pub struct Engine {
    table: Arc<RuleTable>,
    classifier: Classifier,
    protocol: Arc<RuleCommandProtocol>,
}

impl Engine {
    /// Build an engine that reports decisions to `sink`
    pub fn new(config: &Config, sink: Arc<dyn AuditSink>) -> Self {
        let table = Arc::new(RuleTable::new(config.engine.capacity));
        let rewriter = ProxyRewriter::new(config.engine.proxy_ipv4())
            .with_checksums(config.engine.recompute_checksums);

        Self {
            classifier: Classifier::new(table.clone(), rewriter, sink),
            protocol: Arc::new(RuleCommandProtocol::new(table.clone(), &config.control)),
            table,
        }
    }

    /// Build an engine whose audit sink follows `config.audit`
    pub fn from_config(config: &Config) -> Self {
        let sink: Arc<dyn AuditSink> = if config.audit.enabled {
            Arc::new(TracingAuditSink)
        } else {
            Arc::new(NullAuditSink)
        };
        Self::new(config, sink)
    }

    pub fn table(&self) -> &Arc<RuleTable> {
        &self.table
    }

    pub fn protocol(&self) -> &Arc<RuleCommandProtocol> {
        &self.protocol
    }

    /// Decide the fate of a raw IPv4 packet seen at `hook`.
    ///
    /// Buffers that are not IPv4/TCP are accepted untouched and not audited.
    pub fn inspect(&self, hook: Hook, packet: &mut [u8]) -> Disposition {
        match PacketView::new(packet) {
            Ok(mut view) => self.classifier.classify(hook, &mut view),
            Err(e) => {
                tracing::trace!(%hook, "Passing unclassified packet: {}", e);
                Disposition::Accept
            }
        }
    }
}
