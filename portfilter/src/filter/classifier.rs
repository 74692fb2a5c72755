//! Per-hook packet classification against the rule table

use super::audit::{AuditRecord, AuditSink};
use super::packet::PacketView;
use super::rewriter::ProxyRewriter;
use super::rule_table::{RuleKind, RuleTable};
use std::fmt;
use std::net::Ipv4Addr;
use std::sync::Arc;

/// Interception point a packet is presented at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hook {
    /// Inbound, before the routing decision
    PreRouting,
    /// In transit through the host
    Forward,
    /// Outbound, after the routing decision
    PostRouting,
}

impl Hook {
    pub const ALL: [Hook; 3] = [Hook::PreRouting, Hook::Forward, Hook::PostRouting];

    pub fn as_str(self) -> &'static str {
        match self {
            Hook::PreRouting => "pre_routing",
            Hook::Forward => "forward",
            Hook::PostRouting => "post_routing",
        }
    }
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome handed back to the hook dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Accept,
    Drop,
    /// Accepted after the destination was rewritten in the buffer
    AcceptWithRewrite { addr: Ipv4Addr, port: u16 },
}

/// Audit label for a decision at a given hook
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verdict {
    DropInbound,
    ProxyInbound,
    Inbound,
    DropForward,
    Forward,
    DropOutbound,
    Outbound,
}

impl Verdict {
    pub fn new(hook: Hook, disposition: &Disposition) -> Self {
        match (hook, disposition) {
            (Hook::PreRouting, Disposition::Drop) => Verdict::DropInbound,
            (Hook::PreRouting, Disposition::AcceptWithRewrite { .. }) => Verdict::ProxyInbound,
            (Hook::PreRouting, Disposition::Accept) => Verdict::Inbound,
            (Hook::Forward, Disposition::Drop) => Verdict::DropForward,
            (Hook::Forward, _) => Verdict::Forward,
            (Hook::PostRouting, Disposition::Drop) => Verdict::DropOutbound,
            (Hook::PostRouting, _) => Verdict::Outbound,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Verdict::DropInbound => "DROP(INBOUND)",
            Verdict::ProxyInbound => "PROXY(INBOUND)",
            Verdict::Inbound => "INBOUND",
            Verdict::DropForward => "DROP(FORWARD)",
            Verdict::Forward => "FORWARD",
            Verdict::DropOutbound => "DROP(OUTBOUND)",
            Verdict::Outbound => "OUTBOUND",
        }
    }

    pub fn hook(self) -> Hook {
        match self {
            Verdict::DropInbound | Verdict::ProxyInbound | Verdict::Inbound => Hook::PreRouting,
            Verdict::DropForward | Verdict::Forward => Hook::Forward,
            Verdict::DropOutbound | Verdict::Outbound => Hook::PostRouting,
        }
    }

    pub fn is_drop(self) -> bool {
        matches!(
            self,
            Verdict::DropInbound | Verdict::DropForward | Verdict::DropOutbound
        )
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Decides what happens to each packet.
///
/// Every hook does a linear scan in table order and the first rule whose
/// kind belongs to that hook and whose port equals the hook's key wins. The
/// key is the source port at pre-routing and forward, and the destination
/// port at post-routing. No match means `Accept`.
pub struct Classifier {
    table: Arc<RuleTable>,
    rewriter: ProxyRewriter,
    sink: Arc<dyn AuditSink>,
}

impl Classifier {
    pub fn new(table: Arc<RuleTable>, rewriter: ProxyRewriter, sink: Arc<dyn AuditSink>) -> Self {
        Self {
            table,
            rewriter,
            sink,
        }
    }

    /// Classify one packet, rewriting it in place for proxy matches.
    /// Exactly one audit record is written per call.
    pub fn classify(&self, hook: Hook, view: &mut PacketView<'_>) -> Disposition {
        let key = match hook {
            Hook::PreRouting | Hook::Forward => view.source_port(),
            Hook::PostRouting => view.dest_port(),
        };

        let matched = self
            .table
            .find_map(|rule| (rule.port == key && rule.kind.hook() == hook).then_some(rule.kind));

        let disposition = match matched {
            None => Disposition::Accept,
            Some(RuleKind::Proxy) => self.rewriter.rewrite(view),
            Some(RuleKind::DropInbound | RuleKind::DropForward | RuleKind::DropOutbound) => {
                Disposition::Drop
            }
        };

        let record = AuditRecord::capture(hook, Verdict::new(hook, &disposition), view);
        if let Err(e) = self.sink.write_record(&record) {
            tracing::debug!("Audit record dropped: {}", e);
        }

        disposition
    }
}

impl fmt::Debug for Classifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Classifier")
            .field("table", &self.table)
            .field("rewriter", &self.rewriter)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AuditError;
    use crate::filter::audit::AuditRecorder;
    use crate::filter::packet::test_packet::syn;

    const PROXY: Ipv4Addr = Ipv4Addr::new(131, 1, 1, 1);

    fn setup(rules: &[(RuleKind, u16)]) -> (Classifier, AuditRecorder) {
        let table = Arc::new(RuleTable::default());
        for &(kind, port) in rules {
            table.add(kind, port).unwrap();
        }
        let recorder = AuditRecorder::new();
        let classifier = Classifier::new(
            table,
            ProxyRewriter::new(PROXY),
            Arc::new(recorder.clone()),
        );
        (classifier, recorder)
    }

    fn classify(classifier: &Classifier, hook: Hook, sport: u16, dport: u16) -> Disposition {
        let mut buf = syn(sport, dport);
        let mut view = PacketView::new(&mut buf).unwrap();
        classifier.classify(hook, &mut view)
    }

    #[test]
    fn test_empty_table_accepts_everywhere() {
        let (classifier, recorder) = setup(&[]);
        for hook in Hook::ALL {
            assert_eq!(classify(&classifier, hook, 22, 80), Disposition::Accept);
        }

        let verdicts: Vec<Verdict> = recorder.records().iter().map(|r| r.verdict).collect();
        assert_eq!(
            verdicts,
            vec![Verdict::Inbound, Verdict::Forward, Verdict::Outbound]
        );
    }

    #[test]
    fn test_drop_inbound_scenario() {
        let (classifier, recorder) = setup(&[(RuleKind::DropInbound, 22)]);
        assert_eq!(
            classify(&classifier, Hook::PreRouting, 22, 5000),
            Disposition::Drop
        );
        assert_eq!(recorder.records()[0].verdict, Verdict::DropInbound);

        // Destination port is not the pre-routing key
        assert_eq!(
            classify(&classifier, Hook::PreRouting, 5000, 22),
            Disposition::Accept
        );
    }

    #[test]
    fn test_proxy_scenario() {
        let (classifier, recorder) = setup(&[(RuleKind::Proxy, 8080)]);
        let mut buf = syn(8080, 80);
        let mut view = PacketView::new(&mut buf).unwrap();

        assert_eq!(
            classifier.classify(Hook::PreRouting, &mut view),
            Disposition::AcceptWithRewrite {
                addr: PROXY,
                port: 8080
            }
        );
        assert_eq!(view.dest_addr(), PROXY);
        assert_eq!(view.dest_port(), 8080);

        let record = &recorder.records()[0];
        assert_eq!(record.verdict, Verdict::ProxyInbound);
        assert_eq!(record.dest_addr, PROXY);
        assert_eq!(record.dest_port, 8080);
    }

    #[test]
    fn test_proxy_address_is_stable() {
        let (classifier, _) = setup(&[(RuleKind::Proxy, 9000)]);
        for dport in [80, 443, 9000] {
            assert_eq!(
                classify(&classifier, Hook::PreRouting, 9000, dport),
                Disposition::AcceptWithRewrite {
                    addr: PROXY,
                    port: 9000
                }
            );
        }
    }

    #[test]
    fn test_forward_ignores_inbound_rule() {
        let (classifier, recorder) =
            setup(&[(RuleKind::DropInbound, 80), (RuleKind::DropForward, 80)]);
        assert_eq!(classify(&classifier, Hook::Forward, 80, 1234), Disposition::Drop);
        assert_eq!(recorder.records()[0].verdict, Verdict::DropForward);
    }

    #[test]
    fn test_forward_rule_isolated_to_forward() {
        let (classifier, _) = setup(&[(RuleKind::DropForward, 80)]);
        assert_eq!(
            classify(&classifier, Hook::PreRouting, 80, 80),
            Disposition::Accept
        );
        assert_eq!(
            classify(&classifier, Hook::PostRouting, 80, 80),
            Disposition::Accept
        );
        assert_eq!(classify(&classifier, Hook::Forward, 80, 80), Disposition::Drop);
    }

    #[test]
    fn test_outbound_matches_destination_port() {
        let (classifier, recorder) = setup(&[(RuleKind::DropOutbound, 443)]);
        assert_eq!(
            classify(&classifier, Hook::PostRouting, 443, 80),
            Disposition::Accept
        );
        assert_eq!(
            classify(&classifier, Hook::PostRouting, 50000, 443),
            Disposition::Drop
        );
        assert_eq!(recorder.records()[1].verdict, Verdict::DropOutbound);
    }

    #[test]
    fn test_first_match_wins() {
        // Earlier proxy rule shadows the later drop for the same port
        let (classifier, recorder) =
            setup(&[(RuleKind::Proxy, 7000), (RuleKind::DropInbound, 7000)]);
        assert!(matches!(
            classify(&classifier, Hook::PreRouting, 7000, 80),
            Disposition::AcceptWithRewrite { .. }
        ));
        assert_eq!(recorder.len(), 1);
        assert_eq!(recorder.records()[0].verdict, Verdict::ProxyInbound);

        let (classifier, _) =
            setup(&[(RuleKind::DropInbound, 7000), (RuleKind::Proxy, 7000)]);
        assert_eq!(
            classify(&classifier, Hook::PreRouting, 7000, 80),
            Disposition::Drop
        );
    }

    #[test]
    fn test_duplicate_rules_single_record() {
        let (classifier, recorder) =
            setup(&[(RuleKind::DropOutbound, 25), (RuleKind::DropOutbound, 25)]);
        assert_eq!(classify(&classifier, Hook::PostRouting, 1, 25), Disposition::Drop);
        assert_eq!(recorder.len(), 1);
    }

    struct FailingSink;

    impl AuditSink for FailingSink {
        fn write_record(&self, _record: &AuditRecord) -> Result<(), AuditError> {
            Err(AuditError::Unavailable("down".to_string()))
        }
    }

    #[test]
    fn test_sink_failure_keeps_disposition() {
        let table = Arc::new(RuleTable::default());
        table.add(RuleKind::DropInbound, 22).unwrap();
        let classifier = Classifier::new(table, ProxyRewriter::new(PROXY), Arc::new(FailingSink));

        assert_eq!(classify(&classifier, Hook::PreRouting, 22, 80), Disposition::Drop);
    }

    #[test]
    fn test_verdict_mapping() {
        for hook in Hook::ALL {
            assert_eq!(Verdict::new(hook, &Disposition::Drop).hook(), hook);
            assert!(Verdict::new(hook, &Disposition::Drop).is_drop());
            assert!(!Verdict::new(hook, &Disposition::Accept).is_drop());
        }
        assert_eq!(Verdict::ProxyInbound.to_string(), "PROXY(INBOUND)");
    }
}
