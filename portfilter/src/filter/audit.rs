//! Per-packet decision records and the sinks that receive them

use super::classifier::{Hook, Verdict};
use super::packet::{PacketView, TcpFlags};
use crate::error::AuditError;
use chrono::{DateTime, Utc};
use std::fmt;
use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex};

/// Snapshot of one classification, taken after any rewrite
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditRecord {
    pub timestamp: DateTime<Utc>,
    pub hook: Hook,
    pub verdict: Verdict,
    pub protocol: u8,
    pub source_port: u16,
    pub dest_port: u16,
    pub source_addr: Ipv4Addr,
    pub dest_addr: Ipv4Addr,
    pub flags: TcpFlags,
}

impl AuditRecord {
    pub fn capture(hook: Hook, verdict: Verdict, view: &PacketView<'_>) -> Self {
        Self {
            timestamp: Utc::now(),
            hook,
            verdict,
            protocol: view.protocol(),
            source_port: view.source_port(),
            dest_port: view.dest_port(),
            source_addr: view.source_addr(),
            dest_addr: view.dest_addr(),
            flags: view.flags(),
        }
    }
}

/// `LABEL          : 6,  sport,  dport,saddr          ,daddr          ,syn,fin,ack,rst`
impl fmt::Display for AuditRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<15}:{:>2},{:>5},{:>5},{:<15},{:<15},{},{},{},{}",
            self.verdict.label(),
            self.protocol,
            self.source_port,
            self.dest_port,
            self.source_addr.to_string(),
            self.dest_addr.to_string(),
            self.flags.syn as u8,
            self.flags.fin as u8,
            self.flags.ack as u8,
            self.flags.rst as u8,
        )
    }
}

/// Receives one record per classified packet.
///
/// Delivery is best effort: a failing sink never changes the disposition
/// that has already been computed.
pub trait AuditSink: Send + Sync {
    fn write_record(&self, record: &AuditRecord) -> Result<(), AuditError>;
}

/// Emits records as structured `tracing` events on `portfilter::audit`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn write_record(&self, record: &AuditRecord) -> Result<(), AuditError> {
        tracing::info!(
            target: "portfilter::audit",
            hook = %record.hook,
            verdict = record.verdict.label(),
            protocol = record.protocol,
            sport = record.source_port,
            dport = record.dest_port,
            saddr = %record.source_addr,
            daddr = %record.dest_addr,
            syn = record.flags.syn,
            fin = record.flags.fin,
            ack = record.flags.ack,
            rst = record.flags.rst,
            "{}",
            record
        );
        Ok(())
    }
}

/// Discards every record
#[derive(Debug, Clone, Copy, Default)]
pub struct NullAuditSink;

impl AuditSink for NullAuditSink {
    fn write_record(&self, _record: &AuditRecord) -> Result<(), AuditError> {
        Ok(())
    }
}

/// Keeps records in memory for later inspection
#[derive(Debug, Clone, Default)]
pub struct AuditRecorder {
    records: Arc<Mutex<Vec<AuditRecord>>>,
}

impl AuditRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything recorded so far, oldest first
    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut records) = self.records.lock() {
            records.clear();
        }
    }

    /// Counts by outcome
    pub fn stats(&self) -> AuditStats {
        let mut stats = AuditStats::default();
        if let Ok(records) = self.records.lock() {
            for record in records.iter() {
                if record.verdict.is_drop() {
                    stats.dropped += 1;
                } else if record.verdict == Verdict::ProxyInbound {
                    stats.redirected += 1;
                } else {
                    stats.accepted += 1;
                }
            }
        }
        stats
    }
}

impl AuditSink for AuditRecorder {
    fn write_record(&self, record: &AuditRecord) -> Result<(), AuditError> {
        let mut records = self
            .records
            .lock()
            .map_err(|e| AuditError::Unavailable(e.to_string()))?;
        records.push(record.clone());
        Ok(())
    }
}

/// Outcome counts from an `AuditRecorder`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditStats {
    pub accepted: usize,
    pub dropped: usize,
    pub redirected: usize,
}

impl AuditStats {
    pub fn total(&self) -> usize {
        self.accepted + self.dropped + self.redirected
    }
}
