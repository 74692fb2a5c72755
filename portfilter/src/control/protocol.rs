//! Text command protocol driving the rule table
//!
//! Three endpoints, each taking one line of text:
//! - add: `"<kind> <port>"`, kind one of `I`, `P`, `F`, `O`
//! - del: `"<index>"`
//! - show: no input, answers one `"<index>(<kind>) <port>"` line per rule

use crate::config::schema::{ControlConfig, ShowMode};
use crate::error::{FilterError, ParseError, Result};
use crate::filter::rule_table::{Rule, RuleKind, RuleTable};
use std::fmt::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A request addressed to one of the control endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request<'a> {
    Add(&'a str),
    Show,
    Del(&'a str),
}

impl<'a> Request<'a> {
    /// Split `"<endpoint> [payload]"` into a request
    pub fn parse(line: &'a str) -> std::result::Result<Self, ParseError> {
        let line = line.trim();
        if line.is_empty() {
            return Err(ParseError::Empty);
        }

        let (endpoint, payload) = match line.split_once(char::is_whitespace) {
            Some((endpoint, rest)) => (endpoint, rest.trim()),
            None => (line, ""),
        };

        match endpoint {
            "add" => Ok(Request::Add(payload)),
            "del" => Ok(Request::Del(payload)),
            "show" if payload.is_empty() => Ok(Request::Show),
            "show" => Err(ParseError::WrongArity {
                expected: 0,
                got: payload.split_whitespace().count(),
            }),
            other => Err(ParseError::UnknownEndpoint(other.to_string())),
        }
    }
}

/// Successful outcome of a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Added(usize),
    Listing(String),
    Deleted(Rule),
}

/// Parse an add payload into a rule
pub fn parse_add(payload: &str) -> std::result::Result<Rule, ParseError> {
    let tokens: Vec<&str> = payload.split_whitespace().collect();
    match tokens.as_slice() {
        [] => Err(ParseError::Empty),
        [kind, port] => {
            let kind = RuleKind::parse(kind)?;
            let port = port
                .parse::<u16>()
                .map_err(|_| ParseError::InvalidPort(port.to_string()))?;
            Ok(Rule::new(kind, port))
        }
        _ => Err(ParseError::WrongArity {
            expected: 2,
            got: tokens.len(),
        }),
    }
}

/// Parse a del payload into a rule index
pub fn parse_delete(payload: &str) -> std::result::Result<usize, ParseError> {
    let tokens: Vec<&str> = payload.split_whitespace().collect();
    match tokens.as_slice() {
        [] => Err(ParseError::Empty),
        [index] => index
            .parse::<usize>()
            .map_err(|_| ParseError::InvalidIndex(index.to_string())),
        _ => Err(ParseError::WrongArity {
            expected: 1,
            got: tokens.len(),
        }),
    }
}

/// Render `(index, rule)` pairs, one `"<index>(<kind>) <port>"` line each
pub fn format_listing(entries: &[(usize, Rule)]) -> String {
    let mut out = String::new();
    for (index, rule) in entries {
        let _ = writeln!(out, "{}({}) {}", index, rule.kind, rule.port);
    }
    out
}

/// Applies operator commands to a shared rule table.
///
/// In [`ShowMode::Toggle`] the show endpoint alternates: a listing, then an
/// empty answer, then a listing again. The state is per protocol instance.
#[derive(Debug)]
pub struct RuleCommandProtocol {
    table: Arc<RuleTable>,
    show_mode: ShowMode,
    max_command_len: usize,
    show_buffer_len: usize,
    shown: AtomicBool,
}

impl RuleCommandProtocol {
    pub fn new(table: Arc<RuleTable>, config: &ControlConfig) -> Self {
        Self {
            table,
            show_mode: config.show_mode,
            max_command_len: config.max_command_len,
            show_buffer_len: config.show_buffer_len,
            shown: AtomicBool::new(false),
        }
    }

    pub fn table(&self) -> &Arc<RuleTable> {
        &self.table
    }

    /// Handle `"<kind> <port>"`, returning the new rule's index
    pub fn add(&self, payload: &str) -> Result<usize> {
        self.check_command_len(payload)?;
        let rule = parse_add(payload)?;
        self.table.add(rule.kind, rule.port)
    }

    /// Handle `"<index>"`, returning the removed rule
    pub fn delete(&self, payload: &str) -> Result<Rule> {
        self.check_command_len(payload)?;
        let index = parse_delete(payload)?;
        self.table.delete(index)
    }

    /// Produce the rule listing for the show endpoint
    pub fn show(&self) -> Result<String> {
        if self.show_mode == ShowMode::Toggle && self.shown.fetch_xor(true, Ordering::AcqRel) {
            return Ok(String::new());
        }

        let listing = format_listing(&self.table.list());
        if listing.len() > self.show_buffer_len {
            return Err(FilterError::Copy {
                len: listing.len(),
                limit: self.show_buffer_len,
            });
        }
        Ok(listing)
    }

    /// Route a parsed request to its endpoint
    pub fn handle(&self, request: Request<'_>) -> Result<Reply> {
        match request {
            Request::Add(payload) => self.add(payload).map(Reply::Added),
            Request::Show => self.show().map(Reply::Listing),
            Request::Del(payload) => self.delete(payload).map(Reply::Deleted),
        }
    }

    fn check_command_len(&self, payload: &str) -> Result<()> {
        if payload.len() > self.max_command_len {
            return Err(FilterError::Copy {
                len: payload.len(),
                limit: self.max_command_len,
            });
        }
        Ok(())
    }
}
