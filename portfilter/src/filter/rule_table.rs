//! Ordered, bounded rule table shared by the packet and control paths

use super::classifier::Hook;
use crate::config::schema::DEFAULT_CAPACITY;
use crate::error::{FilterError, ParseError, Result};
use std::fmt;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// What a rule does when its port matches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleKind {
    /// Drop pre-routing packets whose source port matches (`I`)
    DropInbound,
    /// Redirect pre-routing packets whose source port matches to the proxy (`P`)
    Proxy,
    /// Drop forwarded packets whose source port matches (`F`)
    DropForward,
    /// Drop post-routing packets whose destination port matches (`O`)
    DropOutbound,
}

impl RuleKind {
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'I' => Some(RuleKind::DropInbound),
            'P' => Some(RuleKind::Proxy),
            'F' => Some(RuleKind::DropForward),
            'O' => Some(RuleKind::DropOutbound),
            _ => None,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            RuleKind::DropInbound => 'I',
            RuleKind::Proxy => 'P',
            RuleKind::DropForward => 'F',
            RuleKind::DropOutbound => 'O',
        }
    }

    /// The interception point whose scan considers this kind
    pub fn hook(self) -> Hook {
        match self {
            RuleKind::DropInbound | RuleKind::Proxy => Hook::PreRouting,
            RuleKind::DropForward => Hook::Forward,
            RuleKind::DropOutbound => Hook::PostRouting,
        }
    }

    /// Parse a kind token: exactly one of `I`, `P`, `F`, `O`
    pub fn parse(token: &str) -> std::result::Result<Self, ParseError> {
        let mut chars = token.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => {
                Self::from_char(c).ok_or_else(|| ParseError::UnknownKind(token.to_string()))
            }
            _ => Err(ParseError::UnknownKind(token.to_string())),
        }
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// A single (kind, port) filtering rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rule {
    pub kind: RuleKind,
    pub port: u16,
}

impl Rule {
    pub fn new(kind: RuleKind, port: u16) -> Self {
        Self { kind, port }
    }
}

/// Ordered rule collection. Insertion order is match priority.
///
/// All access goes through one `RwLock`: scans share it, add and delete
/// take it exclusively, so a scan never sees a half-shifted table.
#[derive(Debug)]
pub struct RuleTable {
    rules: RwLock<Vec<Rule>>,
    capacity: usize,
}

impl RuleTable {
    /// Create an empty table holding at most `capacity` rules
    pub fn new(capacity: usize) -> Self {
        Self {
            rules: RwLock::new(Vec::with_capacity(capacity)),
            capacity,
        }
    }

    /// Append a rule, returning its index
    pub fn add(&self, kind: RuleKind, port: u16) -> Result<usize> {
        let mut rules = self.write();
        if rules.len() >= self.capacity {
            return Err(FilterError::Capacity {
                capacity: self.capacity,
            });
        }

        rules.push(Rule::new(kind, port));
        let index = rules.len() - 1;
        tracing::debug!(index, kind = %kind, port, "rule added");
        Ok(index)
    }

    /// Remove the rule at `index`; later rules shift down by one
    pub fn delete(&self, index: usize) -> Result<Rule> {
        let mut rules = self.write();
        if index >= rules.len() {
            return Err(FilterError::Index {
                index,
                len: rules.len(),
            });
        }

        let removed = rules.remove(index);
        tracing::debug!(index, kind = %removed.kind, port = removed.port, "rule deleted");
        Ok(removed)
    }

    /// Consistent `(index, rule)` snapshot in table order
    pub fn list(&self) -> Vec<(usize, Rule)> {
        self.read().iter().copied().enumerate().collect()
    }

    pub fn size(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Scan rules in order under the read lock, returning the first hit
    pub fn find_map<T, F>(&self, f: F) -> Option<T>
    where
        F: FnMut(&Rule) -> Option<T>,
    {
        self.read().iter().find_map(f)
    }

    // A panic while holding the lock cannot leave the Vec half-modified,
    // so a poisoned lock is still safe to use.
    fn read(&self) -> RwLockReadGuard<'_, Vec<Rule>> {
        self.rules.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Rule>> {
        self.rules.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for RuleTable {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
