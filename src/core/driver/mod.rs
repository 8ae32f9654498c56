//! Sentence drivers
//!
//! A [`DriverRegistry`] maps sentence type prefixes to handlers. Handlers
//! are plain functions or closures that read fields from an
//! [`InputLine`] and update a [`TelemetryState`]; no driver hierarchy is
//! involved.

pub mod catalog;
pub mod key;
pub mod nmea;

use crate::core::protocol::{ChecksumPolicy, InputLine, MAX_TYPE_LEN};
use crate::core::telemetry::TelemetryState;
use std::fmt;
use thiserror::Error;

/// Something that applies one sentence's fields to the shared state.
///
/// Implemented for every `Fn(&mut InputLine, &mut TelemetryState) -> bool`.
pub trait SentenceHandler: Send + Sync {
    /// Apply the remaining fields of `line`; returns whether the line was consumed
    fn parse(&self, line: &mut InputLine<'_>, state: &mut TelemetryState) -> bool;
}

impl<F> SentenceHandler for F
where
    F: Fn(&mut InputLine<'_>, &mut TelemetryState) -> bool + Send + Sync,
{
    fn parse(&self, line: &mut InputLine<'_>, state: &mut TelemetryState) -> bool {
        self(line, state)
    }
}

/// Registry errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// The prefix is already registered; the first handler stays in place
    #[error("Duplicate sentence prefix: {0}")]
    DuplicatePrefix(String),

    /// The prefix does not start with `$` or `!`, or is too long
    #[error("Invalid sentence prefix: {0:?}")]
    InvalidPrefix(String),
}

/// One registered prefix and its handler
pub struct DriverEntry {
    prefix: String,
    policy: ChecksumPolicy,
    handler: Box<dyn SentenceHandler>,
}

impl DriverEntry {
    /// Sentence type prefix, e.g. `$PDKEY`
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Default checksum policy for this sentence type
    pub fn policy(&self) -> ChecksumPolicy {
        self.policy
    }

    /// Run the handler
    pub fn handle(&self, line: &mut InputLine<'_>, state: &mut TelemetryState) -> bool {
        self.handler.parse(line, state)
    }
}

impl fmt::Debug for DriverEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriverEntry")
            .field("prefix", &self.prefix)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

/// Prefix → handler table, searched in registration order
#[derive(Debug, Default)]
pub struct DriverRegistry {
    name: String,
    entries: Vec<DriverEntry>,
}

impl DriverRegistry {
    /// Create an empty registry
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            entries: Vec::new(),
        }
    }

    /// Driver name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register a handler with [`ChecksumPolicy::Required`]
    pub fn register<F>(&mut self, prefix: &str, handler: F) -> Result<(), RegistryError>
    where
        F: Fn(&mut InputLine<'_>, &mut TelemetryState) -> bool + Send + Sync + 'static,
    {
        self.register_handler(prefix, ChecksumPolicy::Required, Box::new(handler))
    }

    /// Register a handler with an explicit checksum policy
    pub fn register_with_policy<F>(
        &mut self,
        prefix: &str,
        policy: ChecksumPolicy,
        handler: F,
    ) -> Result<(), RegistryError>
    where
        F: Fn(&mut InputLine<'_>, &mut TelemetryState) -> bool + Send + Sync + 'static,
    {
        self.register_handler(prefix, policy, Box::new(handler))
    }

    /// Register a boxed handler
    pub fn register_handler(
        &mut self,
        prefix: &str,
        policy: ChecksumPolicy,
        handler: Box<dyn SentenceHandler>,
    ) -> Result<(), RegistryError> {
        if !is_valid_prefix(prefix) {
            return Err(RegistryError::InvalidPrefix(prefix.to_string()));
        }
        if self.lookup(prefix).is_some() {
            return Err(RegistryError::DuplicatePrefix(prefix.to_string()));
        }

        tracing::debug!(driver = %self.name, prefix, policy = policy.name(), "registered sentence handler");
        self.entries.push(DriverEntry {
            prefix: prefix.to_string(),
            policy,
            handler,
        });
        Ok(())
    }

    /// Exact-match lookup of a type token
    pub fn lookup(&self, kind: &str) -> Option<&DriverEntry> {
        self.entries.iter().find(|e| e.prefix == kind)
    }

    /// Registered prefixes in registration order
    pub fn prefixes(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.prefix.as_str())
    }

    /// Number of registered prefixes
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Is the registry empty?
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Does `prefix` look like a sentence type (`$` or `!` marker, no delimiters)?
pub fn is_valid_prefix(prefix: &str) -> bool {
    let mut chars = prefix.chars();
    matches!(chars.next(), Some('$' | '!'))
        && prefix.len() > 1
        && prefix.len() < MAX_TYPE_LEN
        && !prefix.contains([',', '*'])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set_key_zero(_: &mut InputLine<'_>, state: &mut TelemetryState) -> bool {
        state.keys.set(0)
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = DriverRegistry::new("test");
        registry.register("$PTEST", set_key_zero).unwrap();
        registry
            .register_with_policy("$PFOO", ChecksumPolicy::Unchecked, |_, _| true)
            .unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.lookup("$PTEST").unwrap().policy(), ChecksumPolicy::Required);
        assert_eq!(registry.lookup("$PFOO").unwrap().policy(), ChecksumPolicy::Unchecked);
        assert!(registry.lookup("$PTES").is_none());
        assert!(registry.lookup("$PTESTX").is_none());
        assert_eq!(registry.prefixes().collect::<Vec<_>>(), vec!["$PTEST", "$PFOO"]);
    }

    #[test]
    fn test_duplicate_rejected_first_wins() {
        let mut registry = DriverRegistry::new("test");
        registry.register("$PTEST", set_key_zero).unwrap();
        let err = registry.register("$PTEST", |_, _| false).unwrap_err();
        assert_eq!(err, RegistryError::DuplicatePrefix("$PTEST".into()));

        let mut state = TelemetryState::default();
        let mut line = InputLine::new("");
        assert!(registry.lookup("$PTEST").unwrap().handle(&mut line, &mut state));
        assert!(state.keys.is_set(0));
    }

    #[test]
    fn test_invalid_prefixes() {
        let mut registry = DriverRegistry::new("test");
        for bad in ["PDKEY", "$", "", "$A,B", "$A*", "$ABCDEFGHIJKLMNOPQRST"] {
            assert!(matches!(
                registry.register(bad, |_, _| true),
                Err(RegistryError::InvalidPrefix(_))
            ));
        }
        assert!(registry.is_empty());
        assert!(registry.register("!AIVDM", |_, _| true).is_ok());
    }
}
