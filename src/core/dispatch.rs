//! Sentence dispatch
//!
//! [`IngestDispatcher::parse_line`] is a self-contained transaction:
//! tokenize, look up the handler by exact type match, enforce the checksum
//! policy for that type, run the handler. Every outcome is a boolean, an
//! unknown type and a rejected checksum both report `false` so dispatchers
//! can be chained.

use crate::core::driver::{catalog, DriverRegistry, RegistryError};
use crate::core::protocol::{checksum, ChecksumPolicy, Sentence};
use crate::core::telemetry::TelemetryState;
use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;

/// Errors building a dispatch chain
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// No driver of that name in the catalog
    #[error("Unknown driver: {0}")]
    UnknownDriver(String),

    /// A driver failed to register its sentences
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Per-dispatcher counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchStats {
    /// Lines a handler consumed
    pub handled: u64,
    /// Lines with no matching prefix, or declined by their handler
    pub unhandled: u64,
    /// Lines rejected by the checksum policy
    pub checksum_rejected: u64,
}

/// Dispatches lines against one driver registry
#[derive(Debug)]
pub struct IngestDispatcher {
    registry: DriverRegistry,
    overrides: HashMap<String, ChecksumPolicy>,
    stats: DispatchStats,
}

impl IngestDispatcher {
    /// Create a dispatcher over a registry
    pub fn new(registry: DriverRegistry) -> Self {
        Self {
            registry,
            overrides: HashMap::new(),
            stats: DispatchStats::default(),
        }
    }

    /// Override the checksum policy of one sentence type
    pub fn set_policy(&mut self, prefix: &str, policy: ChecksumPolicy) {
        self.overrides.insert(prefix.to_string(), policy);
    }

    /// Effective checksum policy for a registered prefix
    pub fn policy_for(&self, prefix: &str) -> Option<ChecksumPolicy> {
        let entry = self.registry.lookup(prefix)?;
        Some(self.overrides.get(prefix).copied().unwrap_or(entry.policy()))
    }

    /// Underlying registry
    pub fn registry(&self) -> &DriverRegistry {
        &self.registry
    }

    /// Counters since creation or the last reset
    pub fn stats(&self) -> DispatchStats {
        self.stats
    }

    /// Reset counters
    pub fn reset_stats(&mut self) {
        self.stats = DispatchStats::default();
    }

    /// Parse one line with its terminator already stripped.
    ///
    /// Returns true when a handler consumed the line.
    pub fn parse_line(&mut self, line: &str, state: &mut TelemetryState) -> bool {
        let mut sentence = Sentence::parse(line);

        let Some(entry) = self.registry.lookup(sentence.kind()) else {
            self.stats.unhandled += 1;
            return false;
        };

        let policy = self
            .overrides
            .get(entry.prefix())
            .copied()
            .unwrap_or(entry.policy());

        if policy != ChecksumPolicy::Unchecked {
            let status = checksum::verify(line);
            if !policy.accepts(status) {
                self.stats.checksum_rejected += 1;
                tracing::debug!(
                    driver = %self.registry.name(),
                    kind = sentence.kind(),
                    ?status,
                    policy = policy.name(),
                    "rejecting sentence"
                );
                return false;
            }
        }

        let handled = entry.handle(sentence.fields(), state);
        if handled {
            self.stats.handled += 1;
        } else {
            self.stats.unhandled += 1;
        }
        handled
    }
}

/// Dispatchers tried in order until one handles the line
#[derive(Debug, Default)]
pub struct DispatchChain {
    dispatchers: Vec<IngestDispatcher>,
}

impl DispatchChain {
    /// Empty chain
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a chain from catalog driver names, applying checksum overrides
    /// to whichever dispatcher registers each prefix.
    pub fn from_catalog(
        names: &[String],
        overrides: &HashMap<String, ChecksumPolicy>,
    ) -> Result<Self, DispatchError> {
        let mut chain = Self::new();
        for name in names {
            let driver =
                catalog::find(name).ok_or_else(|| DispatchError::UnknownDriver(name.clone()))?;
            let mut dispatcher = IngestDispatcher::new(driver.create()?);
            for (prefix, policy) in overrides {
                if dispatcher.registry().lookup(prefix).is_some() {
                    dispatcher.set_policy(prefix, *policy);
                }
            }
            chain.push(dispatcher);
        }
        Ok(chain)
    }

    /// Append a dispatcher
    pub fn push(&mut self, dispatcher: IngestDispatcher) {
        self.dispatchers.push(dispatcher);
    }

    /// Try every dispatcher in order; true once one handles the line
    pub fn parse_line(&mut self, line: &str, state: &mut TelemetryState) -> bool {
        self.dispatchers
            .iter_mut()
            .any(|d| d.parse_line(line, state))
    }

    /// Dispatchers in chain order
    pub fn dispatchers(&self) -> &[IngestDispatcher] {
        &self.dispatchers
    }

    /// Counters per driver name
    pub fn stats(&self) -> Vec<(String, DispatchStats)> {
        self.dispatchers
            .iter()
            .map(|d| (d.registry().name().to_string(), d.stats()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::driver::key;

    fn key_dispatcher() -> IngestDispatcher {
        IngestDispatcher::new(key::create().unwrap())
    }

    #[test]
    fn test_scenario_pdkey() {
        let mut dispatcher = key_dispatcher();
        let mut state = TelemetryState::default();

        assert!(dispatcher.parse_line("$PDKEY,5", &mut state));
        assert!(state.keys.is_set(5));

        let before = state.clone();
        assert!(dispatcher.parse_line("$PDKEY,99", &mut state));
        assert_eq!(state, before);

        assert!(!dispatcher.parse_line("$UNKNOWN,1", &mut state));
        assert_eq!(state, before);

        assert_eq!(
            dispatcher.stats(),
            DispatchStats { handled: 2, unhandled: 1, checksum_rejected: 0 }
        );
    }

    #[test]
    fn test_bad_checksum_rejected_before_handler() {
        let mut dispatcher = key_dispatcher();
        let mut state = TelemetryState::default();

        assert!(!dispatcher.parse_line("$PDKEY,5*00", &mut state));
        assert!(!state.keys.any());
        assert_eq!(dispatcher.stats().checksum_rejected, 1);

        assert!(dispatcher.parse_line(&checksum::append("$PDKEY,5"), &mut state));
        assert!(state.keys.is_set(5));
    }

    #[test]
    fn test_required_policy_rejects_missing_checksum() {
        let mut registry = DriverRegistry::new("strict");
        registry
            .register("$PSTRICT", |_, state| state.keys.set(1))
            .unwrap();
        let mut dispatcher = IngestDispatcher::new(registry);
        let mut state = TelemetryState::default();

        assert!(!dispatcher.parse_line("$PSTRICT,1", &mut state));
        assert!(!state.keys.any());
        assert!(dispatcher.parse_line(&checksum::append("$PSTRICT,1"), &mut state));
        assert!(state.keys.is_set(1));
    }

    #[test]
    fn test_policy_override() {
        let mut dispatcher = key_dispatcher();
        let mut state = TelemetryState::default();

        dispatcher.set_policy(key::PDKEY, ChecksumPolicy::Unchecked);
        assert_eq!(dispatcher.policy_for(key::PDKEY), Some(ChecksumPolicy::Unchecked));
        assert!(dispatcher.parse_line("$PDKEY,3*00", &mut state));
        assert!(state.keys.is_set(3));

        dispatcher.set_policy(key::PDKEY, ChecksumPolicy::Required);
        assert!(!dispatcher.parse_line("$PDKEY,4", &mut state));
        assert!(!state.keys.is_set(4));
        assert_eq!(dispatcher.policy_for("$NOPE"), None);
    }

    #[test]
    fn test_handler_declining_counts_unhandled() {
        let mut registry = DriverRegistry::new("picky");
        registry
            .register_with_policy("$PPICKY", ChecksumPolicy::Unchecked, |_, _| false)
            .unwrap();
        let mut dispatcher = IngestDispatcher::new(registry);

        assert!(!dispatcher.parse_line("$PPICKY", &mut TelemetryState::default()));
        assert_eq!(dispatcher.stats().unhandled, 1);
        dispatcher.reset_stats();
        assert_eq!(dispatcher.stats(), DispatchStats::default());
    }

    #[test]
    fn test_chain_tries_next() {
        let mut chain = DispatchChain::from_catalog(
            &["nmea-key".to_string(), "nmea".to_string()],
            &HashMap::new(),
        )
        .unwrap();
        let mut state = TelemetryState::default();

        assert!(chain.parse_line("$PDKEY,1", &mut state));
        assert!(chain.parse_line(&checksum::append("$HEHDT,90.0,T"), &mut state));
        assert!(!chain.parse_line("$HEHDT,90.0,T", &mut state));
        assert!(!chain.parse_line("$XXXXX", &mut state));
        assert_eq!(state.heading, Some(90.0));

        let stats = chain.stats();
        assert_eq!(stats[0].0, "nmea-key");
        assert_eq!(stats[0].1.handled, 1);
        assert_eq!(stats[1].1.handled, 1);
        assert_eq!(stats[1].1.checksum_rejected, 1);
    }

    #[test]
    fn test_chain_overrides_and_unknown_driver() {
        let overrides = HashMap::from([("$HEHDT".to_string(), ChecksumPolicy::IfPresent)]);
        let chain = DispatchChain::from_catalog(&["nmea".to_string()], &overrides).unwrap();
        assert_eq!(
            chain.dispatchers()[0].policy_for("$HEHDT"),
            Some(ChecksumPolicy::IfPresent)
        );

        let err = DispatchChain::from_catalog(&["garmin".to_string()], &HashMap::new()).unwrap_err();
        assert_eq!(err, DispatchError::UnknownDriver("garmin".into()));
    }
}
