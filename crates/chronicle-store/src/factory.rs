//! Recorder factory and store configuration.

use std::sync::Arc;

use chronicle_core::clock::{Clock, SystemClock};
use chronicle_core::error::RecorderError;
use chronicle_core::store::PartitionStore;

use crate::aggregate_recorder::AggregateRecorder;
use crate::application_recorder::ApplicationRecorder;
use crate::process_recorder::ProcessRecorder;

/// Location of the backing store, read from the environment and validated
/// before any recorder is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Store (table) identifier. Mandatory.
    pub store: String,
    /// Alternate backend endpoint address. Optional; adapters fall back to
    /// their default endpoint.
    pub endpoint: Option<String>,
}

impl StoreConfig {
    /// Environment variable naming the store identifier.
    pub const STORE_ENV: &'static str = "CHRONICLE_STORE";
    /// Environment variable naming the alternate endpoint address.
    pub const ENDPOINT_ENV: &'static str = "CHRONICLE_ENDPOINT";

    /// Creates a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`RecorderError::Configuration`] if `store` is not a plain
    /// identifier (`[A-Za-z_][A-Za-z0-9_]*`). The restriction also keeps the
    /// name safe to interpolate as a SQL table identifier.
    pub fn new(
        store: impl Into<String>,
        endpoint: Option<String>,
    ) -> Result<Self, RecorderError> {
        let store = store.into();
        let mut chars = store.chars();
        let valid = chars
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid {
            return Err(RecorderError::Configuration(format!(
                "store identifier {store:?} must match [A-Za-z_][A-Za-z0-9_]*"
            )));
        }
        Ok(Self { store, endpoint })
    }

    /// Reads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`RecorderError::Configuration`] if `CHRONICLE_STORE` is
    /// missing or invalid.
    pub fn from_env() -> Result<Self, RecorderError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads the configuration through `lookup`, for tests and alternative
    /// configuration sources.
    ///
    /// # Errors
    ///
    /// Returns [`RecorderError::Configuration`] if the store identifier is
    /// missing or invalid.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, RecorderError> {
        let store = lookup(Self::STORE_ENV).ok_or_else(|| {
            RecorderError::Configuration(format!(
                "store identifier not found in environment with key '{}'",
                Self::STORE_ENV
            ))
        })?;
        Self::new(store, lookup(Self::ENDPOINT_ENV))
    }
}

/// Wires recorders of the three capability levels over one shared store.
pub struct Factory {
    store: Arc<dyn PartitionStore>,
    clock: Arc<dyn Clock>,
}

impl Factory {
    /// Creates a factory over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn PartitionStore>) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    /// Creates a factory whose recorders stamp `created_at` from `clock`.
    #[must_use]
    pub fn with_clock(store: Arc<dyn PartitionStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// A recorder for plain aggregate event sequences.
    #[must_use]
    pub fn aggregate_recorder(&self) -> AggregateRecorder {
        AggregateRecorder::with_clock(Arc::clone(&self.store), Arc::clone(&self.clock))
    }

    /// A recorder that also maintains the application's notification log.
    #[must_use]
    pub fn application_recorder(&self) -> ApplicationRecorder {
        ApplicationRecorder::with_clock(Arc::clone(&self.store), Arc::clone(&self.clock))
    }

    /// A recorder that also maintains the tracking ledger for process-style
    /// consumers.
    #[must_use]
    pub fn process_recorder(&self) -> ProcessRecorder {
        ProcessRecorder::with_clock(Arc::clone(&self.store), Arc::clone(&self.clock))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_requires_store_identifier() {
        let err = StoreConfig::from_lookup(|_| None).unwrap_err();
        match err {
            RecorderError::Configuration(message) => {
                assert!(message.contains(StoreConfig::STORE_ENV));
            }
            other => panic!("expected Configuration, got {other:?}"),
        }
    }

    #[test]
    fn test_config_reads_store_and_endpoint() {
        let config = StoreConfig::from_lookup(|name| match name {
            StoreConfig::STORE_ENV => Some("chronicle_events".to_string()),
            StoreConfig::ENDPOINT_ENV => Some("postgres://localhost:5433/events".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.store, "chronicle_events");
        assert_eq!(
            config.endpoint.as_deref(),
            Some("postgres://localhost:5433/events")
        );
    }

    #[test]
    fn test_config_endpoint_is_optional() {
        let config = StoreConfig::from_lookup(|name| {
            (name == StoreConfig::STORE_ENV).then(|| "chronicle_events".to_string())
        })
        .unwrap();
        assert!(config.endpoint.is_none());
    }

    #[test]
    fn test_config_rejects_invalid_identifiers() {
        for bad in ["", "1events", "events;drop", "ev-ents", "ev ents"] {
            let result = StoreConfig::new(bad, None);
            assert!(
                matches!(result, Err(RecorderError::Configuration(_))),
                "expected {bad:?} to be rejected"
            );
        }
    }
}
