//! Store configuration.
//!
//! There is no config file layer: the store has no persisted state to
//! locate on disk, so configuration is just a validated builder, in the
//! spirit of a plain settings struct rather than a `figment`/`config`-style
//! loader.

use std::time::Duration;

use crate::error::StoreError;

/// Tunables for an [`crate::MvccStore`]-equivalent instance.
///
/// `initial_capacity` is performance-only. `transaction_timeout` bounds
/// every `lockZ`/`lockRange` wait issued by a write operation. `vacuum_rate`
/// is documentation only: the store does not own a scheduler, so nothing
/// reads this field internally — it exists so callers that *do* run a
/// vacuum loop have one place to configure its period.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    initial_capacity: usize,
    transaction_timeout: Duration,
    vacuum_rate: Duration,
}

impl StoreConfig {
    /// Start building a config with the store's defaults.
    pub fn builder() -> StoreConfigBuilder {
        StoreConfigBuilder::default()
    }

    /// Pre-sizing hint for the primary index.
    pub fn initial_capacity(&self) -> usize {
        self.initial_capacity
    }

    /// Timeout applied to every `lockZ`/`lockRange` acquisition.
    pub fn transaction_timeout(&self) -> Duration {
        self.transaction_timeout
    }

    /// Interval an external scheduler should call `vacuum()` at.
    pub fn vacuum_rate(&self) -> Duration {
        self.vacuum_rate
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            initial_capacity: 0,
            transaction_timeout: Duration::from_millis(500),
            vacuum_rate: Duration::from_secs(30),
        }
    }
}

/// Builder for [`StoreConfig`]; validates at [`StoreConfigBuilder::build`].
#[derive(Debug, Clone)]
pub struct StoreConfigBuilder {
    initial_capacity: usize,
    transaction_timeout: Duration,
    vacuum_rate: Duration,
}

impl Default for StoreConfigBuilder {
    fn default() -> Self {
        let defaults = StoreConfig::default();
        Self {
            initial_capacity: defaults.initial_capacity,
            transaction_timeout: defaults.transaction_timeout,
            vacuum_rate: defaults.vacuum_rate,
        }
    }
}

impl StoreConfigBuilder {
    /// Set `initial-capacity`.
    pub fn initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = capacity;
        self
    }

    /// Set `transaction.timeout`.
    pub fn transaction_timeout(mut self, timeout: Duration) -> Self {
        self.transaction_timeout = timeout;
        self
    }

    /// Set `vacuum-rate`.
    pub fn vacuum_rate(mut self, rate: Duration) -> Self {
        self.vacuum_rate = rate;
        self
    }

    /// Validate and produce a [`StoreConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidArgument`] if `transaction_timeout` is
    /// zero.
    pub fn build(self) -> Result<StoreConfig, StoreError> {
        if self.transaction_timeout.is_zero() {
            return Err(StoreError::InvalidArgument(
                "transaction.timeout must be positive".into(),
            ));
        }
        Ok(StoreConfig {
            initial_capacity: self.initial_capacity,
            transaction_timeout: self.transaction_timeout,
            vacuum_rate: self.vacuum_rate,
        })
    }
}
