//! Configuration for the processor module.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::ConfigError;

/// Configuration for the async fetch/emit pipeline.
///
/// Read once when the processor is built; never changes afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessorConfig {
    /// Capacity of the intake queue (tuples waiting for a fetch worker).
    #[serde(default = "default_queue_size")]
    pub queue_size: usize,

    /// Number of fetch/process workers, each owning one processing client.
    #[serde(default = "default_num_clients")]
    pub num_clients: usize,

    /// Number of emit workers.
    #[serde(default = "default_num_emitters")]
    pub num_emitters: usize,

    /// Ceiling for stop-signal and result hand-off waits, in milliseconds.
    /// Hitting it means a consumer stopped making progress.
    #[serde(default = "default_max_offer_wait")]
    pub max_offer_wait_ms: u64,
}

fn default_queue_size() -> usize {
    10_000
}

fn default_num_clients() -> usize {
    4
}

fn default_num_emitters() -> usize {
    1
}

fn default_max_offer_wait() -> u64 {
    120_000 // 2 minutes
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            queue_size: default_queue_size(),
            num_clients: default_num_clients(),
            num_emitters: default_num_emitters(),
            max_offer_wait_ms: default_max_offer_wait(),
        }
    }
}

impl ProcessorConfig {
    /// Sets the intake queue capacity.
    pub fn with_queue_size(mut self, size: usize) -> Self {
        self.queue_size = size;
        self
    }

    /// Sets the number of fetch workers.
    pub fn with_num_clients(mut self, n: usize) -> Self {
        self.num_clients = n;
        self
    }

    /// Sets the number of emit workers.
    pub fn with_num_emitters(mut self, n: usize) -> Self {
        self.num_emitters = n;
        self
    }

    /// Sets the hand-off ceiling.
    pub fn with_max_offer_wait(mut self, wait: Duration) -> Self {
        self.max_offer_wait_ms = wait.as_millis() as u64;
        self
    }

    /// Hand-off ceiling as a duration.
    pub fn max_offer_wait(&self) -> Duration {
        Duration::from_millis(self.max_offer_wait_ms)
    }

    /// Total number of workers across both pools.
    pub fn total_workers(&self) -> usize {
        self.num_clients + self.num_emitters
    }

    /// Checks that the pipeline can be built from this configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue_size == 0 {
            return Err(ConfigError::ValidationError(
                "processor.queue_size cannot be 0".to_string(),
            ));
        }
        if self.num_clients == 0 {
            return Err(ConfigError::ValidationError(
                "processor.num_clients cannot be 0".to_string(),
            ));
        }
        if self.num_emitters == 0 {
            return Err(ConfigError::ValidationError(
                "processor.num_emitters cannot be 0".to_string(),
            ));
        }
        if self.max_offer_wait_ms == 0 {
            return Err(ConfigError::ValidationError(
                "processor.max_offer_wait_ms cannot be 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ProcessorConfig::default();
        assert_eq!(config.queue_size, 10_000);
        assert_eq!(config.num_clients, 4);
        assert_eq!(config.num_emitters, 1);
        assert_eq!(config.max_offer_wait(), Duration::from_secs(120));
        assert_eq!(config.total_workers(), 5);
    }

    #[test]
    fn test_config_builder() {
        let config = ProcessorConfig::default()
            .with_queue_size(5)
            .with_num_clients(2)
            .with_num_emitters(3)
            .with_max_offer_wait(Duration::from_secs(1));

        assert_eq!(config.queue_size, 5);
        assert_eq!(config.num_clients, 2);
        assert_eq!(config.num_emitters, 3);
        assert_eq!(config.max_offer_wait_ms, 1000);
    }

    #[test]
    fn test_deserialize_partial() {
        let toml = r#"
            queue_size = 50
        "#;
        let config: ProcessorConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.queue_size, 50);
        assert_eq!(config.num_clients, 4);
        assert_eq!(config.max_offer_wait_ms, 120_000);
    }

    #[test]
    fn test_validate_rejects_zero_sizes() {
        assert!(ProcessorConfig::default().validate().is_ok());
        assert!(matches!(
            ProcessorConfig::default().with_queue_size(0).validate(),
            Err(ConfigError::ValidationError(_))
        ));
        assert!(ProcessorConfig::default().with_num_clients(0).validate().is_err());
        assert!(ProcessorConfig::default().with_num_emitters(0).validate().is_err());
    }
}
