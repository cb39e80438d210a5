use serde::{Deserialize, Serialize};

use crate::processor::ProcessorConfig;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub processor: ProcessorConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.processor.queue_size, 10_000);
        assert_eq!(config.processor.num_clients, 4);
        assert_eq!(config.processor.num_emitters, 1);
    }

    #[test]
    fn test_config_roundtrips_through_toml() {
        let mut config = Config::default();
        config.processor.num_clients = 8;

        let serialized = toml::to_string(&config).unwrap();
        assert!(serialized.contains("[processor]"));
        let parsed: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(parsed.processor.num_clients, 8);
    }
}
