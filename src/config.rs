//! Runtime configuration read from the environment.
//!
//! | Variable        | Meaning                                    | Default |
//! |-----------------|--------------------------------------------|---------|
//! | `NNBRIDGE_LOG`  | `tracing` filter directive                 | `warn`  |
//! | `NNBRIDGE_SEED` | Seed for parameter initialisation (`u64`)  | unset   |

pub const LOG_ENV: &str = "NNBRIDGE_LOG";
pub const SEED_ENV: &str = "NNBRIDGE_SEED";
pub const DEFAULT_LOG_FILTER: &str = "warn";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BridgeConfig {
    pub log_filter: String,
    pub seed: Option<u64>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            seed: None,
        }
    }
}

impl BridgeConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    ///
    /// Blank values count as unset. A seed that does not parse as `u64` is dropped with a warning.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let log_filter = read(LOG_ENV).unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());
        let seed = read(SEED_ENV).and_then(|raw| match raw.parse::<u64>() {
            Ok(seed) => Some(seed),
            Err(e) => {
                tracing::warn!(value = %raw, error = %e, "ignoring invalid {SEED_ENV}");
                None
            }
        });

        Self { log_filter, seed }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        assert_eq!(BridgeConfig::from_lookup(lookup(&[])), BridgeConfig::default());
    }

    #[test]
    fn test_reads_filter_and_seed() {
        let config = BridgeConfig::from_lookup(lookup(&[
            (LOG_ENV, "nnbridge=debug"),
            (SEED_ENV, " 42 "),
        ]));
        assert_eq!(config.log_filter, "nnbridge=debug");
        assert_eq!(config.seed, Some(42));
    }

    #[test]
    fn test_invalid_seed_is_dropped() {
        let config = BridgeConfig::from_lookup(lookup(&[(SEED_ENV, "-3"), (LOG_ENV, "  ")]));
        assert_eq!(config.seed, None);
        assert_eq!(config.log_filter, DEFAULT_LOG_FILTER);
    }
}
