use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::config::CompetitionConfig;

/// Configuration validation error types.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid jurors: {0}. Must be at least 1")]
    InvalidJurors(usize),

    #[error("Invalid quorum: {quorum}. Must be between 1 and jurors ({jurors})")]
    InvalidQuorum { quorum: usize, jurors: usize },

    #[error("Invalid max_turns: {0}. Must be at least 1")]
    InvalidMaxTurns(u32),

    #[error("Invalid rubric weight for {dimension}: {value}. Must be non-negative")]
    InvalidWeight { dimension: &'static str, value: f64 },

    #[error("Invalid rubric scale: {0}. Must be positive")]
    InvalidScale(f64),

    #[error("Invalid detector window: {0}. Must be at least 1")]
    InvalidWindow(usize),

    #[error("Invalid threshold for {check}: {value}. Must be in [0, 1]")]
    InvalidThreshold { check: &'static str, value: f64 },

    #[error("Invalid max_turn_gap: {0}. Must be at least 1")]
    InvalidMaxTurnGap(u32),

    #[error("Invalid min_active: {0}. Must be at least 1")]
    InvalidMinActive(usize),

    #[error("Invalid max_retries: {0}. Cannot be 0")]
    InvalidMaxAttempts(u32),

    #[error(
        "Invalid backoff configuration: initial_backoff_ms ({0}) must be less than max_backoff_ms ({1})"
    )]
    InvalidBackoff(u64, u64),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid budget: {0}. max_tokens and max_seconds must be positive")]
    InvalidBudget(&'static str),
}

/// Configuration loader with hierarchical merging.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging.
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. `agon.yaml` in the working directory
    /// 3. Environment variables (`AGON_*` prefix, highest priority)
    pub fn load() -> Result<CompetitionConfig> {
        let config: CompetitionConfig = Figment::new()
            .merge(Serialized::defaults(CompetitionConfig::default()))
            .merge(Yaml::file("agon.yaml"))
            .merge(Env::prefixed("AGON_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<CompetitionConfig> {
        let config: CompetitionConfig = Figment::new()
            .merge(Serialized::defaults(CompetitionConfig::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading.
    pub fn validate(config: &CompetitionConfig) -> Result<(), ConfigError> {
        if config.max_turns == 0 {
            return Err(ConfigError::InvalidMaxTurns(config.max_turns));
        }

        if config.jury.jurors == 0 {
            return Err(ConfigError::InvalidJurors(config.jury.jurors));
        }
        if let Some(quorum) = config.jury.quorum {
            if quorum == 0 || quorum > config.jury.jurors {
                return Err(ConfigError::InvalidQuorum {
                    quorum,
                    jurors: config.jury.jurors,
                });
            }
        }

        let weights = [
            ("novelty", config.rubric.novelty),
            ("builds_on_others", config.rubric.builds_on_others),
            ("solves_subproblem", config.rubric.solves_subproblem),
            ("radical_idea", config.rubric.radical_idea),
            ("manipulation", config.rubric.manipulation),
        ];
        for (dimension, value) in weights {
            if value < 0.0 || !value.is_finite() {
                return Err(ConfigError::InvalidWeight { dimension, value });
            }
        }
        if config.rubric.scale <= 0.0 || !config.rubric.scale.is_finite() {
            return Err(ConfigError::InvalidScale(config.rubric.scale));
        }

        if config.detector.window == 0 {
            return Err(ConfigError::InvalidWindow(config.detector.window));
        }
        let thresholds = [
            ("paraphrase", config.detector.paraphrase.threshold),
            ("repetition", config.detector.repetition.threshold),
            ("orbiting", config.detector.orbiting.threshold),
        ];
        for (check, value) in thresholds {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidThreshold { check, value });
            }
        }

        if config.selector.max_turn_gap == 0 {
            return Err(ConfigError::InvalidMaxTurnGap(config.selector.max_turn_gap));
        }
        if config.elimination.min_active == 0 {
            return Err(ConfigError::InvalidMinActive(config.elimination.min_active));
        }

        if config.retry.max_attempts == 0 {
            return Err(ConfigError::InvalidMaxAttempts(config.retry.max_attempts));
        }
        if config.retry.initial_backoff_ms >= config.retry.max_backoff_ms {
            return Err(ConfigError::InvalidBackoff(
                config.retry.initial_backoff_ms,
                config.retry.max_backoff_ms,
            ));
        }

        for (name, budget) in [
            ("budgets.speak", config.budgets.speak),
            ("budgets.judge", config.budgets.judge),
        ] {
            if budget.max_tokens == 0 || budget.max_seconds == 0 {
                return Err(ConfigError::InvalidBudget(name));
            }
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }
        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(ConfigLoader::validate(&CompetitionConfig::default()).is_ok());
    }

    #[test]
    fn test_zero_jurors_rejected() {
        let config = CompetitionConfig {
            jury: crate::domain::models::JuryConfig {
                jurors: 0,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidJurors(0))
        ));
    }

    #[test]
    fn test_quorum_above_jurors_rejected() {
        let config = CompetitionConfig {
            jury: crate::domain::models::JuryConfig {
                quorum: Some(5),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidQuorum { quorum: 5, jurors: 3 })
        ));
    }

    #[test]
    fn test_negative_weight_rejected() {
        let config = CompetitionConfig {
            rubric: crate::domain::models::RubricWeights {
                novelty: -0.1,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidWeight { dimension: "novelty", .. })
        ));
    }

    #[test]
    fn test_out_of_range_threshold_rejected() {
        let config = CompetitionConfig {
            detector: crate::domain::models::DetectorConfig {
                paraphrase: crate::domain::models::CheckConfig {
                    enabled: true,
                    threshold: 1.5,
                    penalty: -0.6,
                },
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidThreshold { check: "paraphrase", .. })
        ));
    }

    #[test]
    fn test_load_from_yaml_file() {
        let dir = std::env::temp_dir().join("agon-config-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("partial.yaml");
        std::fs::write(&path, "seed: 123\njury:\n  jurors: 5\n").unwrap();

        let config = ConfigLoader::load_from_file(&path).unwrap();
        assert_eq!(config.seed, 123);
        assert_eq!(config.jury.jurors, 5);
        assert_eq!(config.max_turns, 40);
    }
}
