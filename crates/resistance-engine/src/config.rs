use std::time::Duration;

use serde::Deserialize;

use resistance_core::round_config::RoundConfig;

/// Engine configuration, loaded from `resistance.toml` (or the file named by
/// `RESISTANCE_CONFIG`) and overridden by `RESISTANCE_*` env vars.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub min_players: usize,
    pub max_players: usize,
    /// Lobby wait before the game auto-starts.
    pub init_wait_secs: u64,
    pub voting_timeout_secs: u64,
    /// Failed team votes tolerated in one round before the spies win.
    pub max_voting_rounds: usize,
    pub mission_timeout_secs: u64,
    /// Fixed seed for seating and role dealing. Unset draws from the OS.
    pub seed: Option<u64>,
    pub pacing: PacingConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_players: 5,
            max_players: 10,
            init_wait_secs: 180,
            voting_timeout_secs: 30,
            max_voting_rounds: 5,
            mission_timeout_secs: 30,
            seed: None,
            pacing: PacingConfig::default(),
        }
    }
}

/// Announcement pacing between phases. Zero disables a pause.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    pub pick_delay_ms: u64,
    pub result_delay_ms: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            pick_delay_ms: 1000,
            result_delay_ms: 2000,
        }
    }
}

impl PacingConfig {
    pub fn disabled() -> Self {
        Self {
            pick_delay_ms: 0,
            result_delay_ms: 0,
        }
    }
}

/// Rejected configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Parse(String),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(m) => write!(f, "failed to parse config: {m}"),
            Self::Invalid(m) => write!(f, "invalid config: {m}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl EngineConfig {
    pub const DEFAULT_PATH: &'static str = "resistance.toml";

    pub fn init_wait(&self) -> Duration {
        Duration::from_secs(self.init_wait_secs)
    }

    pub fn voting_timeout(&self) -> Duration {
        Duration::from_secs(self.voting_timeout_secs)
    }

    pub fn mission_timeout(&self) -> Duration {
        Duration::from_secs(self.mission_timeout_secs)
    }

    pub fn pick_delay(&self) -> Duration {
        Duration::from_millis(self.pacing.pick_delay_ms)
    }

    pub fn result_delay(&self) -> Duration {
        Duration::from_millis(self.pacing.result_delay_ms)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Check hard constraints. Ranges that include player counts without a
    /// round table entry are allowed but logged, since `start` will refuse
    /// those rosters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_players == 0 {
            return Err(ConfigError::Invalid("min_players must be > 0".to_string()));
        }
        if self.min_players > self.max_players {
            return Err(ConfigError::Invalid(format!(
                "min_players ({}) exceeds max_players ({})",
                self.min_players, self.max_players
            )));
        }
        if self.max_voting_rounds == 0 {
            return Err(ConfigError::Invalid(
                "max_voting_rounds must be > 0".to_string(),
            ));
        }

        let unsupported: Vec<usize> = (self.min_players..=self.max_players)
            .filter(|n| RoundConfig::lookup(*n).is_none())
            .collect();
        if !unsupported.is_empty() {
            tracing::warn!(
                ?unsupported,
                "player range includes counts with no round table entry"
            );
        }
        if self.voting_timeout_secs == 0 || self.mission_timeout_secs == 0 {
            tracing::warn!("zero voting or mission timeout closes phases immediately");
        }
        Ok(())
    }

    /// Load config from the file named by `RESISTANCE_CONFIG`, else
    /// `resistance.toml` if it exists, then apply env var overrides.
    pub fn load() -> Self {
        let path = std::env::var("RESISTANCE_CONFIG")
            .ok()
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| Self::DEFAULT_PATH.to_string());

        let mut config = match std::fs::read_to_string(&path) {
            Ok(content) => match Self::from_toml_str(&content) {
                Ok(cfg) => {
                    tracing::info!(%path, "Loaded configuration");
                    cfg
                },
                Err(e) => {
                    tracing::warn!(%path, "{e}, using defaults");
                    Self::default()
                },
            },
            Err(_) => {
                tracing::info!(%path, "No config file found, using defaults");
                Self::default()
            },
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        config
    }

    /// Apply `RESISTANCE_*` overrides from `lookup`. Unparseable values are
    /// ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let usize_var = |key: &str| lookup(key).and_then(|v| v.parse::<usize>().ok());
        let u64_var = |key: &str| lookup(key).and_then(|v| v.parse::<u64>().ok());

        if let Some(n) = usize_var("RESISTANCE_MIN_PLAYERS") {
            self.min_players = n;
        }
        if let Some(n) = usize_var("RESISTANCE_MAX_PLAYERS") {
            self.max_players = n;
        }
        if let Some(n) = u64_var("RESISTANCE_INIT_WAIT_SECS") {
            self.init_wait_secs = n;
        }
        if let Some(n) = u64_var("RESISTANCE_VOTING_TIMEOUT_SECS") {
            self.voting_timeout_secs = n;
        }
        if let Some(n) = usize_var("RESISTANCE_MAX_VOTING_ROUNDS") {
            self.max_voting_rounds = n;
        }
        if let Some(n) = u64_var("RESISTANCE_MISSION_TIMEOUT_SECS") {
            self.mission_timeout_secs = n;
        }
        if let Some(n) = u64_var("RESISTANCE_SEED") {
            self.seed = Some(n);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.min_players, 5);
        assert_eq!(cfg.max_players, 10);
        assert_eq!(cfg.init_wait(), Duration::from_secs(180));
        assert_eq!(cfg.voting_timeout(), Duration::from_secs(30));
        assert_eq!(cfg.max_voting_rounds, 5);
        assert_eq!(cfg.mission_timeout(), Duration::from_secs(30));
        assert_eq!(cfg.pick_delay(), Duration::from_secs(1));
        assert_eq!(cfg.result_delay(), Duration::from_secs(2));
    }

    #[test]
    fn parse_partial_toml() {
        let cfg = EngineConfig::from_toml_str(
            r#"
max_players = 7
voting_timeout_secs = 10

[pacing]
pick_delay_ms = 0
"#,
        )
        .unwrap();
        assert_eq!(cfg.max_players, 7);
        assert_eq!(cfg.voting_timeout_secs, 10);
        assert_eq!(cfg.min_players, 5);
        assert_eq!(cfg.pacing.pick_delay_ms, 0);
        assert_eq!(cfg.pacing.result_delay_ms, 2000);
    }

    #[test]
    fn parse_rejects_wrong_types() {
        let err = EngineConfig::from_toml_str("min_players = \"five\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn validate_accepts_defaults() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_min_players() {
        let cfg = EngineConfig {
            min_players: 0,
            ..EngineConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn validate_rejects_inverted_range() {
        let cfg = EngineConfig {
            min_players: 8,
            max_players: 6,
            ..EngineConfig::default()
        };
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("exceeds max_players"));
    }

    #[test]
    fn validate_rejects_zero_voting_rounds() {
        let cfg = EngineConfig {
            max_voting_rounds: 0,
            ..EngineConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn unsupported_counts_only_warn() {
        let cfg = EngineConfig {
            min_players: 1,
            max_players: 12,
            ..EngineConfig::default()
        };
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn overrides_replace_parsed_values() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("RESISTANCE_MIN_PLAYERS", "6"),
            ("RESISTANCE_VOTING_TIMEOUT_SECS", "5"),
            ("RESISTANCE_MAX_VOTING_ROUNDS", "not-a-number"),
        ]);
        let mut cfg = EngineConfig::default();
        cfg.apply_overrides(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(cfg.min_players, 6);
        assert_eq!(cfg.voting_timeout_secs, 5);
        assert_eq!(cfg.max_voting_rounds, 5);
    }
}
