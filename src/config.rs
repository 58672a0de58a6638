use crate::error::{RosterError, RosterResult};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub history: HistoryConfig,
    pub autosave: AutosaveConfig,
    pub matching: MatchConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Maximum number of entries kept in the undo log.
    pub max_history: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { max_history: 50 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AutosaveConfig {
    pub enabled: bool,
    /// Directory backing the file key-value store.
    pub path: PathBuf,
    pub key: String,
    pub interval_secs: u64,
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: PathBuf::from(".roster/autosave"),
            key: "roster-autosave".to_string(),
            interval_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    /// Minimum score the top candidate needs for an automatic assignment.
    pub auto_assign_threshold: u8,
    /// Ceiling applied to candidates failing a mandatory requirement.
    pub mandatory_failure_cap: u8,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            auto_assign_threshold: 50,
            mandatory_failure_cap: 40,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

pub fn load_config(path: Option<&Path>) -> RosterResult<AppConfig> {
    let mut builder = Config::builder()
        .add_source(File::with_name("roster").required(false))
        .add_source(Environment::with_prefix("ROSTER").separator("__"));

    if let Some(path) = path {
        builder = builder.add_source(File::from(path).required(false));
    }

    let config = builder
        .build()
        .map_err(|err| RosterError::ConfigError(err.to_string()))?;

    let parsed: AppConfig = config
        .try_deserialize()
        .map_err(|err| RosterError::ConfigError(err.to_string()))?;

    if parsed.history.max_history == 0 {
        return Err(RosterError::ConfigError(
            "history.max_history must be at least 1".to_string(),
        ));
    }

    if parsed.matching.mandatory_failure_cap >= parsed.matching.auto_assign_threshold {
        return Err(RosterError::ConfigError(format!(
            "matching.mandatory_failure_cap ({}) must stay below auto_assign_threshold ({})",
            parsed.matching.mandatory_failure_cap, parsed.matching.auto_assign_threshold
        )));
    }

    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_without_sources() {
        let config = load_config(None).unwrap();
        assert_eq!(config.history.max_history, 50);
        assert_eq!(config.matching.auto_assign_threshold, 50);
        assert_eq!(config.matching.mandatory_failure_cap, 40);
        assert_eq!(config.autosave.key, "roster-autosave");
    }

    #[test]
    fn test_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[history]\nmax_history = 10\n\n[server]\nport = 9000").unwrap();

        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.history.max_history, 10);
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1");
    }

    #[test]
    fn test_cap_must_stay_below_threshold() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[matching]\nauto_assign_threshold = 30").unwrap();

        assert!(matches!(
            load_config(Some(file.path())),
            Err(RosterError::ConfigError(_))
        ));
    }
}
