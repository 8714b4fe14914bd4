use crate::errors::{AppError, AppResult};
use crate::policy::TransitionPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_STORAGE_KEY: &str = "citizenEngagementSystem";
const DEFAULT_DATABASE_FILE: &str = "state.sqlite";
const CONFIG_FILE_NAME: &str = "civic.yaml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub database_file: String,
    pub storage_key: String,
    pub log_filter: String,
    pub transition_policy: TransitionPolicy,
    pub enforce_capabilities: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".civic"),
            database_file: DEFAULT_DATABASE_FILE.to_string(),
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            log_filter: "info".to_string(),
            transition_policy: TransitionPolicy::Strict,
            enforce_capabilities: true,
        }
    }
}

impl AppConfig {
    /// Defaults, then the YAML file (if any), then `CIVIC_*` environment overrides.
    pub fn load() -> AppResult<Self> {
        Self::load_from(|key| std::env::var(key).ok())
    }

    pub fn load_from(lookup: impl Fn(&str) -> Option<String>) -> AppResult<Self> {
        let mut config = Self::default();
        if let Some(dir) = lookup("CIVIC_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }

        let file = match lookup("CIVIC_CONFIG") {
            Some(path) => Some(PathBuf::from(path)),
            None => {
                let candidate = config.data_dir.join(CONFIG_FILE_NAME);
                candidate.exists().then_some(candidate)
            }
        };
        if let Some(path) = file {
            config = Self::from_yaml_file(&path)?;
            if let Some(dir) = lookup("CIVIC_DATA_DIR") {
                config.data_dir = PathBuf::from(dir);
            }
        }

        config.apply_overrides(lookup)?;
        Ok(config)
    }

    pub fn from_yaml_file(path: &Path) -> AppResult<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|error| AppError::Io(format!("failed to read {}: {}", path.display(), error)))?;
        Self::from_yaml_str(&raw)
    }

    pub fn from_yaml_str(raw: &str) -> AppResult<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(raw)?)
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> AppResult<()> {
        if let Some(key) = lookup("CIVIC_STORAGE_KEY") {
            if key.trim().is_empty() {
                return Err(AppError::Validation("CIVIC_STORAGE_KEY must not be empty".to_string()));
            }
            self.storage_key = key;
        }
        if let Some(filter) = lookup("CIVIC_LOG") {
            self.log_filter = filter;
        }
        if let Some(policy) = lookup("CIVIC_TRANSITION_POLICY") {
            self.transition_policy = match policy.trim().to_ascii_lowercase().as_str() {
                "strict" => TransitionPolicy::Strict,
                "permissive" => TransitionPolicy::Permissive,
                other => {
                    return Err(AppError::Validation(format!(
                        "CIVIC_TRANSITION_POLICY must be 'strict' or 'permissive', got '{}'",
                        other
                    )))
                }
            };
        }
        if let Some(flag) = lookup("CIVIC_ENFORCE_CAPABILITIES") {
            self.enforce_capabilities = parse_bool(&flag).ok_or_else(|| {
                AppError::Validation(format!("CIVIC_ENFORCE_CAPABILITIES is not a boolean: '{}'", flag))
            })?;
        }
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database_file)
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
