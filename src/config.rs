use crate::error::{Result, TripError};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Deserialize, Clone, Serialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub identity: IdentityConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone, Serialize)]
pub struct LedgerConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone, Serialize)]
pub struct IdentityConfig {
    /// Certificate attribute naming the caller's company.
    pub company_attribute: String,
}

#[derive(Debug, Deserialize, Clone, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: Option<String>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://tripbid.db".to_string(),
        }
    }
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            company_attribute: "companyID".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: Some("pretty".to_string()),
        }
    }
}

impl AppConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .map_err(|e| TripError::Config(format!("Failed to read config file: {}", e)))?;

        let config: AppConfig = toml::from_str(&config_str)
            .map_err(|e| TripError::Config(format!("Failed to parse config file: {}", e)))?;

        Ok(config)
    }

    pub fn load_with_env_overrides<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("TRIPBID_LEDGER_URL") {
            self.ledger.url = url;
        }

        if let Ok(attribute) = std::env::var("TRIPBID_COMPANY_ATTRIBUTE") {
            self.identity.company_attribute = attribute;
        }

        if let Ok(log_level) = std::env::var("RUST_LOG") {
            self.logging.level = log_level;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.ledger.url.is_empty() {
            return Err(TripError::Config("Ledger URL cannot be empty".to_string()));
        }

        if self.identity.company_attribute.trim().is_empty() {
            return Err(TripError::Config("Company attribute name cannot be empty".to_string()));
        }

        match self.logging.format.as_deref() {
            None | Some("json") | Some("pretty") => {}
            Some(other) => {
                return Err(TripError::Config(format!("Unknown log format: {}", other)));
            }
        }

        Ok(())
    }

    pub fn is_json_logging(&self) -> bool {
        self.logging.format.as_deref() == Some("json")
    }
}

pub fn create_default_config_file<P: AsRef<Path>>(path: P) -> Result<()> {
    let default_config = AppConfig::default();
    let toml_str = toml::to_string_pretty(&default_config)
        .map_err(|e| TripError::Config(format!("Failed to serialize default config: {}", e)))?;

    std::fs::write(path, toml_str)
        .map_err(|e| TripError::Config(format!("Failed to write default config file: {}", e)))?;

    Ok(())
}
