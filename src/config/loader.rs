//! Configuration loading from disk.

use std::path::Path;
use std::fs;

use serde::Deserialize;

use crate::config::schema::ProxyConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Hosts(serde_json::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Hosts(e) => write!(f, "Hosts file error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 { write!(f, ", ")?; }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ProxyConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let config: ProxyConfig = toml::from_str(&content).map_err(ConfigError::Parse)?;
    
    validate_config(&config).map_err(ConfigError::Validation)?;
    
    Ok(config)
}

#[derive(Debug, Deserialize)]
struct HostsFile {
    #[serde(default)]
    hosts: Vec<String>,
}

/// Read the startup host list (`{"hosts": [...]}`).
///
/// Returns `Ok(None)` when the file does not exist.
pub fn load_hosts(path: &Path) -> Result<Option<Vec<String>>, ConfigError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(ConfigError::Io(e)),
    };

    let file: HostsFile = serde_json::from_str(&content).map_err(ConfigError::Hosts)?;
    Ok(Some(file.hosts))
}
