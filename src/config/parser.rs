use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads and parses a configuration file from the given path
///
/// The format is chosen by file extension: `.toml`, `.yaml`/`.yml`, or
/// `.json`.
///
/// # Arguments
///
/// * `path` - Path to the configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use pagetrail::config::load_config;
///
/// let config = load_config(Path::new("quotes.toml")).unwrap();
/// println!("Start URL: {}", config.spec.start_url);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    let config = parse_config(&content, &extension)?;

    validate(&config)?;

    Ok(config)
}

/// Parses configuration text in the format named by `extension`
pub fn parse_config(content: &str, extension: &str) -> Result<Config, ConfigError> {
    let config: Config = match extension {
        "toml" => toml::from_str(content)?,
        "yaml" | "yml" => serde_yaml::from_str(content)?,
        "json" => serde_json::from_str(content)?,
        other => return Err(ConfigError::UnsupportedFormat(format!(".{}", other))),
    };
    Ok(config)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// Logged at start-up and shown in the run summary so that output files can
/// be traced back to the exact configuration that produced them.
///
/// # Returns
///
/// * `Ok(String)` - Hex-encoded SHA-256 hash of the file content
/// * `Err(ConfigError)` - Failed to read the file
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&content);
    Ok(hex::encode(hasher.finalize()))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}
