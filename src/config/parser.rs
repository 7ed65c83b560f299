use crate::config::types::Config;
use crate::config::validation::validate;
use crate::{ConfigError, ConfigResult};
use sha2::{Digest, Sha256};
use std::path::Path;

fn read_config_file(path: &Path) -> ConfigResult<String> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_config(path: &Path, content: &str) -> ConfigResult<Config> {
    let config: Config = toml::from_str(content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    validate(&config)?;
    Ok(config)
}

fn hash_content(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

/// Loads a mirror configuration, checking every section
///
/// # Returns
///
/// * `Ok(Config)` - The validated configuration
/// * `Err(ConfigError::Read)` / `Err(ConfigError::Parse)` - Naming the file
/// * `Err(ConfigError::Validation)` / `Err(ConfigError::InvalidUrl)` - Naming the section
pub fn load_config(path: &Path) -> ConfigResult<Config> {
    parse_config(path, &read_config_file(path)?)
}

/// SHA-256 of the configuration file, recorded with every run in the journal
///
/// Lets a report tell whether two runs used the same site, archive and
/// selection rules.
pub fn compute_config_hash(path: &Path) -> ConfigResult<String> {
    Ok(hash_content(&read_config_file(path)?))
}

/// Loads a configuration and hashes the exact text that was parsed
pub fn load_config_with_hash(path: &Path) -> ConfigResult<(Config, String)> {
    let content = read_config_file(path)?;
    let config = parse_config(path, &content)?;
    Ok((config, hash_content(&content)))
}
