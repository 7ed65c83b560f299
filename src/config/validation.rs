use crate::config::types::{
    ApiConfig, ArchiveConfig, BrowserConfig, Config, CrawlConfig, OutputConfig, SiteConfig,
};
use crate::{ConfigError, ConfigResult};
use url::Url;

/// Validates the entire configuration
///
/// Failures are prefixed with the TOML section they come from, e.g.
/// `[browser] login-user and login-password must be given together`.
pub fn validate(config: &Config) -> ConfigResult<()> {
    in_section("site", validate_site_config(&config.site))?;
    in_section("api", validate_api_config(&config.api))?;
    in_section("browser", validate_browser_config(&config.browser))?;
    in_section("archive", validate_archive_config(&config.archive))?;
    in_section("crawl", validate_crawl_config(&config.crawl))?;
    in_section("output", validate_output_config(&config.output))?;
    Ok(())
}

fn in_section(section: &str, result: ConfigResult<()>) -> ConfigResult<()> {
    result.map_err(|e| match e {
        ConfigError::Validation(message) => {
            ConfigError::Validation(format!("[{}] {}", section, message))
        }
        ConfigError::InvalidUrl(message) => {
            ConfigError::InvalidUrl(format!("[{}] {}", section, message))
        }
        other => other,
    })
}

/// Validates the site section
fn validate_site_config(config: &SiteConfig) -> ConfigResult<()> {
    if config.name.is_empty() {
        return Err(ConfigError::Validation(
            "site name cannot be empty".to_string(),
        ));
    }

    if !config
        .name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "site name must contain only alphanumeric characters and hyphens, got '{}'",
            config.name
        )));
    }

    validate_http_url("site url", &config.url)
}

/// Validates API credentials
fn validate_api_config(config: &ApiConfig) -> ConfigResult<()> {
    validate_http_url("api endpoint", &config.endpoint)?;

    if config.user.is_empty() {
        return Err(ConfigError::Validation(
            "api user cannot be empty".to_string(),
        ));
    }

    if config.key.is_empty() {
        return Err(ConfigError::Validation("api key cannot be empty".to_string()));
    }

    Ok(())
}

/// Validates the browser session section
fn validate_browser_config(config: &BrowserConfig) -> ConfigResult<()> {
    validate_http_url("webdriver-url", &config.webdriver_url)?;

    if config.browser_name.is_empty() {
        return Err(ConfigError::Validation(
            "browser-name cannot be empty".to_string(),
        ));
    }

    if config.wait_timeout_secs < 1 || config.wait_timeout_secs > 300 {
        return Err(ConfigError::Validation(format!(
            "wait-timeout-secs must be between 1 and 300, got {}",
            config.wait_timeout_secs
        )));
    }

    // Credentials come as a pair or not at all
    if config.login_user.is_some() != config.login_password.is_some() {
        return Err(ConfigError::Validation(
            "login-user and login-password must be given together".to_string(),
        ));
    }

    Ok(())
}

/// Validates the archive section
fn validate_archive_config(config: &ArchiveConfig) -> ConfigResult<()> {
    if config.root.is_empty() {
        return Err(ConfigError::Validation(
            "archive root cannot be empty".to_string(),
        ));
    }
    Ok(())
}

/// Validates crawl selection rules
fn validate_crawl_config(config: &CrawlConfig) -> ConfigResult<()> {
    if config.reserved_prefixes.iter().any(|p| p.is_empty()) {
        return Err(ConfigError::Validation(
            "reserved-prefixes cannot contain an empty prefix".to_string(),
        ));
    }

    if config.ignore_pages.iter().any(|p| p.is_empty()) {
        return Err(ConfigError::Validation(
            "ignore-pages cannot contain an empty page name".to_string(),
        ));
    }

    if let Some(start) = &config.start_page {
        if start.is_empty() {
            return Err(ConfigError::Validation(
                "start-page cannot be empty".to_string(),
            ));
        }
    }

    if config.boundary_probes > 64 {
        return Err(ConfigError::Validation(format!(
            "boundary-probes must be <= 64, got {}",
            config.boundary_probes
        )));
    }

    if config.max_pages == Some(0) {
        return Err(ConfigError::Validation(
            "max-pages must be >= 1 when set".to_string(),
        ));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> ConfigResult<()> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    if config.summary_path.is_empty() {
        return Err(ConfigError::Validation(
            "summary_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Checks that a value parses as an http(s) URL
fn validate_http_url(field: &str, value: &str) -> ConfigResult<()> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", field, value, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "{} '{}' must use http or https",
            field, value
        )));
    }

    Ok(())
}
