//! Configuration module for History-Mirror
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Paths, credentials and the site URL all live here rather than in code.
//!
//! # Example
//!
//! ```no_run
//! use history_mirror::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("mirror.toml")).unwrap();
//! println!("Archiving {} into {}", config.site.url, config.archive.root);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    ApiConfig, ArchiveConfig, BrowserConfig, Config, CrawlConfig, OutputConfig, SiteConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash};
