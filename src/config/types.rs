use serde::Deserialize;

/// Main configuration structure for History-Mirror
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub site: SiteConfig,
    pub api: ApiConfig,
    pub browser: BrowserConfig,
    pub archive: ArchiveConfig,
    #[serde(default)]
    pub crawl: CrawlConfig,
    pub output: OutputConfig,
}

/// The wiki being mirrored
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Site identifier used by the remote API (e.g., "fancyclopedia")
    pub name: String,

    /// Base URL pages are served from (e.g., "https://fancyclopedia.org")
    pub url: String,
}

/// Remote page-list API credentials
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// XML-RPC endpoint
    pub endpoint: String,

    /// API user name
    pub user: String,

    /// API key
    pub key: String,
}

/// Browser automation session configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BrowserConfig {
    /// URL of the WebDriver server (geckodriver, chromedriver, selenium)
    #[serde(rename = "webdriver-url")]
    pub webdriver_url: String,

    /// Browser requested from the WebDriver server
    #[serde(rename = "browser-name", default = "default_browser_name")]
    pub browser_name: String,

    /// Bound on every wait for dynamically rendered content (seconds)
    #[serde(rename = "wait-timeout-secs", default = "default_wait_timeout")]
    pub wait_timeout_secs: u64,

    /// Wiki account used to open edit areas
    #[serde(rename = "login-user", default)]
    pub login_user: Option<String>,

    #[serde(rename = "login-password", default)]
    pub login_password: Option<String>,
}

/// Local archive location
#[derive(Debug, Clone, Deserialize)]
pub struct ArchiveConfig {
    /// Root directory of the site archive
    pub root: String,
}

/// Crawl selection rules
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlConfig {
    /// Page-name prefixes of namespaces that are never archived (e.g., "system:")
    #[serde(rename = "reserved-prefixes", default)]
    pub reserved_prefixes: Vec<String>,

    /// Exact page names that are never archived
    #[serde(rename = "ignore-pages", default)]
    pub ignore_pages: Vec<String>,

    /// Resume an incremental run at this page without locating the boundary again
    #[serde(rename = "start-page", default)]
    pub start_page: Option<String>,

    /// Extra timestamp probes past the located resume boundary
    #[serde(rename = "boundary-probes", default = "default_boundary_probes")]
    pub boundary_probes: u32,

    /// Stop after this many pages have been processed in one run
    #[serde(rename = "max-pages", default)]
    pub max_pages: Option<u32>,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            reserved_prefixes: Vec::new(),
            ignore_pages: Vec::new(),
            start_page: None,
            boundary_probes: default_boundary_probes(),
            max_pages: None,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite run journal
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Path to the markdown run report
    #[serde(rename = "summary-path")]
    pub summary_path: String,
}

fn default_browser_name() -> String {
    "firefox".to_string()
}

fn default_wait_timeout() -> u64 {
    10
}

fn default_boundary_probes() -> u32 {
    2
}
