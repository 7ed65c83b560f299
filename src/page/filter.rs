use crate::config::CrawlConfig;

/// Page classification types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageClassification {
    /// Page should be archived
    Archive,
    /// Page lives in a reserved namespace - never archived
    ReservedNamespace,
    /// Page is on the explicit ignore list - never archived
    Ignored,
}

/// Classifies a remote page name according to the crawl rules
///
/// Checks, in priority order:
/// 1. Reserved namespace prefixes
/// 2. Ignore set
/// 3. Archive (default)
///
/// Matching is done on the raw remote name, before normalization.
pub fn classify_page(raw_name: &str, config: &CrawlConfig) -> PageClassification {
    if config
        .reserved_prefixes
        .iter()
        .any(|prefix| raw_name.starts_with(prefix.as_str()))
    {
        return PageClassification::ReservedNamespace;
    }

    if config.ignore_pages.iter().any(|name| name == raw_name) {
        return PageClassification::Ignored;
    }

    PageClassification::Archive
}
