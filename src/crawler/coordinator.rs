//! Crawl coordinator - run orchestration
//!
//! One coordinator drives both crawl modes over a single browser session:
//! - Initial: every page oldest-first, full history, done-list checkpoint per page
//! - Incremental: pages changed since the resume checkpoint, current version only
//!
//! Per-page failures are logged, journaled and skipped; the run continues with the
//! next page. Anything else ends the run.

use crate::browser::{Browser, WebDriverSession};
use crate::config::Config;
use crate::crawler::history::HistoryWalker;
use crate::crawler::resume::ResumeLocator;
use crate::crawler::revision::{parse_row, sequence_number};
use crate::crawler::snapshot;
use crate::journal::{Journal, RunCounters, RunStatus, SqliteJournal};
use crate::page::{classify_page, PageClassification, PageId};
use crate::state::PageOutcome;
use crate::storage::{AttachedFile, CurrentPageState, DoneList, ResumeCheckpoint, VersionStore};
use crate::wikidot::{PageOrder, WikiSite, WikidotApi};
use crate::{ConfigError, MirrorError, Result};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Which kind of run to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrawlMode {
    /// Initial until the first crawl has completed, incremental afterwards
    Auto,
    Initial,
    Incremental,
}

impl CrawlMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Initial => "initial",
            Self::Incremental => "incremental",
        }
    }

    /// Resolves `Auto` against the archive's checkpoint files
    ///
    /// An archive with no done-list entries or no resume checkpoint has not finished
    /// its initial crawl. Explicit modes are returned unchanged.
    pub fn resolve(self, done: &DoneList, checkpoint: &ResumeCheckpoint) -> Self {
        match self {
            Self::Auto if done.is_empty() || !checkpoint.exists() => Self::Initial,
            Self::Auto => Self::Incremental,
            explicit => explicit,
        }
    }
}

impl fmt::Display for CrawlMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for CrawlMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "auto" => Ok(Self::Auto),
            "initial" => Ok(Self::Initial),
            "incremental" => Ok(Self::Incremental),
            other => Err(format!(
                "unknown mode '{}' (expected auto, initial or incremental)",
                other
            )),
        }
    }
}

/// What one run did
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: i64,
    /// The resolved mode, never `Auto`
    pub mode: CrawlMode,
    pub started_at: DateTime<Utc>,
    /// Length of the remote page list
    pub pages_listed: usize,
    /// Pages that were fetched, whatever the outcome
    pub pages_processed: u64,
    pub versions_written: u64,
    pub outcomes: HashMap<PageOutcome, u64>,
    /// Failed pages with their error messages, in processing order
    pub failures: Vec<(String, String)>,
    /// Checkpoint written at the end of the run, if any
    pub checkpoint: Option<DateTime<Utc>>,
    /// The run hit `max-pages` before the end of its page list
    pub stopped_early: bool,
}

impl RunReport {
    fn new(run_id: i64, mode: CrawlMode, started_at: DateTime<Utc>) -> Self {
        Self {
            run_id,
            mode,
            started_at,
            pages_listed: 0,
            pages_processed: 0,
            versions_written: 0,
            outcomes: HashMap::new(),
            failures: Vec::new(),
            checkpoint: None,
            stopped_early: false,
        }
    }

    /// Number of pages that ended with the given outcome
    pub fn count(&self, outcome: PageOutcome) -> u64 {
        self.outcomes.get(&outcome).copied().unwrap_or(0)
    }

    /// True when the whole page list was handled without failures
    pub fn is_complete(&self) -> bool {
        !self.stopped_early && self.failures.is_empty()
    }

    fn counters(&self) -> RunCounters {
        RunCounters {
            pages_processed: self.pages_processed,
            versions_written: self.versions_written,
            pages_failed: self.failures.len() as u64,
            checkpoint_written: self.checkpoint.is_some(),
        }
    }
}

/// Main crawl coordinator structure
pub struct Coordinator {
    config: Config,
    config_hash: String,
    browser: Box<dyn Browser>,
    site: Box<dyn WikiSite>,
    store: VersionStore,
    journal: SqliteJournal,
    wait: Duration,
}

impl Coordinator {
    /// Creates a new coordinator instance
    ///
    /// # Arguments
    ///
    /// * `config` - The mirror configuration
    /// * `config_hash` - Hash of the configuration file, recorded with each run
    /// * `browser` - An open automation session
    /// * `site` - The page-list provider
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Archive root and journal are ready
    /// * `Err(MirrorError)` - Either could not be opened
    pub fn new(
        config: Config,
        config_hash: String,
        browser: Box<dyn Browser>,
        site: Box<dyn WikiSite>,
    ) -> Result<Self> {
        let store = VersionStore::open(&config.archive.root)?;
        let journal = SqliteJournal::new(Path::new(&config.output.database_path))?;
        let wait = Duration::from_secs(config.browser.wait_timeout_secs);

        Ok(Self {
            config,
            config_hash,
            browser,
            site,
            store,
            journal,
            wait,
        })
    }

    pub fn store(&self) -> &VersionStore {
        &self.store
    }

    pub fn journal(&self) -> &SqliteJournal {
        &self.journal
    }

    /// Runs one crawl
    ///
    /// The run is journaled from start to finish. A run that ends with an error is
    /// recorded as failed before the error is returned.
    pub async fn run(&mut self, requested: CrawlMode) -> Result<RunReport> {
        let started_at = Utc::now();
        let root = self.store.root().to_path_buf();
        let mut done = DoneList::load(&root)?;
        let checkpoint = ResumeCheckpoint::new(&root);

        let mode = requested.resolve(&done, &checkpoint);
        let run_id = self
            .journal
            .create_run(mode.as_str(), &self.config_hash, started_at)?;
        tracing::info!(
            "Starting {} run {} ({} pages already archived)",
            mode,
            run_id,
            done.len()
        );

        let mut report = RunReport::new(run_id, mode, started_at);
        let result = self.execute(&mut report, &mut done, &checkpoint).await;

        let status = match &result {
            Ok(()) if report.failures.is_empty() => RunStatus::Completed,
            Ok(()) => RunStatus::CompletedWithErrors,
            Err(_) => RunStatus::Failed,
        };
        if let Err(e) = self.journal.finish_run(run_id, status, &report.counters()) {
            if result.is_ok() {
                return Err(e.into());
            }
            tracing::warn!("Could not record the end of run {}: {}", run_id, e);
        }

        match result {
            Ok(()) => {
                tracing::info!(
                    "Run {} finished: {} pages processed, {} versions written, {} failed",
                    run_id,
                    report.pages_processed,
                    report.versions_written,
                    report.failures.len()
                );
                Ok(report)
            }
            Err(e) => {
                tracing::error!("Run {} failed: {}", run_id, e);
                Err(e)
            }
        }
    }

    /// Ends the browser session
    pub async fn close(mut self) -> Result<()> {
        self.browser.close().await?;
        Ok(())
    }

    async fn execute(
        &mut self,
        report: &mut RunReport,
        done: &mut DoneList,
        checkpoint: &ResumeCheckpoint,
    ) -> Result<()> {
        if let (Some(user), Some(password)) = (
            &self.config.browser.login_user,
            &self.config.browser.login_password,
        ) {
            snapshot::login(self.browser.as_mut(), user, password, self.wait).await?;
        }

        match report.mode {
            CrawlMode::Incremental => self.run_incremental(report, done, checkpoint).await,
            _ => self.run_initial(report, done, checkpoint).await,
        }
    }

    async fn run_initial(
        &mut self,
        report: &mut RunReport,
        done: &mut DoneList,
        checkpoint: &ResumeCheckpoint,
    ) -> Result<()> {
        if let Some(start) = &self.config.crawl.start_page {
            tracing::info!("Ignoring start page {} outside incremental runs", start);
        }

        let pages = self.site.list_pages(PageOrder::OldestFirst).await?;
        report.pages_listed = pages.len();
        self.process_pages(report, &pages, done).await?;

        if !report.is_complete() {
            tracing::info!("Initial crawl not complete yet; checkpoint left unchanged");
            return Ok(());
        }

        // Edits made while the initial crawl was under way are picked up next time
        let first_start = self
            .journal
            .earliest_run_start(CrawlMode::Initial.as_str())?
            .unwrap_or(report.started_at);
        checkpoint.save(first_start)?;
        report.checkpoint = Some(first_start);
        Ok(())
    }

    async fn run_incremental(
        &mut self,
        report: &mut RunReport,
        done: &mut DoneList,
        checkpoint: &ResumeCheckpoint,
    ) -> Result<()> {
        let pages = self.site.list_pages(PageOrder::RecentFirst).await?;
        report.pages_listed = pages.len();

        let resume = match &self.config.crawl.start_page {
            Some(start) => {
                let index = pages.iter().position(|p| p == start).ok_or_else(|| {
                    ConfigError::Validation(format!(
                        "start page '{}' is not in the site's page list",
                        start
                    ))
                })?;
                tracing::info!("Resuming at configured start page {} (index {})", start, index);
                Some(index)
            }
            None => {
                let since = checkpoint.load_or_epoch()?;
                ResumeLocator::new(self.site.as_ref(), self.config.crawl.boundary_probes)
                    .locate(&pages, since)
                    .await?
            }
        };

        if let Some(resume) = resume {
            // Oldest change first, newest last
            let order: Vec<String> = pages[..=resume].iter().rev().cloned().collect();
            self.process_pages(report, &order, done).await?;
        }

        if report.is_complete() {
            checkpoint.save(report.started_at)?;
            report.checkpoint = Some(report.started_at);
        } else {
            tracing::info!("Run had failures or stopped early; checkpoint left unchanged");
        }
        Ok(())
    }

    async fn process_pages(
        &mut self,
        report: &mut RunReport,
        names: &[String],
        done: &mut DoneList,
    ) -> Result<()> {
        for name in names {
            match classify_page(name, &self.config.crawl) {
                PageClassification::ReservedNamespace => {
                    tracing::debug!("Skipping {} (reserved namespace)", name);
                    self.record(report, name, PageOutcome::Reserved, 0, None)?;
                    continue;
                }
                PageClassification::Ignored => {
                    tracing::debug!("Skipping {} (ignore list)", name);
                    self.record(report, name, PageOutcome::Ignored, 0, None)?;
                    continue;
                }
                PageClassification::Archive => {}
            }

            if report.mode == CrawlMode::Initial && done.contains(name) {
                continue;
            }

            if let Some(max) = self.config.crawl.max_pages {
                if report.pages_processed >= u64::from(max) {
                    tracing::info!("Reached max-pages ({}), stopping", max);
                    report.stopped_early = true;
                    break;
                }
            }
            report.pages_processed += 1;

            let page = PageId::new(name.as_str());
            let mut written = 0;
            let result = match report.mode {
                CrawlMode::Incremental => self.archive_current_version(&page, &mut written).await,
                _ => self.archive_full_history(&page, &mut written).await,
            };
            report.versions_written += u64::from(written);

            let (outcome, message) = match result {
                Ok(removed) => {
                    let outcome = if written > 0 {
                        PageOutcome::Archived
                    } else {
                        PageOutcome::Unchanged
                    };
                    let note = (!removed.is_empty())
                        .then(|| format!("attachments removed: {}", removed.join(", ")));
                    (outcome, note)
                }
                Err(MirrorError::PageNotFound { .. }) => {
                    tracing::debug!("Page {} no longer exists", name);
                    (PageOutcome::NotFound, None)
                }
                Err(e) if e.is_page_scoped() => {
                    tracing::warn!("Failed to archive {}: {}", name, e);
                    report.failures.push((name.clone(), e.to_string()));
                    (outcome_for_error(&e), Some(e.to_string()))
                }
                Err(e) => return Err(e),
            };

            if report.mode == CrawlMode::Initial && outcome.is_success() {
                done.append(name)?;
            }
            self.record(report, name, outcome, written, message.as_deref())?;

            tracing::info!(
                "[{}] {} ({} new version(s))",
                outcome,
                name,
                written
            );
        }
        Ok(())
    }

    fn record(
        &mut self,
        report: &mut RunReport,
        page: &str,
        outcome: PageOutcome,
        versions_written: u32,
        message: Option<&str>,
    ) -> Result<()> {
        self.journal
            .record_outcome(report.run_id, page, outcome, versions_written, message)?;
        *report.outcomes.entry(outcome).or_insert(0) += 1;
        Ok(())
    }

    /// Stores every missing version of a page, then its attached files
    ///
    /// Returns the names of attachments removed from the archive.
    async fn archive_full_history(
        &mut self,
        page: &PageId,
        written: &mut u32,
    ) -> Result<Vec<String>> {
        let url = page_url(&self.config.site.url, page.raw());
        let mut walker =
            HistoryWalker::open(self.browser.as_mut(), page.raw(), &url, self.wait).await?;

        loop {
            let rows = walker.row_count().await?;
            for index in 0..rows {
                let text = walker.row_text(index).await?;
                let seq = sequence_number(&text)?;
                if self.store.has_version(page, seq) {
                    continue;
                }

                let row_id = walker.row_id(index).await?;
                let record = parse_row(&text, &row_id)?;
                let source = walker.row_source(index).await?;
                self.store.write_version(page, &record, &source, None)?;
                *written += 1;
            }

            if !walker.advance().await? {
                break;
            }
        }

        let browser = walker.into_browser();
        let (_, removed) =
            snapshot_attached_files(browser, self.site.as_ref(), &self.store, page, &url, self.wait)
                .await?;
        Ok(removed)
    }

    /// Stores the newest version of a page with its current title, tags and files
    ///
    /// Returns the names of attachments removed from the archive.
    async fn archive_current_version(
        &mut self,
        page: &PageId,
        written: &mut u32,
    ) -> Result<Vec<String>> {
        let url = page_url(&self.config.site.url, page.raw());
        let mut walker =
            HistoryWalker::open(self.browser.as_mut(), page.raw(), &url, self.wait).await?;

        if walker.row_count().await? == 0 {
            return Err(MirrorError::MalformedRow {
                row: String::new(),
                reason: format!("history of {} has no rows", page),
            });
        }
        let text = walker.row_text(0).await?;
        let seq = sequence_number(&text)?;
        if self.store.has_version(page, seq) {
            tracing::debug!("Current version {} of {} already archived", seq, page);
            return Ok(Vec::new());
        }
        let row_id = walker.row_id(0).await?;
        let record = parse_row(&text, &row_id)?;

        let browser = walker.into_browser();
        let title = snapshot::read_title(browser).await?;
        let tags = snapshot::read_tags(browser).await?;
        let source = snapshot::read_current_source(browser, page.raw(), self.wait).await?;
        let (file_list, files_deleted) =
            snapshot_attached_files(browser, self.site.as_ref(), &self.store, page, &url, self.wait)
                .await?;

        let current = CurrentPageState {
            title,
            tags,
            file_list,
            files_deleted,
        };
        self.store
            .write_version(page, &record, &source, Some(&current))?;
        *written += 1;
        Ok(current.files_deleted)
    }
}

/// Downloads the page's attached files and replaces the archived set
///
/// # Returns
///
/// The attached file names and the names removed from the archive
async fn snapshot_attached_files(
    browser: &mut dyn Browser,
    site: &dyn WikiSite,
    store: &VersionStore,
    page: &PageId,
    url: &str,
    wait: Duration,
) -> Result<(Vec<String>, Vec<String>)> {
    let remote = snapshot::list_files(browser, url, wait).await?;

    let mut files = Vec::with_capacity(remote.len());
    for file in remote {
        let content = site.download(&file.url).await?;
        files.push(AttachedFile {
            name: file.name,
            content,
        });
    }

    let names = files.iter().map(|f| f.name.clone()).collect();
    let removed = store.snapshot_files(page, &files)?;
    if !removed.is_empty() {
        tracing::info!("Attachments no longer on {}: {}", page, removed.join(", "));
    }
    Ok((names, removed))
}

fn page_url(site_url: &str, raw_name: &str) -> String {
    format!("{}/{}", site_url.trim_end_matches('/'), raw_name)
}

fn outcome_for_error(error: &MirrorError) -> PageOutcome {
    match error {
        MirrorError::PageNotFound { .. } => PageOutcome::NotFound,
        MirrorError::MalformedRow { .. } => PageOutcome::MalformedRow,
        MirrorError::Driver(_) => PageOutcome::AutomationFailed,
        _ => PageOutcome::Failed,
    }
}

/// Runs one crawl against the configured WebDriver server and wiki API
///
/// # Arguments
///
/// * `config` - The mirror configuration
/// * `config_hash` - Hash of the configuration file
/// * `mode` - Requested crawl mode
///
/// # Example
///
/// ```no_run
/// use history_mirror::config::load_config_with_hash;
/// use history_mirror::crawler::{run_mirror, CrawlMode};
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let (config, hash) = load_config_with_hash(Path::new("mirror.toml"))?;
/// let report = run_mirror(config, hash, CrawlMode::Auto).await?;
/// println!("{} versions written", report.versions_written);
/// # Ok(())
/// # }
/// ```
pub async fn run_mirror(config: Config, config_hash: String, mode: CrawlMode) -> Result<RunReport> {
    let site = WikidotApi::new(&config.site, &config.api)?;
    let session = WebDriverSession::start(&config.browser).await?;

    let mut coordinator = Coordinator::new(config, config_hash, Box::new(session), Box::new(site))?;
    let result = coordinator.run(mode).await;

    if let Err(e) = coordinator.close().await {
        tracing::warn!("Failed to close browser session: {}", e);
    }
    result
}
