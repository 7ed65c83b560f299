//! In-memory wiki for end-to-end crawl tests
//!
//! `FakeBrowser` renders the wiki's pages the way the crawler's locators expect
//! (history table, pager, source view, edit area, file list) and `FakeSite` answers
//! page-list, timestamp and download requests from the same state. Revealed
//! sources reach the source view one lookup after the click.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use history_mirror::browser::{self, Browser, DriverError, DriverResult, ElementHandle, Locator};
use history_mirror::config::{
    ApiConfig, ArchiveConfig, BrowserConfig, Config, CrawlConfig, OutputConfig, SiteConfig,
};
use history_mirror::wikidot::{Lookup, PageOrder, WikiSite};
use history_mirror::MirrorError;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

pub const SITE_URL: &str = "https://wiki.test";

/// Revision rows shown per page of history
pub const ROWS_PER_HISTORY_PAGE: usize = 3;

#[derive(Debug, Clone)]
pub struct FakeRevision {
    pub number: u32,
    pub flag: char,
    pub editor: String,
    pub date: String,
    pub comment: String,
    pub source: String,
}

#[derive(Debug, Clone)]
pub struct FakePage {
    pub title: String,
    pub tags: Vec<String>,
    /// Oldest first
    pub revisions: Vec<FakeRevision>,
    pub files: Vec<(String, Vec<u8>)>,
    pub edited_at: DateTime<Utc>,
    /// Replaces the rendered text of the row with this revision number
    pub garbled_row: Option<u32>,
    /// Lookups the edit area stays hidden after the edit button is clicked
    pub slow_edit_area: u32,
    /// The history pager fails to render
    pub broken_pager: bool,
}

impl FakePage {
    /// A page with `count` revisions numbered from 1
    pub fn with_revisions(title: &str, count: u32, edited_at: DateTime<Utc>) -> Self {
        let revisions = (1..=count)
            .map(|n| FakeRevision {
                number: n,
                flag: if n == 1 { 'N' } else { 'S' },
                editor: "Jane Doe".to_string(),
                date: format!("{} Mar 2019", (n - 1) % 28 + 1),
                comment: format!("edit {}", n),
                source: format!("source of {} at {}", title, n),
            })
            .collect();
        Self {
            title: title.to_string(),
            tags: Vec::new(),
            revisions,
            files: Vec::new(),
            edited_at,
            garbled_row: None,
            slow_edit_area: 0,
            broken_pager: false,
        }
    }

    pub fn latest(&self) -> Option<&FakeRevision> {
        self.revisions.last()
    }

    /// Adds an edit and moves the page's last-edited time
    pub fn edit(&mut self, source: &str, edited_at: DateTime<Utc>) {
        let number = self.revisions.len() as u32 + 1;
        self.revisions.push(FakeRevision {
            number,
            flag: 'S',
            editor: "Editor Bot".to_string(),
            date: "2 Apr 2024".to_string(),
            comment: String::new(),
            source: source.to_string(),
        });
        self.edited_at = edited_at;
    }

    fn newest_first(&self) -> Vec<&FakeRevision> {
        self.revisions.iter().rev().collect()
    }

    fn history_pages(&self) -> usize {
        self.revisions.len().div_ceil(ROWS_PER_HISTORY_PAGE).max(1)
    }
}

#[derive(Debug, Default)]
pub struct WikiState {
    pub pages: BTreeMap<String, FakePage>,
    /// Names the page list reports although the page itself is gone
    pub phantom_pages: Vec<(String, DateTime<Utc>)>,
    /// (page, revision) for every source revealed in a history table
    pub source_fetches: Vec<(String, u32)>,
    pub edit_reads: Vec<String>,
    pub downloads: Vec<String>,
    pub timestamp_lookups: usize,
    pub logged_in: bool,
}

/// Shared state of the fake wiki
#[derive(Debug, Clone, Default)]
pub struct FakeWiki {
    state: Arc<Mutex<WikiState>>,
}

impl FakeWiki {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_page(&self, name: &str, page: FakePage) {
        self.state.lock().unwrap().pages.insert(name.to_string(), page);
    }

    pub fn add_phantom_page(&self, name: &str, edited_at: DateTime<Utc>) {
        self.state
            .lock()
            .unwrap()
            .phantom_pages
            .push((name.to_string(), edited_at));
    }

    pub fn with_page<R>(&self, name: &str, f: impl FnOnce(&mut FakePage) -> R) -> R {
        let mut state = self.state.lock().unwrap();
        f(state.pages.get_mut(name).expect("page exists in fake wiki"))
    }

    pub fn state(&self) -> std::sync::MutexGuard<'_, WikiState> {
        self.state.lock().unwrap()
    }

    pub fn browser(&self) -> FakeBrowser {
        FakeBrowser {
            wiki: self.clone(),
            view: View::default(),
        }
    }

    pub fn site(&self) -> FakeSite {
        FakeSite { wiki: self.clone() }
    }
}

#[derive(Debug, Default)]
struct View {
    page: Option<String>,
    missing: bool,
    on_login_form: bool,
    typed_login: Option<String>,
    history_open: bool,
    history_page: usize,
    shown_source: Option<u32>,
    /// Replaced on every reveal, like the site's source view
    source_generation: u32,
    /// Revealed revision and the lookups left before the view shows it
    pending_source: Option<(u32, u32)>,
    edit_open: bool,
    edit_hidden_lookups: u32,
    files_open: bool,
}

pub struct FakeBrowser {
    wiki: FakeWiki,
    view: View,
}

fn handle(s: impl Into<String>) -> ElementHandle {
    ElementHandle(s.into())
}

fn indexed(element: &ElementHandle, prefix: &str) -> Option<usize> {
    element.0.strip_prefix(prefix)?.parse().ok()
}

fn missing(locator: Locator<'_>) -> DriverError {
    DriverError::NoSuchElement(locator.to_string())
}

impl FakeBrowser {
    fn page(&self) -> Option<FakePage> {
        let name = self.view.page.as_ref()?;
        self.wiki.state().pages.get(name).cloned()
    }

    /// Revisions on the shown history page, newest first
    fn visible_rows(&self) -> Vec<FakeRevision> {
        match self.page() {
            Some(page) if self.view.history_open => page
                .newest_first()
                .into_iter()
                .skip(self.view.history_page * ROWS_PER_HISTORY_PAGE)
                .take(ROWS_PER_HISTORY_PAGE)
                .cloned()
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Looks up the source view; a revealed source shows one lookup late
    fn source_view(&mut self) -> Option<ElementHandle> {
        match self.view.pending_source {
            Some((number, 0)) => {
                self.view.pending_source = None;
                self.view.shown_source = Some(number);
                self.view.source_generation += 1;
            }
            Some((number, lookups)) => self.view.pending_source = Some((number, lookups - 1)),
            None => {}
        }
        self.view
            .shown_source
            .map(|_| handle(format!("source:{}", self.view.source_generation)))
    }

    fn edit_area_visible(&mut self) -> bool {
        if !self.view.edit_open {
            return false;
        }
        if self.view.edit_hidden_lookups > 0 {
            self.view.edit_hidden_lookups -= 1;
            return false;
        }
        true
    }

    /// Revision behind a table row handle; row 0 is the header
    fn row_revision(&self, element: &ElementHandle) -> DriverResult<FakeRevision> {
        let index = indexed(element, "row:")
            .filter(|i| *i > 0)
            .ok_or_else(|| DriverError::NoSuchElement(element.0.clone()))?;
        self.visible_rows()
            .get(index - 1)
            .cloned()
            .ok_or_else(|| DriverError::NoSuchElement(format!("stale {}", element.0)))
    }
}

#[async_trait]
impl Browser for FakeBrowser {
    async fn navigate(&mut self, url: &str) -> DriverResult<()> {
        self.view = View::default();
        if url == browser::LOGIN_URL {
            self.view.on_login_form = true;
            return Ok(());
        }
        let name = url
            .strip_prefix(SITE_URL)
            .and_then(|rest| rest.strip_prefix('/'))
            .ok_or_else(|| DriverError::Protocol(format!("unexpected url {}", url)))?;
        self.view.missing = !self.wiki.state().pages.contains_key(name);
        self.view.page = Some(name.to_string());
        Ok(())
    }

    async fn page_contains(&mut self, text: &str) -> DriverResult<bool> {
        Ok(self.view.missing && text == browser::PAGE_NOT_FOUND_TEXT)
    }

    async fn find_element(&mut self, locator: Locator<'_>) -> DriverResult<ElementHandle> {
        if locator == browser::REVISION_SOURCE {
            return self.source_view().ok_or_else(|| missing(locator));
        }
        if locator == browser::EDIT_TEXTAREA {
            if self.edit_area_visible() {
                return Ok(handle("textarea"));
            }
            return Err(missing(locator));
        }

        let on_page = self.view.page.is_some() && !self.view.missing;
        let found = if locator == browser::HISTORY_BUTTON && on_page {
            Some("history-button")
        } else if locator == browser::REVISION_LIST && self.view.history_open {
            Some("revision-list")
        } else if locator == browser::PAGE_TITLE && on_page {
            Some("title")
        } else if locator == browser::EDIT_BUTTON && on_page {
            Some("edit-button")
        } else if locator == browser::EDIT_CANCEL && self.view.edit_open {
            Some("edit-cancel")
        } else if locator == browser::FILES_BUTTON && on_page {
            Some("files-button")
        } else if locator == browser::ACTION_AREA && self.view.files_open {
            Some("action-area")
        } else if locator == browser::LOGIN_NAME_FIELD && self.view.on_login_form {
            Some("login-name")
        } else if locator == browser::LOGIN_PASSWORD_FIELD && self.view.on_login_form {
            Some("login-password")
        } else if locator == browser::LOGIN_SUBMIT && self.view.on_login_form {
            Some("login-submit")
        } else if locator == browser::ACCOUNT_MENU && self.wiki.state().logged_in {
            Some("account-menu")
        } else {
            None
        };
        found.map(handle).ok_or_else(|| missing(locator))
    }

    async fn find_elements(&mut self, locator: Locator<'_>) -> DriverResult<Vec<ElementHandle>> {
        if locator == browser::REVISION_ROWS {
            if !self.view.history_open {
                return Ok(Vec::new());
            }
            let rows = self.visible_rows().len();
            return Ok((0..=rows).map(|i| handle(format!("row:{}", i))).collect());
        }
        if locator == browser::REVISION_SOURCE {
            return Ok(self.source_view().into_iter().collect());
        }
        if locator == browser::PAGER_BUTTONS {
            let pages = match self.page() {
                Some(page) if page.broken_pager => {
                    return Err(DriverError::Protocol("pager failed to render".to_string()))
                }
                Some(page) if self.view.history_open => page.history_pages(),
                _ => 0,
            };
            if pages < 2 {
                return Ok(Vec::new());
            }
            return Ok((0..pages).map(|i| handle(format!("pager:{}", i))).collect());
        }
        if locator == browser::PAGE_TAGS {
            let tags = self.page().map(|p| p.tags.len()).unwrap_or(0);
            return Ok((0..tags).map(|i| handle(format!("tag:{}", i))).collect());
        }
        if locator == browser::FILE_LINKS {
            let files = match self.page() {
                Some(page) if self.view.files_open => page.files.len(),
                _ => 0,
            };
            return Ok((0..files).map(|i| handle(format!("file:{}", i))).collect());
        }
        Err(DriverError::Protocol(format!("unsupported locator {}", locator)))
    }

    async fn find_child(
        &mut self,
        parent: &ElementHandle,
        locator: Locator<'_>,
    ) -> DriverResult<ElementHandle> {
        if locator == browser::ROW_SOURCE_BUTTON {
            let revision = self.row_revision(parent)?;
            return Ok(handle(format!("source-button:{}", revision.number)));
        }
        if locator == browser::PAGER_LINK {
            if let Some(i) = indexed(parent, "pager:") {
                return Ok(handle(format!("pager-link:{}", i)));
            }
        }
        Err(missing(locator))
    }

    async fn click(&mut self, element: &ElementHandle) -> DriverResult<()> {
        if let Some(number) = indexed(element, "source-button:") {
            let page = self.view.page.clone().unwrap_or_default();
            self.wiki.state().source_fetches.push((page, number as u32));
            self.view.pending_source = Some((number as u32, 1));
            return Ok(());
        }
        if let Some(i) = indexed(element, "pager-link:") {
            self.view.history_page = i;
            self.view.shown_source = None;
            self.view.pending_source = None;
            return Ok(());
        }
        match element.0.as_str() {
            "history-button" => {
                self.view.history_open = true;
                self.view.history_page = 0;
            }
            "edit-button" => {
                let page = self.view.page.clone().unwrap_or_default();
                if !self.wiki.state().logged_in {
                    // Anonymous users get no edit area
                    return Ok(());
                }
                let hidden = self.page().map(|p| p.slow_edit_area).unwrap_or(0);
                self.wiki.state().edit_reads.push(page);
                self.view.edit_open = true;
                self.view.edit_hidden_lookups = hidden;
            }
            "edit-cancel" => self.view.edit_open = false,
            "files-button" => self.view.files_open = true,
            "login-submit" => {
                if self.view.typed_login.is_some() {
                    self.wiki.state().logged_in = true;
                }
            }
            other => return Err(DriverError::NoSuchElement(other.to_string())),
        }
        Ok(())
    }

    async fn read_text(&mut self, element: &ElementHandle) -> DriverResult<String> {
        if element.0.starts_with("row:") {
            let revision = self.row_revision(element)?;
            let garbled = self.page().and_then(|p| p.garbled_row);
            if garbled == Some(revision.number) {
                return Ok(format!("{}. garbled row", revision.number));
            }
            return Ok(format!(
                "{}. {} V S R {} {} {}",
                revision.number, revision.flag, revision.editor, revision.date, revision.comment
            )
            .trim_end()
            .to_string());
        }
        if let Some(i) = indexed(element, "pager:") {
            return Ok((i + 1).to_string());
        }
        if let Some(generation) = indexed(element, "source:") {
            let current = self.view.source_generation as usize;
            let number = self
                .view
                .shown_source
                .filter(|_| generation == current)
                .ok_or_else(|| DriverError::NoSuchElement(format!("stale {}", element.0)))?;
            return self
                .page()
                .and_then(|p| p.revisions.iter().find(|r| r.number == number).cloned())
                .map(|r| r.source)
                .ok_or_else(|| DriverError::NoSuchElement(element.0.clone()));
        }
        if let Some(i) = indexed(element, "tag:") {
            return self
                .page()
                .and_then(|p| p.tags.get(i).cloned())
                .ok_or_else(|| DriverError::NoSuchElement(element.0.clone()));
        }
        if let Some(i) = indexed(element, "file:") {
            return self
                .page()
                .and_then(|p| p.files.get(i).map(|(name, _)| name.clone()))
                .ok_or_else(|| DriverError::NoSuchElement(element.0.clone()));
        }
        let page = self
            .page()
            .ok_or_else(|| DriverError::NoSuchElement(element.0.clone()))?;
        match element.0.as_str() {
            "title" => Ok(page.title.clone()),
            "textarea" => Ok(page.latest().map(|r| r.source.clone()).unwrap_or_default()),
            other => Err(DriverError::NoSuchElement(other.to_string())),
        }
    }

    async fn attribute(
        &mut self,
        element: &ElementHandle,
        name: &str,
    ) -> DriverResult<Option<String>> {
        if element.0.starts_with("row:") && name == "id" {
            let revision = self.row_revision(element)?;
            return Ok(Some(format!("revision-row-{}", revision.number)));
        }
        if let (Some(i), "class") = (indexed(element, "pager:"), name) {
            let class = if i == self.view.history_page {
                browser::PAGER_CURRENT_CLASS
            } else {
                browser::PAGER_TARGET_CLASS
            };
            return Ok(Some(class.to_string()));
        }
        if let (Some(i), "href") = (indexed(element, "file:"), name) {
            let page = self.view.page.clone().unwrap_or_default();
            return Ok(self
                .page()
                .and_then(|p| p.files.get(i).map(|(file, _)| file.clone()))
                .map(|file| format!("/local--files/{}/{}", page, file)));
        }
        Ok(None)
    }

    async fn type_text(&mut self, element: &ElementHandle, text: &str) -> DriverResult<()> {
        if element.0 == "login-name" {
            self.view.typed_login = Some(text.to_string());
        }
        Ok(())
    }

    async fn close(&mut self) -> DriverResult<()> {
        Ok(())
    }
}

pub struct FakeSite {
    wiki: FakeWiki,
}

#[async_trait]
impl WikiSite for FakeSite {
    async fn list_pages(&self, order: PageOrder) -> history_mirror::Result<Vec<String>> {
        let state = self.wiki.state();
        let mut listed: Vec<(DateTime<Utc>, String)> = state
            .pages
            .iter()
            .map(|(name, page)| (page.edited_at, name.clone()))
            .chain(state.phantom_pages.iter().map(|(n, ts)| (*ts, n.clone())))
            .collect();
        listed.sort();
        if order == PageOrder::RecentFirst {
            listed.reverse();
        }
        Ok(listed.into_iter().map(|(_, name)| name).collect())
    }

    async fn last_edited_at(&self, page: &str) -> history_mirror::Result<Lookup<DateTime<Utc>>> {
        let mut state = self.wiki.state();
        state.timestamp_lookups += 1;
        if let Some(found) = state.pages.get(page) {
            return Ok(Lookup::Found(found.edited_at));
        }
        let phantom = state
            .phantom_pages
            .iter()
            .find(|(name, _)| name == page)
            .map(|(_, ts)| Lookup::Found(*ts));
        Ok(phantom.unwrap_or(Lookup::NotFound))
    }

    async fn download(&self, url: &str) -> history_mirror::Result<Vec<u8>> {
        let mut state = self.wiki.state();
        state.downloads.push(url.to_string());

        let rest = url
            .strip_prefix(SITE_URL)
            .and_then(|r| r.strip_prefix("/local--files/"))
            .ok_or_else(|| MirrorError::Api(format!("unexpected download {}", url)))?;
        let (page, file) = rest
            .split_once('/')
            .ok_or_else(|| MirrorError::Api(format!("unexpected download {}", url)))?;
        state
            .pages
            .get(page)
            .and_then(|p| p.files.iter().find(|(name, _)| name == file))
            .map(|(_, content)| content.clone())
            .ok_or_else(|| MirrorError::Api(format!("no file at {}", url)))
    }
}

pub fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 12, 0, 0).unwrap()
}

/// Creates a test configuration writing into `dir`
pub fn create_test_config(dir: &Path) -> Config {
    Config {
        site: SiteConfig {
            name: "testwiki".to_string(),
            url: SITE_URL.to_string(),
        },
        api: ApiConfig {
            endpoint: "https://api.wiki.test/xml-rpc-api.php".to_string(),
            user: "archiver".to_string(),
            key: "secret".to_string(),
        },
        browser: BrowserConfig {
            webdriver_url: "http://localhost:4444".to_string(),
            browser_name: "firefox".to_string(),
            wait_timeout_secs: 1,
            login_user: Some("archiver".to_string()),
            login_password: Some("hunter2".to_string()),
        },
        archive: ArchiveConfig {
            root: dir.join("archive").to_string_lossy().into_owned(),
        },
        crawl: CrawlConfig {
            reserved_prefixes: vec!["system:".to_string()],
            ignore_pages: vec!["sandbox".to_string()],
            ..CrawlConfig::default()
        },
        output: OutputConfig {
            database_path: dir.join("journal.db").to_string_lossy().into_owned(),
            summary_path: dir.join("summary.md").to_string_lossy().into_owned(),
        },
    }
}
