//! End-to-end crawl tests
//!
//! Each test builds a small wiki, runs the coordinator against it and inspects
//! the archive tree, the checkpoint files and the journal.

use crate::support::{at, create_test_config, FakePage, FakeWiki};
use chrono::{Duration, Utc};
use history_mirror::config::Config;
use history_mirror::crawler::{Coordinator, CrawlMode, RunReport};
use history_mirror::journal::{Journal, RunStatus};
use history_mirror::page::PageId;
use history_mirror::state::PageOutcome;
use history_mirror::storage::{DoneList, ResumeCheckpoint, VersionStore, METADATA_FILE, SOURCE_FILE};
use history_mirror::MirrorError;
use std::fs;
use tempfile::TempDir;

async fn run(wiki: &FakeWiki, config: &Config, mode: CrawlMode) -> history_mirror::Result<RunReport> {
    let mut coordinator = Coordinator::new(
        config.clone(),
        "test-hash".to_string(),
        Box::new(wiki.browser()),
        Box::new(wiki.site()),
    )?;
    coordinator.run(mode).await
}

fn store(config: &Config) -> VersionStore {
    VersionStore::open(&config.archive.root).unwrap()
}

fn read_version(config: &Config, page: &str, number: u32) -> (String, String) {
    let dir = store(config).version_dir(&PageId::new(page), number);
    (
        fs::read_to_string(dir.join(SOURCE_FILE)).unwrap(),
        fs::read_to_string(dir.join(METADATA_FILE)).unwrap(),
    )
}

/// Two archivable pages, one reserved and one ignored
fn small_wiki() -> FakeWiki {
    let wiki = FakeWiki::new();

    wiki.add_page("home", FakePage::with_revisions("Home", 5, at(2021, 1, 1)));

    let mut foo = FakePage::with_revisions("Foo", 2, at(2020, 6, 1));
    foo.files.push(("badge.png".to_string(), b"PNG".to_vec()));
    wiki.add_page("Misc:Foo", foo);

    wiki.add_page(
        "system:members",
        FakePage::with_revisions("Members", 1, at(2019, 1, 1)),
    );
    wiki.add_page("sandbox", FakePage::with_revisions("Sandbox", 1, at(2019, 2, 1)));
    wiki
}

fn fetched(wiki: &FakeWiki, page: &str) -> Vec<u32> {
    wiki.state()
        .source_fetches
        .iter()
        .filter(|(p, _)| p == page)
        .map(|(_, n)| *n)
        .collect()
}

#[tokio::test]
async fn test_initial_crawl_archives_full_history() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path());
    let wiki = small_wiki();

    let report = run(&wiki, &config, CrawlMode::Auto).await.unwrap();

    assert_eq!(report.mode, CrawlMode::Initial);
    assert_eq!(report.pages_listed, 4);
    assert_eq!(report.pages_processed, 2);
    assert_eq!(report.versions_written, 7);
    assert_eq!(report.count(PageOutcome::Archived), 2);
    assert_eq!(report.count(PageOutcome::Reserved), 1);
    assert_eq!(report.count(PageOutcome::Ignored), 1);
    assert!(report.failures.is_empty());

    // Every revision, across both pages of history
    let store = store(&config);
    assert_eq!(
        store.stored_versions(&PageId::new("home")).unwrap(),
        vec![1, 2, 3, 4, 5]
    );
    assert!(dir.path().join("archive/h/o/home/V0005").is_dir());
    assert!(dir.path().join("archive/m/i/Misc_Foo/V0002").is_dir());

    // The source view lags behind each reveal; every version still gets its own source
    for n in 1..=5 {
        let (source, _) = read_version(&config, "home", n);
        assert_eq!(source, format!("source of Home at {}", n));
    }

    let (source, metadata) = read_version(&config, "home", 5);
    assert_eq!(source, "source of Home at 5");
    assert!(metadata.contains("<number>5</number>"));
    assert!(metadata.contains("<ID>revision-row-5</ID>"));
    assert!(metadata.contains("<type>S</type>"));
    assert!(metadata.contains("<name>Jane Doe</name>"));
    assert!(metadata.contains("<date>5 Mar 2019</date>"));
    assert!(metadata.contains("<comment>edit 5</comment>"));

    let (_, first) = read_version(&config, "home", 1);
    assert!(first.contains("<type>N</type>"));

    // Attached files sit next to the version directories
    let badge = dir.path().join("archive/m/i/Misc_Foo/badge.png");
    assert_eq!(fs::read(badge).unwrap(), b"PNG");

    // Skipped pages are never opened
    assert!(fetched(&wiki, "system:members").is_empty());
    assert!(fetched(&wiki, "sandbox").is_empty());

    let done = DoneList::load(store.root()).unwrap();
    assert_eq!(done.names(), &["Misc:Foo", "home"]);
    assert!(report.checkpoint.is_some());
    assert_eq!(
        ResumeCheckpoint::new(store.root()).load().unwrap(),
        report.checkpoint
    );
}

#[tokio::test]
async fn test_rerunning_initial_crawl_fetches_nothing() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path());
    let wiki = small_wiki();

    run(&wiki, &config, CrawlMode::Initial).await.unwrap();
    let fetches = wiki.state().source_fetches.len();

    let report = run(&wiki, &config, CrawlMode::Initial).await.unwrap();

    assert_eq!(report.pages_processed, 0);
    assert_eq!(report.versions_written, 0);
    assert_eq!(wiki.state().source_fetches.len(), fetches);
}

#[tokio::test]
async fn test_existing_version_directory_is_never_refetched() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path());
    let wiki = small_wiki();

    let version_dir = store(&config).version_dir(&PageId::new("home"), 3);
    fs::create_dir_all(&version_dir).unwrap();

    let report = run(&wiki, &config, CrawlMode::Initial).await.unwrap();

    assert_eq!(report.versions_written, 6);
    let mut home = fetched(&wiki, "home");
    home.sort();
    assert_eq!(home, vec![1, 2, 4, 5]);

    // The pre-existing directory is left exactly as it was
    assert!(fs::read_dir(&version_dir).unwrap().next().is_none());
}

#[tokio::test]
async fn test_malformed_row_fails_only_its_page() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path());
    let wiki = small_wiki();
    wiki.with_page("home", |page| page.garbled_row = Some(3));

    let report = run(&wiki, &config, CrawlMode::Auto).await.unwrap();

    assert_eq!(report.count(PageOutcome::MalformedRow), 1);
    assert_eq!(report.count(PageOutcome::Archived), 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].0, "home");
    assert!(report.checkpoint.is_none());

    // Rows are read newest first; versions read before the bad row are kept
    let root = store(&config);
    assert_eq!(root.stored_versions(&PageId::new("home")).unwrap(), vec![4, 5]);
    let done = DoneList::load(root.root()).unwrap();
    assert!(!done.contains("home"));
    assert!(done.contains("Misc:Foo"));
    assert!(!ResumeCheckpoint::new(root.root()).exists());

    // The next run picks up where the failed page stopped
    wiki.with_page("home", |page| page.garbled_row = None);
    let retry = run(&wiki, &config, CrawlMode::Auto).await.unwrap();

    assert_eq!(retry.mode, CrawlMode::Initial);
    assert_eq!(retry.pages_processed, 1);
    assert_eq!(retry.versions_written, 3);
    assert!(retry.checkpoint.is_some());

    // The checkpoint is the start of the first initial run
    let coordinator = Coordinator::new(
        config.clone(),
        "test-hash".to_string(),
        Box::new(wiki.browser()),
        Box::new(wiki.site()),
    )
    .unwrap();
    let runs = coordinator.journal().list_runs(10).unwrap();
    assert_eq!(runs.len(), 2);
    assert_eq!(runs[1].status, RunStatus::CompletedWithErrors);
    assert_eq!(runs[0].status, RunStatus::Completed);
    assert_eq!(retry.checkpoint.unwrap(), report.started_at);
}

#[tokio::test]
async fn test_pager_failure_fails_only_its_page() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path());
    let wiki = small_wiki();
    wiki.with_page("home", |page| page.broken_pager = true);

    let report = run(&wiki, &config, CrawlMode::Initial).await.unwrap();

    assert_eq!(report.count(PageOutcome::AutomationFailed), 1);
    assert_eq!(report.count(PageOutcome::Archived), 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].0, "home");
    assert!(report.checkpoint.is_none());

    // The first page of history was stored before the pager gave out
    let root = store(&config);
    assert_eq!(root.stored_versions(&PageId::new("home")).unwrap(), vec![3, 4, 5]);
    let done = DoneList::load(root.root()).unwrap();
    assert!(!done.contains("home"));
    assert!(done.contains("Misc:Foo"));

    wiki.with_page("home", |page| page.broken_pager = false);
    let retry = run(&wiki, &config, CrawlMode::Initial).await.unwrap();

    assert_eq!(retry.versions_written, 2);
    assert_eq!(
        root.stored_versions(&PageId::new("home")).unwrap(),
        vec![1, 2, 3, 4, 5]
    );
    assert!(retry.checkpoint.is_some());
}

#[tokio::test]
async fn test_initial_crawl_journals_removed_attachments() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path());
    let wiki = small_wiki();

    let stale = dir.path().join("archive/m/i/Misc_Foo/old-logo.gif");
    fs::create_dir_all(stale.parent().unwrap()).unwrap();
    fs::write(&stale, b"GIF").unwrap();

    let report = run(&wiki, &config, CrawlMode::Initial).await.unwrap();

    assert_eq!(report.count(PageOutcome::Archived), 2);
    assert!(!stale.exists());

    let coordinator = Coordinator::new(
        config.clone(),
        "test-hash".to_string(),
        Box::new(wiki.browser()),
        Box::new(wiki.site()),
    )
    .unwrap();
    let history = coordinator.journal().history_for_page("Misc:Foo").unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(
        history[0].message.as_deref(),
        Some("attachments removed: old-logo.gif")
    );

    let home = coordinator.journal().history_for_page("home").unwrap();
    assert_eq!(home[0].message, None);
}

#[tokio::test]
async fn test_missing_page_is_skipped_without_failure() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path());
    let wiki = small_wiki();
    wiki.add_phantom_page("ghost", at(2022, 1, 1));

    let report = run(&wiki, &config, CrawlMode::Initial).await.unwrap();

    assert_eq!(report.count(PageOutcome::NotFound), 1);
    assert!(report.failures.is_empty());
    assert!(report.checkpoint.is_some());
    assert!(!store(&config).page_dir(&PageId::new("ghost")).exists());
}

#[tokio::test]
async fn test_max_pages_stops_without_checkpoint() {
    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(dir.path());
    config.crawl.max_pages = Some(1);
    let wiki = small_wiki();

    let report = run(&wiki, &config, CrawlMode::Initial).await.unwrap();

    assert!(report.stopped_early);
    assert_eq!(report.pages_processed, 1);
    assert!(report.checkpoint.is_none());
    assert_eq!(DoneList::load(store(&config).root()).unwrap().len(), 1);
}

#[tokio::test]
async fn test_incremental_run_stores_current_version() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path());
    let wiki = small_wiki();
    run(&wiki, &config, CrawlMode::Auto).await.unwrap();

    wiki.with_page("home", |page| {
        page.tags = vec!["featured".to_string(), "con".to_string()];
        page.files.push(("map.pdf".to_string(), b"%PDF".to_vec()));
        page.edit("fresh source", Utc::now() + Duration::hours(1));
    });

    let report = run(&wiki, &config, CrawlMode::Auto).await.unwrap();

    assert_eq!(report.mode, CrawlMode::Incremental);
    assert_eq!(report.pages_processed, 1);
    assert_eq!(report.versions_written, 1);
    assert_eq!(report.checkpoint, Some(report.started_at));

    let (source, metadata) = read_version(&config, "home", 6);
    assert_eq!(source, "fresh source");
    assert!(metadata.contains("<name>Editor Bot</name>"));
    assert!(metadata.contains("<title>Home</title>"));
    assert!(metadata.contains("<tags>featured,con</tags>"));
    assert!(metadata.contains("<file_list>map.pdf</file_list>"));
    assert!(metadata.contains("<files_deleted></files_deleted>"));

    // Current source comes from the edit area, not the history table
    assert_eq!(wiki.state().edit_reads, vec!["home".to_string()]);
    assert!(!fetched(&wiki, "home").contains(&6));

    // The edit is still newer than the checkpoint, but its version is already stored
    let again = run(&wiki, &config, CrawlMode::Auto).await.unwrap();
    assert_eq!(again.count(PageOutcome::Unchanged), 1);
    assert_eq!(again.versions_written, 0);
    assert_eq!(wiki.state().edit_reads.len(), 1);
    assert_eq!(again.checkpoint, Some(again.started_at));
}

#[tokio::test]
async fn test_incremental_snapshot_removes_deleted_files() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path());
    let wiki = small_wiki();
    run(&wiki, &config, CrawlMode::Auto).await.unwrap();

    wiki.with_page("Misc:Foo", |page| {
        page.files.clear();
        page.edit("badge removed", Utc::now() + Duration::hours(1));
    });

    run(&wiki, &config, CrawlMode::Incremental).await.unwrap();

    let (_, metadata) = read_version(&config, "Misc:Foo", 3);
    assert!(metadata.contains("<files_deleted>badge.png</files_deleted>"));
    assert!(metadata.contains("<file_list></file_list>"));
    assert!(!dir.path().join("archive/m/i/Misc_Foo/badge.png").exists());
}

#[tokio::test]
async fn test_slow_edit_area_is_waited_for_once_more() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path());
    let wiki = small_wiki();
    run(&wiki, &config, CrawlMode::Initial).await.unwrap();

    // Longer than one wait, shorter than two
    wiki.with_page("home", |page| {
        page.slow_edit_area = 6;
        page.edit("slow source", Utc::now() + Duration::hours(1));
    });
    let report = run(&wiki, &config, CrawlMode::Incremental).await.unwrap();

    assert_eq!(report.count(PageOutcome::Archived), 1);
    assert!(report.failures.is_empty());
    let (source, _) = read_version(&config, "home", 6);
    assert_eq!(source, "slow source");
    assert_eq!(wiki.state().edit_reads, vec!["home".to_string()]);
}

#[tokio::test]
async fn test_edit_area_missing_after_retry_fails_only_its_page() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path());
    let wiki = small_wiki();
    run(&wiki, &config, CrawlMode::Initial).await.unwrap();
    let done_before = DoneList::load(store(&config).root()).unwrap().len();

    // Oldest change first: home fails, then Misc:Foo is still archived
    wiki.with_page("home", |page| {
        page.slow_edit_area = u32::MAX;
        page.edit("never read", Utc::now() + Duration::hours(1));
    });
    wiki.with_page("Misc:Foo", |page| {
        page.edit("foo update", Utc::now() + Duration::hours(2))
    });
    let report = run(&wiki, &config, CrawlMode::Incremental).await.unwrap();

    assert_eq!(report.count(PageOutcome::AutomationFailed), 1);
    assert_eq!(report.count(PageOutcome::Archived), 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].0, "home");
    assert!(report.checkpoint.is_none());

    let root = store(&config);
    assert!(!root.has_version(&PageId::new("home"), 6));
    assert!(root.has_version(&PageId::new("Misc:Foo"), 3));
    assert_eq!(DoneList::load(root.root()).unwrap().len(), done_before);
}

#[tokio::test]
async fn test_incremental_run_without_login_fails_pages() {
    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(dir.path());
    config.browser.login_user = None;
    config.browser.login_password = None;
    let wiki = small_wiki();
    run(&wiki, &config, CrawlMode::Initial).await.unwrap();

    wiki.with_page("home", |page| {
        page.edit("unreadable", Utc::now() + Duration::hours(1))
    });
    let report = run(&wiki, &config, CrawlMode::Incremental).await.unwrap();

    assert_eq!(report.count(PageOutcome::AutomationFailed), 1);
    assert!(report.checkpoint.is_none());
    assert!(!store(&config).has_version(&PageId::new("home"), 6));
}

#[tokio::test]
async fn test_unknown_start_page_fails_the_run() {
    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(dir.path());
    let wiki = small_wiki();
    run(&wiki, &config, CrawlMode::Initial).await.unwrap();

    config.crawl.start_page = Some("no-such-page".to_string());
    let result = run(&wiki, &config, CrawlMode::Incremental).await;

    assert!(matches!(result, Err(MirrorError::Config(_))));

    let coordinator = Coordinator::new(
        config,
        "test-hash".to_string(),
        Box::new(wiki.browser()),
        Box::new(wiki.site()),
    )
    .unwrap();
    let latest = coordinator.journal().get_latest_run().unwrap().unwrap();
    assert_eq!(latest.status, RunStatus::Failed);
    assert_eq!(latest.mode, "incremental");
}

#[tokio::test]
async fn test_start_page_bypasses_timestamp_search() {
    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(dir.path());
    let wiki = small_wiki();
    run(&wiki, &config, CrawlMode::Initial).await.unwrap();

    // Most recently edited first: home, Misc:Foo, sandbox, system:members
    config.crawl.start_page = Some("Misc:Foo".to_string());
    let report = run(&wiki, &config, CrawlMode::Incremental).await.unwrap();

    assert_eq!(wiki.state().timestamp_lookups, 0);
    assert_eq!(report.pages_processed, 2);
    assert_eq!(report.count(PageOutcome::Unchanged), 2);
    assert_eq!(report.versions_written, 0);
}
