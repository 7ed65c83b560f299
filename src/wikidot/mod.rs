//! Remote site module for History-Mirror
//!
//! The page list and per-page last-edit timestamps come from the wiki's API rather
//! than from the browser session. This module defines that collaborator and its
//! Wikidot XML-RPC implementation.

mod api;
mod xmlrpc;

pub use api::WikidotApi;

use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Outcome of looking a page up on the remote site
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<T> {
    Found(T),
    /// The site has no page by that name
    NotFound,
}

/// Order in which the page list is requested
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageOrder {
    /// Least recently edited first; used by initial crawls
    OldestFirst,
    /// Most recently edited first; used by incremental runs
    RecentFirst,
}

/// The page-list and metadata provider of the mirrored wiki
#[async_trait]
pub trait WikiSite: Send + Sync {
    /// Lists every page name of the site in the requested order
    async fn list_pages(&self, order: PageOrder) -> Result<Vec<String>>;

    /// Time the page was last edited
    ///
    /// # Returns
    ///
    /// * `Ok(Lookup::Found(ts))` - The page exists
    /// * `Ok(Lookup::NotFound)` - The site does not know the page
    /// * `Err(MirrorError)` - The API could not be reached or answered garbage
    async fn last_edited_at(&self, page: &str) -> Result<Lookup<DateTime<Utc>>>;

    /// Downloads a file attached to a page
    async fn download(&self, url: &str) -> Result<Vec<u8>>;
}
