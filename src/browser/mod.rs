//! Browser automation module for History-Mirror
//!
//! Page histories, sources and edit areas are rendered by client-side scripts, so
//! they are read through a real browser session rather than plain HTTP. This module
//! defines the narrow surface the crawler needs from that session:
//! - Navigation and page-content checks
//! - Element lookup by id, CSS selector or XPath, including lookups scoped to an element
//! - Clicking, reading text and attributes, typing
//! - Bounded waits for dynamically rendered elements

mod selectors;
mod webdriver;

pub use webdriver::WebDriverSession;

pub use selectors::*;

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

/// Interval between lookups while waiting for an element
pub const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Errors reported by the automation driver
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("No such element: {0}")]
    NoSuchElement(String),

    #[error("Timed out waiting for {0}")]
    Timeout(String),

    #[error("WebDriver protocol error: {0}")]
    Protocol(String),
}

impl From<reqwest::Error> for DriverError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout(e.to_string())
        } else {
            Self::Protocol(e.to_string())
        }
    }
}

/// Result type for driver operations
pub type DriverResult<T> = std::result::Result<T, DriverError>;

/// How to find an element on the current page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Locator<'a> {
    Id(&'a str),
    Css(&'a str),
    XPath(&'a str),
}

impl fmt::Display for Locator<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "#{}", id),
            Self::Css(css) => write!(f, "css `{}`", css),
            Self::XPath(xpath) => write!(f, "xpath `{}`", xpath),
        }
    }
}

/// Opaque reference to an element of the current page
///
/// Handles go stale when the page re-renders; callers look elements up again
/// instead of holding on to them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementHandle(pub String);

/// A browser automation session
///
/// One session is driven by one crawl at a time; every call is awaited before the
/// next is issued.
#[async_trait]
pub trait Browser: Send {
    /// Loads a URL and waits for the document to finish loading
    async fn navigate(&mut self, url: &str) -> DriverResult<()>;

    /// Returns true if the current page source contains `text`
    async fn page_contains(&mut self, text: &str) -> DriverResult<bool>;

    async fn find_element(&mut self, locator: Locator<'_>) -> DriverResult<ElementHandle>;

    /// Finds every matching element; no match is an empty list
    async fn find_elements(&mut self, locator: Locator<'_>) -> DriverResult<Vec<ElementHandle>>;

    /// Finds the first element matching `locator` inside `parent`
    async fn find_child(
        &mut self,
        parent: &ElementHandle,
        locator: Locator<'_>,
    ) -> DriverResult<ElementHandle>;

    async fn click(&mut self, element: &ElementHandle) -> DriverResult<()>;

    /// Reads the rendered text of an element
    async fn read_text(&mut self, element: &ElementHandle) -> DriverResult<String>;

    async fn attribute(
        &mut self,
        element: &ElementHandle,
        name: &str,
    ) -> DriverResult<Option<String>>;

    async fn type_text(&mut self, element: &ElementHandle, text: &str) -> DriverResult<()>;

    /// Polls for an element until it appears or `timeout` elapses
    ///
    /// # Returns
    ///
    /// * `Ok(ElementHandle)` - The element appeared
    /// * `Err(DriverError::Timeout)` - It did not appear in time
    async fn wait_until_present(
        &mut self,
        locator: Locator<'_>,
        timeout: Duration,
    ) -> DriverResult<ElementHandle> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.find_element(locator).await {
                Ok(element) => return Ok(element),
                Err(DriverError::NoSuchElement(_)) if Instant::now() < deadline => {
                    tokio::time::sleep(POLL_INTERVAL).await;
                }
                Err(DriverError::NoSuchElement(_)) => {
                    return Err(DriverError::Timeout(locator.to_string()));
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Ends the session
    async fn close(&mut self) -> DriverResult<()>;
}
