//! Revision history walker
//!
//! Drives the paginated revision list of one page. The list shows a bounded number
//! of rows per page of history; further pages are reached through a pager whose
//! buttons are re-rendered on every step.
//!
//! Row elements go stale whenever the list re-renders (revealing a source does
//! this), so rows are looked up again before every access.

use crate::browser::{
    Browser, DriverError, ElementHandle, HISTORY_BUTTON, PAGER_BUTTONS, PAGER_CURRENT_CLASS,
    PAGER_LINK, PAGER_TARGET_CLASS, PAGE_NOT_FOUND_TEXT, POLL_INTERVAL, REVISION_LIST,
    REVISION_ROWS, REVISION_SOURCE, ROW_SOURCE_BUTTON,
};
use crate::{MirrorError, Result};
use std::time::Duration;
use tokio::time::Instant;

/// Position of the walker in the paginated history
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cursor {
    /// Showing the first (newest) page of history
    Start,
    /// Showing a later page, reached through the pager
    FollowingPager { page_index: u32 },
    /// No further history pages
    Exhausted,
}

/// Walks the revision list of one page through a browser session
pub struct HistoryWalker<'b> {
    browser: &'b mut dyn Browser,
    page: String,
    wait: Duration,
    cursor: Cursor,
}

impl<'b> HistoryWalker<'b> {
    /// Loads a page and opens its revision list
    ///
    /// # Arguments
    ///
    /// * `browser` - The automation session
    /// * `page` - Raw page name, for diagnostics
    /// * `url` - The page's URL
    /// * `wait` - Bound on waits for rendered content
    ///
    /// # Returns
    ///
    /// * `Ok(HistoryWalker)` - Positioned at the newest history rows
    /// * `Err(MirrorError::PageNotFound)` - The site shows its missing-page notice
    /// * `Err(MirrorError::Driver)` - The history could not be opened
    pub async fn open(
        browser: &'b mut dyn Browser,
        page: &str,
        url: &str,
        wait: Duration,
    ) -> Result<HistoryWalker<'b>> {
        browser.navigate(url).await?;
        if browser.page_contains(PAGE_NOT_FOUND_TEXT).await? {
            return Err(MirrorError::PageNotFound {
                page: page.to_string(),
            });
        }

        let history = browser.find_element(HISTORY_BUTTON).await?;
        browser.click(&history).await?;
        browser.wait_until_present(REVISION_LIST, wait).await?;

        Ok(Self {
            browser,
            page: page.to_string(),
            wait,
            cursor: Cursor::Start,
        })
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    /// Gives the session back for other page interactions
    pub fn into_browser(self) -> &'b mut dyn Browser {
        self.browser
    }

    /// Number of revision rows on the current history page
    pub async fn row_count(&mut self) -> Result<usize> {
        let rows = self.browser.find_elements(REVISION_ROWS).await?;
        // First row is the column header
        Ok(rows.len().saturating_sub(1))
    }

    async fn row(&mut self, index: usize) -> Result<ElementHandle> {
        let mut rows = self.browser.find_elements(REVISION_ROWS).await?;
        if index + 1 >= rows.len() {
            return Err(DriverError::NoSuchElement(format!(
                "history row {} of {}",
                index, self.page
            ))
            .into());
        }
        Ok(rows.swap_remove(index + 1))
    }

    /// Rendered text of a revision row
    pub async fn row_text(&mut self, index: usize) -> Result<String> {
        let row = self.row(index).await?;
        Ok(self.browser.read_text(&row).await?)
    }

    /// Remote identifier of a revision row; empty if the row carries none
    pub async fn row_id(&mut self, index: usize) -> Result<String> {
        let row = self.row(index).await?;
        Ok(self.browser.attribute(&row, "id").await?.unwrap_or_default())
    }

    /// Reveals and reads the source of a revision row
    ///
    /// All rows share one source view, which keeps showing the previously revealed
    /// revision until the new one arrives. The read waits until the view element
    /// has been replaced or its text has changed.
    pub async fn row_source(&mut self, index: usize) -> Result<String> {
        let previous = self.shown_source().await?;

        let row = self.row(index).await?;
        let button = self.browser.find_child(&row, ROW_SOURCE_BUTTON).await?;
        self.browser.click(&button).await?;

        match previous {
            None => {
                let source = self
                    .browser
                    .wait_until_present(REVISION_SOURCE, self.wait)
                    .await?;
                Ok(self.browser.read_text(&source).await?)
            }
            Some((view, text)) => self.wait_for_source_change(index, &view, &text).await,
        }
    }

    /// The source view currently shown, with its text
    async fn shown_source(&mut self) -> Result<Option<(ElementHandle, String)>> {
        let Some(view) = self.browser.find_elements(REVISION_SOURCE).await?.into_iter().next()
        else {
            return Ok(None);
        };
        match self.browser.read_text(&view).await {
            Ok(text) => Ok(Some((view, text))),
            Err(DriverError::NoSuchElement(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn wait_for_source_change(
        &mut self,
        index: usize,
        previous_view: &ElementHandle,
        previous_text: &str,
    ) -> Result<String> {
        let deadline = Instant::now() + self.wait;
        loop {
            if let Some(view) = self.browser.find_elements(REVISION_SOURCE).await?.into_iter().next()
            {
                match self.browser.read_text(&view).await {
                    Ok(text) if view != *previous_view || text != previous_text => return Ok(text),
                    // Still the previous revision, or replaced between lookup and read
                    Ok(_) | Err(DriverError::NoSuchElement(_)) => {}
                    Err(e) => return Err(e.into()),
                }
            }
            if Instant::now() >= deadline {
                return Err(DriverError::Timeout(format!(
                    "source view of {} to show history row {}",
                    self.page, index
                ))
                .into());
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Moves to the next page of history
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - The next history page is showing
    /// * `Ok(false)` - There is no next page; the cursor is `Exhausted`
    /// * `Err(MirrorError::Driver)` - The pager could not be read or did not respond
    pub async fn advance(&mut self) -> Result<bool> {
        let next_index = match self.cursor {
            Cursor::Exhausted => return Ok(false),
            Cursor::Start => 1,
            Cursor::FollowingPager { page_index } => page_index + 1,
        };

        match self.step_pager().await {
            Ok(true) => {
                self.cursor = Cursor::FollowingPager {
                    page_index: next_index,
                };
                tracing::debug!("History of {} at pager page {}", self.page, next_index + 1);
                Ok(true)
            }
            Ok(false) => {
                self.cursor = Cursor::Exhausted;
                Ok(false)
            }
            Err(e) => {
                tracing::warn!("History pager of {} failed: {}", self.page, e);
                Err(e)
            }
        }
    }

    async fn step_pager(&mut self) -> Result<bool> {
        let buttons = self.browser.find_elements(PAGER_BUTTONS).await?;
        if buttons.is_empty() {
            // Short histories have no pager
            return Ok(false);
        }

        let mut current = None;
        for (i, button) in buttons.iter().enumerate() {
            if has_class(self.browser.attribute(button, "class").await?, PAGER_CURRENT_CLASS) {
                current = Some(i);
                break;
            }
        }
        let current = current.ok_or_else(|| {
            DriverError::NoSuchElement(format!("current pager button of {}", self.page))
        })?;

        let Some(next) = buttons.get(current + 1) else {
            return Ok(false);
        };
        if !has_class(self.browser.attribute(next, "class").await?, PAGER_TARGET_CLASS) {
            return Ok(false);
        }

        let label = self.browser.read_text(&buttons[current]).await?;
        let link = self.browser.find_child(next, PAGER_LINK).await?;
        self.browser.click(&link).await?;
        self.wait_for_pager_change(&label).await?;
        Ok(true)
    }

    /// Waits until the pager marks a different button as current
    async fn wait_for_pager_change(&mut self, previous_label: &str) -> Result<()> {
        let deadline = Instant::now() + self.wait;
        loop {
            if let Some(label) = self.current_label().await? {
                if label != previous_label {
                    return Ok(());
                }
            }
            if Instant::now() >= deadline {
                return Err(DriverError::Timeout(format!(
                    "history pager of {} to leave page {}",
                    self.page, previous_label
                ))
                .into());
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn current_label(&mut self) -> Result<Option<String>> {
        for button in self.browser.find_elements(PAGER_BUTTONS).await? {
            if has_class(self.browser.attribute(&button, "class").await?, PAGER_CURRENT_CLASS) {
                return Ok(Some(self.browser.read_text(&button).await?));
            }
        }
        Ok(None)
    }
}

fn has_class(class_attr: Option<String>, class: &str) -> bool {
    class_attr.is_some_and(|attr| attr.split_whitespace().any(|c| c == class))
}
