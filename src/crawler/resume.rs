//! Resume point of an incremental run
//!
//! The page list arrives newest edit first. Every page edited at or after the
//! checkpoint sits in a prefix of that list; the resume index is the last entry of
//! the prefix. It is found by binary search over per-page timestamp lookups, since
//! each lookup is a remote call.

use crate::wikidot::{Lookup, WikiSite};
use crate::{MirrorError, Result};
use chrono::{DateTime, Utc};

/// Locates where an incremental run starts inside a recency-ordered page list
pub struct ResumeLocator<'a> {
    site: &'a dyn WikiSite,
    boundary_probes: u32,
}

impl<'a> ResumeLocator<'a> {
    /// # Arguments
    ///
    /// * `site` - Oracle for per-page last-edit timestamps
    /// * `boundary_probes` - Entries checked past the boundary once it is found
    pub fn new(site: &'a dyn WikiSite, boundary_probes: u32) -> Self {
        Self {
            site,
            boundary_probes,
        }
    }

    /// Finds the largest index whose page was edited at or after `checkpoint`
    ///
    /// # Search
    ///
    /// Bounds start at `upper = 0` and `lower = N-1` and keep the invariant
    /// `ts(lower) < checkpoint <= ts(upper)` while halving the gap. The list is
    /// assumed newest-first; since the remote ordering is not guaranteed strictly
    /// monotonic, the entries just past the boundary are probed as well and any
    /// that are at or after the checkpoint extend the result.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(index))` - Pages `0..=index` need processing
    /// * `Ok(None)` - The list is empty or nothing changed since the checkpoint
    /// * `Err(MirrorError::OracleLookup)` - A timestamp could not be obtained
    pub async fn locate(
        &self,
        pages: &[String],
        checkpoint: DateTime<Utc>,
    ) -> Result<Option<usize>> {
        let Some(last) = pages.len().checked_sub(1) else {
            return Ok(None);
        };

        if self.timestamp(pages, 0).await? < checkpoint {
            tracing::info!("No page edited since {}", checkpoint.to_rfc3339());
            return Ok(None);
        }
        if last == 0 || self.timestamp(pages, last).await? >= checkpoint {
            return Ok(Some(last));
        }

        let mut upper = 0;
        let mut lower = last;
        while lower - upper > 1 {
            let mid = (upper + lower) / 2;
            if self.timestamp(pages, mid).await? >= checkpoint {
                upper = mid;
            } else {
                lower = mid;
            }
        }

        let mut resume = upper;
        let probe_end = last.min(lower + self.boundary_probes as usize);
        for index in lower + 1..=probe_end {
            if self.timestamp(pages, index).await? >= checkpoint {
                tracing::warn!(
                    "Page list is not ordered by edit time: {} at index {} is past the boundary at {}",
                    pages[index],
                    index,
                    upper
                );
                resume = index;
            }
        }

        tracing::info!(
            "Resuming at index {} of {} ({})",
            resume,
            pages.len(),
            pages[resume]
        );
        Ok(Some(resume))
    }

    async fn timestamp(&self, pages: &[String], index: usize) -> Result<DateTime<Utc>> {
        let page = &pages[index];
        match self.site.last_edited_at(page).await? {
            Lookup::Found(ts) => Ok(ts),
            Lookup::NotFound => Err(MirrorError::OracleLookup {
                page: page.clone(),
                message: "page listed but unknown to the metadata lookup".to_string(),
            }),
        }
    }
}
