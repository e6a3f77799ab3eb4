//! Binary search over listing pages for the page that holds a target date.
//!
//! Pages are ordered newest to oldest, and the day span of each page never
//! moves forward in time as the ordinal grows. That makes "the target is not
//! older than everything on page `p`" a monotone predicate over `p`, and the
//! search converges on the first page where it holds.
//!
//! If the listing shifts while it is being searched (new posts pushing items
//! onto later pages), the result is best-effort.

use crate::error::FetchError;
use crate::listing::ListingClient;
use crate::models::{DateRange, Item, SearchWindow};
use crate::source::PageSession;
use chrono::NaiveDate;
use tracing::{debug, info, instrument};

/// Day span covered by one page's items (newest first).
pub fn range_of(page: u32, items: &[Item]) -> Result<DateRange, FetchError> {
    match (items.first(), items.last()) {
        (Some(first), Some(last)) => Ok(DateRange {
            newest: first.published_date(),
            oldest: last.published_date(),
        }),
        _ => Err(FetchError::EmptyPage { page }),
    }
}

/// Finds the boundary page for a target date.
#[derive(Debug)]
pub struct TargetPageLocator<'a, P> {
    listing: &'a ListingClient<P>,
}

impl<'a, P> TargetPageLocator<'a, P>
where
    P: PageSession,
{
    pub fn new(listing: &'a ListingClient<P>) -> Self {
        Self { listing }
    }

    /// Return the smallest page ordinal whose range could contain `target`.
    ///
    /// The result is in `1..=total_pages + 1`; `total_pages + 1` means the
    /// target is older than the whole listing. Each page is probed at most
    /// once, so this makes at most `floor(log2(total_pages)) + 1` listing
    /// calls.
    #[instrument(level = "info", skip(self), fields(identifier = %self.listing.urls().identifier()))]
    pub async fn locate(&self, target: NaiveDate, total_pages: u32) -> Result<u32, FetchError> {
        if total_pages == 0 {
            return Err(FetchError::EmptySource {
                identifier: self.listing.urls().identifier().to_string(),
            });
        }

        let mut window = SearchWindow::new(total_pages);
        while window.is_open() {
            let mid = window.mid();
            info!(lo = window.lo, hi = window.hi, mid, "Searching");
            let items = self.listing.fetch_page(mid).await?;
            let range = range_of(mid, &items)?;
            debug!(mid, %range, "Probed page");

            if target > range.newest || range.contains(target) {
                // newer than this page, or on it: an earlier page may hold it too
                window.go_newer(mid);
            } else {
                window.go_older(mid);
            }
        }

        info!(boundary = window.lo, "Located boundary page");
        Ok(window.lo)
    }
}
