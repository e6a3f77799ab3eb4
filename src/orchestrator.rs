//! Drives one run: discover the listing size, locate the boundary page, then
//! stream every post in the window around it through the detail pool.
//!
//! # Failure Policy
//!
//! Anything that goes wrong before the window is known (discovery, search)
//! is returned from [`FetchOrchestrator::run`] itself, so no detail fetch is
//! attempted. A listing failure inside the window is yielded as the last
//! element of the stream. Detail failures only leave an item's content empty.

use crate::detail::{DetailFetcher, DetailOutcome, DetailPool};
use crate::error::FetchError;
use crate::listing::{ListingClient, ListingOptions, ListingUrls};
use crate::locator::TargetPageLocator;
use crate::models::{FetchWindow, Target};
use crate::source::{ContentSource, PageSession};
use futures::future;
use futures::stream::{self, LocalBoxStream, StreamExt};
use std::fmt;
use std::sync::Arc;
use tracing::{info, instrument};

/// Outcomes of one run, in page order then listing order.
pub type OutcomeStream = LocalBoxStream<'static, Result<DetailOutcome, FetchError>>;

/// Knobs for one orchestrator.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub base_url: String,
    pub workers: usize,
    pub window_radius: u32,
    pub detail_selector: String,
    pub listing: ListingOptions,
}

/// Located boundary and the window derived from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunPlan {
    pub total_pages: u32,
    pub boundary: u32,
    pub window: FetchWindow,
}

pub struct FetchOrchestrator<S> {
    source: Arc<S>,
    options: RunOptions,
}

impl<S> fmt::Debug for FetchOrchestrator<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchOrchestrator").field("options", &self.options).finish()
    }
}

impl<S> FetchOrchestrator<S>
where
    S: ContentSource + 'static,
    S::Session: 'static,
{
    pub fn new(source: Arc<S>, options: RunOptions) -> Self {
        Self { source, options }
    }

    /// Fetch every post in the window around `target.date`.
    ///
    /// Returns the plan and a lazy stream of outcomes. Items come out page by
    /// page, ascending, and in listing order within a page. The listing
    /// session is owned by the stream and released when it is dropped.
    #[instrument(level = "info", skip_all, fields(target = %target))]
    pub async fn run(&self, target: &Target) -> Result<(RunPlan, OutcomeStream), FetchError> {
        let session = self
            .source
            .open_session()
            .await
            .map_err(|source| FetchError::Listing { page: 1, source })?;
        let urls = ListingUrls::new(&self.options.base_url, &target.identifier);
        let listing = ListingClient::new(session, urls, self.options.listing.clone());

        let total_pages = listing.discover_total_pages().await?;
        let boundary = TargetPageLocator::new(&listing).locate(target.date, total_pages).await?;
        let window = FetchWindow::around(boundary, total_pages, self.options.window_radius);
        let pool = DetailPool::new(
            DetailFetcher::new(Arc::clone(&self.source), &self.options.detail_selector),
            self.options.workers,
        );
        info!(total_pages, boundary, %window, workers = pool.width(), "Planned fetch window");

        let plan = RunPlan {
            total_pages,
            boundary,
            window,
        };
        Ok((plan, stream_window(listing, window, pool)))
    }
}

/// Pages of the window in order, each fanned out through the pool. The
/// stream ends right after the first listing failure.
fn stream_window<S, P>(listing: ListingClient<P>, window: FetchWindow, pool: DetailPool<S>) -> OutcomeStream
where
    S: ContentSource + 'static,
    P: PageSession + 'static,
{
    let pages = stream::unfold(Some((listing, window.pages())), |state| async move {
        let (listing, mut pages) = state?;
        let page = pages.next()?;
        info!(page, "Fetching window page");
        match listing.fetch_page(page).await {
            Ok(items) => Some((Ok(items), Some((listing, pages)))),
            Err(e) => Some((Err(e), None)),
        }
    });

    pages
        .map(move |page| match page {
            Ok(items) => pool.fetch_all(items).map(Ok).left_stream(),
            Err(e) => stream::once(future::ready(Err(e))).right_stream(),
        })
        .flatten()
        .boxed_local()
}
