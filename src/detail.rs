//! Detail fetching: one isolated session per post, run through a bounded
//! pool that hands results back in submission order.
//!
//! A failed detail fetch never aborts anything. The item is passed through
//! with empty content and the reason is kept on [`DetailStatus::Empty`].

use crate::error::SourceError;
use crate::models::Item;
use crate::source::{ContentSource, PageSession};
use crate::utils::truncate_for_log;
use futures::future;
use futures::stream::{self, Stream, StreamExt};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Whether an item's body was retrieved.
#[derive(Debug)]
pub enum DetailStatus {
    Fetched,
    Empty { reason: SourceError },
}

/// An item after its detail fetch, successful or not.
#[derive(Debug)]
pub struct DetailOutcome {
    pub item: Item,
    pub status: DetailStatus,
}

impl DetailOutcome {
    pub fn is_fetched(&self) -> bool {
        matches!(self.status, DetailStatus::Fetched)
    }

    pub fn failure(&self) -> Option<&SourceError> {
        match &self.status {
            DetailStatus::Fetched => None,
            DetailStatus::Empty { reason } => Some(reason),
        }
    }

    pub fn into_item(self) -> Item {
        self.item
    }
}

/// Retrieves the body text of one item.
pub struct DetailFetcher<S> {
    source: Arc<S>,
    selector: Arc<str>,
}

impl<S> Clone for DetailFetcher<S> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            selector: Arc::clone(&self.selector),
        }
    }
}

impl<S> fmt::Debug for DetailFetcher<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DetailFetcher").field("selector", &self.selector).finish()
    }
}

impl<S> DetailFetcher<S>
where
    S: ContentSource,
{
    pub fn new(source: Arc<S>, selector: &str) -> Self {
        Self {
            source,
            selector: Arc::from(selector),
        }
    }

    /// Fetch `item`'s body. Never fails; see [`DetailStatus`].
    #[instrument(level = "debug", skip_all, fields(url = %item.url))]
    pub async fn fetch_detail(&self, item: Item) -> DetailOutcome {
        debug!(published_at = %item.published_at, title = %truncate_for_log(&item.title, 40), "Fetching detail");
        match self.load_body(&item.url).await {
            Ok(content) => DetailOutcome {
                item: item.with_content(content),
                status: DetailStatus::Fetched,
            },
            Err(reason) => {
                warn!(url = %item.url, error = %reason, "Detail fetch failed; keeping empty content");
                DetailOutcome {
                    item,
                    status: DetailStatus::Empty { reason },
                }
            }
        }
    }

    async fn load_body(&self, url: &str) -> Result<String, SourceError> {
        // released when this scope ends, whichever way it ends
        let session = self.source.open_session().await?;
        let doc = session.navigate(url).await?;
        doc.query_text(&self.selector)
    }
}

/// Holds out-of-order results until every earlier index has arrived.
#[derive(Debug)]
pub struct ReorderBuffer<T> {
    next: usize,
    pending: BTreeMap<usize, T>,
}

impl<T> Default for ReorderBuffer<T> {
    fn default() -> Self {
        Self {
            next: 0,
            pending: BTreeMap::new(),
        }
    }
}

impl<T> ReorderBuffer<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, index: usize, value: T) {
        self.pending.insert(index, value);
    }

    /// Remove and return the contiguous run starting at the next index due.
    pub fn drain_ready(&mut self) -> Vec<T> {
        let mut ready = Vec::new();
        while let Some(value) = self.pending.remove(&self.next) {
            ready.push(value);
            self.next += 1;
        }
        ready
    }
}

/// Runs detail fetches at most `width` at a time.
pub struct DetailPool<S> {
    fetcher: DetailFetcher<S>,
    width: usize,
}

impl<S> fmt::Debug for DetailPool<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DetailPool")
            .field("fetcher", &self.fetcher)
            .field("width", &self.width)
            .finish()
    }
}

impl<S> DetailPool<S>
where
    S: ContentSource,
{
    /// Widening the pool costs roughly one extra session per slot.
    pub fn new(fetcher: DetailFetcher<S>, width: usize) -> Self {
        Self {
            fetcher,
            width: width.max(1),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Fetch every item's detail, yielding outcomes in the order the items
    /// were given regardless of which fetch finishes first.
    pub fn fetch_all<I>(&self, items: I) -> impl Stream<Item = DetailOutcome> + use<S, I>
    where
        I: IntoIterator<Item = Item>,
    {
        let fetcher = self.fetcher.clone();
        stream::iter(items.into_iter().enumerate())
            .map(move |(index, item)| {
                let fetcher = fetcher.clone();
                async move { (index, fetcher.fetch_detail(item).await) }
            })
            .buffer_unordered(self.width)
            .scan(ReorderBuffer::new(), |buffer, (index, outcome)| {
                buffer.push(index, outcome);
                future::ready(Some(stream::iter(buffer.drain_ready())))
            })
            .flatten()
    }
}
