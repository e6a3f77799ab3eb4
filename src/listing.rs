//! Listing pages: URL scheme, payload parsing and total-page discovery.
//!
//! A listing page embeds its posts as a JSON block
//! (`var article_list = {"re": [...]};`), newest first. The pager at the
//! bottom of every page (`ul.paging li`) carries the total page count in its
//! second-to-last entry.
//!
//! # URL Pattern
//!
//! ```text
//! {base}/list,{identifier}_{page}.html       listing page
//! {base}/news,{identifier},{post_id}.html    post permalink
//! {base}/error?type=1                        "no such identifier" redirect
//! ```

use crate::error::{FetchError, SourceError};
use crate::models::{Item, TIMESTAMP_FORMAT};
use crate::source::retry::RetrySession;
use crate::source::{Document, PageSession};
use chrono::NaiveDateTime;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// URLs for one identifier on one site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingUrls {
    base: String,
    identifier: String,
}

impl ListingUrls {
    pub fn new(base: &str, identifier: &str) -> Self {
        Self {
            base: base.trim_end_matches('/').to_string(),
            identifier: identifier.to_string(),
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn page_url(&self, page: u32) -> String {
        format!("{}/list,{}_{}.html", self.base, self.identifier, page)
    }

    pub fn detail_url(&self, post_id: &PostId) -> String {
        format!("{}/news,{},{}.html", self.base, self.identifier, post_id)
    }

    /// Whether a navigation ended on the site's "no such identifier" page.
    pub fn is_not_found(&self, final_url: &str) -> bool {
        final_url.starts_with(&format!("{}/error", self.base))
    }
}

/// Post ids show up both as JSON numbers and as strings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum PostId {
    Number(u64),
    Text(String),
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PostId::Number(n) => write!(f, "{n}"),
            PostId::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ListingPayload {
    re: Vec<RawPost>,
}

#[derive(Debug, Deserialize)]
struct RawPost {
    post_id: PostId,
    post_title: String,
    post_publish_time: String,
}

/// Selectors and retry knobs the listing client needs.
#[derive(Debug, Clone)]
pub struct ListingOptions {
    pub payload_variable: String,
    pub pager_selector: String,
    pub discovery_retries: usize,
    pub retry_base_delay: Duration,
    pub retry_jitter: Duration,
}

/// Fetches and parses listing pages over one exclusively owned session.
pub struct ListingClient<P> {
    session: P,
    urls: ListingUrls,
    options: ListingOptions,
}

impl<P> fmt::Debug for ListingClient<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListingClient")
            .field("urls", &self.urls)
            .field("options", &self.options)
            .finish()
    }
}

impl<P> ListingClient<P>
where
    P: PageSession,
{
    pub fn new(session: P, urls: ListingUrls, options: ListingOptions) -> Self {
        Self { session, urls, options }
    }

    pub fn urls(&self) -> &ListingUrls {
        &self.urls
    }

    /// Fetch one listing page and parse its items, newest first.
    ///
    /// # Errors
    ///
    /// - [`FetchError::PageNotFound`] when the site reports the identifier
    ///   does not exist
    /// - [`FetchError::Parse`] when the payload is missing or malformed
    /// - [`FetchError::Listing`] for any other navigation failure
    #[instrument(level = "info", skip(self), fields(identifier = %self.urls.identifier))]
    pub async fn fetch_page(&self, page: u32) -> Result<Vec<Item>, FetchError> {
        let url = self.urls.page_url(page);
        let doc = self.load(page, &self.session, &url).await?;
        let items = self.parse_items(page, &doc)?;
        info!(%url, count = items.len(), "Fetched listing page");
        Ok(items)
    }

    /// Read the total page count from page 1's pager.
    ///
    /// The navigation retries transient failures with backoff; a
    /// "no such identifier" answer is never retried.
    #[instrument(level = "info", skip(self), fields(identifier = %self.urls.identifier))]
    pub async fn discover_total_pages(&self) -> Result<u32, FetchError> {
        let url = self.urls.page_url(1);
        let retrying = RetrySession::new(
            &self.session,
            self.options.discovery_retries,
            self.options.retry_base_delay,
            self.options.retry_jitter,
        );
        let doc = self.load(1, &retrying, &url).await?;

        let pagers = doc
            .query_all_text(&self.options.pager_selector)
            .map_err(|source| FetchError::Listing { page: 1, source })?;
        if pagers.len() < 2 {
            return Err(FetchError::Listing {
                page: 1,
                source: SourceError::ElementNotFound {
                    selector: self.options.pager_selector.clone(),
                },
            });
        }
        let last = &pagers[pagers.len() - 2];
        let total: u32 = last.trim().parse().map_err(|e: std::num::ParseIntError| FetchError::Parse {
            page: 1,
            what: format!("pager entry `{last}`"),
            source: e.into(),
        })?;

        if total == 0 {
            return Err(FetchError::EmptySource {
                identifier: self.urls.identifier.clone(),
            });
        }
        info!(total_pages = total, "Discovered total pages");
        Ok(total)
    }

    async fn load<S: PageSession>(&self, page: u32, session: &S, url: &str) -> Result<Document, FetchError> {
        let doc = session.navigate(url).await.map_err(|source| match source {
            SourceError::NotFound { .. } => FetchError::PageNotFound {
                identifier: self.urls.identifier.clone(),
            },
            source => FetchError::Listing { page, source },
        })?;
        if self.urls.is_not_found(doc.url()) {
            debug!(final_url = %doc.url(), "Redirected to not-found page");
            return Err(FetchError::PageNotFound {
                identifier: self.urls.identifier.clone(),
            });
        }
        Ok(doc)
    }

    fn parse_items(&self, page: u32, doc: &Document) -> Result<Vec<Item>, FetchError> {
        let payload: ListingPayload = doc
            .query_structured(&self.options.payload_variable)
            .map_err(|e: SourceError| FetchError::Parse {
                page,
                what: "listing payload".to_string(),
                source: e.into(),
            })?;

        payload
            .re
            .into_iter()
            .map(|post| {
                let published_at = NaiveDateTime::parse_from_str(&post.post_publish_time, TIMESTAMP_FORMAT)
                    .map_err(|e| FetchError::Parse {
                        page,
                        what: format!("publish time `{}`", post.post_publish_time),
                        source: e.into(),
                    })?;
                Ok(Item::summary(post.post_title, self.urls.detail_url(&post.post_id), published_at))
            })
            .collect()
    }
}
