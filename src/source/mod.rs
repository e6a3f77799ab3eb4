//! The content source capability: sessions that load pages, and the
//! documents they return.
//!
//! # Architecture
//!
//! - [`ContentSource`]: hands out isolated [`PageSession`]s
//! - [`PageSession`]: loads one URL at a time into a [`Document`]
//! - [`Document`]: a loaded page with structured and text queries
//! - [`http`]: the `reqwest` implementation used by the binary
//! - [`retry`]: exponential backoff around a session's navigation
//!
//! A session is released when it is dropped, so a session held in a local
//! binding is released on every exit path of the enclosing function.

pub mod http;
pub mod retry;

use crate::error::SourceError;
use regex::Regex;
use scraper::{Html, Selector};
use serde::de::DeserializeOwned;

/// Something that can load pages.
pub trait ContentSource {
    type Session: PageSession;

    /// Open a fresh session that shares no state with any other session.
    async fn open_session(&self) -> Result<Self::Session, SourceError>;
}

/// One browsing session. Dropping it releases its resources.
pub trait PageSession {
    /// Load `url` and wait for it to finish, bounded by the session timeout.
    async fn navigate(&self, url: &str) -> Result<Document, SourceError>;
}

/// A loaded page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Final URL after redirects.
    url: String,
    html: String,
}

impl Document {
    pub fn new(url: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            html: html.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Decode the JSON object assigned to `var {variable} = {...};` in the
    /// page's inline scripts.
    pub fn query_structured<T: DeserializeOwned>(&self, variable: &str) -> Result<T, SourceError> {
        let pattern = Regex::new(&format!(r"var {}\s*=\s*(\{{.*?\}});", regex::escape(variable)))
            .map_err(|_| SourceError::MissingPayload {
                variable: variable.to_string(),
            })?;
        let raw = pattern
            .captures(&self.html)
            .and_then(|caps| caps.get(1))
            .ok_or_else(|| SourceError::MissingPayload {
                variable: variable.to_string(),
            })?;
        serde_json::from_str(raw.as_str()).map_err(|source| SourceError::MalformedPayload {
            variable: variable.to_string(),
            source,
        })
    }

    /// Text of the first element matching `selector`.
    pub fn query_text(&self, selector: &str) -> Result<String, SourceError> {
        let selector_parsed = parse_selector(selector)?;
        let document = Html::parse_document(&self.html);
        document
            .select(&selector_parsed)
            .next()
            .map(|element| normalize_text(element.text()))
            .ok_or_else(|| SourceError::ElementNotFound {
                selector: selector.to_string(),
            })
    }

    /// Text of every element matching `selector`, in document order.
    pub fn query_all_text(&self, selector: &str) -> Result<Vec<String>, SourceError> {
        let selector_parsed = parse_selector(selector)?;
        let document = Html::parse_document(&self.html);
        Ok(document
            .select(&selector_parsed)
            .map(|element| normalize_text(element.text()))
            .collect())
    }
}

/// Parse a CSS selector, mapping scraper's error into [`SourceError`].
pub fn parse_selector(selector: &str) -> Result<Selector, SourceError> {
    Selector::parse(selector).map_err(|_| SourceError::InvalidSelector(selector.to_string()))
}

/// Join text nodes, dropping blank ones and trimming each line.
fn normalize_text<'a>(pieces: impl Iterator<Item = &'a str>) -> String {
    pieces
        .map(str::trim)
        .filter(|piece| !piece.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
