//! Data models shared by the listing, locator, detail and output stages.
//!
//! - [`Item`]: one post summary, later enriched with its body text
//! - [`DateRange`]: the span of days one listing page covers
//! - [`SearchWindow`] / [`FetchWindow`]: page bounds used by the locator and
//!   by the orchestrator
//! - [`Target`]: one (identifier, date) pair to fetch
//! - [`ItemBatch`]: the serialized result for one target

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

/// Timestamp format used by the listing payload and by the JSON output.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A single post on a listing page.
///
/// `content` is empty when the item leaves the listing client and is filled
/// in at most once by the detail fetcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub title: String,
    /// Detail permalink built from the identifier and the post id.
    pub url: String,
    #[serde(rename = "publishedAt", with = "timestamp")]
    pub published_at: NaiveDateTime,
    pub content: String,
}

impl Item {
    /// Create a summary item with no body text yet.
    pub fn summary(title: impl Into<String>, url: impl Into<String>, published_at: NaiveDateTime) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            published_at,
            content: String::new(),
        }
    }

    /// Calendar day the item was published on.
    pub fn published_date(&self) -> NaiveDate {
        self.published_at.date()
    }

    /// Consume the summary and attach its body text.
    pub fn with_content(self, content: String) -> Self {
        Self { content, ..self }
    }
}

/// `YYYY-MM-DD HH:MM:SS` (de)serialization for [`NaiveDateTime`].
pub mod timestamp {
    use super::TIMESTAMP_FORMAT;
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&value.format(TIMESTAMP_FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&raw, TIMESTAMP_FORMAT).map_err(serde::de::Error::custom)
    }
}

/// Inclusive span of days covered by one listing page.
///
/// Listing pages are newest-first, so `newest >= oldest` always holds for a
/// well-formed page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub newest: NaiveDate,
    pub oldest: NaiveDate,
}

impl DateRange {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.oldest <= date && date <= self.newest
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.oldest, self.newest)
    }
}

/// Converging bounds of the page binary search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchWindow {
    pub lo: u32,
    pub hi: u32,
}

impl SearchWindow {
    pub fn new(total_pages: u32) -> Self {
        Self { lo: 1, hi: total_pages }
    }

    pub fn is_open(&self) -> bool {
        self.lo <= self.hi
    }

    pub fn mid(&self) -> u32 {
        self.lo + (self.hi - self.lo) / 2
    }

    /// Continue with ordinals smaller than `mid` (newer pages).
    pub fn go_newer(&mut self, mid: u32) {
        // hi may drop to 0 when mid == 1, which closes the window
        self.hi = mid - 1;
    }

    /// Continue with ordinals larger than `mid` (older pages).
    pub fn go_older(&mut self, mid: u32) {
        self.lo = mid + 1;
    }
}

/// Pages fetched around the located boundary, clamped to `[1, total_pages]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchWindow {
    pub start: u32,
    pub end: u32,
}

impl FetchWindow {
    /// Widen `boundary` by `radius` pages on each side.
    ///
    /// `boundary` may be `total_pages + 1` when the target is older than the
    /// whole listing; the window then collapses onto the last pages.
    pub fn around(boundary: u32, total_pages: u32, radius: u32) -> Self {
        let start = boundary.saturating_sub(radius).max(1);
        let end = boundary.saturating_add(radius).min(total_pages);
        Self {
            start: start.min(end.max(1)),
            end,
        }
    }

    pub fn pages(&self) -> RangeInclusive<u32> {
        self.start..=self.end
    }

    pub fn len(&self) -> usize {
        self.pages().count()
    }
}

impl fmt::Display for FetchWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}

/// One (identifier, date) pair to fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub identifier: String,
    pub date: NaiveDate,
}

impl FromStr for Target {
    type Err = String;

    /// Parse `IDENT@YYYY-MM-DD`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (identifier, date) = s
            .split_once('@')
            .ok_or_else(|| format!("expected IDENT@YYYY-MM-DD, got `{s}`"))?;
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return Err(format!("missing identifier in `{s}`"));
        }
        let date = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
            .map_err(|e| format!("invalid date in `{s}`: {e}"))?;
        Ok(Self {
            identifier: identifier.to_string(),
            date,
        })
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.identifier, self.date)
    }
}

/// Everything fetched for one target, as written to disk.
#[allow(non_snake_case)]
#[derive(Debug, Serialize, Deserialize)]
pub struct ItemBatch {
    pub identifier: String,
    pub targetDate: NaiveDate,
    /// Local time the run finished, `YYYY-MM-DD HH:MM:SS`.
    pub fetchedAt: String,
    pub items: Vec<Item>,
}
