//! Scripted in-memory content source used by the unit tests.

use crate::error::SourceError;
use crate::source::{ContentSource, Document, PageSession};
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const BASE: &str = "https://guba.test";

#[derive(Debug, Clone, Copy)]
pub enum FakeFailure {
    NotFound,
    Timeout,
    ServerError,
}

impl FakeFailure {
    fn to_error(self, url: &str) -> SourceError {
        match self {
            FakeFailure::NotFound => SourceError::NotFound { url: url.to_string() },
            FakeFailure::Timeout => SourceError::Timeout { url: url.to_string() },
            FakeFailure::ServerError => SourceError::Status {
                url: url.to_string(),
                status: 502,
            },
        }
    }
}

#[derive(Debug, Clone)]
struct FakePage {
    final_url: String,
    html: String,
    delay: Duration,
}

#[derive(Debug, Default)]
struct FakeState {
    pages: HashMap<String, FakePage>,
    failures: HashMap<String, (usize, FakeFailure)>,
    visits: Vec<String>,
}

#[derive(Debug, Default)]
struct Inner {
    state: Mutex<FakeState>,
    open: AtomicUsize,
    peak: AtomicUsize,
    opened: AtomicUsize,
}

/// Content source serving scripted pages, with session accounting.
#[derive(Debug, Clone, Default)]
pub struct FakeSource {
    inner: Arc<Inner>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_page(&self, url: &str, html: &str) {
        self.insert(url, url, html);
    }

    /// Serve `html` for `url` as if the site had redirected to `final_url`.
    pub fn set_redirect(&self, url: &str, final_url: &str, html: &str) {
        self.insert(url, final_url, html);
    }

    pub fn set_delay(&self, url: &str, delay: Duration) {
        let mut state = self.inner.state.lock().unwrap();
        if let Some(page) = state.pages.get_mut(url) {
            page.delay = delay;
        }
    }

    /// Fail the next `times` navigations to `url`.
    pub fn fail_times(&self, url: &str, times: usize, failure: FakeFailure) {
        let mut state = self.inner.state.lock().unwrap();
        state.failures.insert(url.to_string(), (times, failure));
    }

    pub fn fail_always(&self, url: &str, failure: FakeFailure) {
        self.fail_times(url, usize::MAX, failure);
    }

    pub fn visits(&self) -> Vec<String> {
        self.inner.state.lock().unwrap().visits.clone()
    }

    pub fn visits_to(&self, url: &str) -> usize {
        self.visits().iter().filter(|v| v.as_str() == url).count()
    }

    pub fn open_sessions(&self) -> usize {
        self.inner.open.load(Ordering::SeqCst)
    }

    pub fn peak_sessions(&self) -> usize {
        self.inner.peak.load(Ordering::SeqCst)
    }

    pub fn sessions_opened(&self) -> usize {
        self.inner.opened.load(Ordering::SeqCst)
    }

    /// Install a full listing for `identifier`, one entry per page, with a
    /// pager on every page reporting `pages.len()` pages.
    pub fn with_listing(self, identifier: &str, pages: &[Vec<Post>]) -> Self {
        for (index, posts) in pages.iter().enumerate() {
            let url = list_url(identifier, index as u32 + 1);
            self.set_page(&url, &listing_html(posts, pages.len() as u32));
        }
        self
    }

    /// Install a detail page for every post in the listing.
    pub fn with_details(self, identifier: &str, pages: &[Vec<Post>]) -> Self {
        for post in pages.iter().flatten() {
            self.set_page(&detail_url(identifier, post.id), &detail_html(&post.body()));
        }
        self
    }

    fn insert(&self, url: &str, final_url: &str, html: &str) {
        let mut state = self.inner.state.lock().unwrap();
        state.pages.insert(
            url.to_string(),
            FakePage {
                final_url: final_url.to_string(),
                html: html.to_string(),
                delay: Duration::ZERO,
            },
        );
    }
}

impl ContentSource for FakeSource {
    type Session = FakeSession;

    async fn open_session(&self) -> Result<FakeSession, SourceError> {
        let open = self.inner.open.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.peak.fetch_max(open, Ordering::SeqCst);
        self.inner.opened.fetch_add(1, Ordering::SeqCst);
        Ok(FakeSession {
            inner: Arc::clone(&self.inner),
        })
    }
}

#[derive(Debug)]
pub struct FakeSession {
    inner: Arc<Inner>,
}

impl PageSession for FakeSession {
    async fn navigate(&self, url: &str) -> Result<Document, SourceError> {
        let outcome = {
            let mut state = self.inner.state.lock().unwrap();
            state.visits.push(url.to_string());
            let failure = match state.failures.get_mut(url) {
                Some((remaining, failure)) if *remaining > 0 => {
                    *remaining -= 1;
                    Some(*failure)
                }
                _ => None,
            };
            match failure {
                Some(failure) => Err(failure.to_error(url)),
                None => state
                    .pages
                    .get(url)
                    .cloned()
                    .ok_or_else(|| SourceError::NotFound { url: url.to_string() }),
            }
        };

        let page = outcome?;
        if !page.delay.is_zero() {
            tokio::time::sleep(page.delay).await;
        }
        Ok(Document::new(page.final_url, page.html))
    }
}

impl Drop for FakeSession {
    fn drop(&mut self) {
        self.inner.open.fetch_sub(1, Ordering::SeqCst);
    }
}

/// One post as it appears in the listing payload.
#[derive(Debug, Clone)]
pub struct Post {
    pub id: u64,
    pub title: String,
    pub published: String,
}

impl Post {
    pub fn body(&self) -> String {
        format!("Body of post {}", self.id)
    }
}

pub fn list_url(identifier: &str, page: u32) -> String {
    format!("{BASE}/list,{identifier}_{page}.html")
}

pub fn detail_url(identifier: &str, post_id: u64) -> String {
    format!("{BASE}/news,{identifier},{post_id}.html")
}

pub fn listing_html(posts: &[Post], total_pages: u32) -> String {
    let payload = json!({
        "re": posts
            .iter()
            .map(|p| json!({
                "post_id": p.id,
                "post_title": p.title,
                "post_publish_time": p.published,
            }))
            .collect::<Vec<_>>(),
        "count": posts.len(),
    });
    format!(
        "<html><head><script>var article_list={payload};</script></head>\
         <body><ul class=\"paging\"><li>1</li><li>{total_pages}</li><li>next</li></ul></body></html>"
    )
}

pub fn detail_html(body: &str) -> String {
    format!("<html><body><div class=\"newstext\"><p>{body}</p></div></body></html>")
}

/// Build listing pages where page `n` holds one post per date in `days[n]`
/// (newest first). Post ids are assigned sequentially from 1.
pub fn pages_of_days(days: &[&[&str]]) -> Vec<Vec<Post>> {
    let mut next_id = 1;
    days.iter()
        .map(|dates| {
            dates
                .iter()
                .map(|date| {
                    let post = Post {
                        id: next_id,
                        title: format!("Post {next_id}"),
                        published: format!("{date} 12:00:00"),
                    };
                    next_id += 1;
                    post
                })
                .collect()
        })
        .collect()
}
