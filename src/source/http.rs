//! `reqwest`-backed content source.
//!
//! Every session builds its own [`Client`], so sessions never share a
//! connection pool or cookies. The final URL after redirects is kept on the
//! returned [`Document`]; the listing relies on it to notice the site's
//! "no such identifier" redirect.

use super::{ContentSource, Document, PageSession};
use crate::error::SourceError;
use reqwest::{Client, StatusCode, redirect::Policy};
use std::time::{Duration, Instant};
use tracing::{debug, instrument};

/// Settings applied to every session the source opens.
#[derive(Debug, Clone)]
pub struct HttpSource {
    user_agent: String,
    timeout: Duration,
}

impl HttpSource {
    pub fn new(user_agent: impl Into<String>, timeout: Duration) -> Self {
        Self {
            user_agent: user_agent.into(),
            timeout,
        }
    }
}

impl ContentSource for HttpSource {
    type Session = HttpSession;

    async fn open_session(&self) -> Result<HttpSession, SourceError> {
        let client = Client::builder()
            .user_agent(&self.user_agent)
            .redirect(Policy::limited(8))
            .timeout(self.timeout)
            .build()?;
        Ok(HttpSession { client })
    }
}

/// One isolated HTTP client.
#[derive(Debug)]
pub struct HttpSession {
    client: Client,
}

impl PageSession for HttpSession {
    #[instrument(level = "debug", skip_all, fields(%url))]
    async fn navigate(&self, url: &str) -> Result<Document, SourceError> {
        let t0 = Instant::now();
        let response = self.client.get(url).send().await.map_err(|e| classify(url, e))?;
        let final_url = response.url().to_string();
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Err(SourceError::NotFound { url: url.to_string() });
        }
        if !status.is_success() {
            return Err(SourceError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let html = response.text().await.map_err(|e| classify(url, e))?;
        debug!(
            %final_url,
            bytes = html.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Loaded page"
        );
        Ok(Document::new(final_url, html))
    }
}

impl Drop for HttpSession {
    fn drop(&mut self) {
        debug!("Released HTTP session");
    }
}

fn classify(url: &str, e: reqwest::Error) -> SourceError {
    if e.is_timeout() {
        SourceError::Timeout { url: url.to_string() }
    } else {
        SourceError::Http(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    const UA: &str = "guba_fetch-test";

    /// Serve canned responses on a local port and return its base URL.
    async fn serve() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut buf = vec![0u8; 8192];
                    let n = socket.read(&mut buf).await.unwrap_or(0);
                    let request = String::from_utf8_lossy(&buf[..n]).to_string();
                    let path = request.split_whitespace().nth(1).unwrap_or("/").to_string();
                    let user_agent = request
                        .lines()
                        .find_map(|l| l.split_once(':').filter(|(k, _)| k.eq_ignore_ascii_case("user-agent")))
                        .map(|(_, v)| v.trim().to_string())
                        .unwrap_or_default();

                    let (status, extra, body) = match path.as_str() {
                        "/list,600519_1.html" => ("200 OK", "", "<html><body>listing</body></html>".to_string()),
                        "/ua" => ("200 OK", "", user_agent),
                        "/boom" => ("502 Bad Gateway", "", "upstream down".to_string()),
                        "/list,000000_1.html" => ("302 Found", "Location: /error?type=1\r\n", String::new()),
                        "/error?type=1" => ("200 OK", "", "<html>no such stock</html>".to_string()),
                        "/slow" => {
                            tokio::time::sleep(Duration::from_secs(2)).await;
                            ("200 OK", "", "late".to_string())
                        }
                        _ => ("404 Not Found", "", "missing".to_string()),
                    };
                    let response = format!(
                        "HTTP/1.1 {status}\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n{extra}\r\n{body}",
                        body.len()
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });
        base
    }

    fn source() -> HttpSource {
        HttpSource::new(UA, Duration::from_millis(500))
    }

    #[tokio::test]
    async fn test_navigate_returns_body_and_url() {
        let base = serve().await;
        let session = source().open_session().await.unwrap();

        let url = format!("{base}/list,600519_1.html");
        let doc = session.navigate(&url).await.unwrap();
        assert_eq!(doc.url(), url);
        assert_eq!(doc.query_text("body").unwrap(), "listing");
    }

    #[tokio::test]
    async fn test_session_sends_configured_user_agent() {
        let base = serve().await;
        let session = source().open_session().await.unwrap();

        let doc = session.navigate(&format!("{base}/ua")).await.unwrap();
        assert_eq!(doc.query_text("body").unwrap(), UA);
    }

    #[tokio::test]
    async fn test_404_is_not_found() {
        let base = serve().await;
        let session = source().open_session().await.unwrap();

        let err = session.navigate(&format!("{base}/nope.html")).await.unwrap_err();
        assert!(matches!(err, SourceError::NotFound { url } if url.ends_with("/nope.html")));
    }

    #[tokio::test]
    async fn test_server_error_is_transient_status() {
        let base = serve().await;
        let session = source().open_session().await.unwrap();

        let err = session.navigate(&format!("{base}/boom")).await.unwrap_err();
        assert!(matches!(err, SourceError::Status { status: 502, .. }));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_redirect_keeps_final_url() {
        let base = serve().await;
        let session = source().open_session().await.unwrap();

        let doc = session.navigate(&format!("{base}/list,000000_1.html")).await.unwrap();
        assert_eq!(doc.url(), format!("{base}/error?type=1"));
    }

    #[tokio::test]
    async fn test_slow_page_is_timeout() {
        let base = serve().await;
        let session = source().open_session().await.unwrap();

        let err = session.navigate(&format!("{base}/slow")).await.unwrap_err();
        assert!(matches!(err, SourceError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_sessions_are_independent_clients() {
        let base = serve().await;
        let source = source();
        let a = source.open_session().await.unwrap();
        let b = source.open_session().await.unwrap();
        a.navigate(&format!("{base}/ua")).await.unwrap();
        drop(a);

        let doc = b.navigate(&format!("{base}/ua")).await.unwrap();
        assert_eq!(doc.query_text("body").unwrap(), UA);
    }

    #[tokio::test]
    async fn test_unreachable_host_is_an_http_error() {
        let session = source().open_session().await.unwrap();
        let err = session.navigate("http://127.0.0.1:9/list,1_1.html").await.unwrap_err();
        assert!(err.is_transient());
    }
}
