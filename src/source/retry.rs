//! Exponential backoff around [`PageSession::navigate`].
//!
//! # Retry Strategy
//!
//! - Only transient failures are retried (see [`SourceError::is_transient`]);
//!   a `NotFound` answer is returned immediately
//! - Delay doubles from `base_delay`, capped at `max_delay`
//! - Random jitter (`0..=jitter`) is added to every delay

use super::{Document, PageSession};
use crate::error::SourceError;
use rand::{Rng, rng};
use std::fmt;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{error, instrument, warn};

/// Wraps a session so navigation retries transient failures.
pub struct RetrySession<'a, P> {
    inner: &'a P,
    max_retries: usize,
    base_delay: Duration,
    max_delay: Duration,
    jitter: Duration,
}

impl<'a, P> RetrySession<'a, P>
where
    P: PageSession,
{
    pub fn new(inner: &'a P, max_retries: usize, base_delay: Duration, jitter: Duration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: Duration::from_secs(30),
            jitter,
        }
    }

    fn delay_for(&self, attempt: usize) -> Duration {
        let shift = (attempt - 1).min(16) as u32;
        let delay = self.base_delay.saturating_mul(1 << shift).min(self.max_delay);
        let jitter_ms = self.jitter.as_millis() as u64;
        delay + Duration::from_millis(rng().random_range(0..=jitter_ms))
    }
}

impl<P> fmt::Debug for RetrySession<'_, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetrySession")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

impl<P> PageSession for RetrySession<'_, P>
where
    P: PageSession,
{
    #[instrument(level = "debug", skip_all, fields(%url))]
    async fn navigate(&self, url: &str) -> Result<Document, SourceError> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            match self.inner.navigate(url).await {
                Ok(doc) => return Ok(doc),
                Err(e) if !e.is_transient() => return Err(e),
                Err(e) => {
                    attempt += 1;
                    let elapsed_ms_total = total_t0.elapsed().as_millis();

                    if attempt > self.max_retries {
                        error!(
                            attempt,
                            max = self.max_retries,
                            elapsed_ms_total,
                            error = %e,
                            "navigate() exhausted retries"
                        );
                        return Err(e);
                    }

                    let delay = self.delay_for(attempt);
                    warn!(
                        attempt,
                        max = self.max_retries,
                        elapsed_ms_total,
                        ?delay,
                        error = %e,
                        "navigate() attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}
