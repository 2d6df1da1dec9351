//! Per-topic fetch loop.
//!
//! ```text
//! Navigating ──ok──▶ WaitingForContent ──▶ Extracting ──non-empty──▶ Succeeded
//!     ▲                                        │
//!     └──── backoff(attempt * unit) ◀── error / empty ──(attempts left)
//!                                              └──(no attempts left)──▶ Exhausted
//! ```
//!
//! Waiting for content never fails an attempt on timeout: the signal ladder
//! broadens, then falls back to a blind scroll and delay.

use std::time::Duration;

use tracing::{debug, info, warn};

use discover_common::{ExtractConfig, FetchConfig, RawCandidate, RefreshConfig, Topic};

use crate::extractor::{self, Extraction, Strategy};
use crate::page::{PageDriver, PageResult};

#[derive(Debug)]
enum FetchState {
    Navigating,
    WaitingForContent,
    Extracting,
    Succeeded(Extraction),
    Exhausted,
}

/// One rung of the content-wait ladder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentSignal {
    Selector { name: &'static str, selector: String },
    ScrollAndDelay,
}

impl ContentSignal {
    pub fn name(&self) -> &'static str {
        match self {
            ContentSignal::Selector { name, .. } => name,
            ContentSignal::ScrollAndDelay => "scroll_and_delay",
        }
    }
}

pub fn content_ladder(topic: Topic) -> Vec<ContentSignal> {
    vec![
        ContentSignal::Selector {
            name: "topic_links",
            selector: format!("a[href*='/discover/{topic}/']"),
        },
        ContentSignal::Selector {
            name: "story_images",
            selector: "a[href*='/discover/'] img[alt]".to_string(),
        },
        ContentSignal::ScrollAndDelay,
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Succeeded,
    Exhausted,
}

#[derive(Debug, Clone)]
pub struct TopicFetch {
    pub topic: Topic,
    pub outcome: FetchOutcome,
    pub attempts: u32,
    pub strategy: Option<Strategy>,
    /// Empty when exhausted.
    pub candidates: Vec<RawCandidate>,
}

pub struct TopicFetcher<'a, P: PageDriver + ?Sized> {
    page: &'a mut P,
    refresh: &'a RefreshConfig,
    fetch: &'a FetchConfig,
    extract: &'a ExtractConfig,
}

impl<'a, P: PageDriver + ?Sized> TopicFetcher<'a, P> {
    pub fn new(
        page: &'a mut P,
        refresh: &'a RefreshConfig,
        fetch: &'a FetchConfig,
        extract: &'a ExtractConfig,
    ) -> Self {
        Self {
            page,
            refresh,
            fetch,
            extract,
        }
    }

    /// Drive one topic to success or exhaustion. Exhaustion is a degraded
    /// result for this topic only, never an error.
    pub async fn fetch_topic(&mut self, topic: Topic) -> TopicFetch {
        let url = self.extract.topic_url(topic);
        let max_attempts = self.refresh.max_attempts();
        let mut attempt: u32 = 1;
        let mut state = FetchState::Navigating;

        loop {
            state = match state {
                FetchState::Navigating => {
                    info!(topic = %topic, attempt, max_attempts, url = url.as_str(), "Navigating");
                    match self.page.navigate(&url, self.fetch.navigation_timeout()).await {
                        Ok(()) => FetchState::WaitingForContent,
                        Err(e) => {
                            warn!(topic = %topic, attempt, error = %e, "Navigation failed");
                            self.after_failure(topic, &mut attempt).await
                        }
                    }
                }
                FetchState::WaitingForContent => match self.wait_for_content(topic).await {
                    Ok(signal) => {
                        debug!(topic = %topic, attempt, signal, "Content signal resolved");
                        FetchState::Extracting
                    }
                    Err(e) => {
                        warn!(topic = %topic, attempt, error = %e, "Waiting for content failed");
                        self.after_failure(topic, &mut attempt).await
                    }
                },
                FetchState::Extracting => {
                    match extractor::extract(&mut *self.page, topic, self.extract).await {
                        Ok(extraction) if !extraction.candidates.is_empty() => {
                            FetchState::Succeeded(extraction)
                        }
                        Ok(extraction) => {
                            warn!(
                                topic = %topic,
                                attempt,
                                anchors = extraction.anchors,
                                "No stories found"
                            );
                            self.after_failure(topic, &mut attempt).await
                        }
                        Err(e) => {
                            warn!(topic = %topic, attempt, error = %e, "Extraction failed");
                            self.after_failure(topic, &mut attempt).await
                        }
                    }
                }
                FetchState::Succeeded(extraction) => {
                    info!(
                        topic = %topic,
                        attempt,
                        strategy = extraction.strategy.map(|s| s.name()).unwrap_or("none"),
                        count = extraction.candidates.len(),
                        "Found stories"
                    );
                    return TopicFetch {
                        topic,
                        outcome: FetchOutcome::Succeeded,
                        attempts: attempt,
                        strategy: extraction.strategy,
                        candidates: extraction.candidates,
                    };
                }
                FetchState::Exhausted => {
                    warn!(topic = %topic, attempts = attempt, "Retries exhausted, topic contributes no stories");
                    return TopicFetch {
                        topic,
                        outcome: FetchOutcome::Exhausted,
                        attempts: attempt,
                        strategy: None,
                        candidates: Vec::new(),
                    };
                }
            };
        }
    }

    /// Back off and go round again, or give up when out of attempts.
    async fn after_failure(&mut self, topic: Topic, attempt: &mut u32) -> FetchState {
        if *attempt >= self.refresh.max_attempts() {
            return FetchState::Exhausted;
        }
        let backoff = self.backoff(*attempt);
        debug!(topic = %topic, attempt = *attempt, backoff_ms = backoff.as_millis() as u64, "Retrying after backoff");
        tokio::time::sleep(backoff).await;
        *attempt += 1;
        FetchState::Navigating
    }

    fn backoff(&self, attempt: u32) -> Duration {
        self.refresh.retry_backoff_unit().saturating_mul(attempt)
    }

    /// Walk the signal ladder; only a failing scroll is an error.
    async fn wait_for_content(&mut self, topic: Topic) -> PageResult<&'static str> {
        let mut resolved = None;
        for signal in content_ladder(topic) {
            match &signal {
                ContentSignal::Selector { selector, .. } => {
                    match self
                        .page
                        .wait_for_selector(selector, self.fetch.selector_timeout())
                        .await
                    {
                        Ok(()) => {
                            resolved = Some(signal.name());
                            break;
                        }
                        Err(e) => {
                            info!(topic = %topic, signal = signal.name(), error = %e, "Content signal not seen, broadening");
                        }
                    }
                }
                ContentSignal::ScrollAndDelay => {
                    self.page.scroll(self.fetch.scroll_delta_y).await?;
                    self.page.delay(self.fetch.scroll_delay()).await;
                    resolved = Some(signal.name());
                    break;
                }
            }
        }

        self.page.delay(self.fetch.settle_delay()).await;
        Ok(resolved.unwrap_or("none"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ladder_ends_in_scroll() {
        let ladder = content_ladder(Topic::Finance);
        assert_eq!(
            ladder[0],
            ContentSignal::Selector {
                name: "topic_links",
                selector: "a[href*='/discover/finance/']".to_string(),
            }
        );
        assert_eq!(ladder.last(), Some(&ContentSignal::ScrollAndDelay));
    }
}
