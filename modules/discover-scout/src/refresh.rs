//! One refresh run: fetch every topic in order, build records, and replace
//! the cache only when the reconciler accepts the batch.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use discover_common::{Config, DiscoverCache, StoryRecord, Topic};

use crate::builder::RecordBuilder;
use crate::cache_store::{CacheStore, PriorState};
use crate::extractor::Strategy;
use crate::fetcher::{FetchOutcome, TopicFetcher};
use crate::page::PageDriver;
use crate::reconcile::{reconcile, Decision, RejectReason};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The cache file was replaced.
    Updated { stories: usize },
    /// The batch was rejected; the existing cache file is untouched.
    Kept { reason: RejectReason },
    /// The batch was accepted but `--dry-run` skipped the write.
    DryRun { stories: usize },
    /// Nothing scraped and no usable cache to fall back to.
    ColdStartFailure,
}

impl RefreshOutcome {
    pub fn exit_code(&self) -> u8 {
        match self {
            RefreshOutcome::ColdStartFailure => 1,
            _ => 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TopicStats {
    pub topic: Topic,
    pub outcome: FetchOutcome,
    pub attempts: u32,
    pub strategy: Option<Strategy>,
    pub candidates: usize,
    pub records: usize,
}

#[derive(Debug, Clone, Default)]
pub struct RefreshStats {
    pub topics: Vec<TopicStats>,
    pub total_stories: usize,
    pub prior_stories: Option<usize>,
}

impl RefreshStats {
    pub fn exhausted_topics(&self) -> usize {
        self.topics
            .iter()
            .filter(|t| t.outcome == FetchOutcome::Exhausted)
            .count()
    }
}

impl std::fmt::Display for RefreshStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\n=== Discover Refresh Complete ===")?;
        for t in &self.topics {
            writeln!(
                f,
                "{:<8} {:>3} stories  ({} candidates, {} attempt(s), {})",
                t.topic.as_str(),
                t.records,
                t.candidates,
                t.attempts,
                match t.outcome {
                    FetchOutcome::Succeeded => t.strategy.map(|s| s.name()).unwrap_or("none"),
                    FetchOutcome::Exhausted => "exhausted",
                }
            )?;
        }
        writeln!(f, "Total:   {:>4} stories", self.total_stories)?;
        match self.prior_stories {
            Some(prior) => writeln!(f, "Prior:   {:>4} stories", prior)?,
            None => writeln!(f, "Prior:   none")?,
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct RefreshReport {
    pub outcome: RefreshOutcome,
    pub stats: RefreshStats,
}

/// Run one refresh against `page`. `now` anchors every timestamp the run
/// produces. Only I/O failures while writing an accepted batch are errors.
pub async fn run_refresh<P: PageDriver + ?Sized>(
    page: &mut P,
    config: &Config,
    store: &CacheStore,
    now: DateTime<Utc>,
    dry_run: bool,
) -> Result<RefreshReport> {
    let prior = store.load_prior();
    match &prior {
        PriorState::Missing => info!(path = %store.path().display(), "No existing cache"),
        PriorState::Unreadable(reason) => warn!(
            path = %store.path().display(),
            reason = reason.as_str(),
            "Existing cache is unreadable, treating as absent"
        ),
        PriorState::Loaded(p) => info!(path = %store.path().display(), stories = p.stories, "Existing cache loaded"),
    }

    let builder = RecordBuilder::new(&config.refresh, &config.extract);
    let mut stats = RefreshStats {
        prior_stories: prior.prior().map(|p| p.stories),
        ..RefreshStats::default()
    };
    let mut stories: Vec<StoryRecord> = Vec::new();

    for &topic in &config.refresh.topics {
        let fetched = TopicFetcher::new(&mut *page, &config.refresh, &config.fetch, &config.extract)
            .fetch_topic(topic)
            .await;
        let records = builder.build(topic, &fetched.candidates, now);
        info!(topic = %topic, records = records.len(), "Topic complete");

        stats.topics.push(TopicStats {
            topic,
            outcome: fetched.outcome,
            attempts: fetched.attempts,
            strategy: fetched.strategy,
            candidates: fetched.candidates.len(),
            records: records.len(),
        });
        stories.extend(records);
    }
    stats.total_stories = stories.len();

    let outcome = match reconcile(stories.len(), prior.prior(), &config.refresh) {
        Decision::Accept if dry_run => {
            info!(stories = stories.len(), "Batch accepted, dry run so cache not written");
            RefreshOutcome::DryRun {
                stories: stories.len(),
            }
        }
        Decision::Accept => {
            let count = stories.len();
            let cache = DiscoverCache::new(stories, now);
            store
                .write(&cache)
                .with_context(|| format!("Failed to write cache to {}", store.path().display()))?;
            RefreshOutcome::Updated { stories: count }
        }
        Decision::Reject(RejectReason::Empty) if prior.prior().is_none() => {
            error!("No stories fetched and no existing cache");
            RefreshOutcome::ColdStartFailure
        }
        Decision::Reject(reason) => {
            warn!(reason = %reason, "Keeping existing cache");
            RefreshOutcome::Kept { reason }
        }
    };

    Ok(RefreshReport { outcome, stats })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_cold_start_fails_the_process() {
        assert_eq!(RefreshOutcome::Updated { stories: 40 }.exit_code(), 0);
        assert_eq!(RefreshOutcome::DryRun { stories: 40 }.exit_code(), 0);
        assert_eq!(
            RefreshOutcome::Kept {
                reason: RejectReason::Empty
            }
            .exit_code(),
            0
        );
        assert_eq!(RefreshOutcome::ColdStartFailure.exit_code(), 1);
    }

    #[test]
    fn stats_render_per_topic_lines() {
        let stats = RefreshStats {
            topics: vec![
                TopicStats {
                    topic: Topic::Top,
                    outcome: FetchOutcome::Succeeded,
                    attempts: 1,
                    strategy: Some(Strategy::TopicScoped),
                    candidates: 22,
                    records: 20,
                },
                TopicStats {
                    topic: Topic::Tech,
                    outcome: FetchOutcome::Exhausted,
                    attempts: 3,
                    strategy: None,
                    candidates: 0,
                    records: 0,
                },
            ],
            total_stories: 20,
            prior_stories: None,
        };
        let rendered = stats.to_string();
        assert!(rendered.contains("top       20 stories  (22 candidates, 1 attempt(s), topic_scoped)"));
        assert!(rendered.contains("tech       0 stories  (0 candidates, 3 attempt(s), exhausted)"));
        assert!(rendered.contains("Prior:   none"));
        assert_eq!(stats.exhausted_topics(), 1);
    }
}
