use std::fmt;

use discover_common::RefreshConfig;

/// What the run knows about the cache already on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriorCache {
    pub stories: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Nothing was scraped at all.
    Empty,
    /// Too few stories to be a complete scrape.
    BelowMinimum { count: usize, minimum: usize },
    /// Much smaller than what is already cached.
    Shrinkage { count: usize, prior: usize },
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::Empty => write!(f, "no stories fetched"),
            RejectReason::BelowMinimum { count, minimum } => {
                write!(f, "only {count} stories (need {minimum}+)")
            }
            RejectReason::Shrinkage { count, prior } => {
                write!(f, "new scrape ({count}) is less than half of existing ({prior})")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Accept,
    Reject(RejectReason),
}

/// Gate a fresh batch against the persisted cache. Rules are checked in
/// order and the first match decides.
pub fn reconcile(new_count: usize, prior: Option<PriorCache>, config: &RefreshConfig) -> Decision {
    if new_count == 0 {
        return Decision::Reject(RejectReason::Empty);
    }

    if new_count < config.min_stories_to_write {
        return Decision::Reject(RejectReason::BelowMinimum {
            count: new_count,
            minimum: config.min_stories_to_write,
        });
    }

    if let Some(prior) = prior {
        if prior.stories > 0 && (new_count as f64) < (prior.stories as f64) * config.shrinkage_fraction {
            return Decision::Reject(RejectReason::Shrinkage {
                count: new_count,
                prior: prior.stories,
            });
        }
    }

    Decision::Accept
}
