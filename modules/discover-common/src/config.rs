use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::info;

use crate::error::DiscoverError;
use crate::types::Topic;

pub const DEFAULT_CACHE_PATH: &str = "perplexity_cache.json";
pub const DEFAULT_ORIGIN: &str = "https://www.perplexity.ai";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Application configuration: tunables from an optional TOML file,
/// deployment paths and secrets from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub cache_path: PathBuf,
    pub browserless_url: Option<String>,
    pub browserless_token: Option<String>,
    pub refresh: RefreshConfig,
    pub fetch: FetchConfig,
    pub extract: ExtractConfig,
}

/// TOML-backed tunables. Every section is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub refresh: RefreshConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub extract: ExtractConfig,
}

/// Thresholds and policies shared by the fetch loop, record builder and
/// cache reconciler.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RefreshConfig {
    /// Fewer stories than this never replace the cache.
    pub min_stories_to_write: usize,
    /// Retries after the first attempt, per topic.
    pub max_retries: u32,
    /// Backoff before retry N is `N * retry_backoff_ms`.
    pub retry_backoff_ms: u64,
    /// Cap on records kept per topic. 0 disables the cap.
    pub per_topic_limit: usize,
    /// Fallback pubDate for the i-th record is
    /// `now - (stagger_offset_minutes + i * stagger_minutes)`.
    pub stagger_minutes: i64,
    pub stagger_offset_minutes: i64,
    /// A new batch smaller than `prior * shrinkage_fraction` is rejected.
    pub shrinkage_fraction: f64,
    pub topics: Vec<Topic>,
    /// Used when the extractor finds no publisher for a story.
    pub default_source: String,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            min_stories_to_write: 30,
            max_retries: 2,
            retry_backoff_ms: 2_000,
            per_topic_limit: 20,
            stagger_minutes: 5,
            stagger_offset_minutes: 0,
            shrinkage_fraction: 0.5,
            topics: Topic::ALL.to_vec(),
            default_source: "Perplexity".to_string(),
        }
    }
}

impl RefreshConfig {
    pub fn retry_backoff_unit(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn per_topic_cap(&self) -> Option<usize> {
        (self.per_topic_limit > 0).then_some(self.per_topic_limit)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

/// Browser timeouts and the content-wait ladder.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FetchConfig {
    pub navigation_timeout_ms: u64,
    pub selector_timeout_ms: u64,
    pub scroll_delta_y: i64,
    pub scroll_delay_ms: u64,
    /// Pause after the content signal resolves, before extraction.
    pub settle_delay_ms: u64,
    pub user_agent: String,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub locale: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            navigation_timeout_ms: 45_000,
            selector_timeout_ms: 15_000,
            scroll_delta_y: 1_000,
            scroll_delay_ms: 3_000,
            settle_delay_ms: 2_000,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            viewport_width: 1280,
            viewport_height: 900,
            locale: "en-US".to_string(),
        }
    }
}

impl FetchConfig {
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }

    pub fn selector_timeout(&self) -> Duration {
        Duration::from_millis(self.selector_timeout_ms)
    }

    pub fn scroll_delay(&self) -> Duration {
        Duration::from_millis(self.scroll_delay_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

/// DOM heuristics. These are tuning values, not derived ones.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExtractConfig {
    pub origin: String,
    /// How far above a story anchor to look for its timestamp / source count.
    pub card_ascension_levels: usize,
    pub days_per_month: i64,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            origin: DEFAULT_ORIGIN.to_string(),
            card_ascension_levels: 6,
            days_per_month: 30,
        }
    }
}

impl ExtractConfig {
    pub fn topic_url(&self, topic: Topic) -> String {
        format!("{}/discover/{}", self.origin.trim_end_matches('/'), topic)
    }
}

impl FileConfig {
    pub fn validate(&self) -> std::result::Result<(), DiscoverError> {
        let r = &self.refresh;
        if !(r.shrinkage_fraction > 0.0 && r.shrinkage_fraction <= 1.0) {
            return Err(DiscoverError::Config(format!(
                "refresh.shrinkage_fraction must be in (0, 1], got {}",
                r.shrinkage_fraction
            )));
        }
        if r.topics.is_empty() {
            return Err(DiscoverError::Config("refresh.topics must not be empty".into()));
        }
        if r.stagger_minutes < 0 || r.stagger_offset_minutes < 0 {
            return Err(DiscoverError::Config("stagger minutes must not be negative".into()));
        }
        if self.extract.days_per_month <= 0 {
            return Err(DiscoverError::Config("extract.days_per_month must be positive".into()));
        }
        if !self.extract.origin.starts_with("http://") && !self.extract.origin.starts_with("https://") {
            return Err(DiscoverError::Config(format!(
                "extract.origin must be an absolute http(s) URL, got {}",
                self.extract.origin
            )));
        }
        Ok(())
    }
}

/// Load and parse a TOML config file.
pub fn load_file_config(path: &Path) -> Result<FileConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let config: FileConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
    config.validate()?;
    Ok(config)
}

impl Config {
    /// Load from the process environment. `config_path` wins over
    /// `DISCOVER_CONFIG`; without either, built-in defaults apply.
    pub fn from_env(config_path: Option<&Path>) -> Result<Self> {
        Self::from_lookup(config_path, |key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(config_path: Option<&Path>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let file_path = config_path
            .map(Path::to_path_buf)
            .or_else(|| lookup("DISCOVER_CONFIG").map(PathBuf::from));

        let file = match file_path {
            Some(path) => load_file_config(&path)?,
            None => FileConfig::default(),
        };

        Ok(Self {
            cache_path: lookup("DISCOVER_CACHE_PATH")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_PATH)),
            browserless_url: lookup("BROWSERLESS_URL").filter(|v| !v.trim().is_empty()),
            browserless_token: lookup("BROWSERLESS_TOKEN").filter(|v| !v.trim().is_empty()),
            refresh: file.refresh,
            fetch: file.fetch,
            extract: file.extract,
        })
    }

    /// Log the effective configuration without secrets.
    pub fn log_redacted(&self) {
        let topics: Vec<&str> = self.refresh.topics.iter().map(Topic::as_str).collect();
        info!(
            cache_path = %self.cache_path.display(),
            browserless_url = self.browserless_url.as_deref().unwrap_or("<unset>"),
            browserless_token = if self.browserless_token.is_some() { "<redacted>" } else { "<unset>" },
            topics = ?topics,
            min_stories_to_write = self.refresh.min_stories_to_write,
            max_retries = self.refresh.max_retries,
            per_topic_limit = self.refresh.per_topic_limit,
            shrinkage_fraction = self.refresh.shrinkage_fraction,
            "Effective configuration"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn defaults_match_observed_policy() {
        let cfg = Config::from_lookup(None, |_| None).unwrap();
        assert_eq!(cfg.cache_path, PathBuf::from(DEFAULT_CACHE_PATH));
        assert_eq!(cfg.refresh.min_stories_to_write, 30);
        assert_eq!(cfg.refresh.max_attempts(), 3);
        assert_eq!(cfg.refresh.per_topic_cap(), Some(20));
        assert_eq!(cfg.refresh.topics, Topic::ALL.to_vec());
        assert_eq!(cfg.extract.card_ascension_levels, 6);
        assert_eq!(cfg.extract.days_per_month, 30);
        assert!(cfg.browserless_url.is_none());
    }

    #[test]
    fn env_supplies_paths_and_secrets() {
        let vars = env(&[
            ("DISCOVER_CACHE_PATH", "/data/cache.json"),
            ("BROWSERLESS_URL", "http://browserless:3000"),
            ("BROWSERLESS_TOKEN", "secret"),
        ]);
        let cfg = Config::from_lookup(None, |k| vars.get(k).cloned()).unwrap();
        assert_eq!(cfg.cache_path, PathBuf::from("/data/cache.json"));
        assert_eq!(cfg.browserless_url.as_deref(), Some("http://browserless:3000"));
        assert_eq!(cfg.browserless_token.as_deref(), Some("secret"));
    }

    #[test]
    fn toml_overrides_only_named_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("discover.toml");
        std::fs::write(
            &path,
            r#"
[refresh]
min_stories_to_write = 10
per_topic_limit = 0
topics = ["tech", "finance"]

[extract]
card_ascension_levels = 4
"#,
        )
        .unwrap();

        let cfg = Config::from_lookup(Some(&path), |_| None).unwrap();
        assert_eq!(cfg.refresh.min_stories_to_write, 10);
        assert_eq!(cfg.refresh.per_topic_cap(), None);
        assert_eq!(cfg.refresh.topics, vec![Topic::Tech, Topic::Finance]);
        assert_eq!(cfg.refresh.max_retries, 2);
        assert_eq!(cfg.extract.card_ascension_levels, 4);
        assert_eq!(cfg.fetch.navigation_timeout(), Duration::from_secs(45));
    }

    #[test]
    fn config_path_can_come_from_env() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("discover.toml");
        std::fs::write(&path, "[refresh]\nmax_retries = 5\n").unwrap();
        let vars = env(&[("DISCOVER_CONFIG", path.to_str().unwrap())]);

        let cfg = Config::from_lookup(None, |k| vars.get(k).cloned()).unwrap();
        assert_eq!(cfg.refresh.max_attempts(), 6);
    }

    #[test]
    fn rejects_unknown_topics_and_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");

        std::fs::write(&path, "[refresh]\ntopics = [\"sports\"]\n").unwrap();
        assert!(Config::from_lookup(Some(&path), |_| None).is_err());

        std::fs::write(&path, "[refresh]\nmin_stories = 3\n").unwrap();
        assert!(Config::from_lookup(Some(&path), |_| None).is_err());
    }

    #[test]
    fn rejects_out_of_range_fraction() {
        let mut file = FileConfig::default();
        file.refresh.shrinkage_fraction = 0.0;
        assert!(file.validate().is_err());
        file.refresh.shrinkage_fraction = 1.5;
        assert!(file.validate().is_err());
        file.refresh.shrinkage_fraction = 1.0;
        assert!(file.validate().is_ok());
    }

    #[test]
    fn topic_url_joins_origin() {
        let extract = ExtractConfig {
            origin: "https://www.perplexity.ai/".to_string(),
            ..ExtractConfig::default()
        };
        assert_eq!(extract.topic_url(Topic::Tech), "https://www.perplexity.ai/discover/tech");
    }
}
