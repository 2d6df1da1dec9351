use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DiscoverError;

// --- Topics ---

/// Feed partition scraped independently. Declaration order is the scrape
/// order and the order of the `topics` projection in the cache file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    Top,
    Tech,
    Finance,
}

impl Topic {
    pub const ALL: [Topic; 3] = [Topic::Top, Topic::Tech, Topic::Finance];

    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::Top => "top",
            Topic::Tech => "tech",
            Topic::Finance => "finance",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Topic {
    type Err = DiscoverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Topic::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| DiscoverError::UnknownTopic(s.to_string()))
    }
}

// --- Extraction output ---

/// One story-like anchor as read off the rendered page, before validation.
/// Every field may be empty; order within a pass is the only identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawCandidate {
    pub title: String,
    pub href: String,
    pub time_text: String,
    pub source_count: String,
    pub source: String,
}

// --- Persisted records ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryRecord {
    pub title: String,
    pub url: String,
    pub description: String,
    pub source: String,
    pub topic: Topic,
    #[serde(with = "iso_seconds")]
    pub pub_date: DateTime<Utc>,
    pub source_count: String,
}

/// Per-topic projection of the story list. Always carries a bucket for every
/// topic in [`Topic::ALL`], even when empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TopicPartition(BTreeMap<Topic, Vec<StoryRecord>>);

impl TopicPartition {
    pub fn from_stories(stories: &[StoryRecord]) -> Self {
        let mut buckets: BTreeMap<Topic, Vec<StoryRecord>> =
            Topic::ALL.into_iter().map(|t| (t, Vec::new())).collect();
        for story in stories {
            buckets.entry(story.topic).or_default().push(story.clone());
        }
        Self(buckets)
    }

    pub fn get(&self, topic: Topic) -> &[StoryRecord] {
        self.0.get(&topic).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Topic, &Vec<StoryRecord>)> {
        self.0.iter()
    }
}

/// The persisted cache document. Replaced wholesale, never patched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoverCache {
    pub stories: Vec<StoryRecord>,
    #[serde(with = "iso_seconds")]
    pub cached_at: DateTime<Utc>,
    pub topics: TopicPartition,
}

impl DiscoverCache {
    pub fn new(stories: Vec<StoryRecord>, cached_at: DateTime<Utc>) -> Self {
        let topics = TopicPartition::from_stories(&stories);
        Self {
            stories,
            cached_at: cached_at.trunc_subsecs(0),
            topics,
        }
    }
}

/// `2026-01-31T12:00:00Z`: ISO-8601, UTC, whole seconds.
pub fn format_iso(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub mod iso_seconds {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_iso(dt))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn story(title: &str, topic: Topic) -> StoryRecord {
        StoryRecord {
            title: title.to_string(),
            url: format!("https://www.perplexity.ai/discover/{topic}/{title}"),
            description: String::new(),
            source: "Perplexity".to_string(),
            topic,
            pub_date: Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
            source_count: "12 sources".to_string(),
        }
    }

    #[test]
    fn topic_parses_case_insensitively() {
        assert_eq!("Tech".parse::<Topic>().unwrap(), Topic::Tech);
        assert_eq!(" finance ".parse::<Topic>().unwrap(), Topic::Finance);
        assert!("sports".parse::<Topic>().is_err());
    }

    #[test]
    fn story_record_uses_camel_case_wire_names() {
        let json = serde_json::to_value(story("a-long-story-title", Topic::Top)).unwrap();
        assert_eq!(json["pubDate"], "2026-03-01T12:00:00Z");
        assert_eq!(json["sourceCount"], "12 sources");
        assert_eq!(json["topic"], "top");
        assert!(json.get("pub_date").is_none());
    }

    #[test]
    fn partition_has_every_bucket_in_topic_order() {
        let stories = vec![story("finance-one", Topic::Finance), story("top-one", Topic::Top)];
        let cache = DiscoverCache::new(stories, Utc::now());

        let json = serde_json::to_string(&cache.topics).unwrap();
        let top = json.find("\"top\"").unwrap();
        let tech = json.find("\"tech\"").unwrap();
        let finance = json.find("\"finance\"").unwrap();
        assert!(top < tech && tech < finance, "bucket order: {json}");

        assert_eq!(cache.topics.get(Topic::Tech).len(), 0);
        assert_eq!(cache.topics.get(Topic::Finance)[0].title, "finance-one");
    }

    #[test]
    fn partition_places_each_story_in_its_own_bucket_once() {
        let stories: Vec<_> = Topic::ALL
            .iter()
            .flat_map(|t| (0..3).map(move |i| story(&format!("{t}-{i}"), *t)))
            .collect();
        let partition = TopicPartition::from_stories(&stories);

        let mut total = 0;
        for (topic, bucket) in partition.iter() {
            assert!(bucket.iter().all(|s| s.topic == *topic));
            total += bucket.len();
        }
        assert_eq!(total, stories.len());
    }

    #[test]
    fn cached_at_drops_subseconds() {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap() + chrono::Duration::milliseconds(750);
        let cache = DiscoverCache::new(Vec::new(), at);
        let json = serde_json::to_value(&cache).unwrap();
        assert_eq!(json["cached_at"], "2026-03-01T12:00:00Z");
    }
}
