use chrono::{DateTime, Duration, SubsecRound, Utc};

use discover_common::{ExtractConfig, RawCandidate, RefreshConfig, StoryRecord, Topic};

use crate::relative_time::RelativeTimeParser;

/// Stored titles are always longer than this.
const MIN_TITLE_CHARS: usize = 10;

/// Turns one topic's raw candidates into canonical records.
///
/// When no relative time can be parsed, the i-th kept record gets
/// `now - (offset + i * stagger)` minutes. That value only keeps fallback
/// timestamps from colliding; it says nothing about real recency.
pub struct RecordBuilder<'a> {
    refresh: &'a RefreshConfig,
    origin: &'a str,
    parser: RelativeTimeParser,
}

impl<'a> RecordBuilder<'a> {
    pub fn new(refresh: &'a RefreshConfig, extract: &'a ExtractConfig) -> Self {
        Self {
            refresh,
            origin: extract.origin.trim_end_matches('/'),
            parser: RelativeTimeParser::new(extract.days_per_month),
        }
    }

    pub fn build(&self, topic: Topic, candidates: &[RawCandidate], now: DateTime<Utc>) -> Vec<StoryRecord> {
        let now = now.trunc_subsecs(0);
        let cap = self.refresh.per_topic_cap().unwrap_or(usize::MAX);

        candidates
            .iter()
            .filter_map(|c| {
                let title = c.title.trim();
                let href = c.href.trim();
                let keep = title.chars().count() > MIN_TITLE_CHARS && !href.is_empty();
                keep.then_some((c, title, href))
            })
            .take(cap)
            .enumerate()
            .map(|(index, (c, title, href))| StoryRecord {
                title: title.to_string(),
                url: self.absolute_url(href),
                description: String::new(),
                source: match c.source.trim() {
                    "" => self.refresh.default_source.clone(),
                    source => source.to_string(),
                },
                topic,
                pub_date: self
                    .parser
                    .parse(&c.time_text, now)
                    .unwrap_or_else(|| self.staggered(now, index)),
                source_count: c.source_count.trim().to_string(),
            })
            .collect()
    }

    fn absolute_url(&self, href: &str) -> String {
        if href.starts_with("http://") || href.starts_with("https://") {
            href.to_string()
        } else if href.starts_with('/') {
            format!("{}{}", self.origin, href)
        } else {
            format!("{}/{}", self.origin, href)
        }
    }

    fn staggered(&self, now: DateTime<Utc>, index: usize) -> DateTime<Utc> {
        let index = i64::try_from(index).unwrap_or(i64::MAX);
        let minutes = index
            .saturating_mul(self.refresh.stagger_minutes)
            .saturating_add(self.refresh.stagger_offset_minutes);
        Duration::try_minutes(minutes)
            .and_then(|offset| now.checked_sub_signed(offset))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 10, 9, 30, 0).unwrap()
    }

    fn candidate(title: &str, href: &str, time_text: &str) -> RawCandidate {
        RawCandidate {
            title: title.to_string(),
            href: href.to_string(),
            time_text: time_text.to_string(),
            source_count: "9 sources".to_string(),
            source: String::new(),
        }
    }

    fn build(refresh: &RefreshConfig, candidates: &[RawCandidate]) -> Vec<StoryRecord> {
        let extract = ExtractConfig::default();
        RecordBuilder::new(refresh, &extract).build(Topic::Tech, candidates, now())
    }

    #[test]
    fn parsed_time_wins_over_fallback() {
        let records = build(
            &RefreshConfig::default(),
            &[candidate("A headline worth keeping", "/discover/tech/a", "2 hours ago")],
        );
        assert_eq!(records[0].pub_date, now() - Duration::hours(2));
        assert_eq!(records[0].topic, Topic::Tech);
        assert_eq!(records[0].source, "Perplexity");
        assert_eq!(records[0].description, "");
        assert_eq!(records[0].source_count, "9 sources");
    }

    #[test]
    fn relative_and_absolute_urls_resolve_against_origin() {
        let records = build(
            &RefreshConfig::default(),
            &[
                candidate("Relative link headline here", "/discover/tech/rel", ""),
                candidate("Absolute link headline here", "https://elsewhere.example/x", ""),
                candidate("Bare path link headline here", "discover/tech/bare", ""),
            ],
        );
        assert_eq!(records[0].url, "https://www.perplexity.ai/discover/tech/rel");
        assert_eq!(records[1].url, "https://elsewhere.example/x");
        assert_eq!(records[2].url, "https://www.perplexity.ai/discover/tech/bare");
    }

    #[test]
    fn blank_titles_or_links_are_skipped_before_indexing() {
        let records = build(
            &RefreshConfig::default(),
            &[
                candidate("   ", "/discover/tech/blank-title", ""),
                candidate("First kept headline here", "/discover/tech/one", ""),
                candidate("Missing link headline", "  ", ""),
                candidate("Too short", "/discover/tech/short", ""),
                candidate("Second kept headline here", "/discover/tech/two", ""),
            ],
        );
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].pub_date, now());
        assert_eq!(records[1].pub_date, now() - Duration::minutes(5));
    }

    #[test]
    fn staggered_fallback_is_deterministic_and_non_increasing() {
        let candidates: Vec<_> = (0..8)
            .map(|i| candidate(&format!("Headline number {i} for today"), &format!("/discover/tech/{i}"), "yesterday"))
            .collect();
        let refresh = RefreshConfig::default();

        let first = build(&refresh, &candidates);
        let second = build(&refresh, &candidates);
        assert_eq!(first, second);

        for pair in first.windows(2) {
            assert!(pair[0].pub_date >= pair[1].pub_date);
        }
        assert_eq!(first[7].pub_date, now() - Duration::minutes(35));
    }

    #[test]
    fn alternate_offset_and_stagger() {
        let refresh = RefreshConfig {
            stagger_minutes: 15,
            stagger_offset_minutes: 30,
            ..RefreshConfig::default()
        };
        let records = build(
            &refresh,
            &[
                candidate("Headline zero for the offset", "/discover/tech/0", ""),
                candidate("Headline one for the offset", "/discover/tech/1", ""),
            ],
        );
        assert_eq!(records[0].pub_date, now() - Duration::minutes(30));
        assert_eq!(records[1].pub_date, now() - Duration::minutes(45));
    }

    #[test]
    fn per_topic_cap_truncates_in_order() {
        let candidates: Vec<_> = (0..30)
            .map(|i| candidate(&format!("Capped headline number {i}"), &format!("/discover/tech/{i}"), ""))
            .collect();

        let capped = build(&RefreshConfig::default(), &candidates);
        assert_eq!(capped.len(), 20);
        assert_eq!(capped[19].title, "Capped headline number 19");

        let uncapped = build(
            &RefreshConfig {
                per_topic_limit: 0,
                ..RefreshConfig::default()
            },
            &candidates,
        );
        assert_eq!(uncapped.len(), 30);
    }

    #[test]
    fn extracted_source_is_kept() {
        let mut c = candidate("Headline with a known source", "/discover/tech/s", "");
        c.source = "Reuters".to_string();
        let records = build(&RefreshConfig::default(), &[c]);
        assert_eq!(records[0].source, "Reuters");
    }
}
