//! "N units ago" → absolute UTC timestamp.
//!
//! Only whole-number magnitudes and the unit set {minute, min, hour, hr, day,
//! week, month} are recognised. A month is a flat number of days (30 unless
//! configured otherwise); no calendar arithmetic is attempted.

use std::sync::LazyLock;

use chrono::{DateTime, Duration, SubsecRound, Utc};
use regex::Regex;

pub const DEFAULT_DAYS_PER_MONTH: i64 = 30;

/// Magnitude must not be glued to a preceding digit or decimal point, so
/// "3.5 hours ago" does not resolve as "5 hours ago".
static RELATIVE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:^|[^\d.])(\d+)\s*(minute|min|hour|hr|day|week|month)s?\b")
        .expect("relative-time pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Minute,
    Hour,
    Day,
    Week,
    Month,
}

impl TimeUnit {
    fn from_token(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().as_str() {
            "minute" | "min" => Some(TimeUnit::Minute),
            "hour" | "hr" => Some(TimeUnit::Hour),
            "day" => Some(TimeUnit::Day),
            "week" => Some(TimeUnit::Week),
            "month" => Some(TimeUnit::Month),
            _ => None,
        }
    }

    fn seconds(self, days_per_month: i64) -> i64 {
        match self {
            TimeUnit::Minute => 60,
            TimeUnit::Hour => 3_600,
            TimeUnit::Day => 86_400,
            TimeUnit::Week => 7 * 86_400,
            TimeUnit::Month => days_per_month * 86_400,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RelativeTimeParser {
    days_per_month: i64,
}

impl Default for RelativeTimeParser {
    fn default() -> Self {
        Self {
            days_per_month: DEFAULT_DAYS_PER_MONTH,
        }
    }
}

impl RelativeTimeParser {
    pub fn new(days_per_month: i64) -> Self {
        Self { days_per_month }
    }

    /// `None` is the unresolved sentinel: empty, malformed, fractional, or
    /// out-of-range input.
    pub fn parse(&self, text: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let caps = RELATIVE_RE.captures(text.trim())?;
        let magnitude: i64 = caps[1].parse().ok()?;
        let unit = TimeUnit::from_token(&caps[2])?;

        let seconds = magnitude.checked_mul(unit.seconds(self.days_per_month))?;
        let offset = Duration::try_seconds(seconds)?;
        now.trunc_subsecs(0).checked_sub_signed(offset)
    }
}

pub fn parse_relative_time(text: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    RelativeTimeParser::default().parse(text, now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 15, 12, 0, 0).unwrap()
    }

    fn ago(secs: i64) -> Option<DateTime<Utc>> {
        Some(now() - Duration::seconds(secs))
    }

    #[test]
    fn every_unit_and_spelling_resolves() {
        let cases = [
            ("1 minute ago", 60),
            ("5 minutes ago", 300),
            ("12 min ago", 720),
            ("12 mins ago", 720),
            ("1 hour ago", 3_600),
            ("3 hours ago", 10_800),
            ("2 hr ago", 7_200),
            ("2 hrs ago", 7_200),
            ("1 day ago", 86_400),
            ("4 days ago", 345_600),
            ("1 week ago", 604_800),
            ("2 weeks ago", 1_209_600),
            ("1 month ago", 2_592_000),
            ("3 months ago", 7_776_000),
        ];
        for (text, secs) in cases {
            assert_eq!(parse_relative_time(text, now()), ago(secs), "{text}");
        }
    }

    #[test]
    fn case_whitespace_and_missing_ago_are_tolerated() {
        assert_eq!(parse_relative_time("  7 HOURS AGO ", now()), ago(25_200));
        assert_eq!(parse_relative_time("7hours ago", now()), ago(25_200));
        assert_eq!(parse_relative_time("7 hours", now()), ago(25_200));
        assert_eq!(parse_relative_time("Published 2 days ago", now()), ago(172_800));
    }

    #[test]
    fn unsupported_text_is_unresolved() {
        for text in [
            "",
            "   ",
            "yesterday",
            "just now",
            "3.5 hours ago",
            "1.5 hours ago",
            "an hour ago",
            "5 seconds ago",
            "2 years ago",
            "5 hourly",
        ] {
            assert_eq!(parse_relative_time(text, now()), None, "{text:?}");
        }
    }

    #[test]
    fn overflowing_magnitude_is_unresolved() {
        assert_eq!(parse_relative_time("99999999999999999999 days ago", now()), None);
        assert_eq!(parse_relative_time("9223372036854775807 months ago", now()), None);
    }

    #[test]
    fn month_length_is_configurable() {
        let parser = RelativeTimeParser::new(31);
        assert_eq!(parser.parse("1 month ago", now()), ago(31 * 86_400));
    }

    #[test]
    fn result_is_whole_seconds() {
        let jittered = now() + Duration::milliseconds(420);
        let parsed = parse_relative_time("1 min ago", jittered).unwrap();
        assert_eq!(parsed, now() - Duration::seconds(60));
    }
}
