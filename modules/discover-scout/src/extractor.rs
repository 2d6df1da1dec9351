//! Story extraction from a rendered Discover page.
//!
//! The front-end markup is unversioned and shifts without notice, so anchors
//! are located through an ordered ladder of strategies. The first strategy
//! that matches any anchor is the only one used; results from different
//! strategies are never merged. Adding a strategy means appending a variant
//! to [`STRATEGY_LADDER`].

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

use discover_common::{ExtractConfig, RawCandidate, Topic};

use crate::page::{PageDriver, PageResult};

/// Discover sections whose bare link is site chrome, not a story.
pub const NAV_SECTIONS: &[&str] = &["top", "tech", "finance", "you", "trending"];

const MIN_ALT_TITLE_CHARS: usize = 15;
const MIN_LEAF_TITLE_CHARS: usize = 20;
const MIN_ANCHOR_TITLE_CHARS: usize = 15;
/// Every story link, on any topic, lives under this path.
const STORY_PATH: &str = "/discover/";
/// Titles this short or shorter drop the candidate.
const MIN_TITLE_CHARS: usize = 10;

static ANCHOR: LazyLock<Selector> = LazyLock::new(|| selector("a[href]"));
static IMG_ALT: LazyLock<Selector> = LazyLock::new(|| selector("img[alt]"));
static TITLE_CONTAINERS: LazyLock<Selector> = LazyLock::new(|| selector("div, h1, h2, h3, h4, p"));
static META_CONTAINERS: LazyLock<Selector> = LazyLock::new(|| selector("div, span, time, p"));

static NAV_CHROME_RE: LazyLock<Regex> = LazyLock::new(|| {
    let sections = NAV_SECTIONS.join("|");
    Regex::new(&format!(r"^(?:https?://[^/]+)?/discover(?:/(?:{sections}))?/?$"))
        .expect("nav chrome pattern is valid")
});
static TIME_AGO_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\d+\s*(?:minute|min|hour|hr|day|week|month)s?\s*ago$")
        .expect("time-ago pattern is valid")
});
static SOURCE_COUNT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\d+\s+sources?$").expect("source-count pattern is valid"));
static TITLE_CUT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Published|\d+ sources?").expect("title cut pattern is valid"));
static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

fn selector(css: &str) -> Selector {
    Selector::parse(css).unwrap_or_else(|e| panic!("static selector {css:?} is invalid: {e}"))
}

// --- Strategy ladder ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Anchors linking into `/discover/<topic>/`.
    TopicScoped,
    /// Any `/discover/` anchor on the page.
    SiteWide,
}

pub const STRATEGY_LADDER: &[Strategy] = &[Strategy::TopicScoped, Strategy::SiteWide];

impl Strategy {
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::TopicScoped => "topic_scoped",
            Strategy::SiteWide => "site_wide",
        }
    }

    fn href_fragment(&self, topic: Topic) -> String {
        match self {
            Strategy::TopicScoped => format!("/discover/{topic}/"),
            Strategy::SiteWide => STORY_PATH.to_string(),
        }
    }

    fn anchors<'a>(&self, document: &'a Html, topic: Topic) -> Vec<ElementRef<'a>> {
        let fragment = self.href_fragment(topic);
        document
            .select(&ANCHOR)
            .filter(|a| a.value().attr("href").is_some_and(|h| h.contains(&fragment)))
            .collect()
    }
}

/// Outcome of one read-only pass over the DOM.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    /// Strategy that matched, `None` when every rung came up empty.
    pub strategy: Option<Strategy>,
    /// Anchors matched by that strategy, before filtering.
    pub anchors: usize,
    pub candidates: Vec<RawCandidate>,
}

/// Snapshot the live page and extract candidates for `topic`.
/// Never waits or retries; that belongs to the fetch loop.
pub async fn extract<P: PageDriver + ?Sized>(
    page: &mut P,
    topic: Topic,
    config: &ExtractConfig,
) -> PageResult<Extraction> {
    let html = page.snapshot_html().await?;
    Ok(extract_from_html(&html, topic, config))
}

pub fn extract_from_html(html: &str, topic: Topic, config: &ExtractConfig) -> Extraction {
    let document = Html::parse_document(html);
    let base = match Url::parse(&config.origin) {
        Ok(u) => u,
        Err(_) => return Extraction::default(),
    };

    for strategy in STRATEGY_LADDER {
        let anchors = strategy.anchors(&document, topic);
        if anchors.is_empty() {
            debug!(topic = %topic, strategy = strategy.name(), "No anchors matched");
            continue;
        }

        let candidates = candidates_from_anchors(&anchors, &base, config.card_ascension_levels);
        debug!(
            topic = %topic,
            strategy = strategy.name(),
            anchors = anchors.len(),
            candidates = candidates.len(),
            "Strategy matched"
        );
        return Extraction {
            strategy: Some(*strategy),
            anchors: anchors.len(),
            candidates,
        };
    }

    Extraction::default()
}

fn candidates_from_anchors(anchors: &[ElementRef], base: &Url, levels: usize) -> Vec<RawCandidate> {
    let mut seen = HashSet::new();
    let mut candidates = Vec::new();

    for anchor in anchors {
        let Some(href) = story_href(anchor, base) else {
            continue;
        };
        if !seen.insert(href.clone()) {
            continue;
        }

        let title = resolve_title(anchor);
        if title.chars().count() <= MIN_TITLE_CHARS {
            continue;
        }

        let scopes = card_scopes(anchor, &href, base, levels);
        candidates.push(RawCandidate {
            title,
            time_text: find_metadata(&scopes, &TIME_AGO_RE).unwrap_or_default(),
            source_count: find_metadata(&scopes, &SOURCE_COUNT_RE).unwrap_or_default(),
            source: String::new(),
            href,
        });
    }

    candidates
}

/// Absolute story URL for an anchor, or `None` for empty and chrome links.
fn story_href(anchor: &ElementRef, base: &Url) -> Option<String> {
    let href = anchor.value().attr("href")?.trim();
    if href.is_empty() || NAV_CHROME_RE.is_match(href) {
        return None;
    }
    base.join(href).ok().map(String::from)
}

// --- Title tiers ---

fn resolve_title(anchor: &ElementRef) -> String {
    title_from_image_alt(anchor)
        .or_else(|| title_from_leaf_container(anchor))
        .or_else(|| title_from_anchor_text(anchor))
        .unwrap_or_default()
}

fn title_from_image_alt(anchor: &ElementRef) -> Option<String> {
    anchor
        .select(&IMG_ALT)
        .filter_map(|img| img.value().attr("alt"))
        .map(str::trim)
        .find(|alt| alt.chars().count() > MIN_ALT_TITLE_CHARS && !alt.contains("favicon"))
        .map(str::to_string)
}

fn title_from_leaf_container(anchor: &ElementRef) -> Option<String> {
    anchor
        .select(&TITLE_CONTAINERS)
        .filter(is_leaf)
        .map(|el| element_text(&el))
        .find(|text| {
            text.chars().count() > MIN_LEAF_TITLE_CHARS
                && !SOURCE_COUNT_RE.is_match(text)
                && text != "Published"
        })
}

fn title_from_anchor_text(anchor: &ElementRef) -> Option<String> {
    let text = element_text(anchor);
    let head = match TITLE_CUT_RE.find(&text) {
        Some(m) => &text[..m.start()],
        None => text.as_str(),
    };
    let head = head.trim();
    (head.chars().count() > MIN_ANCHOR_TITLE_CHARS).then(|| head.to_string())
}

fn is_leaf(el: &ElementRef) -> bool {
    !el.children().any(|child| child.value().is_element())
}

fn element_text(el: &ElementRef) -> String {
    let raw: String = el.text().collect();
    WHITESPACE_RE.replace_all(raw.trim(), " ").into_owned()
}

// --- Card metadata ---

/// The anchor followed by up to `levels` ancestors, stopping below the first
/// ancestor that also holds a different story link (a neighbouring card).
/// Publisher and citation links inside a card do not count.
fn card_scopes<'a>(anchor: &ElementRef<'a>, href: &str, base: &Url, levels: usize) -> Vec<ElementRef<'a>> {
    let mut scopes = vec![*anchor];
    let mut current = anchor.parent();

    for _ in 0..levels {
        let Some(ancestor) = current.and_then(ElementRef::wrap) else {
            break;
        };
        let holds_other_story = ancestor
            .select(&ANCHOR)
            .filter(|a| a.value().attr("href").is_some_and(|h| h.contains(STORY_PATH)))
            .filter_map(|a| story_href(&a, base))
            .any(|other| other != href);
        if holds_other_story {
            break;
        }
        scopes.push(ancestor);
        current = ancestor.parent();
    }

    scopes
}

fn find_metadata(scopes: &[ElementRef], pattern: &Regex) -> Option<String> {
    scopes.iter().find_map(|scope| {
        scope
            .select(&META_CONTAINERS)
            .map(|el| element_text(&el))
            .find(|text| pattern.is_match(text))
    })
}
