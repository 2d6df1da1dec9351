// Test doubles for the refresh pipeline.
//
// ScriptedPage (PageDriver) serves canned HTML per URL. Selector waits are
// answered by actually matching the selector against the current HTML, so a
// fixture without topic links falls through the wait ladder the same way a
// slow live page would. Every call is recorded for assertions.
//
// Plus fixture builders for Discover-shaped pages.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use scraper::{Html, Selector};

use discover_common::Topic;

use crate::page::{PageDriver, PageError, PageResult, DOM_SNAPSHOT_EXPRESSION};

// ---------------------------------------------------------------------------
// Route
// ---------------------------------------------------------------------------

/// What one URL serves. Each successful navigation takes the next entry of
/// `visits`; the last one repeats.
#[derive(Debug, Clone, Default)]
pub struct Route {
    visits: Vec<String>,
    nav_failures: u32,
    after_scroll: Option<String>,
}

impl Route {
    pub fn html(html: impl Into<String>) -> Self {
        Self {
            visits: vec![html.into()],
            ..Self::default()
        }
    }

    /// One HTML document per successful visit, in order.
    pub fn visits(visits: Vec<String>) -> Self {
        Self {
            visits,
            ..Self::default()
        }
    }

    /// The first `n` navigations fail before any HTML is served.
    pub fn failing_first(mut self, n: u32) -> Self {
        self.nav_failures = n;
        self
    }

    /// Content that only appears once the page has been scrolled.
    pub fn after_scroll(mut self, html: impl Into<String>) -> Self {
        self.after_scroll = Some(html.into());
        self
    }
}

// ---------------------------------------------------------------------------
// ScriptedPage
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum PageCall {
    Navigate(String),
    WaitForSelector(String),
    Evaluate(String),
    Scroll(i64),
    Delay(Duration),
}

/// HashMap-based page driver. Navigating to an unregistered URL fails.
#[derive(Default)]
pub struct ScriptedPage {
    routes: HashMap<String, Route>,
    navigations: HashMap<String, u32>,
    successful_visits: HashMap<String, usize>,
    current_url: Option<String>,
    current_html: Option<String>,
    calls: Vec<PageCall>,
}

impl ScriptedPage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, url: &str, route: Route) -> Self {
        self.routes.insert(url.to_string(), route);
        self
    }

    pub fn calls(&self) -> &[PageCall] {
        &self.calls
    }

    pub fn navigations_to(&self, url: &str) -> u32 {
        self.navigations.get(url).copied().unwrap_or(0)
    }

    /// Total time the pipeline asked the page to wait.
    pub fn total_delay(&self) -> Duration {
        self.calls
            .iter()
            .filter_map(|call| match call {
                PageCall::Delay(d) => Some(*d),
                _ => None,
            })
            .sum()
    }
}

#[async_trait]
impl PageDriver for ScriptedPage {
    async fn navigate(&mut self, url: &str, _timeout: Duration) -> PageResult<()> {
        self.calls.push(PageCall::Navigate(url.to_string()));
        self.current_url = None;
        self.current_html = None;

        let count = self.navigations.entry(url.to_string()).or_insert(0);
        *count += 1;
        let count = *count;

        let Some(route) = self.routes.get(url) else {
            return Err(PageError::Navigation {
                url: url.to_string(),
                message: "no route scripted".to_string(),
            });
        };
        if count <= route.nav_failures {
            return Err(PageError::Navigation {
                url: url.to_string(),
                message: format!("scripted failure {count}/{}", route.nav_failures),
            });
        }

        let visit = self.successful_visits.entry(url.to_string()).or_insert(0);
        let html = route
            .visits
            .get(*visit)
            .or_else(|| route.visits.last())
            .cloned()
            .unwrap_or_default();
        *visit += 1;

        self.current_url = Some(url.to_string());
        self.current_html = Some(html);
        Ok(())
    }

    async fn wait_for_selector(&mut self, selector: &str, timeout: Duration) -> PageResult<()> {
        self.calls.push(PageCall::WaitForSelector(selector.to_string()));
        let html = self.current_html.as_deref().ok_or(PageError::NotNavigated)?;

        let parsed = Selector::parse(selector)
            .map_err(|e| PageError::Script(format!("invalid selector {selector}: {e:?}")))?;
        if Html::parse_document(html).select(&parsed).next().is_some() {
            Ok(())
        } else {
            Err(PageError::Timeout {
                what: selector.to_string(),
                after: timeout,
            })
        }
    }

    async fn evaluate(&mut self, expression: &str) -> PageResult<serde_json::Value> {
        self.calls.push(PageCall::Evaluate(expression.to_string()));
        let html = self.current_html.as_deref().ok_or(PageError::NotNavigated)?;
        if expression == DOM_SNAPSHOT_EXPRESSION {
            Ok(serde_json::Value::String(html.to_string()))
        } else {
            Err(PageError::Script(format!("unscripted expression: {expression}")))
        }
    }

    async fn scroll(&mut self, delta_y: i64) -> PageResult<()> {
        self.calls.push(PageCall::Scroll(delta_y));
        let url = self.current_url.as_deref().ok_or(PageError::NotNavigated)?;
        if let Some(html) = self.routes.get(url).and_then(|r| r.after_scroll.clone()) {
            self.current_html = Some(html);
        }
        Ok(())
    }

    async fn delay(&mut self, duration: Duration) {
        self.calls.push(PageCall::Delay(duration));
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// Live-page URL for a topic under the default origin.
pub fn topic_url(topic: Topic) -> String {
    format!("{}/discover/{topic}", discover_common::config::DEFAULT_ORIGIN)
}

/// A Discover page with `count` story cards for `topic`, behind the usual
/// section navigation.
pub fn discover_page(topic: Topic, count: usize) -> String {
    let cards: String = (0..count)
        .map(|i| {
            story_card(
                &format!("/discover/{topic}/{topic}-story-{i}"),
                &format!("{topic} headline number {i} with detail"),
                &format!("{} hours ago", i + 1),
                &format!("{} sources", 10 + i),
            )
        })
        .collect();
    format!(
        r#"<html><body>
<nav><a href="/discover/top/">Top</a><a href="/discover/tech/">Tech</a><a href="/discover/finance/">Finance</a></nav>
<main>{cards}</main>
</body></html>"#
    )
}

/// A page whose story links carry no recognisable topic path.
pub fn site_wide_page(count: usize) -> String {
    let cards: String = (0..count)
        .map(|i| {
            story_card(
                &format!("/discover/you/personal-story-{i}"),
                &format!("Personalised headline number {i} here"),
                "",
                "",
            )
        })
        .collect();
    format!("<html><body><main>{cards}</main></body></html>")
}

/// A page with only navigation chrome and no stories.
pub fn empty_page() -> String {
    r#"<html><body><nav><a href="/discover/top/">Top</a></nav><main></main></body></html>"#.to_string()
}

pub fn story_card(href: &str, title: &str, time_text: &str, source_count: &str) -> String {
    format!(
        r#"<div class="card"><a href="{href}"><img alt="{title}" src="/thumb.jpg"><div><div>{title}</div></div></a><div class="meta"><span>{source_count}</span><span>{time_text}</span></div></div>"#
    )
}
