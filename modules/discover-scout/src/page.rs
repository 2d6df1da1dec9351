// Browser capability consumed by the fetch loop and extractor.
//
// The core only needs navigate / wait-for-selector / evaluate / scroll+delay.
// BrowserlessPage is the production implementation; testing::ScriptedPage is
// the deterministic one used by `cargo test`.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PageError {
    #[error("Navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error("Timed out after {after:?} waiting for {what}")]
    Timeout { what: String, after: Duration },

    #[error("Script evaluation failed: {0}")]
    Script(String),

    #[error("No page loaded")]
    NotNavigated,

    #[error(transparent)]
    Browser(#[from] browserless_client::BrowserlessError),
}

pub type PageResult<T> = std::result::Result<T, PageError>;

/// Expression the extractor evaluates to get a DOM snapshot.
pub const DOM_SNAPSHOT_EXPRESSION: &str = "document.documentElement.outerHTML";

#[async_trait]
pub trait PageDriver: Send {
    /// Load `url`, waiting for network idle up to `timeout`.
    async fn navigate(&mut self, url: &str, timeout: Duration) -> PageResult<()>;

    /// Resolve once `selector` matches, or fail with `PageError::Timeout`.
    async fn wait_for_selector(&mut self, selector: &str, timeout: Duration) -> PageResult<()>;

    /// Evaluate a JS expression in the page and return its JSON value.
    async fn evaluate(&mut self, expression: &str) -> PageResult<serde_json::Value>;

    /// Wheel-scroll the viewport vertically.
    async fn scroll(&mut self, delta_y: i64) -> PageResult<()>;

    /// Let the page run for `duration` so lazily-loaded content can arrive.
    async fn delay(&mut self, duration: Duration);

    /// Current rendered DOM as HTML.
    async fn snapshot_html(&mut self) -> PageResult<String> {
        match self.evaluate(DOM_SNAPSHOT_EXPRESSION).await? {
            serde_json::Value::String(html) => Ok(html),
            other => Err(PageError::Script(format!(
                "DOM snapshot returned {} instead of a string",
                json_kind(&other)
            ))),
        }
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a bool",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
