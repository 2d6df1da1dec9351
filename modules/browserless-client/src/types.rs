use std::collections::BTreeMap;

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GotoOptions {
    pub wait_until: String,
    /// Milliseconds.
    pub timeout: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct WaitForSelector {
    pub selector: String,
    /// Milliseconds.
    pub timeout: u64,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

/// Body for the `/content` endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentRequest {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goto_options: Option<GotoOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wait_for_selector: Option<WaitForSelector>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub viewport: Option<Viewport>,
    #[serde(rename = "setExtraHTTPHeaders", skip_serializing_if = "BTreeMap::is_empty")]
    pub extra_http_headers: BTreeMap<String, String>,
}

impl ContentRequest {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            goto_options: None,
            wait_for_selector: None,
            user_agent: None,
            viewport: None,
            extra_http_headers: BTreeMap::new(),
        }
    }
}

/// Body for the `/function` endpoint. `code` is an ES module whose default
/// export receives `{ page, context }`.
#[derive(Debug, Clone, Serialize)]
pub struct FunctionRequest {
    pub code: String,
    pub context: serde_json::Value,
}
