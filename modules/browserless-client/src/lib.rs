pub mod error;
pub mod types;

pub use error::{BrowserlessError, Result};
pub use types::{ContentRequest, FunctionRequest, GotoOptions, Viewport, WaitForSelector};

use std::time::Duration;

use serde::Serialize;

/// Request ceiling when the caller does not pick one. Sized to cover a 45s
/// navigation plus selector waits inside a single replayed session.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

pub struct BrowserlessClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl BrowserlessClient {
    pub fn new(base_url: &str, token: Option<&str>) -> Result<Self> {
        Self::with_timeout(base_url, token, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, token: Option<&str>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BrowserlessError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.map(String::from),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        let mut endpoint = format!("{}/{}", self.base_url, path);
        if let Some(ref token) = self.token {
            endpoint.push_str(&format!("?token={token}"));
        }
        endpoint
    }

    async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<reqwest::Response> {
        let resp = self
            .client
            .post(self.endpoint(path))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(BrowserlessError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(resp)
    }

    /// Fetch fully-rendered HTML via the /content endpoint, honouring the
    /// request's goto / selector / settle options.
    pub async fn content_with(&self, request: &ContentRequest) -> Result<String> {
        tracing::debug!(url = request.url.as_str(), "Browserless /content");
        let resp = self.post("content", request).await?;
        Ok(resp.text().await?)
    }

    /// Run a puppeteer function on the Browserless side and return whatever
    /// JSON it hands back as `data`.
    pub async fn function(&self, request: &FunctionRequest) -> Result<serde_json::Value> {
        tracing::debug!(code_bytes = request.code.len(), "Browserless /function");
        let resp = self.post("function", request).await?;
        let body = resp.text().await?;
        if body.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }
        serde_json::from_str(&body)
            .map_err(|e| BrowserlessError::InvalidResponse(format!("function returned non-JSON: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_appends_token_and_trims_slash() {
        let client = BrowserlessClient::new("http://localhost:3000/", Some("abc")).unwrap();
        assert_eq!(client.endpoint("content"), "http://localhost:3000/content?token=abc");

        let client = BrowserlessClient::new("http://localhost:3000", None).unwrap();
        assert_eq!(client.endpoint("function"), "http://localhost:3000/function");
    }
}
