//! `PageDriver` over the stateless Browserless HTTP API.
//!
//! Browserless renders each request in a fresh tab, so the page session is
//! kept client-side as an ordered list of steps and replayed whenever the
//! DOM has to be observed. Only steps that succeeded are kept; `navigate`
//! starts a new list.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use browserless_client::{
    BrowserlessClient, ContentRequest, FunctionRequest, GotoOptions, Viewport, WaitForSelector,
};
use serde::Serialize;
use tracing::debug;

use discover_common::FetchConfig;

use crate::page::{PageDriver, PageError, PageResult};

const WAIT_UNTIL: &str = "networkidle2";

/// Replays `context.steps` in a fresh tab, then evaluates `context.expression`.
const REPLAY_FUNCTION: &str = r#"export default async function ({ page, context }) {
  if (context.userAgent) await page.setUserAgent(context.userAgent);
  if (context.viewport) await page.setViewport(context.viewport);
  if (context.locale) await page.setExtraHTTPHeaders({ "Accept-Language": context.locale });
  for (const step of context.steps) {
    switch (step.op) {
      case "goto":
        await page.goto(step.url, { waitUntil: context.waitUntil, timeout: step.timeoutMs });
        break;
      case "waitForSelector":
        await page.waitForSelector(step.selector, { timeout: step.timeoutMs });
        break;
      case "scroll":
        await page.mouse.wheel({ deltaY: step.deltaY });
        break;
      case "delay":
        await new Promise((resolve) => setTimeout(resolve, step.ms));
        break;
    }
  }
  const value = context.expression ? await page.evaluate(context.expression) : null;
  return { data: { value }, type: "application/json" };
}"#;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "op", rename_all = "camelCase", rename_all_fields = "camelCase")]
enum Step {
    Goto { url: String, timeout_ms: u64 },
    WaitForSelector { selector: String, timeout_ms: u64 },
    Scroll { delta_y: i64 },
    Delay { ms: u64 },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReplayContext<'a> {
    steps: &'a [Step],
    expression: Option<&'a str>,
    wait_until: &'static str,
    user_agent: &'a str,
    viewport: Viewport,
    locale: &'a str,
}

pub struct BrowserlessPage {
    client: BrowserlessClient,
    fetch: FetchConfig,
    steps: Vec<Step>,
}

impl BrowserlessPage {
    pub fn new(client: BrowserlessClient, fetch: FetchConfig) -> Self {
        Self {
            client,
            fetch,
            steps: Vec::new(),
        }
    }

    fn viewport(&self) -> Viewport {
        Viewport {
            width: self.fetch.viewport_width,
            height: self.fetch.viewport_height,
        }
    }

    fn content_request(&self, url: &str, timeout: Duration) -> ContentRequest {
        let mut req = ContentRequest::new(url);
        req.goto_options = Some(GotoOptions {
            wait_until: WAIT_UNTIL.to_string(),
            timeout: millis(timeout),
        });
        req.user_agent = Some(self.fetch.user_agent.clone());
        req.viewport = Some(self.viewport());
        req.extra_http_headers = BTreeMap::from([(
            "Accept-Language".to_string(),
            self.fetch.locale.clone(),
        )]);
        req
    }

    async fn replay(&self, steps: &[Step], expression: Option<&str>) -> PageResult<serde_json::Value> {
        let context = ReplayContext {
            steps,
            expression,
            wait_until: WAIT_UNTIL,
            user_agent: &self.fetch.user_agent,
            viewport: self.viewport(),
            locale: &self.fetch.locale,
        };
        let request = FunctionRequest {
            code: REPLAY_FUNCTION.to_string(),
            context: serde_json::to_value(&context)
                .map_err(|e| PageError::Script(format!("unserializable replay context: {e}")))?,
        };
        debug!(steps = steps.len(), evaluate = expression.is_some(), "Replaying page session");
        let mut response = self.client.function(&request).await?;
        Ok(response
            .get_mut("value")
            .map(serde_json::Value::take)
            .unwrap_or(serde_json::Value::Null))
    }

    fn ensure_navigated(&self) -> PageResult<()> {
        if self.steps.is_empty() {
            Err(PageError::NotNavigated)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl PageDriver for BrowserlessPage {
    async fn navigate(&mut self, url: &str, timeout: Duration) -> PageResult<()> {
        self.steps.clear();
        let request = self.content_request(url, timeout);
        self.client
            .content_with(&request)
            .await
            .map_err(|e| PageError::Navigation {
                url: url.to_string(),
                message: e.to_string(),
            })?;
        self.steps.push(Step::Goto {
            url: url.to_string(),
            timeout_ms: millis(timeout),
        });
        Ok(())
    }

    async fn wait_for_selector(&mut self, selector: &str, timeout: Duration) -> PageResult<()> {
        self.ensure_navigated()?;
        let step = Step::WaitForSelector {
            selector: selector.to_string(),
            timeout_ms: millis(timeout),
        };

        // A bare navigation can use the cheaper /content wait.
        let result = match self.steps.as_slice() {
            [Step::Goto { url, timeout_ms }] => {
                let mut request = self.content_request(url, Duration::from_millis(*timeout_ms));
                request.wait_for_selector = Some(WaitForSelector {
                    selector: selector.to_string(),
                    timeout: millis(timeout),
                });
                self.client.content_with(&request).await.map(|_| ())
            }
            steps => {
                let mut replay = steps.to_vec();
                replay.push(step.clone());
                match self.replay(&replay, None).await {
                    Ok(_) => Ok(()),
                    Err(PageError::Browser(e)) => Err(e),
                    Err(other) => return Err(other),
                }
            }
        };

        match result {
            Ok(()) => {
                self.steps.push(step);
                Ok(())
            }
            Err(e) if e.is_timeout() => Err(PageError::Timeout {
                what: format!("selector {selector}"),
                after: timeout,
            }),
            Err(e) => Err(PageError::Browser(e)),
        }
    }

    async fn evaluate(&mut self, expression: &str) -> PageResult<serde_json::Value> {
        self.ensure_navigated()?;
        self.replay(&self.steps, Some(expression)).await
    }

    async fn scroll(&mut self, delta_y: i64) -> PageResult<()> {
        self.ensure_navigated()?;
        self.steps.push(Step::Scroll { delta_y });
        Ok(())
    }

    async fn delay(&mut self, duration: Duration) {
        if self.steps.is_empty() {
            tokio::time::sleep(duration).await;
        } else {
            // Runs in the browser on the next replay, after the scrolls before it.
            self.steps.push(Step::Delay {
                ms: millis(duration),
            });
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steps_serialize_with_op_tags() {
        let steps = vec![
            Step::Goto {
                url: "https://www.perplexity.ai/discover/tech".to_string(),
                timeout_ms: 45_000,
            },
            Step::WaitForSelector {
                selector: "a[href*='/discover/tech/']".to_string(),
                timeout_ms: 15_000,
            },
            Step::Scroll { delta_y: 1_000 },
            Step::Delay { ms: 3_000 },
        ];
        let json = serde_json::to_value(&steps).unwrap();
        assert_eq!(json[0]["op"], "goto");
        assert_eq!(json[0]["timeoutMs"], 45_000);
        assert_eq!(json[1]["op"], "waitForSelector");
        assert_eq!(json[2]["op"], "scroll");
        assert_eq!(json[2]["deltaY"], 1_000);
        assert_eq!(json[3]["op"], "delay");
        assert_eq!(json[3]["ms"], 3_000);
    }

    #[test]
    fn replay_function_handles_every_step() {
        for op in ["\"goto\"", "\"waitForSelector\"", "\"scroll\"", "\"delay\""] {
            assert!(REPLAY_FUNCTION.contains(op), "missing {op}");
        }
    }

    #[tokio::test]
    async fn probes_before_navigation_are_rejected() {
        let client = BrowserlessClient::new("http://127.0.0.1:9", None).unwrap();
        let mut page = BrowserlessPage::new(client, FetchConfig::default());

        assert!(matches!(page.scroll(100).await, Err(PageError::NotNavigated)));
        assert!(matches!(
            page.evaluate("1 + 1").await,
            Err(PageError::NotNavigated)
        ));
        assert!(matches!(
            page.wait_for_selector("a", Duration::from_millis(1)).await,
            Err(PageError::NotNavigated)
        ));
    }
}
