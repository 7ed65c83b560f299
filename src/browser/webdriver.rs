//! W3C WebDriver client
//!
//! Speaks the WebDriver JSON protocol to a driver server (geckodriver,
//! chromedriver, a Selenium grid) over HTTP.

use super::{Browser, DriverError, DriverResult, ElementHandle, Locator};
use crate::config::BrowserConfig;
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde_json::{json, Value};
use std::time::Duration;

/// Key under which the protocol wraps element references
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// A live WebDriver session
#[derive(Debug)]
pub struct WebDriverSession {
    client: Client,
    base: String,
    session_id: String,
}

impl WebDriverSession {
    /// Opens a new browser session on the configured driver server
    ///
    /// # Arguments
    ///
    /// * `config` - Driver URL and requested browser
    ///
    /// # Returns
    ///
    /// * `Ok(WebDriverSession)` - The session is ready for navigation
    /// * `Err(DriverError)` - The server refused or could not be reached
    pub async fn start(config: &BrowserConfig) -> DriverResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        let base = config.webdriver_url.trim_end_matches('/').to_string();

        let capabilities = json!({
            "capabilities": {
                "alwaysMatch": { "browserName": config.browser_name }
            }
        });
        let response = client
            .post(format!("{}/session", base))
            .json(&capabilities)
            .send()
            .await?;
        let value = unwrap_value(response).await?;

        let session_id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| DriverError::Protocol("new session response has no sessionId".into()))?
            .to_string();

        tracing::info!(
            "Started {} session {} on {}",
            config.browser_name,
            session_id,
            base
        );

        Ok(Self {
            client,
            base,
            session_id,
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    fn url(&self, path: &str) -> String {
        format!("{}/session/{}{}", self.base, self.session_id, path)
    }

    async fn get(&self, path: &str) -> DriverResult<Value> {
        let response = self.client.get(self.url(path)).send().await?;
        unwrap_value(response).await
    }

    async fn post(&self, path: &str, body: Value) -> DriverResult<Value> {
        let response = self.client.post(self.url(path)).json(&body).send().await?;
        unwrap_value(response).await
    }
}

/// Extracts the `value` member of a response, mapping protocol errors
async fn unwrap_value(response: Response) -> DriverResult<Value> {
    let status = response.status();
    let body: Value = response.json().await?;
    let value = match body {
        Value::Object(mut map) => map.remove("value").unwrap_or(Value::Null),
        _ => Value::Null,
    };

    if status.is_success() {
        return Ok(value);
    }

    let error = value
        .get("error")
        .and_then(Value::as_str)
        .unwrap_or("unknown error");
    let message = value
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    Err(match error {
        "no such element" | "stale element reference" => DriverError::NoSuchElement(message),
        "timeout" | "script timeout" => DriverError::Timeout(message),
        other => DriverError::Protocol(format!("{} (HTTP {}): {}", other, status, message)),
    })
}

fn locator_body(locator: Locator<'_>) -> Value {
    let (using, value) = match locator {
        Locator::Id(id) => ("css selector", format!("[id=\"{}\"]", id)),
        Locator::Css(css) => ("css selector", css.to_string()),
        Locator::XPath(xpath) => ("xpath", xpath.to_string()),
    };
    json!({ "using": using, "value": value })
}

fn element_from(value: &Value) -> DriverResult<ElementHandle> {
    value
        .get(ELEMENT_KEY)
        .and_then(Value::as_str)
        .map(|id| ElementHandle(id.to_string()))
        .ok_or_else(|| DriverError::Protocol(format!("not an element reference: {}", value)))
}

#[async_trait]
impl Browser for WebDriverSession {
    async fn navigate(&mut self, url: &str) -> DriverResult<()> {
        tracing::debug!("Navigating to {}", url);
        self.post("/url", json!({ "url": url })).await?;
        Ok(())
    }

    async fn page_contains(&mut self, text: &str) -> DriverResult<bool> {
        let source = self.get("/source").await?;
        Ok(source.as_str().is_some_and(|s| s.contains(text)))
    }

    async fn find_element(&mut self, locator: Locator<'_>) -> DriverResult<ElementHandle> {
        let value = self.post("/element", locator_body(locator)).await?;
        element_from(&value)
    }

    async fn find_elements(&mut self, locator: Locator<'_>) -> DriverResult<Vec<ElementHandle>> {
        let value = self.post("/elements", locator_body(locator)).await?;
        value
            .as_array()
            .ok_or_else(|| DriverError::Protocol("element list is not an array".into()))?
            .iter()
            .map(element_from)
            .collect()
    }

    async fn find_child(
        &mut self,
        parent: &ElementHandle,
        locator: Locator<'_>,
    ) -> DriverResult<ElementHandle> {
        let path = format!("/element/{}/element", parent.0);
        let value = self.post(&path, locator_body(locator)).await?;
        element_from(&value)
    }

    async fn click(&mut self, element: &ElementHandle) -> DriverResult<()> {
        self.post(&format!("/element/{}/click", element.0), json!({}))
            .await?;
        Ok(())
    }

    async fn read_text(&mut self, element: &ElementHandle) -> DriverResult<String> {
        let value = self.get(&format!("/element/{}/text", element.0)).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn attribute(
        &mut self,
        element: &ElementHandle,
        name: &str,
    ) -> DriverResult<Option<String>> {
        let value = self
            .get(&format!("/element/{}/attribute/{}", element.0, name))
            .await?;
        Ok(value.as_str().map(str::to_string))
    }

    async fn type_text(&mut self, element: &ElementHandle, text: &str) -> DriverResult<()> {
        self.post(
            &format!("/element/{}/value", element.0),
            json!({ "text": text }),
        )
        .await?;
        Ok(())
    }

    async fn close(&mut self) -> DriverResult<()> {
        let response = self.client.delete(self.url("")).send().await?;
        unwrap_value(response).await?;
        tracing::info!("Closed session {}", self.session_id);
        Ok(())
    }
}
