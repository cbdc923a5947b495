//! Minimal W3C WebDriver client
//!
//! Covers the handful of commands the replay driver needs: session
//! lifecycle, navigation, script execution, element lookup, typing and
//! keyboard actions. Every response is the standard `{"value": ...}`
//! envelope; error envelopes become [`FlapError::WebDriver`].

use crate::errors::{FlapError, Result};
use crate::http_config::{create_driver_client, create_remote_driver_client, is_local_driver};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

/// Key name under which element references are serialized
pub const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// WebDriver code point of the space key
pub const KEY_SPACE: &str = "\u{E00D}";

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    value: T,
}

#[derive(Debug, Deserialize)]
struct ErrorValue {
    error: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct NewSessionValue {
    #[serde(rename = "sessionId")]
    session_id: String,
    #[serde(default)]
    capabilities: Value,
}

/// Opaque handle to an element in the page
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ElementRef {
    #[serde(rename = "element-6066-11e4-a52e-4f735466cecf")]
    pub id: String,
}

impl ElementRef {
    /// JSON form used when passing the element as a script argument
    pub fn to_json(&self) -> Value {
        json!({ ELEMENT_KEY: self.id })
    }
}

/// Capabilities for a Chrome session with the given launch arguments
pub fn chrome_capabilities(args: &[String]) -> Value {
    json!({
        "capabilities": {
            "alwaysMatch": {
                "browserName": "chrome",
                "goog:chromeOptions": { "args": args }
            }
        }
    })
}

/// Entry point to a WebDriver server (chromedriver, geckodriver, a grid)
#[derive(Debug, Clone)]
pub struct WebDriverClient {
    http_client: Client,
    base_url: String,
}

impl WebDriverClient {
    /// Connect to a driver, picking client tuning by whether it runs locally
    pub fn new(base_url: &str) -> Result<Self> {
        let http_client = if is_local_driver(base_url) {
            create_driver_client()?
        } else {
            create_remote_driver_client()?
        };
        Ok(Self::with_client(http_client, base_url))
    }

    pub fn with_client(http_client: Client, base_url: &str) -> Self {
        Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn http_client(&self) -> &Client {
        &self.http_client
    }

    /// Create a browser session
    pub async fn new_session(&self, capabilities: &Value) -> Result<WebDriverSession> {
        let request = self
            .http_client
            .post(format!("{}/session", self.base_url))
            .json(capabilities);
        let created: NewSessionValue = send(request).await?;
        if created.session_id.is_empty() {
            return Err(FlapError::session("driver returned an empty session id"));
        }

        let browser = browser_name(&created.capabilities);
        debug!(session_id = %created.session_id, browser, "WebDriver session created");

        Ok(WebDriverSession {
            client: self.clone(),
            session_id: created.session_id,
        })
    }
}

/// `browserName` of a capabilities object, `"unknown"` when absent
fn browser_name(capabilities: &Value) -> &str {
    capabilities
        .get("browserName")
        .and_then(serde_json::Value::as_str)
        .unwrap_or("unknown")
}

/// Unwrap the value envelope or turn the error envelope into a [`FlapError`]
async fn send<T: DeserializeOwned>(request: RequestBuilder) -> Result<T> {
    let response = request.send().await?;
    let status = response.status();
    let body = response.bytes().await?;

    if !status.is_success() {
        return Err(match serde_json::from_slice::<Envelope<ErrorValue>>(&body) {
            Ok(envelope) => FlapError::webdriver(status.as_u16(), envelope.value.error, envelope.value.message),
            Err(_) => FlapError::webdriver(
                status.as_u16(),
                "unknown error",
                String::from_utf8_lossy(&body).into_owned(),
            ),
        });
    }

    let envelope: Envelope<T> = serde_json::from_slice(&body)?;
    Ok(envelope.value)
}

/// A live browser session
#[derive(Debug)]
pub struct WebDriverSession {
    client: WebDriverClient,
    session_id: String,
}

impl WebDriverSession {
    pub fn id(&self) -> &str {
        &self.session_id
    }

    fn url(&self, path: &str) -> String {
        format!("{}/session/{}{}", self.client.base_url, self.session_id, path)
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, body: Value) -> Result<T> {
        send(self.client.http_client.post(self.url(path)).json(&body)).await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        send(self.client.http_client.get(self.url(path))).await
    }

    /// Navigate the current top-level browsing context
    pub async fn goto(&self, url: &str) -> Result<()> {
        let _: Value = self.post("/url", json!({ "url": url })).await?;
        Ok(())
    }

    /// Run a synchronous script and return its result
    pub async fn execute(&self, script: &str, args: Vec<Value>) -> Result<Value> {
        self.post("/execute/sync", json!({ "script": script, "args": args })).await
    }

    /// Find the first element matching a CSS selector
    pub async fn find(&self, selector: &str) -> Result<ElementRef> {
        self.post("/element", json!({ "using": "css selector", "value": selector }))
            .await
    }

    /// Find all elements matching a CSS selector; empty when none match
    pub async fn find_all(&self, selector: &str) -> Result<Vec<ElementRef>> {
        self.post("/elements", json!({ "using": "css selector", "value": selector }))
            .await
    }

    /// Like [`find`](Self::find) but maps "no such element" to `None`
    pub async fn try_find(&self, selector: &str) -> Result<Option<ElementRef>> {
        match self.find(selector).await {
            Ok(element) => Ok(Some(element)),
            Err(e) if e.is_no_such_element() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Type text into an element
    pub async fn send_keys(&self, element: &ElementRef, text: &str) -> Result<()> {
        let path = format!("/element/{}/value", element.id);
        let _: Value = self.post(&path, json!({ "text": text })).await?;
        Ok(())
    }

    pub async fn text(&self, element: &ElementRef) -> Result<String> {
        self.get(&format!("/element/{}/text", element.id)).await
    }

    pub async fn is_displayed(&self, element: &ElementRef) -> Result<bool> {
        self.get(&format!("/element/{}/displayed", element.id)).await
    }

    /// Submit the form an element belongs to, firing the page's submit handlers
    pub async fn submit(&self, element: &ElementRef) -> Result<()> {
        let script = "var el = arguments[0]; \
            var form = el.tagName === 'FORM' ? el : (el.form || el.closest('form')); \
            if (!form) { throw new Error('element is not inside a form'); } \
            if (form.requestSubmit) { form.requestSubmit(); } else { form.submit(); }";
        self.execute(script, vec![element.to_json()]).await?;
        Ok(())
    }

    /// Press and release one key through the actions API
    pub async fn press_key(&self, key: &str) -> Result<()> {
        let body = json!({
            "actions": [{
                "type": "key",
                "id": "keyboard",
                "actions": [
                    { "type": "keyDown", "value": key },
                    { "type": "keyUp", "value": key }
                ]
            }]
        });
        let _: Value = self.post("/actions", body).await?;
        Ok(())
    }

    /// End the session and close the browser
    pub async fn quit(self) -> Result<()> {
        let request = self.client.http_client.delete(self.url(""));
        let _: Value = send(request).await?;
        Ok(())
    }

    /// Best-effort variant of [`quit`](Self::quit) for cleanup paths
    pub async fn close(self) {
        let id = self.session_id.clone();
        if let Err(e) = self.quit().await {
            warn!(session_id = %id, error = %e, "Failed to close WebDriver session");
        }
    }
}
