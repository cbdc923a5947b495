//! Browser-backed game session
//!
//! [`BrowserSession`] wraps a [`WebDriverSession`] pointed at the game client
//! and answers the [`LiveSession`] queries from page state. [`run_replay`]
//! strings the whole run together: launch, log in, replay, persist.

use crate::config::{PageSelectors, ReplayConfig};
use crate::errors::{FlapError, Result};
use crate::http_config::wait_for_driver;
use crate::output::{prepare_output_dir, write_result};
use crate::replay::{seed_from_path, LiveSession, ReplayOutcome, Replayer};
use crate::schedule::ReplaySchedule;
use crate::webdriver::{chrome_capabilities, ElementRef, WebDriverClient, WebDriverSession, KEY_SPACE};
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const CLEAR_STORAGE_SCRIPT: &str = "window.localStorage.clear(); location.reload(true);";

/// The game client open in a browser
#[derive(Debug)]
pub struct BrowserSession {
    driver: WebDriverSession,
    selectors: PageSelectors,
    poll_interval: Duration,
}

impl BrowserSession {
    pub fn new(driver: WebDriverSession, selectors: PageSelectors, poll_interval: Duration) -> Self {
        Self {
            driver,
            selectors,
            poll_interval,
        }
    }

    /// Launch a browser through the configured driver and open the game
    pub async fn launch(config: &ReplayConfig) -> Result<Self> {
        let client = WebDriverClient::new(&config.webdriver_url)?;
        let status = wait_for_driver(client.http_client(), client.base_url(), config.setup_timeout).await?;
        debug!(message = %status.message, "WebDriver ready");

        let args = config.launch_args();
        for arg in &args {
            info!(%arg, "Adding browser argument");
        }
        let driver = client.new_session(&chrome_capabilities(&args)).await?;
        let session = Self::new(driver, config.selectors.clone(), config.poll_interval);

        if let Err(e) = session.driver.goto(&config.game_url).await {
            session.close().await;
            return Err(e);
        }
        Ok(session)
    }

    pub fn driver(&self) -> &WebDriverSession {
        &self.driver
    }

    /// Drop stored credentials so the run measures a fresh login
    pub async fn clear_storage(&self) -> Result<()> {
        self.driver.execute(CLEAR_STORAGE_SCRIPT, Vec::new()).await?;
        Ok(())
    }

    /// Poll for an element until it exists
    pub async fn wait_for_element(&self, selector: &str, timeout: Duration) -> Result<ElementRef> {
        let started = Instant::now();
        loop {
            if let Some(element) = self.driver.try_find(selector).await? {
                return Ok(element);
            }
            if started.elapsed() >= timeout {
                return Err(FlapError::timeout(timeout, format!("element {} never appeared", selector)));
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Fill in and submit the login form
    pub async fn login(&self, username: &str, password: &str, timeout: Duration) -> Result<()> {
        let user_field = self.wait_for_element(&self.selectors.username, timeout).await?;
        let pass_field = self.wait_for_element(&self.selectors.password, timeout).await?;
        let form = self.wait_for_element(&self.selectors.login_form, timeout).await?;

        self.driver.send_keys(&user_field, username).await?;
        self.driver.send_keys(&pass_field, password).await?;
        self.driver.submit(&form).await?;
        debug!(username, "Submitted login form");
        Ok(())
    }

    /// Wait until the readiness element is displayed
    pub async fn wait_until_ready(&self, timeout: Duration) -> Result<()> {
        let started = Instant::now();
        loop {
            if let Some(element) = self.driver.try_find(&self.selectors.ready).await? {
                if self.driver.is_displayed(&element).await? {
                    info!(waited = ?started.elapsed(), "Game ready for input");
                    return Ok(());
                }
            }
            if started.elapsed() >= timeout {
                return Err(FlapError::timeout(
                    timeout,
                    format!("readiness element {} never became visible", self.selectors.ready),
                ));
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn eval(&self, expression: &str) -> Result<Value> {
        self.driver.execute(&format!("return {};", expression), Vec::new()).await
    }

    /// Close the browser
    pub async fn close(self) {
        self.driver.close().await;
    }
}

impl LiveSession for BrowserSession {
    async fn press_key(&mut self) -> Result<()> {
        self.driver.press_key(KEY_SPACE).await
    }

    async fn is_terminated(&mut self) -> Result<bool> {
        Ok(!self.driver.find_all(&self.selectors.game_over).await?.is_empty())
    }

    async fn is_complete(&mut self) -> Result<bool> {
        let value = self.eval(&format!("{} === true", self.selectors.completion_flag)).await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn read_score(&mut self) -> Result<i64> {
        let element = self.driver.find(&self.selectors.score).await?;
        let text = self.driver.text(&element).await?;
        parse_score(&text)
    }

    async fn read_auth_latency(&mut self) -> Result<f64> {
        let value = self.eval(&self.selectors.auth_latency).await?;
        value.as_f64().ok_or_else(|| {
            FlapError::parse(
                format!("{} is not a number: {}", self.selectors.auth_latency, value),
                None,
            )
        })
    }
}

/// Parse the score element's text
pub fn parse_score(text: &str) -> Result<i64> {
    let trimmed = text.trim();
    trimmed
        .parse::<i64>()
        .map_err(|e| FlapError::parse(format!("invalid score {:?}: {}", trimmed, e), None))
}

/// Run one complete replay as described by the configuration
///
/// The output directory is created before the browser starts so a clashing
/// directory fails fast.
pub async fn run_replay(config: &ReplayConfig) -> Result<ReplayOutcome> {
    config.validate()?;

    let schedule = ReplaySchedule::load(&config.input_file)?;
    let seed = seed_from_path(&config.input_file)?;
    if schedule.is_empty() {
        warn!(input = %config.input_file.display(), "Recording has no events, nothing will be replayed");
    }
    let output_dir = prepare_output_dir(config.output_dir.as_deref())?;
    info!(
        input = %config.input_file.display(),
        %seed,
        events = schedule.timestamps().len(),
        output = %output_dir.display(),
        "Loaded recording"
    );

    let mut session = BrowserSession::launch(config).await?;
    let outcome = drive(&mut session, config, &schedule, &seed).await;
    session.close().await;
    let outcome = outcome?;

    let path = write_result(&output_dir, &outcome.result)?;
    info!(path = %path.display(), "Wrote result record");
    Ok(outcome)
}

async fn drive(
    session: &mut BrowserSession,
    config: &ReplayConfig,
    schedule: &ReplaySchedule,
    seed: &str,
) -> Result<ReplayOutcome> {
    session.clear_storage().await?;
    session
        .login(&config.login.username, &config.login.password, config.setup_timeout)
        .await?;
    session.wait_until_ready(config.setup_timeout).await?;

    Replayer::new(config.compensation)
        .with_completion_timeout(config.readiness_timeout)
        .run(session, schedule, seed)
        .await
}
