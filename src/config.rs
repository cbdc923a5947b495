//! Replay configuration
//!
//! All knobs of a replay run live in [`ReplayConfig`]. Values are loaded from
//! the environment (and an optional `.env` file) and may then be overridden
//! by the command line.

use crate::errors::{FlapError, Result};
use crate::{DEFAULT_COMPENSATION_MS, DEFAULT_SETUP_TIMEOUT_SECS, DEFAULT_WEBDRIVER_URL};
use std::path::PathBuf;
use std::time::Duration;

pub const ENV_INPUT_FILE: &str = "INPUT_FILE";
pub const ENV_GAME_URL: &str = "GAME_URL";
pub const ENV_OUTPUT_DIR: &str = "OUTPUT_DIR";
pub const ENV_WEBDRIVER_URL: &str = "WEBDRIVER_URL";
pub const ENV_USERNAME: &str = "GAME_USERNAME";
pub const ENV_PASSWORD: &str = "GAME_PASSWORD";
pub const ENV_READINESS_TIMEOUT_SECS: &str = "READINESS_TIMEOUT_SECS";

/// Credentials typed into the login form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginConfig {
    pub username: String,
    pub password: String,
}

impl Default for LoginConfig {
    fn default() -> Self {
        Self {
            username: "admin".to_string(),
            password: "password".to_string(),
        }
    }
}

/// CSS selectors and page globals the driver interacts with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSelectors {
    pub username: String,
    pub password: String,
    pub login_form: String,
    /// Shown once authentication succeeded and the game accepts input
    pub ready: String,
    /// Present once the game-over screen has been rendered
    pub game_over: String,
    pub score: String,
    /// Global boolean set when the game-over screen finished showing
    pub completion_flag: String,
    /// Global number holding the measured authentication latency
    pub auth_latency: String,
}

impl Default for PageSelectors {
    fn default() -> Self {
        Self {
            username: "#username".to_string(),
            password: "#password".to_string(),
            login_form: ".form-group".to_string(),
            ready: "#jump-instruction".to_string(),
            game_over: ".game-over".to_string(),
            score: "#score".to_string(),
            completion_flag: "window.gameOverScreenShown".to_string(),
            auth_latency: "window.authLatency".to_string(),
        }
    }
}

/// Everything one replay invocation needs
#[derive(Debug, Clone)]
pub struct ReplayConfig {
    /// Recorded key presses (`code,time` CSV)
    pub input_file: PathBuf,
    pub game_url: String,
    /// Output directory; a timestamped path is used when unset
    pub output_dir: Option<PathBuf>,
    /// Extra browser launch arguments
    pub browser_args: Vec<String>,
    /// Browser profile directory, passed as `--user-data-dir`
    pub user_data_dir: PathBuf,
    pub webdriver_url: String,
    pub login: LoginConfig,
    pub selectors: PageSelectors,
    /// Subtracted from every recorded gap to offset key dispatch overhead
    pub compensation: Duration,
    /// Bound on the post-replay completion poll; `None` waits forever
    pub readiness_timeout: Option<Duration>,
    /// Sleep between polls while waiting for the page before replay starts
    pub poll_interval: Duration,
    /// Bound on each pre-replay wait (driver start, login form, readiness)
    pub setup_timeout: Duration,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            input_file: PathBuf::new(),
            game_url: String::new(),
            output_dir: None,
            browser_args: Vec::new(),
            user_data_dir: PathBuf::from("selenium"),
            webdriver_url: DEFAULT_WEBDRIVER_URL.to_string(),
            login: LoginConfig::default(),
            selectors: PageSelectors::default(),
            compensation: Duration::from_millis(DEFAULT_COMPENSATION_MS),
            readiness_timeout: None,
            poll_interval: Duration::from_millis(50),
            setup_timeout: Duration::from_secs(DEFAULT_SETUP_TIMEOUT_SECS),
        }
    }
}

impl ReplayConfig {
    /// Load configuration from the process environment, reading `.env` first
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        let mut config = Self::from_lookup(|key| std::env::var(key).ok())?;
        if let Ok(cwd) = std::env::current_dir() {
            config.user_data_dir = cwd.join("selenium");
        }
        Ok(config)
    }

    /// Build a configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(input) = lookup(ENV_INPUT_FILE) {
            config.input_file = PathBuf::from(input);
        }
        if let Some(url) = lookup(ENV_GAME_URL) {
            config.game_url = url;
        }
        config.output_dir = lookup(ENV_OUTPUT_DIR)
            .filter(|dir| !dir.is_empty())
            .map(PathBuf::from);
        if let Some(url) = lookup(ENV_WEBDRIVER_URL) {
            config.webdriver_url = url;
        }
        if let Some(username) = lookup(ENV_USERNAME) {
            config.login.username = username;
        }
        if let Some(password) = lookup(ENV_PASSWORD) {
            config.login.password = password;
        }
        if let Some(secs) = lookup(ENV_READINESS_TIMEOUT_SECS) {
            let secs: u64 = secs.trim().parse().map_err(|e| {
                FlapError::config(format!("{} must be whole seconds: {}", ENV_READINESS_TIMEOUT_SECS, e))
            })?;
            config.readiness_timeout = Some(Duration::from_secs(secs));
        }

        Ok(config)
    }

    /// Reject configurations that cannot possibly drive a run
    pub fn validate(&self) -> Result<()> {
        if self.input_file.as_os_str().is_empty() {
            return Err(FlapError::config(format!("no input file ({} unset)", ENV_INPUT_FILE)));
        }
        if self.game_url.is_empty() {
            return Err(FlapError::config(format!("no game URL ({} unset)", ENV_GAME_URL)));
        }
        url::Url::parse(&self.webdriver_url)
            .map_err(|e| FlapError::config(format!("invalid WebDriver URL {}: {}", self.webdriver_url, e)))?;
        Ok(())
    }

    /// Browser arguments including the profile directory
    pub fn launch_args(&self) -> Vec<String> {
        let mut args = self.browser_args.clone();
        args.push(format!("--user-data-dir={}", self.user_data_dir.display()));
        args
    }
}
