//! flapbench: input replay and latency telemetry for the flappy cloud game
//!
//! # Features
//!
//! - **Input replay** of recorded key presses against the browser client, paced
//!   by a spin loop on a monotonic clock
//! - **Early termination** as soon as the game-over screen appears
//! - **Result capture** of the final score and authentication latency
//! - **Backend telemetry aggregation** across microservice and monolith deployments
//! - **Client latency and jitter reports** per recorded seed
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use flapbench::{run_replay, ReplayConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     flapbench::init();
//!
//!     // INPUT_FILE, GAME_URL, OUTPUT_DIR, WEBDRIVER_URL ...
//!     let config = ReplayConfig::from_env()?;
//!     let outcome = run_replay(&config).await?;
//!     println!("score {} after {} presses", outcome.result.score, outcome.progress.keys_sent);
//!
//!     Ok(())
//! }
//! ```
//!
//! # Custom sessions
//!
//! The pacing loop only needs a [`LiveSession`], so it can drive anything
//! that can take a key press and report whether the game is over:
//!
//! ```rust,no_run
//! use flapbench::{LiveSession, ReplaySchedule, Replayer, Result};
//! use std::time::Duration;
//!
//! struct Console;
//!
//! impl LiveSession for Console {
//!     async fn press_key(&mut self) -> Result<()> { println!("flap"); Ok(()) }
//!     async fn is_terminated(&mut self) -> Result<bool> { Ok(false) }
//!     async fn is_complete(&mut self) -> Result<bool> { Ok(true) }
//!     async fn read_score(&mut self) -> Result<i64> { Ok(0) }
//!     async fn read_auth_latency(&mut self) -> Result<f64> { Ok(0.0) }
//! }
//!
//! # async fn demo() -> Result<()> {
//! let schedule = ReplaySchedule::new(&[500, 600, 900]);
//! let _outcome = Replayer::new(Duration::from_millis(11))
//!     .run(&mut Console, &schedule, "seed42")
//!     .await?;
//! # Ok(())
//! # }
//! ```

use tracing::info;
use tracing_subscriber::EnvFilter;

// Global constants
pub const DEFAULT_WEBDRIVER_URL: &str = "http://localhost:9515"; // chromedriver
pub const DEFAULT_COMPENSATION_MS: u64 = 11;
pub const DEFAULT_SETUP_TIMEOUT_SECS: u64 = 30;

// Initialize logging
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
    info!("flapbench initialized");
}

// Re-export main types
pub use crate::types::{
    ClientLatencyRecord, DeployKind, Direction, InputEvent, LatencyKind, ResultRecord, TelemetryRow,
    TELEMETRY_HEADER,
};

// Re-export configuration
pub use crate::config::{LoginConfig, PageSelectors, ReplayConfig};

// Re-export error types
pub use crate::errors::{FlapError, Result};

// Re-export replay components
pub use crate::replay::{LiveSession, ReplayOutcome, ReplayProgress, Replayer};
pub use crate::schedule::ReplaySchedule;
pub use crate::session::{run_replay, BrowserSession};
pub use crate::webdriver::{WebDriverClient, WebDriverSession};

// Module declarations
pub mod config;
pub mod errors;
pub mod http_config;
pub mod output;
pub mod replay;
pub mod schedule;
pub mod session;
pub mod telemetry;
pub mod types;
pub mod webdriver;
