//! HTTP client setup for talking to the WebDriver endpoint
//!
//! Key presses travel over this client during replay, so request overhead
//! eats directly into the pacing budget. The local client keeps a warm
//! keep-alive connection and disables Nagle's algorithm.

use crate::errors::{FlapError, Result};
use reqwest::{Client, ClientBuilder};
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::debug;

/// Create a client tuned for a driver running on the same host
pub fn create_driver_client() -> std::result::Result<Client, reqwest::Error> {
    ClientBuilder::new()
        // Single warm connection reused for every command
        .pool_max_idle_per_host(4)
        .pool_idle_timeout(Duration::from_secs(300))

        .connect_timeout(Duration::from_millis(2000))
        // Session creation launches the browser, which can be slow
        .timeout(Duration::from_secs(60))

        .tcp_nodelay(true)
        .tcp_keepalive(Duration::from_secs(60))

        // Drivers speak plain HTTP/1.1
        .http1_only()

        .user_agent(concat!("flapbench/", env!("CARGO_PKG_VERSION")))

        .build()
}

/// Whether the driver URL points at this machine
pub fn is_local_driver(base_url: &str) -> bool {
    match url::Url::parse(base_url) {
        Ok(url) => match url.host() {
            Some(url::Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
            Some(url::Host::Ipv4(ip)) => ip.is_loopback(),
            Some(url::Host::Ipv6(ip)) => ip.is_loopback(),
            None => false,
        },
        Err(_) => false,
    }
}

/// Create a client for a driver behind a network hop (e.g. a Selenium grid)
pub fn create_remote_driver_client() -> std::result::Result<Client, reqwest::Error> {
    ClientBuilder::new()
        .pool_max_idle_per_host(4)
        .pool_idle_timeout(Duration::from_secs(90))

        // Grids queue session requests until a node frees up
        .connect_timeout(Duration::from_millis(10000))
        .timeout(Duration::from_secs(300))

        .tcp_nodelay(true)
        .tcp_keepalive(Duration::from_secs(120))

        .gzip(true)

        .user_agent(concat!("flapbench/", env!("CARGO_PKG_VERSION"), " (remote)"))

        .build()
}

#[derive(Debug, Deserialize)]
struct StatusEnvelope {
    value: DriverStatus,
}

/// Body of `GET /status`
#[derive(Debug, Clone, Deserialize)]
pub struct DriverStatus {
    pub ready: bool,
    #[serde(default)]
    pub message: String,
}

/// Poll the driver's status endpoint until it reports ready
///
/// Also establishes the pooled connection before the timing-sensitive part.
pub async fn wait_for_driver(client: &Client, base_url: &str, timeout: Duration) -> Result<DriverStatus> {
    let started = Instant::now();
    let url = format!("{}/status", base_url.trim_end_matches('/'));

    loop {
        match client
            .get(&url)
            .timeout(Duration::from_millis(1000))
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => {
                let status: StatusEnvelope = response.json().await?;
                if status.value.ready {
                    return Ok(status.value);
                }
                debug!(message = %status.value.message, "Driver not ready yet");
            }
            Ok(response) => debug!(status = %response.status(), "Driver status request failed"),
            Err(e) => debug!(error = %e, "Driver unreachable"),
        }

        if started.elapsed() >= timeout {
            return Err(FlapError::timeout(timeout, format!("WebDriver at {} never became ready", base_url)));
        }
        tokio::time::sleep(Duration::from_millis(250)).await;
    }
}
