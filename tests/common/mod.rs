//! Common utilities for integration tests

#![allow(dead_code)]

use flapbench::telemetry::DEPLOY_TYPE_FILE;
use flapbench::{ReplayConfig, TELEMETRY_HEADER};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

/// Test configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct TestConfig {
    pub webdriver_url: String,
    pub game_url: Option<String>,
    pub test_timeout: Duration,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            webdriver_url: env::var("WEBDRIVER_URL").unwrap_or_else(|_| flapbench::DEFAULT_WEBDRIVER_URL.to_string()),
            game_url: env::var("GAME_URL").ok(),
            test_timeout: Duration::from_secs(30),
        }
    }
}

impl TestConfig {
    /// Check if a live game client is configured
    pub fn has_game(&self) -> bool {
        self.game_url.is_some()
    }

    /// Replay configuration pointed at the live game
    pub fn replay_config(&self, input_file: &Path, output_dir: &Path) -> ReplayConfig {
        ReplayConfig {
            input_file: input_file.to_path_buf(),
            game_url: self.game_url.clone().unwrap_or_default(),
            output_dir: Some(output_dir.to_path_buf()),
            webdriver_url: self.webdriver_url.clone(),
            readiness_timeout: Some(self.test_timeout),
            ..ReplayConfig::default()
        }
    }

    /// Print test configuration
    pub fn print_config(&self) {
        println!("Test Configuration:");
        println!("  WebDriver: {}", self.webdriver_url);
        println!("  Game URL: {:?}", self.game_url);
        println!("  Timeout: {:?}", self.test_timeout);
    }
}

/// Builder for a collected-telemetry data directory
pub struct DataTree {
    temp: TempDir,
}

impl DataTree {
    pub fn new() -> Self {
        Self {
            temp: TempDir::new().expect("temp dir"),
        }
    }

    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    /// Create a run directory, optionally with a `deploy_type` marker
    pub fn run(&self, name: &str, deploys: Option<&[&str]>) -> PathBuf {
        let dir = self.root().join(name);
        fs::create_dir_all(&dir).expect("run dir");
        if let Some(deploys) = deploys {
            fs::write(dir.join(DEPLOY_TYPE_FILE), deploys.join("\n")).expect("deploy_type");
        }
        dir
    }

    /// Write `<run>/<collected>/remote/<service>/<file>` with the given data rows
    pub fn service_stats(&self, run: &Path, collected: &str, service: &str, file: &str, rows: &[&str]) -> PathBuf {
        let dir = run.join(collected).join("remote").join(service);
        fs::create_dir_all(&dir).expect("service dir");
        let path = dir.join(file);
        fs::write(&path, TestUtils::telemetry_csv(rows)).expect("stats csv");
        path
    }

    /// Write `<run>/<collected>/client_seed_<seed>_run_<n>/latency_data.csv`
    pub fn client_run(&self, run: &Path, collected: &str, seed: &str, n: u32, lines: &[&str]) -> PathBuf {
        let dir = run.join(collected).join(format!("client_seed_{}_run_{}", seed, n));
        fs::create_dir_all(&dir).expect("client run dir");
        let path = dir.join("latency_data.csv");
        fs::write(&path, TestUtils::latency_csv(lines)).expect("latency csv");
        path
    }
}

/// Test utilities for common operations
pub struct TestUtils;

impl TestUtils {
    /// Backend telemetry CSV text with the standard header
    pub fn telemetry_csv(rows: &[&str]) -> String {
        let mut text = TELEMETRY_HEADER.join(",");
        text.push('\n');
        for row in rows {
            text.push_str(row);
            text.push('\n');
        }
        text
    }

    /// Client latency CSV text (`type,direction,time`)
    pub fn latency_csv(lines: &[&str]) -> String {
        let mut text = String::from("type,direction,time\n");
        for line in lines {
            text.push_str(line);
            text.push('\n');
        }
        text
    }

    /// Write a recording named `<seed>.csv` with the given timestamps
    pub fn write_recording(dir: &Path, seed: &str, timestamps: &[i64]) -> PathBuf {
        let path = dir.join(format!("{}.csv", seed));
        let mut text = String::from("code,time\n");
        for ts in timestamps {
            text.push_str(&format!("57,{}\n", ts));
        }
        fs::write(&path, text).expect("recording");
        path
    }

    /// Data rows (header excluded) of a CSV file
    pub fn data_lines(path: &Path) -> Vec<String> {
        fs::read_to_string(path)
            .expect("read csv")
            .lines()
            .skip(1)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Measure execution time of an async operation
    pub async fn measure_time<F, Fut, T>(operation: F) -> (T, Duration)
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = T>,
    {
        let start = std::time::Instant::now();
        let result = operation().await;
        (result, start.elapsed())
    }
}

/// Test result reporting
pub struct TestReporter;

impl TestReporter {
    /// Report test success
    pub fn success(test_name: &str) {
        println!("✅ {} passed", test_name);
    }

    /// Report test skip
    pub fn skip(test_name: &str, reason: &str) {
        println!("⚠️  {} skipped: {}", test_name, reason);
    }

    /// Report test performance
    pub fn performance(test_name: &str, duration: Duration) {
        println!("⚡ {} completed in {:?}", test_name, duration);
    }
}
