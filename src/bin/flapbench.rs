//! flapbench command line
//!
//! `replay` drives one recorded input file through the browser client;
//! the remaining subcommands build reports from collected telemetry.

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand};
use flapbench::telemetry::{backend, client};
use flapbench::{run_replay, ReplayConfig};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

#[derive(Parser)]
#[command(name = "flapbench")]
#[command(about = "Replay recorded game input and report latency telemetry")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replay a recorded input file against the game client in a browser
    Replay(ReplayArgs),
    /// Combine backend telemetry of every run under a data directory and plot it
    Backend {
        /// Data directory holding one subdirectory per run
        #[arg(long, default_value = "data")]
        data: PathBuf,
    },
    /// Report client latency and jitter for every recorded seed
    Frontend {
        #[arg(long, default_value = "data")]
        data: PathBuf,
    },
    /// Report every telemetry CSV in a directory
    Report {
        dir: PathBuf,
    },
    /// Summarize a single client latency log
    ClientSummary {
        file: PathBuf,
        /// Where the plots go
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
}

#[derive(Args)]
struct ReplayArgs {
    /// Recorded key presses (`code,time` CSV)
    #[arg(long, env = "INPUT_FILE")]
    input: Option<PathBuf>,

    /// Game client URL
    #[arg(long, env = "GAME_URL")]
    url: Option<String>,

    /// Output directory; must not exist yet (default: runs/<timestamp>)
    #[arg(long, env = "OUTPUT_DIR")]
    output: Option<PathBuf>,

    /// WebDriver endpoint
    #[arg(long, env = "WEBDRIVER_URL")]
    webdriver: Option<String>,

    /// Milliseconds subtracted from every recorded gap
    #[arg(long)]
    compensation_ms: Option<u64>,

    /// Give up waiting for the completion flag after this many seconds
    #[arg(long, env = "READINESS_TIMEOUT_SECS")]
    readiness_timeout: Option<u64>,

    /// Extra browser launch arguments
    #[arg(last = true)]
    browser_args: Vec<String>,
}

impl ReplayArgs {
    fn into_config(self) -> anyhow::Result<ReplayConfig> {
        let mut config = ReplayConfig::from_env().context("loading configuration")?;
        if let Some(input) = self.input {
            config.input_file = input;
        }
        if let Some(url) = self.url {
            config.game_url = url;
        }
        if self.output.is_some() {
            config.output_dir = self.output;
        }
        if let Some(webdriver) = self.webdriver {
            config.webdriver_url = webdriver;
        }
        if let Some(ms) = self.compensation_ms {
            config.compensation = Duration::from_millis(ms);
        }
        if let Some(secs) = self.readiness_timeout {
            config.readiness_timeout = Some(Duration::from_secs(secs));
        }
        config.browser_args.extend(self.browser_args);
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    flapbench::init();
    let cli = Cli::parse();

    match cli.command {
        Command::Replay(args) => {
            let config = args.into_config()?;
            let outcome = run_replay(&config).await.context("replay failed")?;
            info!(
                keys_sent = outcome.progress.keys_sent,
                terminated_early = outcome.progress.terminated_early,
                score = outcome.result.score,
                auth_latency = outcome.result.auth_latency,
                "Run complete"
            );
        }
        Command::Backend { data } => {
            let summary = backend::aggregate(&data)
                .with_context(|| format!("aggregating backend telemetry in {}", data.display()))?;
            info!(
                combined = summary.combined.len(),
                reports = summary.reports.len(),
                skipped_runs = summary.skipped_runs,
                "Backend aggregation done"
            );
        }
        Command::Frontend { data } => {
            let reports = client::aggregate(&data)
                .with_context(|| format!("aggregating client telemetry in {}", data.display()))?;
            info!(reports = reports.len(), "Client aggregation done");
        }
        Command::Report { dir } => {
            let reported = backend::report_dir(&dir)?;
            info!(reported, "Reports written");
        }
        Command::ClientSummary { file, out } => {
            let summary = client::summarize(&file, &out)
                .with_context(|| format!("summarizing {}", file.display()))?;
            if let (Some(audio), Some(frame)) = (summary.avg_audio_jitter, summary.avg_frame_jitter) {
                println!("Average audio jitter: {:.3} ms", audio);
                println!("Average frame jitter: {:.3} ms", frame);
            }
        }
    }

    Ok(())
}
