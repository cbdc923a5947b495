//! Browser client latency telemetry
//!
//! The game client logs a timestamp for every input it sends and every audio
//! chunk and frame it receives (`type,direction,time`, milliseconds). The
//! latency of an input is the time until the next receive of each kind.

use super::plot::{bar_chart, line_panels, table, Panel, Series};
use super::{collected_dirs, copy_into, create_dir_all, mean, read_deploy_types, run_dirs, warn_skip, GRAPHS_DIR};
use crate::errors::{FlapError, Result};
use crate::types::{ClientLatencyRecord, Direction, LatencyKind};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Latency log file name inside a client run directory
pub const LATENCY_FILE: &str = "latency_data.csv";

/// Prefix of client run directories: `client_seed_<seed>_run_<n>`
pub const CLIENT_RUN_PREFIX: &str = "client_seed_";

/// Sorted timestamps of one latency log
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ClientTimeline {
    pub input_send: Vec<f64>,
    pub audio_recv: Vec<f64>,
    pub frame_recv: Vec<f64>,
}

impl ClientTimeline {
    pub fn from_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = ClientLatencyRecord>,
    {
        let mut timeline = Self::default();
        for record in records {
            match (record.kind, record.direction) {
                (LatencyKind::Input, Direction::Send) => timeline.input_send.push(record.time),
                (LatencyKind::Audio, Direction::Recv) => timeline.audio_recv.push(record.time),
                (LatencyKind::Frame, Direction::Recv) => timeline.frame_recv.push(record.time),
                _ => {}
            }
        }
        for times in [&mut timeline.input_send, &mut timeline.audio_recv, &mut timeline.frame_recv] {
            times.sort_by(f64::total_cmp);
        }
        timeline
    }

    pub fn load(path: &Path) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_path(path)?;
        let records = reader
            .deserialize()
            .collect::<std::result::Result<Vec<ClientLatencyRecord>, _>>()?;
        Ok(Self::from_records(records))
    }

    /// Audio latency of every input send
    pub fn audio_latencies(&self) -> Vec<Option<f64>> {
        latencies(&self.input_send, &self.audio_recv)
    }

    /// Frame latency of every input send
    pub fn frame_latencies(&self) -> Vec<Option<f64>> {
        latencies(&self.input_send, &self.frame_recv)
    }
}

/// For each send, the delay until the first receive strictly after it
///
/// Both slices must be sorted; sends with no later receive yield `None`.
pub fn latencies(sends: &[f64], recvs: &[f64]) -> Vec<Option<f64>> {
    sends
        .iter()
        .map(|&sent| {
            let idx = recvs.partition_point(|&r| r <= sent);
            recvs.get(idx).map(|&r| r - sent)
        })
        .collect()
}

/// Absolute differences between consecutive values
pub fn jitter(values: &[f64]) -> Vec<f64> {
    values.windows(2).map(|pair| (pair[1] - pair[0]).abs()).collect()
}

/// Pair each send time with its latency, dropping sends without one
pub fn valid_points(sends: &[f64], latencies: &[Option<f64>]) -> Vec<(f64, f64)> {
    sends
        .iter()
        .zip(latencies)
        .filter_map(|(&t, l)| l.map(|l| (t, l)))
        .collect()
}

const AVERAGE_COLUMNS: [&str; 3] = ["Run", "AvgAudioLatency", "AvgFrameLatency"];

/// Average latencies of one client run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunAverage {
    #[serde(rename = "Run")]
    pub run: u32,
    #[serde(rename = "AvgAudioLatency")]
    pub avg_audio_latency: f64,
    #[serde(rename = "AvgFrameLatency")]
    pub avg_frame_latency: f64,
}

/// Parse `client_seed_<seed>_run_<n>` into `(seed, n)`
pub fn parse_run_dir_name(name: &str) -> Option<(String, u32)> {
    let rest = name.strip_prefix(CLIENT_RUN_PREFIX)?;
    let (seed, run) = rest.rsplit_once("_run_")?;
    if seed.is_empty() || seed.contains('_') {
        return None;
    }
    Some((seed.to_string(), run.parse().ok()?))
}

fn client_runs(collected_dir: &Path) -> Result<Vec<(String, u32, PathBuf)>> {
    let mut runs = Vec::new();
    for dir in super::sorted_subdirs(collected_dir, |name| name.starts_with(CLIENT_RUN_PREFIX))? {
        let name = dir.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        match parse_run_dir_name(name) {
            Some((seed, run)) => runs.push((seed, run, dir)),
            None => warn_skip("unrecognized client run directory", &dir),
        }
    }
    Ok(runs)
}

/// Output location of per-seed reports
pub fn frontend_graphs_dir(data_dir: &Path) -> PathBuf {
    data_dir.join(GRAPHS_DIR).join("frontend")
}

/// Report every run of one seed inside a collected set
///
/// Writes into `<out_root>/<run>_<deploy>/<seed>/`.
pub fn process_seed(
    run_dir: &Path,
    collected_dir: &Path,
    seed: &str,
    out_root: &Path,
    deploy: &str,
) -> Result<PathBuf> {
    let run_name = run_dir
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| FlapError::config(format!("bad run directory {}", run_dir.display())))?;
    let seed_dir = out_root.join(format!("{}_{}", run_name, deploy)).join(seed);
    create_dir_all(&seed_dir)?;

    let mut runs: Vec<(u32, PathBuf)> = client_runs(collected_dir)?
        .into_iter()
        .filter(|(s, _, _)| s == seed)
        .map(|(_, run, dir)| (run, dir))
        .collect();
    runs.sort_by_key(|(run, _)| *run);

    let mut averages = Vec::new();
    let mut audio_latency = Panel::new("Audio Latency vs Time", "Send Time (ms)", "Latency (ms)");
    let mut frame_latency = Panel::new("Frame Latency vs Time", "Send Time (ms)", "Latency (ms)");
    let mut audio_jitter = Panel::new("Audio Jitter vs Time", "Send Time (ms)", "Jitter (ms)");
    let mut frame_jitter = Panel::new("Frame Jitter vs Time", "Send Time (ms)", "Jitter (ms)");

    for (run, dir) in runs {
        let csv_file = dir.join(LATENCY_FILE);
        if !csv_file.exists() {
            warn_skip("client run without latency data", &dir);
            continue;
        }
        let copy_name = format!("{}_{}", run, LATENCY_FILE);
        copy_into(&csv_file, &seed_dir, Some(copy_name.as_str()))?;

        let timeline = ClientTimeline::load(&csv_file)?;
        let audio = valid_points(&timeline.input_send, &timeline.audio_latencies());
        let frame = valid_points(&timeline.input_send, &timeline.frame_latencies());
        let label = format!("Run {}", run);

        // Jitter here is the spread of receive inter-arrival times
        if audio.len() > 1 {
            audio_jitter.series.push(arrival_jitter(&label, &timeline.audio_recv));
        }
        if frame.len() > 1 {
            frame_jitter.series.push(arrival_jitter(&label, &timeline.frame_recv));
        }

        let audio_values: Vec<f64> = audio.iter().map(|(_, l)| *l).collect();
        let frame_values: Vec<f64> = frame.iter().map(|(_, l)| *l).collect();
        averages.push(RunAverage {
            run,
            avg_audio_latency: mean(&audio_values).unwrap_or(0.0),
            avg_frame_latency: mean(&frame_values).unwrap_or(0.0),
        });

        audio_latency.series.push(Series::new(label.as_str(), audio));
        frame_latency.series.push(Series::new(label, frame));
    }

    line_panels(&seed_dir.join("latency_runs.svg"), None, &[audio_latency, frame_latency], 2)?;
    line_panels(&seed_dir.join("jitter_runs.svg"), None, &[audio_jitter, frame_jitter], 2)?;

    let mut writer = csv::Writer::from_path(seed_dir.join("average_latency.csv"))?;
    if averages.is_empty() {
        writer.write_record(AVERAGE_COLUMNS)?;
    }
    for average in &averages {
        writer.serialize(average)?;
    }
    writer.flush()?;

    let cells: Vec<Vec<String>> = averages
        .iter()
        .map(|a| vec![a.run.to_string(), a.avg_audio_latency.to_string(), a.avg_frame_latency.to_string()])
        .collect();
    table(&seed_dir.join("average_latency_table.svg"), &AVERAGE_COLUMNS, &cells)?;

    info!(seed, runs = averages.len(), out = %seed_dir.display(), "Wrote client report");
    Ok(seed_dir)
}

fn arrival_jitter(label: &str, recvs: &[f64]) -> Series {
    let points = recvs.iter().skip(1).copied().zip(jitter(recvs)).collect();
    Series::new(label, points)
}

/// Walk every run under `data_dir` and report each client seed
pub fn aggregate(data_dir: &Path) -> Result<Vec<PathBuf>> {
    let out_root = frontend_graphs_dir(data_dir);
    create_dir_all(&out_root)?;

    let mut reports = Vec::new();
    for run_dir in run_dirs(data_dir)? {
        let deploy = match read_deploy_types(&run_dir)? {
            None => {
                warn_skip("run without deploy_type", &run_dir);
                continue;
            }
            Some(deploys) => match deploys.into_iter().next() {
                Some(first) => first,
                None => {
                    warn_skip("run with empty deploy_type", &run_dir);
                    continue;
                }
            },
        };
        info!(run = %run_dir.display(), %deploy, "Deploy type");

        for collected_dir in collected_dirs(&run_dir)? {
            let seeds: BTreeSet<String> = client_runs(&collected_dir)?
                .into_iter()
                .map(|(seed, _, _)| seed)
                .collect();
            for seed in seeds {
                info!(%seed, collected = %collected_dir.display(), "Processing seed");
                match process_seed(&run_dir, &collected_dir, &seed, &out_root, &deploy) {
                    Ok(dir) => reports.push(dir),
                    Err(e) => warn!(%seed, error = %e, "Failed to report seed"),
                }
            }
        }
    }
    Ok(reports)
}

/// Headline numbers of a single latency log
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClientSummary {
    pub avg_audio_latency: Option<f64>,
    pub avg_frame_latency: Option<f64>,
    pub avg_audio_jitter: Option<f64>,
    pub avg_frame_jitter: Option<f64>,
}

/// Summarize one latency log, plotting per-input latency and jitter into `out_dir`
pub fn summarize(csv_path: &Path, out_dir: &Path) -> Result<ClientSummary> {
    let timeline = ClientTimeline::load(csv_path)?;
    create_dir_all(out_dir)?;

    let audio: Vec<Option<f64>> = timeline.audio_latencies();
    let frame: Vec<Option<f64>> = timeline.frame_latencies();
    let instance_points = |lats: &[Option<f64>]| -> Vec<(f64, f64)> {
        lats.iter()
            .enumerate()
            .filter_map(|(i, l)| l.map(|l| (i as f64, l)))
            .collect()
    };
    let audio_values: Vec<f64> = audio.iter().flatten().copied().collect();
    let frame_values: Vec<f64> = frame.iter().flatten().copied().collect();
    let audio_jitter = jitter(&audio_values);
    let frame_jitter = jitter(&frame_values);

    let summary = ClientSummary {
        avg_audio_latency: mean(&audio_values),
        avg_frame_latency: mean(&frame_values),
        avg_audio_jitter: mean(&audio_jitter),
        avg_frame_jitter: mean(&frame_jitter),
    };

    let latency_panel = Panel::new("Per-Input Latencies", "Input Instance Index", "Latency (ms)")
        .with_series(Series::new("Audio", instance_points(&audio)))
        .with_series(Series::new("Frame", instance_points(&frame)));
    line_panels(&out_dir.join("latency_instances.svg"), None, &[latency_panel], 1)?;

    let jitter_series = |name: &str, values: &[f64]| {
        Series::new(name, values.iter().enumerate().map(|(i, v)| ((i + 1) as f64, *v)).collect())
    };
    let jitter_panel = Panel::new("Per-Instance Jitter", "Input Instance Index", "Jitter (ms)")
        .with_series(jitter_series("Audio Jitter", &audio_jitter))
        .with_series(jitter_series("Frame Jitter", &frame_jitter));
    line_panels(&out_dir.join("jitter_instances.svg"), None, &[jitter_panel], 1)?;

    let audio_vs_frame = |a: Option<f64>, f: Option<f64>| {
        vec![("Audio".to_string(), a.unwrap_or(0.0)), ("Frame".to_string(), f.unwrap_or(0.0))]
    };
    bar_chart(
        &out_dir.join("average_latency.svg"),
        "Average Audio vs. Frame Latency",
        "",
        "Average Latency (ms)",
        &audio_vs_frame(summary.avg_audio_latency, summary.avg_frame_latency),
    )?;
    bar_chart(
        &out_dir.join("average_jitter.svg"),
        "Average Audio vs. Frame Jitter",
        "",
        "Average Jitter (ms)",
        &audio_vs_frame(summary.avg_audio_jitter, summary.avg_frame_jitter),
    )?;

    info!(
        avg_audio_latency = ?summary.avg_audio_latency,
        avg_frame_latency = ?summary.avg_frame_latency,
        avg_audio_jitter = ?summary.avg_audio_jitter,
        avg_frame_jitter = ?summary.avg_frame_jitter,
        "Client latency summary"
    );
    Ok(summary)
}
