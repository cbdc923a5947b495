//! Backend service telemetry
//!
//! Combines the per-service `stats.csv` files of a collected run into one
//! CSV per deployment, then reports average latency per destination service
//! and the latency sequence of each destination.

use super::plot::{bar_chart, line_panels, Panel, Series};
use super::{collected_dirs, copy_into, create_dir_all, mean, read_deploy_types, run_dirs, warn_skip, GRAPHS_DIR};
use crate::errors::{FlapError, Result};
use crate::types::{DeployKind, TelemetryRow, TELEMETRY_HEADER};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Services of the microservice deployment, in combine order
pub const MICROSERVICES: [&str; 6] = ["auth", "engine", "initiator", "music", "score", "worldgen"];

/// Per-service telemetry file name
pub const STATS_FILE: &str = "stats.csv";

/// Telemetry written by a monolith before its last restart
pub const STATS_OLD_FILE: &str = "stats_old.csv";

pub const AVERAGE_CSV: &str = "average_latency_by_destsvcname.csv";
pub const AVERAGE_PLOT: &str = "average_latency.svg";
pub const TRENDS_PLOT: &str = "latency_trends.svg";

/// Output location of backend reports under the data root
pub fn backend_graphs_dir(data_dir: &Path) -> PathBuf {
    data_dir.join(GRAPHS_DIR).join("backend")
}

fn telemetry_writer(path: &Path) -> Result<csv::Writer<std::fs::File>> {
    let mut writer = csv::WriterBuilder::new().flexible(true).from_path(path)?;
    writer.write_record(TELEMETRY_HEADER)?;
    Ok(writer)
}

/// Every data row of `src` (header skipped), or an error if any row is unreadable
fn read_records(src: &Path) -> Result<Vec<csv::StringRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(src)?;
    let records = reader.records().collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(records)
}

/// Append the rows of `src` to `writer`; an unreadable file contributes nothing
fn append_file<W: std::io::Write>(writer: &mut csv::Writer<W>, src: &Path) -> Result<Option<usize>> {
    let records = match read_records(src) {
        Ok(records) => records,
        Err(e) => {
            warn!(path = %src.display(), error = %e, "Skipping unreadable telemetry");
            return Ok(None);
        }
    };
    for record in &records {
        writer.write_record(record)?;
    }
    Ok(Some(records.len()))
}

/// Combine the microservice telemetry of one collected set
///
/// A missing auth file is created header-only so the service still shows up
/// in the collection; any other missing service is skipped.
pub fn combine_microservices(
    run_dir: &Path,
    collected: &str,
    remote_dir: &Path,
    deploy: &str,
    graphs_dir: &Path,
) -> Result<PathBuf> {
    let out_name = format!("{}_{}_combined.csv", deploy, collected);
    let combined = run_dir.join(&out_name);
    info!(path = %combined.display(), "Combining microservice telemetry");

    let mut writer = telemetry_writer(&combined)?;
    for service in MICROSERVICES {
        let stats = remote_dir.join(service).join(STATS_FILE);
        if service == "auth" && !stats.exists() {
            let parent = remote_dir.join(service);
            create_dir_all(&parent)?;
            telemetry_writer(&stats)?.flush()?;
        }
        if !stats.exists() {
            warn_skip("missing service telemetry", &stats);
            continue;
        }
        if let Some(rows) = append_file(&mut writer, &stats)? {
            debug!(service, rows, "Appended service telemetry");
        }
    }
    writer.flush()?;

    let copied = copy_into(&combined, graphs_dir, None)?;
    debug!(path = %copied.display(), "Copied combined CSV");
    Ok(combined)
}

/// Combine the monolith telemetry (current then pre-restart file)
pub fn combine_monolith(run_dir: &Path, collected: &str, remote_dir: &Path, graphs_dir: &Path) -> Result<PathBuf> {
    let out_name = format!("monolith_single_instance_{}_combined.csv", collected);
    let combined = run_dir.join(&out_name);
    let monolith_dir = remote_dir.join("monolith");
    info!(path = %combined.display(), "Combining monolith telemetry");

    let mut writer = telemetry_writer(&combined)?;
    for file in [STATS_FILE, STATS_OLD_FILE] {
        let stats = monolith_dir.join(file);
        if !stats.exists() {
            warn_skip("missing monolith telemetry", &stats);
            continue;
        }
        if let Some(rows) = append_file(&mut writer, &stats)? {
            debug!(file, rows, "Appended monolith telemetry");
        }
    }
    writer.flush()?;

    copy_into(&combined, graphs_dir, None)?;
    Ok(combined)
}

/// Parse a telemetry CSV into typed rows
///
/// Rows that do not fit the telemetry layout are logged and dropped; a file
/// whose header lacks a telemetry column is rejected as a whole.
pub fn load_rows(path: &Path) -> Result<Vec<TelemetryRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)?;

    let headers = reader.headers()?.clone();
    if let Some(missing) = TELEMETRY_HEADER.iter().find(|col| !headers.iter().any(|h| h == **col)) {
        return Err(FlapError::parse(
            format!("{} has no {} column", path.display(), missing),
            Some(1),
        ));
    }

    let mut rows = Vec::new();
    let mut skipped = 0usize;
    for result in reader.deserialize::<TelemetryRow>() {
        match result {
            Ok(row) => rows.push(row),
            Err(e) => {
                skipped += 1;
                debug!(path = %path.display(), error = %e, "Bad telemetry row");
            }
        }
    }
    if skipped > 0 {
        warn!(path = %path.display(), skipped, kept = rows.len(), "Dropped malformed telemetry rows");
    }
    Ok(rows)
}

/// Mean request time per destination
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DestinationAverage {
    #[serde(rename = "DestSvcName")]
    pub dest_svc_name: String,
    #[serde(rename = "AverageLatency")]
    pub average_latency: f64,
}

/// Request times grouped by destination, in file order within each group
pub fn latency_by_destination(rows: &[TelemetryRow]) -> BTreeMap<String, Vec<f64>> {
    let mut groups: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for row in rows {
        groups.entry(row.dest_svc_name.clone()).or_default().push(row.req_time);
    }
    groups
}

/// Average request time per destination, ordered by destination name
pub fn average_by_destination(rows: &[TelemetryRow]) -> Vec<DestinationAverage> {
    latency_by_destination(rows)
        .into_iter()
        .filter_map(|(dest, times)| {
            mean(&times).map(|average_latency| DestinationAverage {
                dest_svc_name: dest,
                average_latency,
            })
        })
        .collect()
}

/// Write the report for one combined CSV into `<out_root>/<stem>/`
pub fn report(csv_path: &Path, out_root: &Path) -> Result<PathBuf> {
    let name = csv_path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| FlapError::config(format!("bad CSV name {}", csv_path.display())))?;
    let out_dir = out_root.join(name);
    create_dir_all(&out_dir)?;
    copy_into(csv_path, &out_dir, None)?;

    let rows = load_rows(csv_path)?;
    let averages = average_by_destination(&rows);

    let mut writer = csv::Writer::from_path(out_dir.join(AVERAGE_CSV))?;
    if averages.is_empty() {
        writer.write_record(["DestSvcName", "AverageLatency"])?;
    }
    for average in &averages {
        writer.serialize(average)?;
    }
    writer.flush()?;

    if averages.is_empty() {
        warn!(csv = %csv_path.display(), "No telemetry rows, skipping plots");
        return Ok(out_dir);
    }

    let bars: Vec<(String, f64)> = averages
        .iter()
        .map(|a| (a.dest_svc_name.clone(), a.average_latency))
        .collect();
    bar_chart(
        &out_dir.join(AVERAGE_PLOT),
        &format!("Average Latency by Service ({})", name),
        "Destination Service",
        "Latency (ns)",
        &bars,
    )?;

    let panels: Vec<Panel> = latency_by_destination(&rows)
        .into_iter()
        .map(|(dest, times)| {
            Panel::new(dest.as_str(), "Instance", "Latency (ns)").with_series(Series::indexed(dest.as_str(), &times))
        })
        .collect();
    let title = format!("Latency Trends ({})", name);
    line_panels(&out_dir.join(TRENDS_PLOT), Some(title.as_str()), &panels, 2)?;

    info!(out = %out_dir.display(), destinations = averages.len(), "Wrote backend report");
    Ok(out_dir)
}

/// Report every CSV directly inside `dir`, writing next to them
pub fn report_dir(dir: &Path) -> Result<usize> {
    if !dir.is_dir() {
        return Err(FlapError::config(format!("backend folder not found: {}", dir.display())));
    }
    let mut csvs: Vec<PathBuf> = std::fs::read_dir(dir)
        .map_err(|e| FlapError::io(dir, e))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case("csv"))
        })
        .collect();
    csvs.sort();

    let mut reported = 0;
    for csv_path in &csvs {
        info!(csv = %csv_path.display(), "Processing");
        match report(csv_path, dir) {
            Ok(_) => reported += 1,
            Err(e) => warn!(csv = %csv_path.display(), error = %e, "Error reading telemetry"),
        }
    }
    Ok(reported)
}

/// What a full backend aggregation produced
#[derive(Debug, Default, Clone, PartialEq)]
pub struct AggregateSummary {
    pub combined: Vec<PathBuf>,
    pub reports: Vec<PathBuf>,
    pub skipped_runs: usize,
}

/// Walk every run under `data_dir`, combining and reporting each deployment
pub fn aggregate(data_dir: &Path) -> Result<AggregateSummary> {
    let graphs_dir = backend_graphs_dir(data_dir);
    create_dir_all(&graphs_dir)?;
    info!(graphs = %graphs_dir.display(), "Backend graphs output directory");

    let mut summary = AggregateSummary::default();
    for run_dir in run_dirs(data_dir)? {
        info!(run = %run_dir.display(), "Processing run");

        let Some(deploys) = read_deploy_types(&run_dir)? else {
            warn_skip("run without deploy_type", &run_dir);
            summary.skipped_runs += 1;
            continue;
        };
        let collected = collected_dirs(&run_dir)?;
        if collected.is_empty() {
            warn_skip("run without collected_* directories", &run_dir);
            summary.skipped_runs += 1;
            continue;
        }

        for collected_dir in collected {
            let remote_dir = collected_dir.join("remote");
            if !remote_dir.is_dir() {
                warn_skip("collected set without remote/", &collected_dir);
                continue;
            }
            let collected_name = collected_dir
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default()
                .to_string();

            for deploy in &deploys {
                let combined = match DeployKind::parse(deploy) {
                    DeployKind::Microservices(name) => {
                        combine_microservices(&run_dir, &collected_name, &remote_dir, &name, &graphs_dir)
                    }
                    DeployKind::Monolith => combine_monolith(&run_dir, &collected_name, &remote_dir, &graphs_dir),
                    DeployKind::Unknown(name) => {
                        warn!(deploy = %name, "Unknown deploy type, skipping");
                        continue;
                    }
                };
                let combined = match combined {
                    Ok(path) => path,
                    Err(e) => {
                        warn!(run = %run_dir.display(), %deploy, error = %e, "Failed to combine telemetry");
                        continue;
                    }
                };

                match report(&combined, &graphs_dir) {
                    Ok(out) => summary.reports.push(out),
                    Err(e) => warn!(csv = %combined.display(), error = %e, "Error reading telemetry"),
                }
                summary.combined.push(combined);
            }
        }
    }
    Ok(summary)
}
