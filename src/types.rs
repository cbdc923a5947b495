//! Core types shared by the replay driver and the telemetry tools
//!
//! The telemetry row layout is produced by the game backend services and has
//! no versioning; field names here follow the CSV header exactly.

use serde::{Deserialize, Serialize};

/// Header of every backend telemetry CSV
pub const TELEMETRY_HEADER: [&str; 6] = [
    "SrcSvcName",
    "SrcSvcVerb",
    "DestSvcName",
    "DestSvcVerb",
    "GameId",
    "ReqTime",
];

/// One recorded key press from the input logger (`code,time`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputEvent {
    /// First CSV column; a key code or an event index depending on the recorder
    pub index: i64,
    /// Timestamp in milliseconds
    pub time_ms: i64,
}

/// Final telemetry of one replay run, written as `extra_data.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub score: i64,
    pub auth_latency: f64,
    pub seed: String,
}

/// One request timing record exchanged between two named services
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TelemetryRow {
    pub src_svc_name: String,
    pub src_svc_verb: String,
    pub dest_svc_name: String,
    pub dest_svc_verb: String,
    pub game_id: String,
    pub req_time: f64,
}

/// Kind of event in the browser client's `latency_data.csv`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LatencyKind {
    Input,
    Audio,
    Frame,
}

/// Whether the timestamp was taken when sending or receiving
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Send,
    Recv,
}

/// One row of the browser client's `latency_data.csv` (`type,direction,time`)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClientLatencyRecord {
    #[serde(rename = "type")]
    pub kind: LatencyKind,
    pub direction: Direction,
    pub time: f64,
}

/// Deployment variant named by a line of a run's `deploy_type` file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployKind {
    /// One process per service; carries the full deploy name
    Microservices(String),
    /// Single binary hosting every service
    Monolith,
    Unknown(String),
}

impl DeployKind {
    pub fn parse(name: &str) -> Self {
        let name = name.trim();
        if name.starts_with("microservices_") {
            DeployKind::Microservices(name.to_string())
        } else if name.starts_with("monolith") {
            DeployKind::Monolith
        } else {
            DeployKind::Unknown(name.to_string())
        }
    }
}
