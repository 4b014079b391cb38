//! REST API response types.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::sink::RoutedProfile;
use crate::transform::pipeline::ImportReport;

/// Response sent after an uploaded import job ran.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResponse {
    /// Unique job run identifier
    pub job_id: String,

    /// Import configuration the job ran with
    pub config_id: String,

    /// Status: "ready" when every line was imported, "warning" otherwise
    pub status: String,

    /// Produced profile updates with their routing metadata
    pub profiles: Vec<RoutedProfile>,

    pub report: ImportReport,
}

impl ImportResponse {
    pub fn new(config_id: impl Into<String>, report: ImportReport, profiles: Vec<RoutedProfile>) -> Self {
        Self {
            job_id: Uuid::new_v4().to_string(),
            config_id: config_id.into(),
            status: if report.is_clean() { "ready" } else { "warning" }.to_string(),
            profiles,
            report,
        }
    }
}

/// Response of the event collector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectorResponse {
    /// Whether any event changed the profile.
    pub updated: bool,
}

/// Create an error response
pub fn error_response(error: &str) -> Value {
    json!({
        "jobId": Uuid::new_v4().to_string(),
        "status": "error",
        "error": error,
        "profiles": [],
    })
}
