//! Transport-free cleanup requests against the accumulator.

use std::{collections::BTreeMap, time::SystemTime};

use humantime_serde::re::humantime;
use serde::{Deserialize, Serialize};

use crate::{accumulator::MetricAccumulator, Error};

/// A request to delete cached series.
///
/// Deserializes from `{"type": "labels", "filters": {...}}`, `{"type": "name", "pattern": "..."}`
/// or `{"type": "expired"}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CleanupRequest {
    Labels {
        #[serde(default)]
        filters: BTreeMap<String, String>,
    },
    Name {
        #[serde(default)]
        pattern: String,
    },
    Expired,
}

/// Outcome of a cleanup request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CleanupResponse {
    pub success: bool,
    pub deleted_count: usize,
    pub message: String,
    /// When the response was produced, RFC 3339 in UTC to the second.
    pub timestamp: String,
}

impl CleanupResponse {
    fn deleted(deleted_count: usize) -> CleanupResponse {
        CleanupResponse {
            success: true,
            deleted_count,
            message: format!("Successfully deleted {deleted_count} metrics"),
            timestamp: now_rfc3339(),
        }
    }

    /// A response reporting a rejected request.
    pub fn failure(error: &Error) -> CleanupResponse {
        CleanupResponse {
            success: false,
            deleted_count: 0,
            message: error.to_string(),
            timestamp: now_rfc3339(),
        }
    }
}

fn now_rfc3339() -> String {
    humantime::format_rfc3339_seconds(SystemTime::now()).to_string()
}

impl CleanupRequest {
    /// Runs the request against `accumulator`.
    ///
    /// Label cleanup needs at least one filter and name cleanup needs a pattern.
    pub fn execute(&self, accumulator: &MetricAccumulator) -> Result<CleanupResponse, Error> {
        let deleted = match self {
            CleanupRequest::Labels { filters } => {
                if filters.is_empty() {
                    return Err(Error::MissingCleanupFilters);
                }
                accumulator.clean_by_labels(filters)
            }
            CleanupRequest::Name { pattern } => {
                if pattern.is_empty() {
                    return Err(Error::MissingCleanupPattern);
                }
                accumulator.clean_by_metric_name(pattern)
            }
            CleanupRequest::Expired => accumulator.clean_expired(),
        };
        Ok(CleanupResponse::deleted(deleted))
    }

    /// Runs the request, reporting a rejected request as an unsuccessful response.
    pub fn respond(&self, accumulator: &MetricAccumulator) -> CleanupResponse {
        self.execute(accumulator).unwrap_or_else(|e| {
            tracing::error!(request = ?self, error = %e, "rejected cleanup request");
            CleanupResponse::failure(&e)
        })
    }
}
