use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::result::LeafError;

#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub request_timeout: Duration,
    pub max_response_bytes: usize,
    pub hook_timeout: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            max_response_bytes: 4 * 1024 * 1024,
            hook_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LeafStage {
    Pending,
    PreHook,
    TemplateExpand,
    Dispatch,
    PostHook,
    Completed,
}

impl LeafStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeafStage::Pending => "pending",
            LeafStage::PreHook => "pre_hook",
            LeafStage::TemplateExpand => "template_expand",
            LeafStage::Dispatch => "dispatch",
            LeafStage::PostHook => "post_hook",
            LeafStage::Completed => "completed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LeafStatus {
    Pass,
    Fail,
}

impl LeafStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeafStatus::Pass => "pass",
            LeafStatus::Fail => "fail",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FailureInfo {
    pub kind: &'static str,
    pub message: String,
}

impl From<&LeafError> for FailureInfo {
    fn from(e: &LeafError) -> Self {
        Self {
            kind: e.kind(),
            message: e.to_string(),
        }
    }
}

/// Completion record for one leaf run.
#[derive(Debug, Clone, Serialize)]
pub struct LeafRecord {
    pub name: String,
    pub status: LeafStatus,
    /// `Completed` on success, otherwise the stage that failed.
    pub stage: LeafStage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<FailureInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
    pub duration_ms: u64,
    pub mandatory: bool,
    pub implicit: bool,
}

impl LeafRecord {
    pub fn passed(&self) -> bool {
        self.status == LeafStatus::Pass
    }

    pub fn was_cancelled(&self) -> bool {
        self.error.as_ref().is_some_and(|e| e.kind == "cancelled")
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub records: Vec<LeafRecord>,
    /// Mandatory leaf whose failure stopped the run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aborted_by: Option<String>,
    pub cancelled: bool,
    /// Leaves in the plan that never started.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub not_run: Vec<String>,
}

impl RunReport {
    pub fn passed(&self) -> usize {
        self.records.iter().filter(|r| r.passed()).count()
    }

    pub fn failed(&self) -> usize {
        self.records.len() - self.passed()
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0 && self.aborted_by.is_none() && !self.cancelled
    }

    pub fn record(&self, name: &str) -> Option<&LeafRecord> {
        self.records.iter().find(|r| r.name == name)
    }
}
