use async_trait::async_trait;
use serde_json::json;
use uuid::Uuid;

use super::types::{LeafRecord, RunReport};

#[derive(Debug, Clone)]
pub enum Event {
    RunStarted {
        run_id: Uuid,
        leaves: usize,
    },
    LeafStarted {
        run_id: Uuid,
        leaf: String,
        implicit: bool,
    },
    LeafFinished {
        run_id: Uuid,
        record: LeafRecord,
    },
    RunAborted {
        run_id: Uuid,
        leaf: String,
    },
    RunCancelled {
        run_id: Uuid,
    },
    RunFinished {
        run_id: Uuid,
        passed: usize,
        failed: usize,
        not_run: usize,
    },
}

impl Event {
    pub fn run_id(&self) -> Uuid {
        match self {
            Event::RunStarted { run_id, .. }
            | Event::LeafStarted { run_id, .. }
            | Event::LeafFinished { run_id, .. }
            | Event::RunAborted { run_id, .. }
            | Event::RunCancelled { run_id }
            | Event::RunFinished { run_id, .. } => *run_id,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Event::RunStarted { .. } => "run.started",
            Event::LeafStarted { .. } => "leaf.started",
            Event::LeafFinished { record, .. } if record.passed() => "leaf.passed",
            Event::LeafFinished { .. } => "leaf.failed",
            Event::RunAborted { .. } => "run.aborted",
            Event::RunCancelled { .. } => "run.cancelled",
            Event::RunFinished { .. } => "run.finished",
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        let run_id = self.run_id().to_string();
        let ty = self.type_name();
        match self {
            Event::RunStarted { leaves, .. } => {
                json!({ "type": ty, "run_id": run_id, "leaves": leaves })
            }
            Event::LeafStarted { leaf, implicit, .. } => {
                json!({ "type": ty, "run_id": run_id, "leaf": leaf, "implicit": implicit })
            }
            Event::LeafFinished { record, .. } => {
                json!({ "type": ty, "run_id": run_id, "record": record })
            }
            Event::RunAborted { leaf, .. } => {
                json!({ "type": ty, "run_id": run_id, "leaf": leaf })
            }
            Event::RunCancelled { .. } => json!({ "type": ty, "run_id": run_id }),
            Event::RunFinished { passed, failed, not_run, .. } => {
                json!({ "type": ty, "run_id": run_id, "passed": passed, "failed": failed, "not_run": not_run })
            }
        }
    }

    pub(crate) fn finished(report: &RunReport) -> Self {
        Event::RunFinished {
            run_id: report.run_id,
            passed: report.passed(),
            failed: report.failed(),
            not_run: report.not_run.len(),
        }
    }
}

#[async_trait]
pub trait EventSink: Send + Sync {
    async fn emit(&self, event: Event);
}

pub struct CompositeEventSink {
    sinks: Vec<Box<dyn EventSink>>,
}

impl Default for CompositeEventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl CompositeEventSink {
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    pub fn add(&mut self, sink: Box<dyn EventSink>) {
        self.sinks.push(sink);
    }

    pub fn with(mut self, sink: Box<dyn EventSink>) -> Self {
        self.add(sink);
        self
    }
}

#[async_trait]
impl EventSink for CompositeEventSink {
    async fn emit(&self, event: Event) {
        for sink in &self.sinks {
            sink.emit(event.clone()).await;
        }
    }
}

/// Writes one JSON object per event to stdout.
pub struct JsonEventSink;

#[async_trait]
impl EventSink for JsonEventSink {
    async fn emit(&self, event: Event) {
        println!("{}", serde_json::to_string(&event.to_json()).unwrap_or_default());
    }
}

/// Forwards events to `tracing`.
pub struct TracingEventSink;

#[async_trait]
impl EventSink for TracingEventSink {
    async fn emit(&self, event: Event) {
        match &event {
            Event::RunStarted { run_id, leaves } => {
                tracing::info!(%run_id, leaves, "run started");
            }
            Event::LeafStarted { run_id, leaf, implicit } => {
                tracing::debug!(%run_id, leaf = %leaf, implicit, "leaf started");
            }
            Event::LeafFinished { run_id, record } if record.passed() => {
                tracing::info!(
                    %run_id,
                    leaf = %record.name,
                    http_status = ?record.http_status,
                    duration_ms = record.duration_ms,
                    "leaf passed"
                );
            }
            Event::LeafFinished { run_id, record } => {
                let error = record.error.as_ref().map(|e| e.message.as_str()).unwrap_or("");
                tracing::warn!(
                    %run_id,
                    leaf = %record.name,
                    stage = record.stage.as_str(),
                    error,
                    "leaf failed"
                );
            }
            Event::RunAborted { run_id, leaf } => {
                tracing::warn!(%run_id, leaf = %leaf, "mandatory leaf failed, run aborted");
            }
            Event::RunCancelled { run_id } => {
                tracing::warn!(%run_id, "run cancelled");
            }
            Event::RunFinished { run_id, passed, failed, not_run } => {
                tracing::info!(%run_id, passed, failed, not_run, "run finished");
            }
        }
    }
}

pub struct NoOpEventSink;

#[async_trait]
impl EventSink for NoOpEventSink {
    async fn emit(&self, _event: Event) {}
}
