use std::sync::Arc;

use chrono::Utc;
use pepper_core::{Document, ExecutionPlan, Leaf};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::executor::events::{Event, EventSink};
use crate::executor::globals::Globals;
use crate::executor::http::HttpClient;
use crate::executor::leaf_runner::{run_leaf, LeafDeps};
use crate::executor::result::{ExecutionError, LeafError};
use crate::executor::types::{RunReport, RunnerConfig};
use crate::hooks::HookEngine;

/// Executes a resolved plan one leaf at a time.
pub struct Runner {
    config: RunnerConfig,
    http: Arc<dyn HttpClient>,
    hooks: Arc<dyn HookEngine>,
    event_sink: Arc<dyn EventSink>,
}

impl Runner {
    pub fn new(
        config: RunnerConfig,
        http: Arc<dyn HttpClient>,
        hooks: Arc<dyn HookEngine>,
        event_sink: Arc<dyn EventSink>,
    ) -> Self {
        Self { config, http, hooks, event_sink }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Runs every leaf of `plan` in order.
    ///
    /// Leaf failures never surface as `Err`: they are recorded in the report. A failed
    /// mandatory leaf or a cancelled token stops the run; the remaining leaves are listed
    /// in `not_run`.
    pub async fn run(
        &self,
        doc: &Document,
        plan: &ExecutionPlan,
        globals: &Globals,
        cancel: &CancellationToken,
    ) -> Result<RunReport, ExecutionError> {
        let leaves = plan
            .order
            .iter()
            .map(|name| doc.get(name).ok_or_else(|| ExecutionError::LeafNotFound(name.clone())))
            .collect::<Result<Vec<&Leaf>, _>>()?;

        let run_id = Uuid::new_v4();
        let mut report = RunReport {
            run_id,
            started_at: Utc::now(),
            finished_at: Utc::now(),
            records: Vec::with_capacity(leaves.len()),
            aborted_by: None,
            cancelled: false,
            not_run: Vec::new(),
        };
        self.event_sink
            .emit(Event::RunStarted { run_id, leaves: leaves.len() })
            .await;

        let deps = LeafDeps {
            config: &self.config,
            http: self.http.as_ref(),
            hooks: self.hooks.as_ref(),
            globals,
            cancel,
        };

        let mut next = 0;
        while next < leaves.len() {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            let leaf = leaves[next];
            next += 1;

            self.event_sink
                .emit(Event::LeafStarted {
                    run_id,
                    leaf: leaf.name.clone(),
                    implicit: leaf.is_global(),
                })
                .await;

            let (record, error) = run_leaf(leaf, &deps).await;
            report.records.push(record.clone());
            self.event_sink.emit(Event::LeafFinished { run_id, record }).await;

            match error {
                Some(LeafError::Cancelled) => {
                    report.cancelled = true;
                    break;
                }
                Some(_) if leaf.mandatory => {
                    report.aborted_by = Some(leaf.name.clone());
                    self.event_sink
                        .emit(Event::RunAborted { run_id, leaf: leaf.name.clone() })
                        .await;
                    break;
                }
                _ => {}
            }
        }

        report.not_run = leaves[next..].iter().map(|l| l.name.clone()).collect();
        report.finished_at = Utc::now();

        if report.cancelled {
            self.event_sink.emit(Event::RunCancelled { run_id }).await;
        }
        self.event_sink.emit(Event::finished(&report)).await;
        Ok(report)
    }
}
