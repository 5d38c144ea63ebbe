use std::future::Future;
use std::time::{Duration, Instant};

use pepper_core::{ExpandMode, Leaf, Template, Variables};
use tokio_util::sync::CancellationToken;

use crate::executor::globals::Globals;
use crate::executor::http::{HttpClient, HttpError};
use crate::executor::request::finalize;
use crate::executor::result::LeafError;
use crate::executor::types::{FailureInfo, LeafRecord, LeafStage, LeafStatus, RunnerConfig};
use crate::hooks::{HookEngine, HookError, HookSource};

pub(crate) struct LeafDeps<'a> {
    pub config: &'a RunnerConfig,
    pub http: &'a dyn HttpClient,
    pub hooks: &'a dyn HookEngine,
    pub globals: &'a Globals,
    pub cancel: &'a CancellationToken,
}

/// Runs one leaf to completion. Every failure is folded into the returned record.
pub(crate) async fn run_leaf(leaf: &Leaf, deps: &LeafDeps<'_>) -> (LeafRecord, Option<LeafError>) {
    let started = Instant::now();
    let mut progress = Progress {
        stage: LeafStage::Pending,
        http_status: None,
    };

    let result = execute(leaf, deps, &mut progress).await;
    let duration_ms = started.elapsed().as_millis() as u64;

    let (status, stage, error) = match result {
        Ok(()) => (LeafStatus::Pass, LeafStage::Completed, None),
        Err(e) => (LeafStatus::Fail, progress.stage, Some(e)),
    };

    let record = LeafRecord {
        name: leaf.name.clone(),
        status,
        stage,
        error: error.as_ref().map(FailureInfo::from),
        http_status: progress.http_status,
        duration_ms,
        mandatory: leaf.mandatory,
        implicit: leaf.is_global(),
    };
    (record, error)
}

struct Progress {
    stage: LeafStage,
    http_status: Option<u16>,
}

impl Progress {
    fn enter(&mut self, leaf: &str, stage: LeafStage) {
        tracing::debug!(leaf, stage = stage.as_str(), "leaf stage");
        self.stage = stage;
    }
}

async fn execute(leaf: &Leaf, deps: &LeafDeps<'_>, progress: &mut Progress) -> Result<(), LeafError> {
    let name = leaf.name.as_str();
    let mut locals = Variables::new();
    let mut working = leaf.request.clone();

    progress.enter(name, LeafStage::PreHook);
    let hooks = if leaf.has_hooks() {
        Some(deps.hooks.compile(&HookSource::from_leaf(leaf))?)
    } else {
        None
    };

    if let Some(hooks) = hooks.as_ref().filter(|_| !leaf.pre_code.is_empty()) {
        let call = hooks.pre(working.as_mut(), deps.globals, &mut locals);
        guarded(deps.cancel, deps.config.hook_timeout, call).await??;
    }

    if let Some(req) = working.as_mut() {
        progress.enter(name, LeafStage::TemplateExpand);
        req.expand(&Template::new(&locals), ExpandMode::Lenient)?;
        let handle = deps.globals;
        let globals = guarded(deps.cancel, deps.config.hook_timeout, async move {
            Ok::<_, LeafError>(handle.lock().await)
        })
        .await
        .map_err(|e| match e {
            LeafError::Hook(HookError::Timeout(limit)) => LeafError::GlobalsTimeout(limit),
            other => other,
        })??;
        req.expand(&Template::new(&globals), ExpandMode::Strict)?;
    }

    let response = match working {
        Some(req) => {
            progress.enter(name, LeafStage::Dispatch);
            let parts = finalize(req)?;
            tracing::debug!(leaf = name, method = %parts.method, url = %parts.url, "dispatching");
            let call = deps
                .http
                .send(parts, deps.config.request_timeout, deps.config.max_response_bytes);
            let resp = guarded(deps.cancel, deps.config.request_timeout, call)
                .await
                .map_err(|e| match e {
                    LeafError::Hook(HookError::Timeout(_)) => LeafError::Transport(HttpError::Timeout),
                    other => other,
                })??;
            progress.http_status = Some(resp.status);
            Some(resp)
        }
        None => None,
    };

    if let Some(hooks) = hooks.as_ref().filter(|_| !leaf.post_code.is_empty()) {
        progress.enter(name, LeafStage::PostHook);
        let call = hooks.post(response.as_ref(), deps.globals, &mut locals);
        guarded(deps.cancel, deps.config.hook_timeout, call).await??;
    }

    Ok(())
}

/// Races `fut` against the run's cancellation token and a deadline.
///
/// The outer error is cancellation or the deadline (reported as a hook timeout); the
/// inner result is the future's own.
async fn guarded<T, E, F>(
    cancel: &CancellationToken,
    limit: Duration,
    fut: F,
) -> Result<Result<T, E>, LeafError>
where
    F: Future<Output = Result<T, E>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(LeafError::Cancelled),
        res = tokio::time::timeout(limit, fut) => match res {
            Ok(inner) => Ok(inner),
            Err(_) => Err(LeafError::Hook(HookError::Timeout(limit))),
        },
    }
}
