use std::time::Duration;

use pepper_core::TemplateError;

use crate::executor::http::HttpError;
use crate::hooks::HookError;

/// Why a single leaf failed. Caught at the leaf boundary and folded into its record.
#[derive(Debug, thiserror::Error)]
pub enum LeafError {
    #[error("template error: {0}")]
    Template(#[from] TemplateError),
    #[error(transparent)]
    Hook(#[from] HookError),
    #[error("transport error: {0}")]
    Transport(#[from] HttpError),
    #[error("timed out after {0:?} waiting for globals")]
    GlobalsTimeout(Duration),
    #[error("cancelled")]
    Cancelled,
}

impl LeafError {
    pub fn kind(&self) -> &'static str {
        match self {
            LeafError::Template(_) => "template",
            LeafError::Hook(HookError::Compile(_)) => "hook_compile",
            LeafError::Hook(HookError::Runtime(_)) => "hook_runtime",
            LeafError::Hook(HookError::Assertion(_)) => "assertion",
            LeafError::Hook(HookError::Timeout(_)) => "hook_timeout",
            LeafError::GlobalsTimeout(_) => "globals_timeout",
            LeafError::Transport(_) => "transport",
            LeafError::Cancelled => "cancelled",
        }
    }
}

/// Errors that stop a run before any leaf executes.
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error("leaf not found: {0}")]
    LeafNotFound(String),
}
