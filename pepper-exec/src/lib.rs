#![forbid(unsafe_code)]

//! Runtime engine for executing pepper documents.
//!
//! Parsing and dependency resolution live in `pepper-core`; this crate runs the resolved
//! leaves against an [`HttpClient`], evaluating hooks through a [`HookEngine`].

pub mod executor;
pub mod hooks;

pub use crate::executor::{
    Event, EventSink, ExecutionError, Globals, HttpClient, LeafError, LeafRecord, LeafStage,
    LeafStatus, ReqwestHttpClient, RunReport, Runner, RunnerConfig,
};
pub use crate::hooks::{CompiledHooks, HookEngine, HookError, HookSource, ScriptEngine};
