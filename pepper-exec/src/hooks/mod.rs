//! Pre/post hook seam.
//!
//! A [`HookEngine`] compiles a leaf's `before{}`/`after{}` sources once per run into a
//! [`CompiledHooks`] value exposing both entry points. [`ScriptEngine`] is the built-in
//! implementation; see [`script`] for the language.

use std::time::Duration;

use async_trait::async_trait;
use pepper_core::{RequestSpec, Variables};

use crate::executor::globals::Globals;
use crate::executor::http::HttpResponseParts;

pub mod script;

pub use script::ScriptEngine;

/// Import modules every hook program gets regardless of its `import{}` cell.
pub const BASELINE_IMPORTS: [&str; 2] = ["core", "json"];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HookError {
    #[error("hook compile error: {0}")]
    Compile(String),
    #[error("hook runtime error: {0}")]
    Runtime(String),
    /// Failure reported by the hook itself (`assert`/`fail`).
    #[error("{0}")]
    Assertion(String),
    #[error("hook timed out after {0:?}")]
    Timeout(Duration),
}

/// Everything a leaf contributes to its hook program.
#[derive(Debug, Clone, Copy)]
pub struct HookSource<'a> {
    pub leaf: &'a str,
    pub pre: &'a str,
    pub post: &'a str,
    pub imports: &'a [String],
}

impl<'a> HookSource<'a> {
    pub fn from_leaf(leaf: &'a pepper_core::Leaf) -> Self {
        Self {
            leaf: &leaf.name,
            pre: &leaf.pre_code,
            post: &leaf.post_code,
            imports: &leaf.imports,
        }
    }
}

pub trait HookEngine: Send + Sync {
    fn compile(&self, source: &HookSource<'_>) -> Result<Box<dyn CompiledHooks>, HookError>;
}

#[async_trait]
pub trait CompiledHooks: Send + Sync {
    /// Runs the pre-hook. `request` is the working copy, absent when the leaf has no `do{}`.
    async fn pre(
        &self,
        request: Option<&mut RequestSpec>,
        globals: &Globals,
        locals: &mut Variables,
    ) -> Result<(), HookError>;

    /// Runs the post-hook. `response` is absent when the leaf sent no request.
    async fn post(
        &self,
        response: Option<&HttpResponseParts>,
        globals: &Globals,
        locals: &mut Variables,
    ) -> Result<(), HookError>;
}
