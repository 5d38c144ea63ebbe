//! The built-in hook language.
//!
//! Programs are lists of statements separated by newlines or `;`:
//!
//! ```text
//! assert response.status == 200, "login failed"
//! globals["token"] = response.json.token
//! request.headers.Authorization = "Bearer " + globals.token
//! ```
//!
//! Values are JSON. `globals` and `locals` are always in scope; `request` only in
//! `before{}` and `response` only in `after{}`. Functions come from import modules
//! (`core` and `json` always, `regex`, `env` and `uuid` on request).

mod ast;
mod builtins;
mod interp;
mod lexer;
mod parser;
mod value;

use async_trait::async_trait;
use pepper_core::{RequestSpec, Variables};

use self::ast::{HookKind, Stmt};
use self::interp::{response_view, Interpreter};
use super::{CompiledHooks, HookEngine, HookError, HookSource};
use crate::executor::globals::Globals;
use crate::executor::http::HttpResponseParts;

#[derive(Debug, Clone, Copy, Default)]
pub struct ScriptEngine;

impl ScriptEngine {
    pub fn new() -> Self {
        Self
    }
}

impl HookEngine for ScriptEngine {
    fn compile(&self, source: &HookSource<'_>) -> Result<Box<dyn CompiledHooks>, HookError> {
        let imports = builtins::resolve_imports(source.imports)?;
        let with_leaf = |e: HookError| match e {
            HookError::Compile(msg) => HookError::Compile(format!("leaf `{}`: {msg}", source.leaf)),
            other => other,
        };
        let pre = parser::parse_program(source.pre, HookKind::Pre, &imports).map_err(with_leaf)?;
        let post = parser::parse_program(source.post, HookKind::Post, &imports).map_err(with_leaf)?;
        tracing::trace!(leaf = source.leaf, pre = pre.len(), post = post.len(), "compiled hooks");
        Ok(Box::new(ScriptHooks { pre, post }))
    }
}

struct ScriptHooks {
    pre: Vec<Stmt>,
    post: Vec<Stmt>,
}

#[async_trait]
impl CompiledHooks for ScriptHooks {
    async fn pre(
        &self,
        request: Option<&mut RequestSpec>,
        globals: &Globals,
        locals: &mut Variables,
    ) -> Result<(), HookError> {
        if self.pre.is_empty() {
            return Ok(());
        }
        let mut guard = globals.lock().await;
        Interpreter {
            globals: &mut *guard,
            locals,
            request,
            response: None,
        }
        .run(&self.pre)
    }

    async fn post(
        &self,
        response: Option<&HttpResponseParts>,
        globals: &Globals,
        locals: &mut Variables,
    ) -> Result<(), HookError> {
        if self.post.is_empty() {
            return Ok(());
        }
        let view = response.map(response_view);
        let mut guard = globals.lock().await;
        Interpreter {
            globals: &mut *guard,
            locals,
            request: None,
            response: view.as_ref(),
        }
        .run(&self.post)
    }
}
