use std::borrow::Cow;

use pepper_core::{RequestSpec, Variables};
use serde_json::{Map, Value as JsonValue};

use super::ast::{BinaryOp, Expr, RequestField, Root, Scope, Stmt, StmtKind, Target, UnaryOp};
use super::value::{arith, json_cmp, json_eq, negate, to_display, truthy, type_name, Arith};
use crate::executor::http::HttpResponseParts;
use crate::hooks::HookError;

static NULL: JsonValue = JsonValue::Null;

/// State visible to one hook invocation.
pub(crate) struct Interpreter<'a> {
    pub globals: &'a mut Variables,
    pub locals: &'a mut Variables,
    pub request: Option<&'a mut RequestSpec>,
    pub response: Option<&'a JsonValue>,
}

impl Interpreter<'_> {
    pub(crate) fn run(&mut self, program: &[Stmt]) -> Result<(), HookError> {
        for stmt in program {
            self.exec(stmt)?;
        }
        Ok(())
    }

    fn exec(&mut self, stmt: &Stmt) -> Result<(), HookError> {
        let rt = |msg: String| HookError::Runtime(format!("line {}: {msg}", stmt.line));
        match &stmt.kind {
            StmtKind::Assign { target, value } => {
                let value = self.eval(value).map_err(rt)?.into_owned();
                self.assign(target, value).map_err(rt)
            }
            StmtKind::Unset(target) => self.unset(target).map_err(rt),
            StmtKind::Assert { cond, message, source } => {
                if truthy(&*self.eval(cond).map_err(rt)?) {
                    return Ok(());
                }
                let msg = match message {
                    Some(m) => to_display(&*self.eval(m).map_err(rt)?),
                    None => format!("assertion failed: {source}"),
                };
                Err(HookError::Assertion(msg))
            }
            StmtKind::Fail(message) => {
                let msg = to_display(&*self.eval(message).map_err(rt)?);
                Err(HookError::Assertion(msg))
            }
        }
    }

    fn assign(&mut self, target: &Target, value: JsonValue) -> Result<(), String> {
        match target {
            Target::Var { scope, key } => {
                let key = self.key(key)?;
                self.scope_mut(*scope).insert(key, value);
            }
            Target::Request(field) => {
                let req = self.request_mut()?;
                match field {
                    RequestField::Method => req.method = expect_string("request.method", value)?,
                    RequestField::Url => req.url = expect_string("request.url", value)?,
                    RequestField::Body => {
                        req.body = match value {
                            JsonValue::String(s) => s.into_bytes(),
                            JsonValue::Null => Vec::new(),
                            other => serde_json::to_vec(&other).map_err(|e| e.to_string())?,
                        }
                    }
                }
            }
            Target::RequestHeader(key) => {
                let name = self.key(key)?;
                let req = self.request_mut()?;
                remove_header(req, &name);
                req.headers.insert(name, to_display(&value));
            }
        }
        Ok(())
    }

    fn unset(&mut self, target: &Target) -> Result<(), String> {
        match target {
            Target::Var { scope, key } => {
                let key = self.key(key)?;
                self.scope_mut(*scope).remove(&key);
            }
            Target::Request(RequestField::Body) => self.request_mut()?.body.clear(),
            Target::Request(_) => return Err("only request.body and request headers can be unset".into()),
            Target::RequestHeader(key) => {
                let name = self.key(key)?;
                remove_header(self.request_mut()?, &name);
            }
        }
        Ok(())
    }

    fn key(&self, key: &Expr) -> Result<String, String> {
        match self.eval(key)?.into_owned() {
            JsonValue::String(s) => Ok(s),
            other => Err(format!("names must be strings, got {}", type_name(&other))),
        }
    }

    fn scope(&self, scope: Scope) -> &Variables {
        match scope {
            Scope::Globals => &*self.globals,
            Scope::Locals => &*self.locals,
        }
    }

    fn scope_mut(&mut self, scope: Scope) -> &mut Variables {
        match scope {
            Scope::Globals => &mut *self.globals,
            Scope::Locals => &mut *self.locals,
        }
    }

    fn request_mut(&mut self) -> Result<&mut RequestSpec, String> {
        self.request
            .as_deref_mut()
            .ok_or_else(|| "this leaf has no request (no do{} cell)".to_string())
    }

    fn eval<'s>(&'s self, expr: &'s Expr) -> Result<Cow<'s, JsonValue>, String> {
        match expr {
            Expr::Literal(v) => Ok(Cow::Borrowed(v)),
            Expr::Root(root) => Ok(self.root(*root)),
            Expr::Member(base, name) => {
                if let Some(scope) = scope_of(base) {
                    return Ok(Cow::Borrowed(self.scope(scope).get(name).unwrap_or(&NULL)));
                }
                let base = self.eval(base)?;
                Ok(project(base, |v| v.get(name.as_str())))
            }
            Expr::Index(base, key) => {
                let key = self.eval(key)?.into_owned();
                if let Some(scope) = scope_of(base) {
                    let v = key.as_str().and_then(|k| self.scope(scope).get(k));
                    return Ok(Cow::Borrowed(v.unwrap_or(&NULL)));
                }
                let base = self.eval(base)?;
                Ok(project(base, |v| index(v, &key)))
            }
            Expr::Call(func, args) => {
                let args = args
                    .iter()
                    .map(|a| self.eval(a).map(Cow::into_owned))
                    .collect::<Result<Vec<_>, _>>()?;
                func.call(&args).map(Cow::Owned)
            }
            Expr::Unary(op, operand) => {
                let v = self.eval(operand)?;
                match op {
                    UnaryOp::Not => Ok(Cow::Owned(JsonValue::Bool(!truthy(&v)))),
                    UnaryOp::Neg => v
                        .as_number()
                        .and_then(negate)
                        .map(|n| Cow::Owned(JsonValue::Number(n)))
                        .ok_or_else(|| format!("cannot negate {}", type_name(&v))),
                }
            }
            Expr::Binary(op, lhs, rhs) => self.binary(*op, lhs, rhs).map(Cow::Owned),
        }
    }

    fn binary(&self, op: BinaryOp, lhs: &Expr, rhs: &Expr) -> Result<JsonValue, String> {
        let l = self.eval(lhs)?;
        match op {
            BinaryOp::And if !truthy(&l) => return Ok(JsonValue::Bool(false)),
            BinaryOp::Or if truthy(&l) => return Ok(JsonValue::Bool(true)),
            BinaryOp::And | BinaryOp::Or => return Ok(JsonValue::Bool(truthy(&*self.eval(rhs)?))),
            _ => {}
        }

        let r = self.eval(rhs)?;
        let (l, r) = (l.as_ref(), r.as_ref());
        let ordering = |pred: fn(std::cmp::Ordering) -> bool| {
            json_cmp(l, r)
                .map(|o| JsonValue::Bool(pred(o)))
                .ok_or_else(|| format!("cannot compare {} with {}", type_name(l), type_name(r)))
        };

        match op {
            BinaryOp::Eq => Ok(JsonValue::Bool(json_eq(l, r))),
            BinaryOp::Ne => Ok(JsonValue::Bool(!json_eq(l, r))),
            BinaryOp::Lt => ordering(|o| o.is_lt()),
            BinaryOp::Le => ordering(|o| o.is_le()),
            BinaryOp::Gt => ordering(|o| o.is_gt()),
            BinaryOp::Ge => ordering(|o| o.is_ge()),
            BinaryOp::Add => match (l, r) {
                (JsonValue::Number(a), JsonValue::Number(b)) => arith(Arith::Add, a, b)
                    .map(JsonValue::Number)
                    .ok_or_else(|| "numeric overflow".to_string()),
                (JsonValue::String(_), _) | (_, JsonValue::String(_)) => {
                    Ok(JsonValue::String(to_display(l) + &to_display(r)))
                }
                _ => Err(format!("cannot add {} and {}", type_name(l), type_name(r))),
            },
            BinaryOp::Sub => match (l, r) {
                (JsonValue::Number(a), JsonValue::Number(b)) => arith(Arith::Sub, a, b)
                    .map(JsonValue::Number)
                    .ok_or_else(|| "numeric overflow".to_string()),
                _ => Err(format!("cannot subtract {} from {}", type_name(r), type_name(l))),
            },
            BinaryOp::And | BinaryOp::Or => unreachable!("short-circuit operators handled above"),
        }
    }

    fn root(&self, root: Root) -> Cow<'_, JsonValue> {
        match root {
            Root::Globals => Cow::Owned(vars_to_object(self.globals)),
            Root::Locals => Cow::Owned(vars_to_object(self.locals)),
            Root::Request => match self.request.as_deref() {
                Some(req) => Cow::Owned(request_view(req)),
                None => Cow::Borrowed(&NULL),
            },
            Root::Response => Cow::Borrowed(self.response.unwrap_or(&NULL)),
        }
    }
}

/// `status`, lowercased `headers`, lossy `body` text, and `json` (or null).
pub(crate) fn response_view(resp: &HttpResponseParts) -> JsonValue {
    let headers: Map<String, JsonValue> = resp
        .headers
        .iter()
        .map(|(k, v)| (k.to_ascii_lowercase(), JsonValue::String(v.clone())))
        .collect();
    let body = String::from_utf8_lossy(&resp.body).into_owned();
    let json = serde_json::from_slice(&resp.body).unwrap_or(JsonValue::Null);
    serde_json::json!({
        "status": resp.status,
        "headers": headers,
        "body": body,
        "json": json,
    })
}

fn request_view(req: &RequestSpec) -> JsonValue {
    let headers: Map<String, JsonValue> = req
        .headers
        .iter()
        .map(|(k, v)| (k.clone(), JsonValue::String(v.clone())))
        .collect();
    serde_json::json!({
        "method": req.method,
        "url": req.url,
        "headers": headers,
        "body": String::from_utf8_lossy(&req.body),
    })
}

fn vars_to_object(vars: &Variables) -> JsonValue {
    JsonValue::Object(vars.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
}

fn scope_of(e: &Expr) -> Option<Scope> {
    match e {
        Expr::Root(Root::Globals) => Some(Scope::Globals),
        Expr::Root(Root::Locals) => Some(Scope::Locals),
        _ => None,
    }
}

fn index<'v>(v: &'v JsonValue, key: &JsonValue) -> Option<&'v JsonValue> {
    match (v, key) {
        (JsonValue::Object(o), JsonValue::String(k)) => o.get(k),
        (JsonValue::Array(a), JsonValue::Number(n)) => n.as_u64().and_then(|i| a.get(i as usize)),
        _ => None,
    }
}

fn project<'v>(
    base: Cow<'v, JsonValue>,
    f: impl for<'x> Fn(&'x JsonValue) -> Option<&'x JsonValue>,
) -> Cow<'v, JsonValue> {
    match base {
        Cow::Borrowed(v) => Cow::Borrowed(f(v).unwrap_or(&NULL)),
        Cow::Owned(v) => Cow::Owned(f(&v).cloned().unwrap_or(JsonValue::Null)),
    }
}

fn expect_string(what: &str, value: JsonValue) -> Result<String, String> {
    match value {
        JsonValue::String(s) => Ok(s),
        other => Err(format!("{what} must be a string, got {}", type_name(&other))),
    }
}

fn remove_header(req: &mut RequestSpec, name: &str) {
    req.headers.retain(|k, _| !k.eq_ignore_ascii_case(name));
}
