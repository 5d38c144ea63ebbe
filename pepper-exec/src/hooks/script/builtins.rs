use std::collections::BTreeSet;

use regex::Regex;
use serde_json::{Number, Value as JsonValue};
use serde_json_path::JsonPath;

use super::value::{to_display, type_name};
use crate::hooks::{HookError, BASELINE_IMPORTS};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum Module {
    Core,
    Json,
    Regex,
    Env,
    Uuid,
}

impl Module {
    fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "core" => Module::Core,
            "json" => Module::Json,
            "regex" => Module::Regex,
            "env" => Module::Env,
            "uuid" => Module::Uuid,
            _ => return None,
        })
    }

    pub(crate) fn name(self) -> &'static str {
        match self {
            Module::Core => "core",
            Module::Json => "json",
            Module::Regex => "regex",
            Module::Env => "env",
            Module::Uuid => "uuid",
        }
    }
}

/// Baseline modules plus the leaf's `import{}` lines.
pub(crate) fn resolve_imports(imports: &[String]) -> Result<BTreeSet<Module>, HookError> {
    let mut out = BTreeSet::new();
    let lines = BASELINE_IMPORTS.iter().copied().chain(imports.iter().map(String::as_str));
    for line in lines {
        let name = line.trim().trim_matches(|c| c == '"' || c == '\'').trim();
        if name.is_empty() {
            continue;
        }
        let module = Module::parse(name)
            .ok_or_else(|| HookError::Compile(format!("unknown import `{name}`")))?;
        out.insert(module);
    }
    Ok(out)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Builtin {
    Len,
    Contains,
    StartsWith,
    EndsWith,
    Lower,
    Upper,
    Trim,
    Str,
    Num,
    Exists,
    TypeOf,
    ParseJson,
    ToJson,
    JsonPath,
    JsonPathAll,
    Matches,
    Capture,
    Env,
    Uuid,
}

impl Builtin {
    pub(crate) fn lookup(name: &str) -> Option<Self> {
        Some(match name {
            "len" => Builtin::Len,
            "contains" => Builtin::Contains,
            "starts_with" => Builtin::StartsWith,
            "ends_with" => Builtin::EndsWith,
            "lower" => Builtin::Lower,
            "upper" => Builtin::Upper,
            "trim" => Builtin::Trim,
            "str" => Builtin::Str,
            "num" => Builtin::Num,
            "exists" => Builtin::Exists,
            "type_of" => Builtin::TypeOf,
            "parse_json" => Builtin::ParseJson,
            "to_json" => Builtin::ToJson,
            "jsonpath" => Builtin::JsonPath,
            "jsonpath_all" => Builtin::JsonPathAll,
            "matches" => Builtin::Matches,
            "capture" => Builtin::Capture,
            "env" => Builtin::Env,
            "uuid" => Builtin::Uuid,
            _ => return None,
        })
    }

    pub(crate) fn module(self) -> Module {
        match self {
            Builtin::ParseJson | Builtin::ToJson | Builtin::JsonPath | Builtin::JsonPathAll => {
                Module::Json
            }
            Builtin::Matches | Builtin::Capture => Module::Regex,
            Builtin::Env => Module::Env,
            Builtin::Uuid => Module::Uuid,
            _ => Module::Core,
        }
    }

    pub(crate) fn arity(self) -> usize {
        match self {
            Builtin::Uuid => 0,
            Builtin::Contains
            | Builtin::StartsWith
            | Builtin::EndsWith
            | Builtin::JsonPath
            | Builtin::JsonPathAll
            | Builtin::Matches => 2,
            Builtin::Capture => 3,
            _ => 1,
        }
    }

    /// Evaluates the call. Errors are plain messages; the interpreter adds the line.
    pub(crate) fn call(self, args: &[JsonValue]) -> Result<JsonValue, String> {
        let arg = |i: usize| args.get(i).unwrap_or(&JsonValue::Null);
        match self {
            Builtin::Len => match arg(0) {
                JsonValue::String(s) => Ok(JsonValue::from(s.chars().count())),
                JsonValue::Array(a) => Ok(JsonValue::from(a.len())),
                JsonValue::Object(o) => Ok(JsonValue::from(o.len())),
                JsonValue::Null => Ok(JsonValue::from(0)),
                other => Err(format!("len() does not accept {}", type_name(other))),
            },
            Builtin::Contains => Ok(JsonValue::Bool(contains(arg(0), arg(1)))),
            Builtin::StartsWith => {
                let (s, p) = (str_arg(self, arg(0))?, str_arg(self, arg(1))?);
                Ok(JsonValue::Bool(s.starts_with(p)))
            }
            Builtin::EndsWith => {
                let (s, p) = (str_arg(self, arg(0))?, str_arg(self, arg(1))?);
                Ok(JsonValue::Bool(s.ends_with(p)))
            }
            Builtin::Lower => Ok(JsonValue::String(str_arg(self, arg(0))?.to_lowercase())),
            Builtin::Upper => Ok(JsonValue::String(str_arg(self, arg(0))?.to_uppercase())),
            Builtin::Trim => Ok(JsonValue::String(str_arg(self, arg(0))?.trim().to_string())),
            Builtin::Str => Ok(JsonValue::String(to_display(arg(0)))),
            Builtin::Num => to_number(arg(0)),
            Builtin::Exists => Ok(JsonValue::Bool(!arg(0).is_null())),
            Builtin::TypeOf => Ok(JsonValue::String(type_name(arg(0)).to_string())),
            Builtin::ParseJson => serde_json::from_str(str_arg(self, arg(0))?)
                .map_err(|e| format!("parse_json(): {e}")),
            Builtin::ToJson => {
                serde_json::to_string(arg(0)).map(JsonValue::String).map_err(|e| e.to_string())
            }
            Builtin::JsonPath => {
                let path = compile_path(str_arg(self, arg(1))?)?;
                Ok(path.query(arg(0)).all().first().map(|v| (*v).clone()).unwrap_or(JsonValue::Null))
            }
            Builtin::JsonPathAll => {
                let path = compile_path(str_arg(self, arg(1))?)?;
                Ok(JsonValue::Array(path.query(arg(0)).all().into_iter().cloned().collect()))
            }
            Builtin::Matches => {
                let re = compile_regex(str_arg(self, arg(1))?)?;
                Ok(JsonValue::Bool(re.is_match(&to_display(arg(0)))))
            }
            Builtin::Capture => {
                let re = compile_regex(str_arg(self, arg(1))?)?;
                let haystack = to_display(arg(0));
                let Some(caps) = re.captures(&haystack) else {
                    return Ok(JsonValue::Null);
                };
                let m = match arg(2) {
                    JsonValue::String(name) => caps.name(name),
                    JsonValue::Number(n) => n.as_u64().and_then(|i| caps.get(i as usize)),
                    other => return Err(format!("capture() group must be a name or index, got {}", type_name(other))),
                };
                Ok(m.map(|m| JsonValue::String(m.as_str().to_string())).unwrap_or(JsonValue::Null))
            }
            Builtin::Env => {
                let name = str_arg(self, arg(0))?;
                Ok(std::env::var(name).map(JsonValue::String).unwrap_or(JsonValue::Null))
            }
            Builtin::Uuid => Ok(JsonValue::String(uuid::Uuid::new_v4().to_string())),
        }
    }

    fn name(self) -> &'static str {
        match self {
            Builtin::Len => "len",
            Builtin::Contains => "contains",
            Builtin::StartsWith => "starts_with",
            Builtin::EndsWith => "ends_with",
            Builtin::Lower => "lower",
            Builtin::Upper => "upper",
            Builtin::Trim => "trim",
            Builtin::Str => "str",
            Builtin::Num => "num",
            Builtin::Exists => "exists",
            Builtin::TypeOf => "type_of",
            Builtin::ParseJson => "parse_json",
            Builtin::ToJson => "to_json",
            Builtin::JsonPath => "jsonpath",
            Builtin::JsonPathAll => "jsonpath_all",
            Builtin::Matches => "matches",
            Builtin::Capture => "capture",
            Builtin::Env => "env",
            Builtin::Uuid => "uuid",
        }
    }
}

fn str_arg(f: Builtin, v: &JsonValue) -> Result<&str, String> {
    v.as_str()
        .ok_or_else(|| format!("{}() expects a string, got {}", f.name(), type_name(v)))
}

fn contains(haystack: &JsonValue, needle: &JsonValue) -> bool {
    match haystack {
        JsonValue::String(s) => needle.as_str().is_some_and(|n| s.contains(n)),
        JsonValue::Array(a) => a.iter().any(|v| super::value::json_eq(v, needle)),
        JsonValue::Object(o) => needle.as_str().is_some_and(|k| o.contains_key(k)),
        _ => false,
    }
}

fn to_number(v: &JsonValue) -> Result<JsonValue, String> {
    match v {
        JsonValue::Number(_) => Ok(v.clone()),
        JsonValue::Bool(b) => Ok(JsonValue::from(*b as i64)),
        JsonValue::String(s) => {
            let s = s.trim();
            if let Ok(i) = s.parse::<i64>() {
                return Ok(JsonValue::from(i));
            }
            s.parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(JsonValue::Number)
                .ok_or_else(|| format!("num(): `{s}` is not a number"))
        }
        other => Err(format!("num() does not accept {}", type_name(other))),
    }
}

fn compile_path(path: &str) -> Result<JsonPath, String> {
    JsonPath::parse(path).map_err(|e| format!("invalid JSONPath `{path}`: {e}"))
}

fn compile_regex(pattern: &str) -> Result<Regex, String> {
    Regex::new(pattern).map_err(|e| format!("invalid regex `{pattern}`: {e}"))
}
