use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::types::Variables;

/// Upper bound on substitution passes over one string.
///
/// A value that reintroduces its own token would otherwise loop forever.
pub const MAX_EXPANSION_PASSES: usize = 64;

static TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^{}]+)\}").expect("valid regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpandMode {
    /// A missing value is an error.
    Strict,
    /// A missing value leaves its token in place.
    Lenient,
}

/// `${name}` expansion against one variable mapping.
#[derive(Debug, Clone, Copy)]
pub struct Template<'a> {
    values: &'a Variables,
}

impl<'a> Template<'a> {
    pub fn new(values: &'a Variables) -> Self {
        Self { values }
    }

    pub fn contains_tokens(s: &str) -> bool {
        TOKEN_RE.is_match(s)
    }

    /// Names referenced by `${...}` tokens, in order of first appearance.
    pub fn token_names(s: &str) -> Vec<String> {
        let mut seen = BTreeSet::new();
        TOKEN_RE
            .captures_iter(s)
            .filter_map(|c| c.get(1))
            .map(|m| m.as_str().to_string())
            .filter(|n| seen.insert(n.clone()))
            .collect()
    }

    pub fn expand(&self, s: &str, mode: ExpandMode) -> Result<String, TemplateError> {
        if !TOKEN_RE.is_match(s) {
            return Ok(s.to_string());
        }

        let mut out = s.to_string();
        let mut skipped = BTreeSet::<String>::new();
        for _ in 0..MAX_EXPANSION_PASSES {
            let next = TOKEN_RE
                .captures_iter(&out)
                .filter_map(|c| Some((c.get(0)?.as_str().to_string(), c.get(1)?.as_str().to_string())))
                .find(|(_, name)| !skipped.contains(name));

            let Some((token, name)) = next else {
                return Ok(out);
            };

            match self.values.get(&name) {
                None => match mode {
                    ExpandMode::Strict => return Err(TemplateError::MissingValue(name)),
                    ExpandMode::Lenient => {
                        skipped.insert(name);
                    }
                },
                Some(serde_json::Value::String(v)) => {
                    out = out.replace(&token, v);
                }
                Some(other) => {
                    return Err(TemplateError::InvalidType {
                        name,
                        found: type_name(other),
                    })
                }
            }
        }

        Err(TemplateError::ExpansionLimit(s.to_string()))
    }
}

fn type_name(v: &serde_json::Value) -> &'static str {
    match v {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    #[error("missing template value for `{0}`")]
    MissingValue(String),
    #[error("invalid type for template value `{name}`: expected string, got {found}")]
    InvalidType { name: String, found: &'static str },
    #[error("template expansion did not terminate: {0}")]
    ExpansionLimit(String),
}
