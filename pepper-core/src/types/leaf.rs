use std::collections::BTreeMap;

use crate::expressions::{ExpandMode, Template, TemplateError};

/// Reserved name of the implicit, anonymous block.
pub const GLOBAL_LEAF: &str = "global";

/// Name → value mapping used for globals, locals and template expansion.
pub type Variables = BTreeMap<String, serde_json::Value>;

/// One named unit of work parsed from a document.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct Leaf {
    pub name: String,

    /// `None` when the block declares no `do{}` cell.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<RequestSpec>,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub pre_code: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub post_code: String,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub imports: Vec<String>,

    pub mandatory: bool,
}

impl Leaf {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn is_global(&self) -> bool {
        self.name == GLOBAL_LEAF
    }

    pub fn has_hooks(&self) -> bool {
        !self.pre_code.is_empty() || !self.post_code.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct RequestSpec {
    pub method: String,
    pub url: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty", serialize_with = "body_as_text")]
    pub body: Vec<u8>,
}

fn body_as_text<S: serde::Serializer>(body: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&String::from_utf8_lossy(body))
}

impl RequestSpec {
    /// Expands `${name}` tokens in the method, URL and header values in place.
    ///
    /// A field is only replaced when its expansion succeeds. The body is never expanded.
    pub fn expand(&mut self, template: &Template<'_>, mode: ExpandMode) -> Result<(), TemplateError> {
        self.method = template.expand(&self.method, mode)?;
        self.url = template.expand(&self.url, mode)?;
        for value in self.headers.values_mut() {
            *value = template.expand(value, mode)?;
        }
        Ok(())
    }
}
