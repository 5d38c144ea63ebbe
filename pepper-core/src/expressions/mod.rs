mod template;

pub use template::{ExpandMode, Template, TemplateError, MAX_EXPANSION_PASSES};
