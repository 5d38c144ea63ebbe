mod dependency;
mod format;
mod model;

use crate::error::{PepperError, ResolutionError};
use crate::parser::parse_document;
use crate::types::Document;

pub use format::format_plan_text;
pub use model::ExecutionPlan;

pub fn plan_document(doc: &Document) -> Result<ExecutionPlan, ResolutionError> {
    dependency::resolve(doc)
}

/// Parses and resolves a document in one step.
pub fn load_plan(input: &[u8]) -> Result<(Document, ExecutionPlan), PepperError> {
    let doc = parse_document(input)?;
    let plan = plan_document(&doc)?;
    Ok((doc, plan))
}
