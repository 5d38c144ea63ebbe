#![forbid(unsafe_code)]

pub mod error;
pub mod expressions;
pub mod parser;
pub mod planner;
pub mod types;

pub use crate::error::{ParseError, PepperError, ResolutionError};
pub use crate::expressions::{ExpandMode, Template, TemplateError};
pub use crate::parser::{
    parse_document, parse_document_concurrent, parse_document_str, DEFAULT_PARSE_WORKERS,
};
pub use crate::planner::{format_plan_text, load_plan, plan_document, ExecutionPlan};
pub use crate::types::{Document, Leaf, RequestSpec, Variables, GLOBAL_LEAF};
