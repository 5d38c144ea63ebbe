use std::path::Path;

use pepper_core::{parse_document_concurrent, plan_document, Document, ExecutionPlan};

use crate::exit_codes;
use crate::output::print_error;
use crate::OutputArgs;

/// Reads, parses and resolves `path`, reporting failures and mapping them to an exit code.
pub async fn load_document(
    path: &Path,
    parse_workers: usize,
    output: &OutputArgs,
) -> Result<(Document, ExecutionPlan), i32> {
    let content = match tokio::fs::read(path).await {
        Ok(v) => v,
        Err(e) => {
            print_error(
                output.format,
                output.quiet,
                &format!("failed to read {}: {e}", path.display()),
            );
            return Err(exit_codes::RUNTIME_ERROR);
        }
    };

    let doc = match parse_document_concurrent(&content, parse_workers).await {
        Ok(d) => d,
        Err(e) => {
            print_error(output.format, output.quiet, &format!("parse failed: {e}"));
            return Err(exit_codes::VALIDATION_FAILED);
        }
    };

    match plan_document(&doc) {
        Ok(plan) => Ok((doc, plan)),
        Err(e) => {
            print_error(output.format, output.quiet, &format!("resolution failed: {e}"));
            Err(exit_codes::VALIDATION_FAILED)
        }
    }
}
