use std::path::Path;

use pepper_exec::{HookEngine, HookSource, ScriptEngine};
use serde::Serialize;

use crate::exit_codes;
use crate::output::{print_result, OutputFormat};
use crate::OutputArgs;

#[derive(Serialize)]
struct CheckResult {
    valid: bool,
    leaves: usize,
    hooks: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    errors: Vec<String>,
}

pub async fn check_cmd(path: &Path, parse_workers: usize, output: OutputArgs) -> i32 {
    let (doc, _) = match super::load::load_document(path, parse_workers, &output).await {
        Ok(v) => v,
        Err(code) => return code,
    };

    let engine = ScriptEngine;
    let mut hooks = 0;
    let mut errors = Vec::new();
    for leaf in doc.leaves().iter().filter(|l| l.has_hooks()) {
        hooks += 1;
        if let Err(e) = engine.compile(&HookSource::from_leaf(leaf)) {
            errors.push(e.to_string());
        }
    }

    let result = CheckResult {
        valid: errors.is_empty(),
        leaves: doc.len(),
        hooks,
        errors,
    };
    if output.format == OutputFormat::Text && !output.quiet {
        if result.valid {
            println!(
                "ok: {} leaves, {} with hooks",
                result.leaves, result.hooks
            );
        } else {
            eprintln!("error: hook compilation failed");
            for e in &result.errors {
                eprintln!("- {e}");
            }
        }
    } else {
        print_result(output.format, output.quiet, &result);
    }

    if result.valid {
        exit_codes::SUCCESS
    } else {
        exit_codes::VALIDATION_FAILED
    }
}
