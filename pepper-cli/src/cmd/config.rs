use std::path::Path;
use std::time::Duration;

use pepper_core::Variables;
use pepper_exec::RunnerConfig;

use crate::output::print_error;
use crate::{OutputArgs, RunArgs};

/// Reads a JSON or YAML object of initial globals.
pub fn load_vars(path: &Path, output: &OutputArgs) -> Option<Variables> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            print_error(output.format, output.quiet, &format!("failed to read vars: {e}"));
            return None;
        }
    };
    let value: serde_json::Value = match serde_json::from_str(&content) {
        Ok(v) => v,
        Err(_) => match serde_yaml::from_str(&content) {
            Ok(v) => v,
            Err(_) => {
                print_error(output.format, output.quiet, "vars file is neither valid JSON nor YAML");
                return None;
            }
        },
    };
    match value {
        serde_json::Value::Object(map) => Some(map.into_iter().collect()),
        serde_json::Value::Null => Some(Variables::new()),
        _ => {
            print_error(output.format, output.quiet, "vars file must contain an object");
            None
        }
    }
}

/// Applies `KEY=VALUE` flags as string globals.
pub fn merge_var_flags(vars: &mut Variables, flags: &[String]) -> Result<(), String> {
    for s in flags {
        let Some((k, v)) = s.split_once('=') else {
            return Err(format!("invalid --var `{s}` (expected KEY=VALUE)"));
        };
        let k = k.trim();
        if k.is_empty() {
            return Err(format!("invalid --var `{s}` (empty key)"));
        }
        vars.insert(k.to_string(), serde_json::Value::String(v.to_string()));
    }
    Ok(())
}

/// Builds the initial globals from `--vars` and `--var`, reporting any failure.
pub fn initial_globals(run: &RunArgs, output: &OutputArgs) -> Option<Variables> {
    let mut vars = match &run.vars_file {
        Some(path) => load_vars(path, output)?,
        None => Variables::new(),
    };
    if let Err(e) = merge_var_flags(&mut vars, &run.vars) {
        print_error(output.format, output.quiet, &e);
        return None;
    }
    Some(vars)
}

pub fn build_runner_config(run: &RunArgs) -> RunnerConfig {
    RunnerConfig {
        request_timeout: Duration::from_millis(run.timeout),
        hook_timeout: Duration::from_millis(run.hook_timeout),
        max_response_bytes: run.max_response_bytes,
    }
}
