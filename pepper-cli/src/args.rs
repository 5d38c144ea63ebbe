use std::path::PathBuf;

use clap::Args;
use pepper_core::DEFAULT_PARSE_WORKERS;

use crate::output::OutputFormat;

#[derive(Debug, Args, Clone)]
pub struct OutputArgs {
    #[arg(long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    pub format: OutputFormat,
    #[arg(long, short, global = true)]
    pub quiet: bool,
}

#[derive(Debug, Args, Clone)]
pub struct RunArgs {
    /// Seed a global variable; applied after `--vars`.
    #[arg(long = "var", value_name = "KEY=VALUE")]
    pub vars: Vec<String>,
    /// JSON or YAML object seeding the globals.
    #[arg(long = "vars", value_name = "FILE")]
    pub vars_file: Option<PathBuf>,
    /// Per-request timeout in milliseconds.
    #[arg(long, default_value_t = 30_000)]
    pub timeout: u64,
    /// Per-hook timeout in milliseconds.
    #[arg(long, default_value_t = 10_000)]
    pub hook_timeout: u64,
    #[arg(long, default_value_t = 4_194_304)]
    pub max_response_bytes: usize,
    #[arg(long, default_value_t = DEFAULT_PARSE_WORKERS)]
    pub parse_workers: usize,
}
