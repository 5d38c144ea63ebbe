use std::path::PathBuf;

use clap::Subcommand;
use pepper_core::DEFAULT_PARSE_WORKERS;

use crate::args::*;

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Parse, resolve and run a document.
    Run {
        path: PathBuf,
        #[command(flatten)]
        run: RunArgs,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Parse, resolve and compile every hook without sending requests.
    Check {
        path: PathBuf,
        #[arg(long, default_value_t = DEFAULT_PARSE_WORKERS)]
        parse_workers: usize,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Print the resolved execution order.
    Plan {
        path: PathBuf,
        #[arg(long, default_value_t = DEFAULT_PARSE_WORKERS)]
        parse_workers: usize,
        #[command(flatten)]
        output: OutputArgs,
    },
}
