use clap::Parser;
use tracing_subscriber::EnvFilter;

mod args;
mod cmd;
mod commands;
mod exit_codes;
mod output;

pub use args::*;
use commands::Command;

#[derive(Debug, Parser)]
#[command(name = "pepper", version, about = "Declarative HTTP workflow runner")]
struct Cli {
    /// Log at debug level (overrides RUST_LOG).
    #[arg(long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("error: failed to create tokio runtime: {e}");
            std::process::exit(exit_codes::RUNTIME_ERROR);
        }
    };

    let exit_code = rt.block_on(run_command(cli.command));
    std::process::exit(exit_code);
}

// stdout carries reports; logs go to stderr.
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

async fn run_command(command: Command) -> i32 {
    match command {
        Command::Run { path, run, output } => cmd::run::run_cmd(&path, run, output).await,
        Command::Check {
            path,
            parse_workers,
            output,
        } => cmd::check::check_cmd(&path, parse_workers, output).await,
        Command::Plan {
            path,
            parse_workers,
            output,
        } => cmd::plan::plan_cmd(&path, parse_workers, output).await,
    }
}
