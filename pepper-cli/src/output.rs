use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
    Dot,
}

/// Prints `result` as JSON: compact for `json`, pretty otherwise.
///
/// Only `plan` renders DOT; other commands fall back to pretty JSON.
pub fn print_result<T: Serialize>(format: OutputFormat, quiet: bool, result: &T) {
    if quiet {
        return;
    }
    let rendered = match format {
        OutputFormat::Json => serde_json::to_string(result),
        OutputFormat::Text | OutputFormat::Dot => serde_json::to_string_pretty(result),
    };
    match rendered {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("error: failed to serialize output: {e}"),
    }
}

pub fn print_error(format: OutputFormat, quiet: bool, message: &str) {
    if quiet {
        return;
    }
    match format {
        OutputFormat::Json => {
            let err = serde_json::json!({"error": message});
            eprintln!("{}", serde_json::to_string(&err).unwrap_or_default());
        }
        OutputFormat::Text | OutputFormat::Dot => eprintln!("error: {message}"),
    }
}
