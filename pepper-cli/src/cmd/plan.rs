use std::path::Path;

use pepper_core::format_plan_text;

use crate::exit_codes;
use crate::output::{print_result, OutputFormat};
use crate::OutputArgs;

pub async fn plan_cmd(path: &Path, parse_workers: usize, output: OutputArgs) -> i32 {
    let (_, plan) = match super::load::load_document(path, parse_workers, &output).await {
        Ok(v) => v,
        Err(code) => return code,
    };

    if output.quiet {
        return exit_codes::SUCCESS;
    }
    match output.format {
        OutputFormat::Text => print!("{}", format_plan_text(&plan)),
        OutputFormat::Json => print_result(output.format, false, &plan),
        OutputFormat::Dot => {
            let title = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "pepper".to_string());
            println!("{}", plan.to_dot(&title));
        }
    }
    exit_codes::SUCCESS
}
