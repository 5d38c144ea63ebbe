use std::path::Path;
use std::sync::Arc;

use pepper_exec::executor::{CompositeEventSink, JsonEventSink, TracingEventSink};
use pepper_exec::{EventSink, Globals, ReqwestHttpClient, Runner, ScriptEngine};
use tokio_util::sync::CancellationToken;

use super::config::{build_runner_config, initial_globals};
use super::report::TextReporter;
use crate::exit_codes;
use crate::output::{print_error, print_result, OutputFormat};
use crate::{OutputArgs, RunArgs};

pub async fn run_cmd(path: &Path, run: RunArgs, output: OutputArgs) -> i32 {
    let Some(vars) = initial_globals(&run, &output) else {
        return exit_codes::RUNTIME_ERROR;
    };

    let (doc, plan) = match super::load::load_document(path, run.parse_workers, &output).await {
        Ok(v) => v,
        Err(code) => return code,
    };

    let http = match ReqwestHttpClient::new() {
        Ok(c) => c,
        Err(e) => {
            print_error(output.format, output.quiet, &format!("failed to build HTTP client: {e}"));
            return exit_codes::RUNTIME_ERROR;
        }
    };

    let runner = Runner::new(
        build_runner_config(&run),
        Arc::new(http),
        Arc::new(ScriptEngine),
        event_sink(&output),
    );

    let cancel = CancellationToken::new();
    let on_ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received, cancelling run");
                cancel.cancel();
            }
        })
    };

    let result = runner
        .run(&doc, &plan, &Globals::new(vars), &cancel)
        .await;
    on_ctrl_c.abort();

    let report = match result {
        Ok(r) => r,
        Err(e) => {
            print_error(output.format, output.quiet, &format!("{e}"));
            return exit_codes::RUNTIME_ERROR;
        }
    };

    if output.format == OutputFormat::Json {
        print_result(output.format, output.quiet, &report);
    }

    if report.is_success() {
        exit_codes::SUCCESS
    } else {
        exit_codes::RUN_FAILED
    }
}

fn event_sink(output: &OutputArgs) -> Arc<dyn EventSink> {
    let sinks = CompositeEventSink::new().with(Box::new(TracingEventSink));
    if output.quiet {
        return Arc::new(sinks);
    }
    match output.format {
        OutputFormat::Json => Arc::new(sinks.with(Box::new(JsonEventSink))),
        OutputFormat::Text | OutputFormat::Dot => Arc::new(sinks.with(Box::new(TextReporter))),
    }
}
