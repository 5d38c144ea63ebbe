use async_trait::async_trait;
use pepper_exec::{Event, EventSink, LeafRecord};

/// Human-readable run output: one line per completed leaf and a closing summary.
///
/// The implicit global leaf is only reported when it fails.
pub struct TextReporter;

impl TextReporter {
    fn leaf_line(record: &LeafRecord) -> String {
        let mut line = format!(
            "{} {}",
            record.status.as_str().to_uppercase(),
            record.name
        );
        if let Some(status) = record.http_status {
            line.push_str(&format!(" [{status}]"));
        }
        line.push_str(&format!(" ({} ms)", record.duration_ms));
        if let Some(err) = &record.error {
            line.push_str(&format!(
                ": {} at {}: {}",
                err.kind,
                record.stage.as_str(),
                err.message
            ));
        }
        line
    }
}

#[async_trait]
impl EventSink for TextReporter {
    async fn emit(&self, event: Event) {
        match event {
            Event::LeafFinished { record, .. } => {
                if record.implicit && record.passed() {
                    return;
                }
                println!("{}", Self::leaf_line(&record));
            }
            Event::RunAborted { leaf, .. } => {
                println!("aborted: mandatory leaf `{leaf}` failed");
            }
            Event::RunCancelled { .. } => println!("cancelled"),
            Event::RunFinished {
                passed,
                failed,
                not_run,
                ..
            } => {
                let mut summary = format!("{passed} passed, {failed} failed");
                if not_run > 0 {
                    summary.push_str(&format!(", {not_run} not run"));
                }
                println!("{summary}");
            }
            Event::RunStarted { .. } | Event::LeafStarted { .. } => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pepper_exec::executor::FailureInfo;
    use pepper_exec::{LeafStage, LeafStatus};

    fn record(status: LeafStatus) -> LeafRecord {
        LeafRecord {
            name: "login".into(),
            status,
            stage: LeafStage::Completed,
            error: None,
            http_status: Some(200),
            duration_ms: 12,
            mandatory: false,
            implicit: false,
        }
    }

    #[test]
    fn passing_leaf_line() {
        assert_eq!(
            TextReporter::leaf_line(&record(LeafStatus::Pass)),
            "PASS login [200] (12 ms)"
        );
    }

    #[test]
    fn failing_leaf_line_names_kind_and_stage() {
        let mut r = record(LeafStatus::Fail);
        r.stage = LeafStage::PostHook;
        r.error = Some(FailureInfo {
            kind: "assertion",
            message: "expected 200".into(),
        });
        assert_eq!(
            TextReporter::leaf_line(&r),
            "FAIL login [200] (12 ms): assertion at post_hook: expected 200"
        );
    }
}
