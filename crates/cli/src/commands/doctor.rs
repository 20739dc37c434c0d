use std::sync::Arc;

use concierge_agent::reply::HELP_MESSAGE;
use concierge_agent::service::TurnRequest;
use concierge_agent::{build_executor, ConversationService, TurnExecutor};
use concierge_core::config::{AppConfig, LoadOptions};
use concierge_store::InMemorySessionStore;
use serde::Serialize;

use crate::commands::{escape_json, CommandResult};

const DOCTOR_FAILURE_EXIT_CODE: u8 = 3;
const PROBE_MESSAGE: &str = "Hello";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> CommandResult {
    let report = build_report(AppConfig::load(LoadOptions::default()).map_err(|e| e.to_string()));
    let exit_code =
        if report.overall_status == CheckStatus::Pass { 0 } else { DOCTOR_FAILURE_EXIT_CODE };

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\
                 \"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn build_report(config: Result<AppConfig, String>) -> DoctorReport {
    let mut checks = Vec::new();

    match config {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            match build_executor(&config) {
                Ok(executor) => {
                    checks.push(DoctorCheck {
                        name: "executor_construction",
                        status: CheckStatus::Pass,
                        details: format!(
                            "`{}` extractor with {:?} pipeline",
                            executor.extractor_name(),
                            executor.variant()
                        ),
                    });
                    checks.push(check_turn_roundtrip(&config, executor));
                }
                Err(error) => {
                    checks.push(DoctorCheck {
                        name: "executor_construction",
                        status: CheckStatus::Fail,
                        details: error.to_string(),
                    });
                    checks.push(skipped("turn_roundtrip", "executor could not be built"));
                }
            }
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error,
            });
            checks.push(skipped("executor_construction", "configuration did not load"));
            checks.push(skipped("turn_roundtrip", "configuration did not load"));
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

/// Sends a greeting through a throwaway session. A greeting never reaches the
/// booking collaborators, so the probe stays offline with the keyword extractor.
fn check_turn_roundtrip(config: &AppConfig, executor: TurnExecutor) -> DoctorCheck {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return DoctorCheck {
                name: "turn_roundtrip",
                status: CheckStatus::Fail,
                details: format!("failed to initialize async runtime: {error}"),
            };
        }
    };

    let store = Arc::new(InMemorySessionStore::new(config.sessions.clone()));
    let service = ConversationService::new(store, Some(Arc::new(executor)));
    let result = runtime.block_on(async {
        let response = service
            .handle_turn(TurnRequest {
                message: PROBE_MESSAGE.to_string(),
                user_id: "doctor".to_string(),
                ..TurnRequest::default()
            })
            .await;
        let session = service
            .get_session(&response.session_id)
            .await
            .map_err(|error| format!("probe session was not retained: {error}"))?;
        Ok::<_, String>((response.reply, session.transcript.len()))
    });

    match result {
        Ok((reply, 2)) if reply == HELP_MESSAGE => DoctorCheck {
            name: "turn_roundtrip",
            status: CheckStatus::Pass,
            details: "greeting answered with the help message and recorded".to_string(),
        },
        Ok((reply, recorded)) => DoctorCheck {
            name: "turn_roundtrip",
            status: CheckStatus::Fail,
            details: format!("unexpected probe outcome ({recorded} messages): {reply}"),
        },
        Err(details) => DoctorCheck { name: "turn_roundtrip", status: CheckStatus::Fail, details },
    }
}

fn skipped(name: &'static str, reason: &str) -> DoctorCheck {
    DoctorCheck {
        name,
        status: CheckStatus::Skipped,
        details: format!("skipped because {reason}"),
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use concierge_core::config::{AppConfig, LlmProvider};

    use super::{build_report, render_human, CheckStatus};

    #[test]
    fn default_config_passes_every_check() {
        let report = build_report(Ok(AppConfig::default()));

        assert_eq!(report.overall_status, CheckStatus::Pass);
        let names: Vec<_> = report.checks.iter().map(|check| check.name).collect();
        assert_eq!(names, vec!["config_validation", "executor_construction", "turn_roundtrip"]);
    }

    #[test]
    fn executor_failure_skips_the_roundtrip() {
        let mut config = AppConfig::default();
        config.llm.provider = LlmProvider::Anthropic;

        let report = build_report(Ok(config));
        assert_eq!(report.overall_status, CheckStatus::Fail);
        assert_eq!(report.checks[1].status, CheckStatus::Fail);
        assert_eq!(report.checks[2].status, CheckStatus::Skipped);
    }

    #[test]
    fn config_failure_is_rendered_with_markers() {
        let report = build_report(Err("llm.api_key is required".to_string()));
        let text = render_human(&report);

        assert!(text.starts_with("doctor: one or more readiness checks failed"));
        assert!(text.contains("- [fail] config_validation: llm.api_key is required"));
        assert!(text.contains("- [skip] turn_roundtrip"));
    }
}
