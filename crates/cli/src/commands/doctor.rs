use serde::Serialize;
use timebot_core::{
    config::{AppConfig, LoadOptions},
    timezone,
};
use timebot_slack::{identity::resolve_identity, web::SlackWebClient};

use super::{current_thread_runtime, CommandResult};

const EXIT_DOCTOR_FAILED: u8 = 1;

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

impl DoctorCheck {
    fn pass(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Pass, details: details.into() }
    }

    fn fail(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Fail, details: details.into() }
    }

    fn skipped(name: &'static str, reason: &str) -> Self {
        Self { name, status: CheckStatus::Skipped, details: format!("skipped because {reason}") }
    }
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> CommandResult {
    let report = build_report();
    let exit_code = if report.overall_status == CheckStatus::Pass { 0 } else { EXIT_DOCTOR_FAILED };

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck::pass(
                "config_validation",
                "configuration loaded; app token is `xapp-`, bot token is `xoxb-`",
            ));
            checks.extend(check_slack(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck::fail("config_validation", error.to_string()));
            for name in ["slack_api", "bot_identity"] {
                checks.push(DoctorCheck::skipped(name, "configuration did not load"));
            }
        }
    }

    checks.push(DoctorCheck::pass(
        "timezone_catalog",
        format!("{} zones and aliases loaded", timezone::preload()),
    ));

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_slack(config: &AppConfig) -> Vec<DoctorCheck> {
    let runtime = match current_thread_runtime() {
        Ok(runtime) => runtime,
        Err(error) => {
            return vec![
                DoctorCheck::fail(
                    "slack_api",
                    format!("failed to initialize async runtime: {error}"),
                ),
                DoctorCheck::skipped("bot_identity", "the slack api check failed"),
            ];
        }
    };

    runtime.block_on(async {
        let client = match SlackWebClient::new(&config.slack) {
            Ok(client) => client,
            Err(error) => {
                return vec![
                    DoctorCheck::fail("slack_api", error.to_string()),
                    DoctorCheck::skipped("bot_identity", "the slack api check failed"),
                ];
            }
        };

        let api_check = match client.api_test().await {
            Ok(()) => client.auth_test().await,
            Err(error) => Err(error),
        };
        let auth = match api_check {
            Ok(auth) => auth,
            Err(error) => {
                return vec![
                    DoctorCheck::fail("slack_api", error.to_string()),
                    DoctorCheck::skipped("bot_identity", "the slack api check failed"),
                ];
            }
        };
        let api = DoctorCheck::pass(
            "slack_api",
            format!(
                "reached {} as `{}` in team `{}`",
                config.slack.api_base_url,
                auth.user,
                auth.team.as_deref().unwrap_or("unknown")
            ),
        );

        let identity = match resolve_identity(&client, &config.bot.name).await {
            Ok(identity) => DoctorCheck::pass(
                "bot_identity",
                format!("`{}` is {}", identity.name, identity.mention_token()),
            ),
            Err(error) => DoctorCheck::fail("bot_identity", error.to_string()),
        };

        vec![api, identity]
    })
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

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
