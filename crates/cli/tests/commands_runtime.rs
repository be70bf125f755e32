use std::env;
use std::sync::{Mutex, OnceLock};

use chrono::{TimeZone, Utc};
use serde_json::{json, Value};
use timebot_cli::commands::{channels, config, doctor, resolve};
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

const VALID_TOKENS: [(&str, &str); 2] =
    [("TIMEBOT_SLACK_APP_TOKEN", "xapp-test-1"), ("TIMEBOT_SLACK_BOT_TOKEN", "xoxb-test-2")];

#[test]
fn resolve_prints_the_reply_for_an_alias() {
    let now = Utc.with_ymd_and_hms(2026, 7, 4, 18, 0, 0).single().expect("valid instant");

    let result = resolve::run_at("India", now);
    assert_eq!(result.exit_code, 0);

    let payload = parse_payload(&result.output);
    assert_eq!(payload["command"], "resolve");
    assert_eq!(payload["status"], "ok");
    let message = payload["message"].as_str().unwrap_or_default();
    assert!(message.starts_with("It is now 2026-07-04T23:30:00 in india"));
    assert!(message.contains("Asia/Kolkata"));
}

#[test]
fn resolve_accepts_catalog_names() {
    let now = Utc.with_ymd_and_hms(2026, 1, 10, 9, 0, 0).single().expect("valid instant");

    let result = resolve::run_at("America/Los_Angeles", now);
    assert_eq!(result.exit_code, 0);
    let payload = parse_payload(&result.output);
    assert!(payload["message"]
        .as_str()
        .unwrap_or_default()
        .starts_with("It is now 2026-01-10T01:00:00 in america/los_angeles"));
}

#[test]
fn resolve_reports_unknown_place() {
    let result = resolve::run("atlantis");
    assert_eq!(result.exit_code, 3);

    let payload = parse_payload(&result.output);
    assert_eq!(payload["status"], "error");
    assert_eq!(payload["error_class"], "unknown_place");
    assert_eq!(
        payload["message"],
        "I do not recognize atlantis as a timezone, but I understand india, us/pacific and utc. Try one of those!"
    );
}

#[test]
fn config_redacts_tokens_and_attributes_sources() {
    with_env(
        &[
            VALID_TOKENS[0],
            VALID_TOKENS[1],
            ("TIMEBOT_LOG_LEVEL", "debug"),
        ],
        || {
            let result = config::run();
            assert_eq!(result.exit_code, 0);

            let output = result.output;
            assert!(output.contains("- slack.app_token = xapp-*** (source: env (TIMEBOT_SLACK_APP_TOKEN))"));
            assert!(output.contains("- slack.bot_token = xoxb-*** (source: env (TIMEBOT_SLACK_BOT_TOKEN))"));
            assert!(output.contains("- logging.level = debug (source: env (TIMEBOT_LOG_LEVEL))"));
            assert!(output.contains("- bot.name = timebot (source: default)"));
            assert!(output.contains("- bot.poll_interval_ms = 1000 (source: default)"));
            assert!(!output.contains("test-2"));
        },
    );
}

#[test]
fn config_reports_validation_failure_without_tokens() {
    with_env(&[], || {
        let result = config::run();
        assert_eq!(result.exit_code, 2);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "config");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
        let message = payload["message"].as_str().unwrap_or_default();
        assert!(message.starts_with("config validation failed:"));
        assert!(message.contains("slack.app_token"));
    });
}

#[test]
fn doctor_skips_slack_checks_when_config_is_invalid() {
    with_env(&[], || {
        let result = doctor::run(true);
        assert_eq!(result.exit_code, 1);

        let report = parse_payload(&result.output);
        assert_eq!(report["overall_status"], "fail");
        assert_eq!(check_status(&report, "config_validation"), "fail");
        assert_eq!(check_status(&report, "slack_token_readiness"), "missing");
        assert_eq!(check_status(&report, "slack_api"), "skipped");
        assert_eq!(check_status(&report, "bot_identity"), "skipped");
        assert_eq!(check_status(&report, "timezone_catalog"), "pass");
    });
}

#[test]
fn doctor_passes_against_a_healthy_workspace() {
    let runtime = tokio::runtime::Runtime::new().expect("runtime");
    let server = runtime.block_on(async {
        let server = MockServer::start().await;
        mount_ok(&server, "api.test", json!({ "ok": true })).await;
        mount_ok(
            &server,
            "auth.test",
            json!({ "ok": true, "user_id": "UBOT", "user": "timebot", "team": "Acme" }),
        )
        .await;
        mount_ok(
            &server,
            "users.list",
            json!({ "ok": true, "members": [{ "id": "UBOT", "name": "timebot" }] }),
        )
        .await;
        server
    });
    let base_url = server.uri();

    with_env(
        &[VALID_TOKENS[0], VALID_TOKENS[1], ("TIMEBOT_SLACK_API_BASE_URL", base_url.as_str())],
        || {
            let result = doctor::run(false);
            assert_eq!(result.exit_code, 0, "unexpected doctor output:\n{}", result.output);
            assert!(result.output.starts_with("doctor: all readiness checks passed"));
            assert!(result.output.contains("- [ok] bot_identity: `timebot` is <@UBOT>"));
            assert!(result.output.contains(
                "- [ok] config_validation: configuration loaded; app token is `xapp-`, bot token is `xoxb-`"
            ));
            assert!(!result.output.contains("slack_token_readiness"));
        },
    );
}

#[test]
fn doctor_fails_when_bot_is_missing_from_directory() {
    let runtime = tokio::runtime::Runtime::new().expect("runtime");
    let server = runtime.block_on(async {
        let server = MockServer::start().await;
        mount_ok(&server, "api.test", json!({ "ok": true })).await;
        mount_ok(&server, "auth.test", json!({ "ok": true, "user_id": "UBOT", "user": "timebot" }))
            .await;
        mount_ok(
            &server,
            "users.list",
            json!({ "ok": true, "members": [{ "id": "UALICE", "name": "alice" }] }),
        )
        .await;
        server
    });
    let base_url = server.uri();

    with_env(
        &[VALID_TOKENS[0], VALID_TOKENS[1], ("TIMEBOT_SLACK_API_BASE_URL", base_url.as_str())],
        || {
            let result = doctor::run(true);
            assert_eq!(result.exit_code, 1);

            let report = parse_payload(&result.output);
            assert_eq!(check_status(&report, "slack_api"), "pass");
            assert_eq!(check_status(&report, "bot_identity"), "fail");
        },
    );
}

#[test]
fn channels_lists_visible_channels() {
    let runtime = tokio::runtime::Runtime::new().expect("runtime");
    let server = runtime.block_on(async {
        let server = MockServer::start().await;
        mount_ok(
            &server,
            "conversations.list",
            json!({
                "ok": true,
                "channels": [
                    { "id": "C1", "name": "general", "is_member": true },
                    { "id": "C2", "name": "random", "is_member": false }
                ]
            }),
        )
        .await;
        server
    });
    let base_url = server.uri();

    with_env(
        &[VALID_TOKENS[0], VALID_TOKENS[1], ("TIMEBOT_SLACK_API_BASE_URL", base_url.as_str())],
        || {
            let result = channels::run();
            assert_eq!(result.exit_code, 0);

            let payload = parse_payload(&result.output);
            assert_eq!(payload["message"], "2 channels\nC1 #general (member)\nC2 #random");
        },
    );
}

#[test]
fn channels_requires_valid_config() {
    with_env(&[], || {
        let result = channels::run();
        assert_eq!(result.exit_code, 2);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "config_validation");
    });
}

async fn mount_ok(server: &MockServer, endpoint: &str, body: Value) {
    Mock::given(method("POST"))
        .and(path(format!("/{endpoint}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

fn check_status(report: &Value, name: &str) -> String {
    report["checks"]
        .as_array()
        .and_then(|checks| checks.iter().find(|check| check["name"] == name))
        .and_then(|check| check["status"].as_str())
        .unwrap_or("missing")
        .to_string()
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "TIMEBOT_SLACK_APP_TOKEN",
        "TIMEBOT_SLACK_BOT_TOKEN",
        "TIMEBOT_SLACK_BOT_TOKEN_FILE",
        "TIMEBOT_SLACK_API_BASE_URL",
        "TIMEBOT_BOT_NAME",
        "TIMEBOT_BOT_POLL_INTERVAL_MS",
        "TIMEBOT_LOGGING_LEVEL",
        "TIMEBOT_LOGGING_FORMAT",
        "TIMEBOT_LOG_LEVEL",
        "TIMEBOT_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
