use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::ExposeSecret;
use timebot_core::config::{AppConfig, LoadOptions};
use toml::Value;

use super::{CommandResult, EXIT_CONFIG};

struct FileSource {
    path: Option<PathBuf>,
    doc: Option<Value>,
}

impl FileSource {
    fn detect() -> Self {
        let path = detect_config_path();
        let doc = load_config_file_doc(path.as_deref());
        Self { path, doc }
    }

    fn line(&self, key: &str, value: &str, env_keys: &[&str]) -> String {
        format!("- {key} = {value} (source: {})", self.source_of(key, env_keys))
    }

    fn source_of(&self, key_path: &str, env_keys: &[&str]) -> String {
        if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
            return format!("env ({env_key})");
        }

        if let Some(doc) = &self.doc {
            if contains_path(doc, key_path) {
                let file_path = self
                    .path
                    .as_deref()
                    .map(|path| path.display().to_string())
                    .unwrap_or_else(|| "config file".to_string());
                return format!("file ({file_path})");
            }
        }

        "default".to_string()
    }
}

pub fn run() -> CommandResult {
    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => CommandResult { exit_code: 0, output: render(&config) },
        Err(error) => CommandResult::failure(
            "config",
            "config_validation",
            format!("config validation failed: {error}"),
            EXIT_CONFIG,
        ),
    }
}

fn render(config: &AppConfig) -> String {

    let file = FileSource::detect();
    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];

    lines.push(file.line(
        "slack.app_token",
        &redact_token(config.slack.app_token.expose_secret()),
        &["TIMEBOT_SLACK_APP_TOKEN"],
    ));
    lines.push(file.line(
        "slack.bot_token",
        &redact_token(config.slack.bot_token.expose_secret()),
        &["TIMEBOT_SLACK_BOT_TOKEN"],
    ));
    let token_file = config
        .slack
        .bot_token_file
        .as_deref()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "<unset>".to_string());
    lines.push(file.line("slack.bot_token_file", &token_file, &["TIMEBOT_SLACK_BOT_TOKEN_FILE"]));
    lines.push(file.line(
        "slack.api_base_url",
        &config.slack.api_base_url,
        &["TIMEBOT_SLACK_API_BASE_URL"],
    ));

    lines.push(file.line("bot.name", &config.bot.name, &["TIMEBOT_BOT_NAME"]));
    lines.push(file.line(
        "bot.poll_interval_ms",
        &config.bot.poll_interval_ms.to_string(),
        &["TIMEBOT_BOT_POLL_INTERVAL_MS"],
    ));

    lines.push(file.line(
        "logging.level",
        &config.logging.level,
        &["TIMEBOT_LOGGING_LEVEL", "TIMEBOT_LOG_LEVEL"],
    ));
    lines.push(file.line(
        "logging.format",
        &format!("{:?}", config.logging.format),
        &["TIMEBOT_LOGGING_FORMAT", "TIMEBOT_LOG_FORMAT"],
    ));

    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("timebot.toml"), PathBuf::from("config/timebot.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}
