use timebot_core::config::{AppConfig, LoadOptions};
use timebot_slack::web::{ChannelSummary, SlackWebClient};

use super::{current_thread_runtime, CommandResult, EXIT_CONFIG, EXIT_RUNTIME, EXIT_SLACK_API};

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "channels",
                "config_validation",
                error.to_string(),
                EXIT_CONFIG,
            );
        }
    };

    let runtime = match current_thread_runtime() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "channels",
                "runtime",
                format!("failed to initialize async runtime: {error}"),
                EXIT_RUNTIME,
            );
        }
    };

    let listed = runtime.block_on(async {
        let client = SlackWebClient::new(&config.slack)?;
        client.conversations_list().await
    });

    match listed {
        Ok(channels) => CommandResult::success("channels", render_channels(&channels)),
        Err(error) => CommandResult::failure("channels", "slack_api", error.to_string(), EXIT_SLACK_API),
    }
}

fn render_channels(channels: &[ChannelSummary]) -> String {
    let mut lines = vec![format!("{} channels", channels.len())];
    lines.extend(channels.iter().map(|channel| {
        let membership = if channel.is_member { " (member)" } else { "" };
        format!("{} #{}{membership}", channel.id, channel.name)
    }));
    lines.join("\n")
}
