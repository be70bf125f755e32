mod bootstrap;

use std::process::ExitCode;

use anyhow::Result;
use timebot_core::config::{AppConfig, LoadOptions};
use timebot_slack::socket::SocketError;
use tracing::{error, info};

fn init_logging(config: &AppConfig) {
    use timebot_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            error!(
                event_name = "system.server.fatal",
                error = %format!("{error:#}"),
                "{}",
                fatal_message(&error)
            );
            eprintln!("timebot: {error:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    // Logging needs the config, so config errors are reported on stderr only.
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;
    info!(
        event_name = "system.server.started",
        bot_name = %app.identity.name,
        bot_user_id = %app.identity.user_id,
        poll_interval_ms = app.config.bot.poll_interval_ms,
        "timebot connected and running"
    );

    tokio::select! {
        result = app.dispatch.start() => result?,
        signal = wait_for_shutdown() => {
            signal?;
            info!(event_name = "system.server.stopping", "timebot stopping");
        }
    }

    Ok(())
}

async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}

fn fatal_message(error: &anyhow::Error) -> &'static str {
    if error.downcast_ref::<SocketError>().is_some() {
        "connection failed"
    } else {
        "startup failed"
    }
}
