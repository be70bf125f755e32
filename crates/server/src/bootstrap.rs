use std::{sync::Arc, time::Duration};

use thiserror::Error;
use timebot_core::{
    config::AppConfig,
    timezone,
};
use timebot_slack::{
    events::MentionHandler,
    identity::{resolve_identity, AgentIdentity, IdentityError},
    socket::DispatchLoop,
    socket_mode::{ReconnectPolicy, SocketModeTransport},
    web::{SlackWebClient, WebApiError},
};
use tracing::{debug, info, warn};

pub struct Application {
    pub config: AppConfig,
    pub identity: AgentIdentity,
    pub dispatch: DispatchLoop,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("slack client setup failed")]
    Client(#[source] WebApiError),
    #[error("slack api self-test failed")]
    SelfTest(#[source] WebApiError),
    #[error("slack bot token was rejected")]
    Auth(#[source] WebApiError),
    #[error("could not determine bot identity")]
    Identity(#[from] IdentityError),
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "system.bootstrap.start", "starting application bootstrap");

    let web = Arc::new(SlackWebClient::new(&config.slack).map_err(BootstrapError::Client)?);

    web.api_test().await.map_err(BootstrapError::SelfTest)?;
    let auth = web.auth_test().await.map_err(BootstrapError::Auth)?;
    info!(
        event_name = "system.bootstrap.authenticated",
        team = auth.team.as_deref().unwrap_or("unknown"),
        auth_user = %auth.user,
        "slack api reachable and bot token accepted"
    );

    log_channels(&web).await;

    let identity = resolve_identity(web.as_ref(), &config.bot.name).await?;
    if identity.user_id != auth.user_id {
        warn!(
            event_name = "system.bootstrap.identity_mismatch",
            directory_user_id = %identity.user_id,
            token_user_id = %auth.user_id,
            "directory entry differs from the token's user; mentions use the directory id"
        );
    }

    let zones = timezone::preload();
    info!(event_name = "system.bootstrap.timezones_loaded", zones, "timezone tables ready");

    let transport = Arc::new(SocketModeTransport::new(web.clone(), ReconnectPolicy::default()));
    let dispatch = DispatchLoop::new(
        transport,
        web,
        MentionHandler::new(&identity),
        Duration::from_millis(config.bot.poll_interval_ms),
    );

    Ok(Application { config, identity, dispatch })
}

async fn log_channels(web: &SlackWebClient) {
    match web.conversations_list().await {
        Ok(channels) => {
            info!(
                event_name = "system.bootstrap.channels_listed",
                channel_count = channels.len(),
                member_of = channels.iter().filter(|channel| channel.is_member).count(),
                "listed workspace channels"
            );
            for channel in &channels {
                debug!(channel_id = %channel.id, channel_name = %channel.name, "channel");
            }
        }
        Err(error) => {
            warn!(
                event_name = "system.bootstrap.channels_listed",
                error = %error,
                "could not list channels; continuing"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use timebot_core::config::AppConfig;
    use wiremock::{
        matchers::{method, path},
        Mock, MockServer, ResponseTemplate,
    };

    use crate::bootstrap::{bootstrap_with_config, BootstrapError};

    fn config_for(server: &MockServer) -> AppConfig {
        let mut config = AppConfig::default();
        config.slack.app_token = "xapp-test".to_owned().into();
        config.slack.bot_token = "xoxb-test".to_owned().into();
        config.slack.api_base_url = server.uri();
        config
    }

    async fn mount_ok(server: &MockServer, endpoint: &str, body: serde_json::Value) {
        Mock::given(method("POST"))
            .and(path(format!("/{endpoint}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    async fn mount_startup(server: &MockServer, members: serde_json::Value) {
        mount_ok(server, "api.test", json!({ "ok": true })).await;
        mount_ok(
            server,
            "auth.test",
            json!({ "ok": true, "user_id": "UBOT", "user": "timebot", "team": "Acme" }),
        )
        .await;
        mount_ok(server, "users.list", json!({ "ok": true, "members": members })).await;
    }

    #[tokio::test]
    async fn resolves_identity_and_builds_dispatch_loop() {
        let server = MockServer::start().await;
        mount_startup(
            &server,
            json!([
                { "id": "UALICE", "name": "alice" },
                { "id": "UBOT", "name": "timebot" }
            ]),
        )
        .await;
        mount_ok(
            &server,
            "conversations.list",
            json!({ "ok": true, "channels": [{ "id": "C1", "name": "general", "is_member": true }] }),
        )
        .await;

        let app = bootstrap_with_config(config_for(&server)).await.expect("bootstrap");

        assert_eq!(app.identity.user_id, "UBOT");
        assert_eq!(app.identity.mention_token(), "<@UBOT>");
        assert_eq!(app.config.bot.poll_interval_ms, 1_000);
    }

    #[tokio::test]
    async fn channel_listing_failure_is_not_fatal() {
        let server = MockServer::start().await;
        mount_startup(&server, json!([{ "id": "UBOT", "name": "timebot" }])).await;
        mount_ok(&server, "conversations.list", json!({ "ok": false, "error": "missing_scope" }))
            .await;

        let app = bootstrap_with_config(config_for(&server)).await.expect("bootstrap");
        assert_eq!(app.identity.name, "timebot");
    }

    #[tokio::test]
    async fn failed_self_test_is_fatal() {
        let server = MockServer::start().await;
        mount_ok(&server, "api.test", json!({ "ok": false, "error": "invalid_auth" })).await;

        let error = bootstrap_with_config(config_for(&server)).await.err().expect("fatal");
        assert!(matches!(error, BootstrapError::SelfTest(_)));
    }

    #[tokio::test]
    async fn fatal_error_chain_names_the_cause_once() {
        let server = MockServer::start().await;
        mount_ok(&server, "api.test", json!({ "ok": false, "error": "invalid_auth" })).await;

        let error = bootstrap_with_config(config_for(&server)).await.err().expect("fatal");
        assert_eq!(error.to_string(), "slack api self-test failed");

        let rendered = format!("{:#}", anyhow::Error::from(error));
        assert!(rendered.starts_with("slack api self-test failed: "));
        assert_eq!(rendered.matches("invalid_auth").count(), 1);
    }

    #[tokio::test]
    async fn missing_directory_entry_is_fatal() {
        let server = MockServer::start().await;
        mount_startup(&server, json!([{ "id": "UALICE", "name": "alice" }])).await;
        mount_ok(&server, "conversations.list", json!({ "ok": true, "channels": [] })).await;

        let mut config = config_for(&server);
        config.bot.name = "clockwork".to_owned();

        let error = bootstrap_with_config(config).await.err().expect("fatal");
        assert!(matches!(error, BootstrapError::Identity(_)));
        let cause = std::error::Error::source(&error).map(ToString::to_string).unwrap_or_default();
        assert!(cause.contains("clockwork"));
    }
}
