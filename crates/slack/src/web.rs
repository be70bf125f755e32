//! Slack Web API calls used by the bot: startup self-test, directory and
//! channel listings, Socket Mode URLs, and message posting.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::Value;
use thiserror::Error;
use timebot_core::config::SlackConfig;
use tracing::debug;

use crate::{
    identity::{Directory, DirectoryMember},
    socket::{ReplyError, ReplySink},
};

const PAGE_LIMIT: &str = "200";
const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error)]
pub enum WebApiError {
    #[error("could not build slack http client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("slack {method} request failed: {source}")]
    Http {
        method: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("slack {method} returned error `{code}`")]
    Api { method: &'static str, code: String },
    #[error("slack {method} response could not be decoded: {source}")]
    Decode {
        method: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct AuthIdentity {
    pub user_id: String,
    pub user: String,
    #[serde(default)]
    pub team: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ChannelSummary {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub is_member: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct PostedMessage {
    pub channel: String,
    pub ts: String,
}

#[derive(Debug, Default, Deserialize)]
struct ResponseMetadata {
    #[serde(default)]
    next_cursor: String,
}

#[derive(Debug, Deserialize)]
struct MembersPage {
    #[serde(default)]
    members: Vec<DirectoryMember>,
    #[serde(default)]
    response_metadata: ResponseMetadata,
}

#[derive(Debug, Deserialize)]
struct ChannelsPage {
    #[serde(default)]
    channels: Vec<ChannelSummary>,
    #[serde(default)]
    response_metadata: ResponseMetadata,
}

#[derive(Debug, Deserialize)]
struct SocketUrl {
    url: String,
}

#[derive(Clone, Copy)]
enum TokenKind {
    Bot,
    App,
}

pub struct SlackWebClient {
    http: reqwest::Client,
    base_url: String,
    bot_token: SecretString,
    app_token: SecretString,
}

impl SlackWebClient {
    pub fn new(config: &SlackConfig) -> Result<Self, WebApiError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(concat!("timebot/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(WebApiError::Client)?;

        Ok(Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_owned(),
            bot_token: config.bot_token.clone(),
            app_token: config.app_token.clone(),
        })
    }

    pub async fn api_test(&self) -> Result<(), WebApiError> {
        self.call::<Value>("api.test", TokenKind::Bot, &[]).await.map(|_| ())
    }

    pub async fn auth_test(&self) -> Result<AuthIdentity, WebApiError> {
        self.call("auth.test", TokenKind::Bot, &[]).await
    }

    pub async fn users_list(&self) -> Result<Vec<DirectoryMember>, WebApiError> {
        let mut members = Vec::new();
        let mut cursor = String::new();
        loop {
            let page: MembersPage = self
                .call(
                    "users.list",
                    TokenKind::Bot,
                    &[("limit", PAGE_LIMIT), ("cursor", cursor.as_str())],
                )
                .await?;
            members.extend(page.members);
            if page.response_metadata.next_cursor.is_empty() {
                return Ok(members);
            }
            cursor = page.response_metadata.next_cursor;
        }
    }

    pub async fn conversations_list(&self) -> Result<Vec<ChannelSummary>, WebApiError> {
        let mut channels = Vec::new();
        let mut cursor = String::new();
        loop {
            let page: ChannelsPage = self
                .call(
                    "conversations.list",
                    TokenKind::Bot,
                    &[
                        ("limit", PAGE_LIMIT),
                        ("exclude_archived", "true"),
                        ("types", "public_channel,private_channel"),
                        ("cursor", cursor.as_str()),
                    ],
                )
                .await?;
            channels.extend(page.channels);
            if page.response_metadata.next_cursor.is_empty() {
                return Ok(channels);
            }
            cursor = page.response_metadata.next_cursor;
        }
    }

    pub async fn chat_post_message(
        &self,
        channel: &str,
        text: &str,
    ) -> Result<PostedMessage, WebApiError> {
        self.call("chat.postMessage", TokenKind::Bot, &[("channel", channel), ("text", text)])
            .await
    }

    /// Requests a fresh Socket Mode websocket URL using the app-level token.
    pub async fn open_socket_url(&self) -> Result<String, WebApiError> {
        let response: SocketUrl = self.call("apps.connections.open", TokenKind::App, &[]).await?;
        Ok(response.url)
    }

    async fn call<T>(
        &self,
        method: &'static str,
        token: TokenKind,
        params: &[(&str, &str)],
    ) -> Result<T, WebApiError>
    where
        T: DeserializeOwned,
    {
        let token = match token {
            TokenKind::Bot => &self.bot_token,
            TokenKind::App => &self.app_token,
        };
        let form: Vec<(&str, &str)> =
            params.iter().copied().filter(|(_, value)| !value.is_empty()).collect();

        let response = self
            .http
            .post(format!("{}/{method}", self.base_url))
            .bearer_auth(token.expose_secret())
            .form(&form)
            .send()
            .await
            .map_err(|source| WebApiError::Http { method, source })?;
        let body: Value =
            response.json().await.map_err(|source| WebApiError::Http { method, source })?;

        if body.get("ok").and_then(Value::as_bool) != Some(true) {
            let code = body.get("error").and_then(Value::as_str).unwrap_or("unknown").to_owned();
            return Err(WebApiError::Api { method, code });
        }
        debug!(method, "slack web api call succeeded");

        serde_json::from_value(body).map_err(|source| WebApiError::Decode { method, source })
    }
}

#[async_trait]
impl ReplySink for SlackWebClient {
    async fn post_message(&self, channel_id: &str, text: &str) -> Result<(), ReplyError> {
        self.chat_post_message(channel_id, text)
            .await
            .map(|_| ())
            .map_err(|error| ReplyError::new(channel_id, error.to_string()))
    }
}

#[async_trait]
impl Directory for SlackWebClient {
    async fn members(&self) -> Result<Vec<DirectoryMember>, WebApiError> {
        self.users_list().await
    }
}
