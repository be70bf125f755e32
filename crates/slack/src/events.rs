use chrono::{DateTime, Utc};
use serde_json::Value;
use timebot_core::replies::{answer, Reply};

use crate::identity::{AgentIdentity, MentionMatcher};

pub type NowFn = fn() -> DateTime<Utc>;

/// One raw event from the realtime stream.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InboundEvent {
    pub kind: String,
    pub channel_id: Option<String>,
    pub user_id: Option<String>,
    pub subtype: Option<String>,
    pub text: Option<String>,
}

impl InboundEvent {
    /// Reads the fields the dispatcher needs; anything not a string is treated
    /// as absent.
    pub fn from_json(value: &Value) -> Self {
        let field = |key: &str| value.get(key).and_then(Value::as_str).map(str::to_owned);
        Self {
            kind: field("type").unwrap_or_default(),
            channel_id: field("channel"),
            user_id: field("user"),
            subtype: field("subtype"),
            text: field("text"),
        }
    }

    /// `Some` only for `message` events that carry non-empty text and a
    /// channel to answer in.
    pub fn text_message(&self) -> Option<TextMessage<'_>> {
        if self.kind != "message" {
            return None;
        }
        let text = self.text.as_deref().filter(|text| !text.is_empty())?;
        let channel_id = self.channel_id.as_deref()?;
        Some(TextMessage { channel_id, text })
    }
}

#[cfg(test)]
impl InboundEvent {
    pub(crate) fn message(channel_id: &str, user_id: &str, text: &str) -> Self {
        Self {
            kind: "message".to_owned(),
            channel_id: Some(channel_id.to_owned()),
            user_id: Some(user_id.to_owned()),
            subtype: None,
            text: Some(text.to_owned()),
        }
    }

    pub(crate) fn other(kind: &str, channel_id: &str) -> Self {
        Self { kind: kind.to_owned(), channel_id: Some(channel_id.to_owned()), ..Self::default() }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TextMessage<'a> {
    pub channel_id: &'a str,
    pub text: &'a str,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutboundReply {
    pub channel_id: String,
    pub reply: Reply,
}

impl OutboundReply {
    pub fn text(&self) -> String {
        self.reply.text()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IgnoreReason {
    NotTextMessage,
    NotMentioned,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    Responded(OutboundReply),
    Ignored(IgnoreReason),
}

/// Answers time queries in messages that mention the agent.
pub struct MentionHandler {
    mention: MentionMatcher,
    now: NowFn,
}

impl MentionHandler {
    pub fn new(identity: &AgentIdentity) -> Self {
        Self { mention: identity.mention_matcher(), now: Utc::now }
    }

    pub fn with_clock(mut self, now: NowFn) -> Self {
        self.now = now;
        self
    }

    pub fn mention_token(&self) -> &str {
        self.mention.token()
    }

    pub fn handle(&self, event: &InboundEvent) -> HandlerResult {
        let Some(message) = event.text_message() else {
            return HandlerResult::Ignored(IgnoreReason::NotTextMessage);
        };
        if !self.mention.matches(message.text) {
            return HandlerResult::Ignored(IgnoreReason::NotMentioned);
        }

        let reply = answer(message.text, (self.now)());
        HandlerResult::Responded(OutboundReply { channel_id: message.channel_id.to_owned(), reply })
    }
}
