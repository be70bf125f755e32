//! Slack integration for timebot
//!
//! - **Events** (`events`) - inbound event model and the mention handler
//! - **Identity** (`identity`) - the bot's directory entry and mention token
//! - **Dispatch** (`socket`) - transport and reply seams plus the poll loop
//! - **Web API** (`web`) - `api.test`, `auth.test`, listings, `chat.postMessage`
//! - **Socket Mode** (`socket_mode`) - websocket event transport
//!
//! # Architecture
//!
//! ```text
//! Socket Mode reader → inbox → DispatchLoop::poll → MentionHandler → chat.postMessage
//! ```
//!
//! # Getting Started
//!
//! 1. Create a Slack app at https://api.slack.com/apps
//! 2. Enable Socket Mode and subscribe to `message.channels` events
//! 3. Set env vars: `TIMEBOT_SLACK_APP_TOKEN`, `TIMEBOT_SLACK_BOT_TOKEN`

pub mod events;
pub mod identity;
pub mod socket;
pub mod socket_mode;
pub mod web;
