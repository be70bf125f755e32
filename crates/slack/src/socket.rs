use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, trace, warn};

use crate::events::{HandlerResult, InboundEvent, MentionHandler};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport failed to connect: {0}")]
    Connect(String),
    #[error("transport read failed: {0}")]
    Receive(String),
}

#[derive(Debug, Error)]
pub enum SocketError {
    #[error(transparent)]
    Transport(#[from] TransportError),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("reply to channel {channel_id} was not delivered: {reason}")]
pub struct ReplyError {
    pub channel_id: String,
    pub reason: String,
}

impl ReplyError {
    pub fn new(channel_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self { channel_id: channel_id.into(), reason: reason.into() }
    }
}

/// Realtime event source. `poll` must not block: it returns whatever arrived
/// since the previous call, oldest first.
#[async_trait]
pub trait EventTransport: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;
    async fn poll(&self) -> Result<Vec<InboundEvent>, TransportError>;
}

#[async_trait]
pub trait ReplySink: Send + Sync {
    async fn post_message(&self, channel_id: &str, text: &str) -> Result<(), ReplyError>;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub received: usize,
    pub ignored: usize,
    pub replied: usize,
    pub failed_posts: usize,
}

pub struct DispatchLoop {
    transport: Arc<dyn EventTransport>,
    sink: Arc<dyn ReplySink>,
    handler: MentionHandler,
    poll_interval: Duration,
}

impl DispatchLoop {
    pub fn new(
        transport: Arc<dyn EventTransport>,
        sink: Arc<dyn ReplySink>,
        handler: MentionHandler,
        poll_interval: Duration,
    ) -> Self {
        Self { transport, sink, handler, poll_interval }
    }

    /// Connects once, then polls forever. Only returns on a transport failure.
    pub async fn start(&self) -> Result<(), SocketError> {
        info!(event_name = "system.socket.connecting", "opening realtime session");
        self.transport.connect().await?;
        info!(
            event_name = "system.socket.connected",
            mention_token = %self.handler.mention_token(),
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            "realtime session established"
        );

        loop {
            self.run_cycle().await?;
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Drains one batch and answers it in arrival order.
    pub async fn run_cycle(&self) -> Result<CycleReport, SocketError> {
        let events = self.transport.poll().await?;
        let mut report = CycleReport { received: events.len(), ..CycleReport::default() };

        for event in &events {
            let reply = match self.handler.handle(event) {
                HandlerResult::Ignored(reason) => {
                    trace!(
                        event_name = "ingress.slack.event_dropped",
                        event_type = %event.kind,
                        reason = ?reason,
                        "dropping event"
                    );
                    report.ignored += 1;
                    continue;
                }
                HandlerResult::Responded(reply) => reply,
            };

            debug!(
                event_name = "ingress.slack.mention_received",
                channel_id = %reply.channel_id,
                user_id = event.user_id.as_deref().unwrap_or("unknown"),
                "handling message addressed to bot"
            );
            info!(
                event_name = "dispatch.reply_prepared",
                channel_id = %reply.channel_id,
                outcome = reply.reply.outcome(),
                "prepared reply"
            );

            match self.sink.post_message(&reply.channel_id, &reply.text()).await {
                Ok(()) => report.replied += 1,
                Err(error) => {
                    warn!(
                        event_name = "dispatch.reply_post_failed",
                        channel_id = %reply.channel_id,
                        error = %error,
                        "reply post failed; continuing with next event"
                    );
                    report.failed_posts += 1;
                }
            }
        }

        Ok(report)
    }
}
