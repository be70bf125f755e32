use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::{
    net::TcpStream,
    sync::{
        mpsc::{self, error::TryRecvError, UnboundedReceiver, UnboundedSender},
        Mutex,
    },
    task::JoinHandle,
};
use tokio_tungstenite::{tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, trace, warn};

use crate::{
    events::InboundEvent,
    socket::{EventTransport, TransportError},
    web::SlackWebClient,
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type InboxItem = Result<InboundEvent, TransportError>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_retries: 5, base_delay_ms: 250, max_delay_ms: 5_000 }
    }
}

impl ReconnectPolicy {
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

/// One decoded Socket Mode frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Frame {
    Hello,
    Disconnect { reason: String },
    /// Every envelope is acknowledged; only `events_api` envelopes carry an event.
    Envelope { envelope_id: String, event: Option<InboundEvent> },
    Other { kind: String },
}

pub fn parse_frame(text: &str) -> Result<Frame, serde_json::Error> {
    let value: Value = serde_json::from_str(text)?;
    let kind = value.get("type").and_then(Value::as_str).unwrap_or_default();

    let frame = match kind {
        "hello" => Frame::Hello,
        "disconnect" => Frame::Disconnect {
            reason: value
                .get("reason")
                .and_then(Value::as_str)
                .unwrap_or("unspecified")
                .to_owned(),
        },
        _ => match value.get("envelope_id").and_then(Value::as_str) {
            Some(envelope_id) => {
                let event = (kind == "events_api")
                    .then(|| value.pointer("/payload/event"))
                    .flatten()
                    .map(InboundEvent::from_json);
                Frame::Envelope { envelope_id: envelope_id.to_owned(), event }
            }
            None => Frame::Other { kind: kind.to_owned() },
        },
    };
    Ok(frame)
}

pub fn ack_message(envelope_id: &str) -> String {
    json!({ "envelope_id": envelope_id }).to_string()
}

/// Buffered events handed over by the reader task. A failure is reported
/// after every event queued ahead of it has been returned.
pub struct Inbox {
    rx: UnboundedReceiver<InboxItem>,
    failure: Option<TransportError>,
}

impl Inbox {
    pub fn new(rx: UnboundedReceiver<InboxItem>) -> Self {
        Self { rx, failure: None }
    }

    pub fn drain(&mut self) -> Result<Vec<InboundEvent>, TransportError> {
        if let Some(failure) = self.failure.take() {
            return Err(failure);
        }

        let mut events = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(Ok(event)) => events.push(event),
                Ok(Err(failure)) => {
                    if events.is_empty() {
                        return Err(failure);
                    }
                    self.failure = Some(failure);
                    return Ok(events);
                }
                Err(TryRecvError::Empty) => return Ok(events),
                Err(TryRecvError::Disconnected) => {
                    if events.is_empty() {
                        return Err(TransportError::Receive("event reader stopped".to_owned()));
                    }
                    return Ok(events);
                }
            }
        }
    }
}

pub struct SocketModeTransport {
    web: Arc<SlackWebClient>,
    policy: ReconnectPolicy,
    inbox: Mutex<Option<Inbox>>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl SocketModeTransport {
    pub fn new(web: Arc<SlackWebClient>, policy: ReconnectPolicy) -> Self {
        Self { web, policy, inbox: Mutex::new(None), reader: Mutex::new(None) }
    }
}

#[async_trait]
impl EventTransport for SocketModeTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        let stream = open_session(&self.web).await?;
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run_reader(self.web.clone(), self.policy.clone(), stream, tx));

        if let Some(previous) = self.reader.lock().await.replace(handle) {
            previous.abort();
        }
        *self.inbox.lock().await = Some(Inbox::new(rx));
        Ok(())
    }

    async fn poll(&self) -> Result<Vec<InboundEvent>, TransportError> {
        match self.inbox.lock().await.as_mut() {
            Some(inbox) => inbox.drain(),
            None => Err(TransportError::Receive("socket mode session is not connected".to_owned())),
        }
    }
}

impl Drop for SocketModeTransport {
    fn drop(&mut self) {
        if let Some(handle) = self.reader.get_mut().take() {
            handle.abort();
        }
    }
}

async fn open_session(web: &SlackWebClient) -> Result<WsStream, TransportError> {
    let url =
        web.open_socket_url().await.map_err(|error| TransportError::Connect(error.to_string()))?;
    let (stream, response) = tokio_tungstenite::connect_async(url.as_str())
        .await
        .map_err(|error| TransportError::Connect(error.to_string()))?;
    debug!(status = %response.status(), "socket mode websocket opened");
    Ok(stream)
}

#[derive(Debug)]
enum SessionEnd {
    Refresh(String),
    Closed,
    Failed(String),
    InboxClosed,
}

async fn run_reader(
    web: Arc<SlackWebClient>,
    policy: ReconnectPolicy,
    mut stream: WsStream,
    tx: UnboundedSender<InboxItem>,
) {
    loop {
        match pump(stream, &tx).await {
            SessionEnd::InboxClosed => return,
            SessionEnd::Refresh(reason) if reason == "link_disabled" => {
                error!(
                    event_name = "system.socket.link_disabled",
                    "socket mode was disabled for this app"
                );
                let _ = tx.send(Err(TransportError::Receive("socket mode link disabled".to_owned())));
                return;
            }
            SessionEnd::Refresh(reason) => {
                info!(
                    event_name = "system.socket.refresh_requested",
                    reason = %reason,
                    "slack requested a socket mode reconnect"
                );
            }
            SessionEnd::Closed => {
                info!(event_name = "system.socket.closed", "socket mode connection closed");
            }
            SessionEnd::Failed(reason) => {
                warn!(
                    event_name = "system.socket.read_failed",
                    error = %reason,
                    "socket mode connection failed"
                );
            }
        }

        match reopen(&web, &policy).await {
            Ok(next) => stream = next,
            Err(error) => {
                error!(
                    event_name = "system.socket.reconnect_exhausted",
                    max_retries = policy.max_retries,
                    error = %error,
                    "socket mode reconnect retries exhausted"
                );
                let _ = tx.send(Err(TransportError::Receive(error.to_string())));
                return;
            }
        }
    }
}

async fn reopen(
    web: &SlackWebClient,
    policy: &ReconnectPolicy,
) -> Result<WsStream, TransportError> {
    let mut last_error = TransportError::Connect("no reconnect attempts allowed".to_owned());
    for attempt in 0..=policy.max_retries {
        match open_session(web).await {
            Ok(stream) => {
                info!(event_name = "system.socket.reconnected", attempt, "socket mode reconnected");
                return Ok(stream);
            }
            Err(error) => {
                warn!(
                    attempt,
                    max_retries = policy.max_retries,
                    error = %error,
                    "socket mode reconnect attempt failed"
                );
                last_error = error;
            }
        }

        if attempt < policy.max_retries {
            let delay = policy.backoff(attempt);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
    }
    Err(last_error)
}

async fn pump(stream: WsStream, tx: &UnboundedSender<InboxItem>) -> SessionEnd {
    let (mut write, mut read) = stream.split();

    while let Some(message) = read.next().await {
        let message = match message {
            Ok(message) => message,
            Err(error) => return SessionEnd::Failed(error.to_string()),
        };

        match message {
            Message::Text(text) => {
                let frame = match parse_frame(text.as_str()) {
                    Ok(frame) => frame,
                    Err(error) => {
                        warn!(error = %error, "skipping undecodable socket mode frame");
                        continue;
                    }
                };
                match frame {
                    Frame::Hello => debug!("socket mode hello received"),
                    Frame::Disconnect { reason } => return SessionEnd::Refresh(reason),
                    Frame::Envelope { envelope_id, event } => {
                        if let Err(error) = write.send(Message::text(ack_message(&envelope_id))).await
                        {
                            return SessionEnd::Failed(error.to_string());
                        }
                        trace!(
                            event_name = "ingress.slack.ack_sent",
                            envelope_id = %envelope_id,
                            "acknowledged envelope"
                        );
                        if let Some(event) = event {
                            if tx.send(Ok(event)).is_err() {
                                return SessionEnd::InboxClosed;
                            }
                        }
                    }
                    Frame::Other { kind } => trace!(frame_type = %kind, "ignoring frame"),
                }
            }
            Message::Ping(data) => {
                if let Err(error) = write.send(Message::Pong(data)).await {
                    return SessionEnd::Failed(error.to_string());
                }
            }
            Message::Close(_) => return SessionEnd::Closed,
            _ => {}
        }
    }

    SessionEnd::Closed
}
