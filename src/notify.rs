use crate::presenter::NotificationKind;
use crate::session::ConsoleSession;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Notification {
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct StatusUpdate {
    pub message: String,
}

/// Events the updater emits on its Socket.IO channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PushEvent {
    Notification(Notification),
    StatusUpdate(StatusUpdate),
}

impl PushEvent {
    fn decode(name: &str, data: Value) -> Option<Self> {
        let event = match name {
            "notification" => serde_json::from_value(data).map(PushEvent::Notification),
            "status_update" => serde_json::from_value(data).map(PushEvent::StatusUpdate),
            other => {
                tracing::debug!("Ignoring push event {other}");
                return None;
            }
        };
        event
            .map_err(|err| tracing::debug!("Ignoring malformed {name} event: {err}"))
            .ok()
    }
}

/// One Engine.IO text frame, with Socket.IO packets on the default namespace
/// unwrapped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Frame {
    /// Engine.IO `0`: handshake; the client answers with a namespace connect.
    Open,
    /// Engine.IO `1`.
    Close,
    /// Engine.IO `2`, answered with `3` and the same payload.
    Ping(String),
    /// Socket.IO `40`: namespace connect acknowledged.
    Connected,
    /// Socket.IO `41` or `44`: the server dropped or refused the namespace.
    Disconnected,
    /// Socket.IO `42[name, data]`.
    Event(PushEvent),
    Ignored,
}

pub const CONNECT_PACKET: &str = "40";

pub fn pong_packet(payload: &str) -> String {
    format!("3{payload}")
}

pub fn decode_frame(frame: &str) -> Frame {
    let mut chars = frame.chars();
    match chars.next() {
        Some('0') => Frame::Open,
        Some('1') => Frame::Close,
        Some('2') => Frame::Ping(chars.as_str().to_string()),
        Some('4') => decode_packet(chars.as_str()),
        _ => Frame::Ignored,
    }
}

fn decode_packet(packet: &str) -> Frame {
    let mut chars = packet.chars();
    match chars.next() {
        Some('0') => Frame::Connected,
        Some('1') | Some('4') => Frame::Disconnected,
        Some('2') => {
            // Events sent with an ack carry a numeric id before the payload.
            let payload = chars.as_str().trim_start_matches(|c: char| c.is_ascii_digit());
            decode_event(payload).map_or(Frame::Ignored, Frame::Event)
        }
        _ => Frame::Ignored,
    }
}

fn decode_event(payload: &str) -> Option<PushEvent> {
    let args = match serde_json::from_str::<Vec<Value>>(payload) {
        Ok(args) => args,
        Err(err) => {
            tracing::debug!("Ignoring push frame: {err}");
            return None;
        }
    };
    let mut args = args.into_iter();
    let name = match args.next() {
        Some(Value::String(name)) => name,
        _ => return None,
    };
    PushEvent::decode(&name, args.next().unwrap_or(Value::Null))
}

pub fn deliver(session: &ConsoleSession, event: &PushEvent) {
    match event {
        PushEvent::Notification(note) => {
            session.presenter().show_toast(note.kind, &note.message);
        }
        PushEvent::StatusUpdate(update) => {
            session.presenter().append_log(&update.message);
        }
    }
}

/// Routes one text frame to the presenter. Anything but an event is dropped.
pub fn dispatch(session: &ConsoleSession, frame: &str) -> Option<PushEvent> {
    match decode_frame(frame) {
        Frame::Event(event) => {
            deliver(session, &event);
            Some(event)
        }
        _ => None,
    }
}

/// Best-effort push connection to the updater. At most one connection task
/// runs per channel.
pub struct NotificationChannel {
    url: String,
    reconnect_delay: Duration,
    session: Arc<ConsoleSession>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl NotificationChannel {
    pub fn new(url: String, reconnect_delay: Duration, session: Arc<ConsoleSession>) -> Self {
        Self {
            url,
            reconnect_delay,
            session,
            task: Mutex::new(None),
        }
    }

    /// Starts the connection task; returns `false` if one is already running.
    pub fn setup(&self) -> bool {
        let mut task = self.task.lock().expect("notification task poisoned");
        if task.is_some() {
            return false;
        }
        let url = self.url.clone();
        let delay = self.reconnect_delay;
        let session = Arc::clone(&self.session);
        *task = Some(tokio::spawn(connection_loop(url, delay, session)));
        true
    }

    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .expect("notification task poisoned")
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    pub fn shutdown(&self) {
        if let Some(handle) = self.task.lock().expect("notification task poisoned").take() {
            handle.abort();
        }
    }
}

impl Drop for NotificationChannel {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn connection_loop(url: String, reconnect_delay: Duration, session: Arc<ConsoleSession>) {
    loop {
        match tokio_tungstenite::connect_async(url.as_str()).await {
            Ok((mut stream, _response)) => {
                tracing::info!("Connected to notification channel at {url}");
                while let Some(frame) = stream.next().await {
                    let text = match frame {
                        Ok(Message::Text(text)) => text,
                        Ok(Message::Ping(data)) => {
                            if let Err(err) = stream.send(Message::Pong(data)).await {
                                tracing::warn!("Notification channel error: {err}");
                                break;
                            }
                            continue;
                        }
                        Ok(Message::Close(_)) => break,
                        Ok(_) => continue,
                        Err(err) => {
                            tracing::warn!("Notification channel error: {err}");
                            break;
                        }
                    };
                    let reply = match decode_frame(&text) {
                        Frame::Open => Some(CONNECT_PACKET.to_string()),
                        Frame::Ping(payload) => Some(pong_packet(&payload)),
                        Frame::Connected => {
                            tracing::debug!("Joined notification namespace");
                            None
                        }
                        Frame::Event(event) => {
                            deliver(&session, &event);
                            None
                        }
                        Frame::Close | Frame::Disconnected => break,
                        Frame::Ignored => None,
                    };
                    if let Some(reply) = reply {
                        if let Err(err) = stream.send(Message::Text(reply)).await {
                            tracing::warn!("Notification channel error: {err}");
                            break;
                        }
                    }
                }
                tracing::info!("Disconnected from notification channel");
            }
            Err(err) => {
                tracing::warn!("Unable to reach notification channel {url}: {err}");
            }
        }
        tokio::time::sleep(reconnect_delay).await;
    }
}
