//! Wire events.
//!
//! Frames travel as `{"event": <name>, "data": <payload>}` JSON text. Inbound
//! frames are normalised here into [`Request`] so the hub never inspects
//! payload shapes; outbound frames are [`ServerEvent`].

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use crate::rooms::RoomSummary;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum Request {
    #[serde(rename = "join")]
    Join(JoinRequest),
    /// Legacy global chat. Kept raw: the gateway charges the rate limit
    /// before it validates.
    #[serde(rename = "mensaje")]
    Mensaje(Value),
    #[serde(rename = "room:create")]
    CreateRoom(CreateRoom),
    #[serde(rename = "room:join")]
    JoinRoom(RoomRef),
    #[serde(rename = "room:leave")]
    LeaveRoom(RoomRef),
    #[serde(rename = "room:message")]
    RoomMessage(RoomText),
    #[serde(rename = "logout")]
    Logout,
    #[serde(rename = "ping_rtt")]
    PingRtt(Value),
}

impl Request {
    pub fn parse(frame: &str) -> serde_json::Result<Self> {
        serde_json::from_str(frame)
    }
}

/// Canonical `join`. Accepts `{"username": "..."}` or a bare string.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "JoinPayload")]
pub struct JoinRequest {
    /// Trimmed, non-blank name; `None` means "pick an anonymous one".
    pub username: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum JoinPayload {
    Bare(String),
    Object {
        #[serde(default)]
        username: Value,
    },
    Other(serde::de::IgnoredAny),
}

impl From<JoinPayload> for JoinRequest {
    fn from(payload: JoinPayload) -> Self {
        let raw = match &payload {
            JoinPayload::Bare(name) => Some(name.as_str()),
            JoinPayload::Object { username } => username.as_str(),
            JoinPayload::Other(_) => None,
        };
        let username = raw.map(str::trim).filter(|name| !name.is_empty()).map(str::to_owned);
        Self { username }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateRoom {
    pub name: Option<String>,
    pub invite_user: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomRef {
    pub room_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomText {
    pub room_id: String,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    RoomNotFound,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    #[serde(rename = "system")]
    System(Notice),
    #[serde(rename = "system:info")]
    SystemInfo(Notice),
    #[serde(rename = "system:error")]
    SystemError { code: ErrorCode },
    #[serde(rename = "mensaje")]
    Mensaje(ChatMessage),
    #[serde(rename = "presence:update")]
    Presence(Vec<String>),
    #[serde(rename = "rooms:update")]
    Rooms(Vec<RoomSummary>),
    #[serde(rename = "room:invited")]
    RoomInvited(RoomInvite),
    #[serde(rename = "room:created")]
    RoomCreated(RoomCreated),
    #[serde(rename = "room:message")]
    RoomMessage(RoomMessage),
    #[serde(rename = "pong_rtt")]
    PongRtt(Value),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub text: String,
    pub ts: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub user: String,
    pub text: String,
    /// The sender's own timestamp when it sent a number, else server time.
    pub ts: Number,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomInvite {
    pub room_id: String,
    pub name: String,
    pub owner: String,
    pub ts: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomCreated {
    pub room_id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomMessage {
    pub room_id: String,
    pub user: String,
    pub text: String,
    pub ts: i64,
}

/// What the hub pushes into a connection's outbox.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Event(ServerEvent),
    /// Server-initiated close (logout).
    Close,
}
