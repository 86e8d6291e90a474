//! The coordinator that owns every piece of chat state.
//!
//! A [`Hub`] is driven one request at a time (see [`crate::actor`]), so none
//! of its methods need locking. Each call resolves the caller through the
//! registry, mutates rooms and membership, then pushes events into the
//! outboxes of the affected connections.
//!
//! Outboxes are bounded. A connection whose outbox is full when the hub
//! writes to it is dropped once the current command has been applied.

use std::collections::HashMap;

use tokio::sync::mpsc::{self, error::TrySendError};

use crate::{
    config::ChatConfig,
    events::{
        ChatMessage, CreateRoom, ErrorCode, JoinRequest, Notice, Outbound, Request, RoomCreated,
        RoomInvite, RoomMessage, RoomRef, RoomText, ServerEvent,
    },
    gateway::{self, RateLimiter, MAX_NAME_LEN},
    presence::{ConnId, Registry},
    rooms::{self, GeneralTransition, Membership, RoomDirectory, RoomKind, GENERAL_ROOM_ID, SYSTEM_OWNER},
};

pub type Outbox = mpsc::Sender<Outbound>;

/// Why a request was dropped without telling the sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Discard {
    #[error("frame could not be decoded")]
    Malformed,
    #[error("payload failed validation")]
    Invalid,
    #[error("rate limit exceeded")]
    RateLimited,
    #[error("sender has not joined")]
    Unregistered,
    #[error("connection is not open")]
    UnknownConnection,
    #[error("room does not exist")]
    UnknownRoom,
    #[error("message text is blank")]
    EmptyText,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    /// Refused with an error signal sent back to the sender only.
    Rejected(ErrorCode),
    Discarded(Discard),
}

impl From<Discard> for Outcome {
    fn from(reason: Discard) -> Self {
        Outcome::Discarded(reason)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HubStats {
    pub connections: usize,
    pub users: usize,
    pub rooms: usize,
}

pub struct Hub {
    config: ChatConfig,
    outboxes: HashMap<ConnId, Outbox>,
    registry: Registry,
    directory: RoomDirectory,
    membership: Membership,
    limiter: RateLimiter,
    /// Connections that hit a full outbox during the current command.
    stalled: Vec<ConnId>,
}

impl Hub {
    pub fn new(config: ChatConfig) -> Self {
        Self {
            limiter: RateLimiter::new(&config),
            config,
            outboxes: HashMap::new(),
            registry: Registry::new(),
            directory: RoomDirectory::new(),
            membership: Membership::new(),
            stalled: Vec::new(),
        }
    }

    pub fn connect(&mut self, conn: ConnId, outbox: Outbox) {
        self.outboxes.insert(conn, outbox);
        tracing::info!(%conn, "connected");
    }

    pub fn stats(&self) -> HubStats {
        HubStats {
            connections: self.outboxes.len(),
            users: self.registry.user_count(),
            rooms: self.directory.len(),
        }
    }

    pub fn handle(&mut self, conn: ConnId, request: Request, now: i64) -> Outcome {
        if !self.outboxes.contains_key(&conn) {
            return Discard::UnknownConnection.into();
        }

        let result = match request {
            Request::Join(join) => self.join(conn, join, now),
            Request::Mensaje(payload) => self.global_message(conn, &payload, now),
            Request::CreateRoom(create) => self.create_room(conn, create, now),
            Request::JoinRoom(target) => self.join_room(conn, target, now),
            Request::LeaveRoom(target) => self.leave_room(conn, target, now),
            Request::RoomMessage(message) => self.room_message(conn, message, now),
            Request::Logout => self.logout(conn, now),
            Request::PingRtt(stamp) => {
                self.send(conn, ServerEvent::PongRtt(stamp));
                Ok(Outcome::Applied)
            }
        };

        let outcome = result.unwrap_or_else(Outcome::from);
        if let Outcome::Discarded(reason) = outcome {
            tracing::debug!(%conn, %reason, "request discarded");
        }
        self.drop_stalled(now);
        outcome
    }

    /// Transport reported the socket gone.
    pub fn disconnect(&mut self, conn: ConnId, now: i64) -> Outcome {
        let outcome = self.drop_connection(conn, now);
        self.drop_stalled(now);
        outcome
    }

    /// Disconnects every connection that could not keep up. Dropping the
    /// outbox lets its writer flush what is queued and then stop.
    fn drop_stalled(&mut self, now: i64) {
        while let Some(conn) = self.stalled.pop() {
            if self.outboxes.contains_key(&conn) {
                tracing::warn!(%conn, "outbox full, dropping stalled connection");
                self.drop_connection(conn, now);
            }
        }
    }

    fn drop_connection(&mut self, conn: ConnId, now: i64) -> Outcome {
        if self.outboxes.remove(&conn).is_none() {
            return Discard::UnknownConnection.into();
        }

        if let Some(name) = self.registry.resolve_name(conn).map(str::to_owned) {
            self.send_all(ServerEvent::System(Notice {
                text: format!("{name} disconnected"),
                ts: now,
            }));
        }
        self.release(conn, now);
        tracing::info!(%conn, "disconnected");
        Outcome::Applied
    }

    fn join(&mut self, conn: ConnId, join: JoinRequest, now: i64) -> Result<Outcome, Discard> {
        let name = join.username.unwrap_or_else(|| conn.anon_label());
        self.registry.register(conn, name.clone());
        tracing::info!(%conn, %name, "joined");

        self.send_all(ServerEvent::System(Notice {
            text: format!("{name} connected"),
            ts: now,
        }));

        self.reconcile_general(now);
        if self.membership.is_live(GENERAL_ROOM_ID) {
            self.membership.join(GENERAL_ROOM_ID, conn);
        }

        self.broadcast_state();
        self.send(conn, ServerEvent::SystemInfo(Notice {
            text: format!("Welcome {name}"),
            ts: now,
        }));
        Ok(Outcome::Applied)
    }

    fn global_message(&mut self, conn: ConnId, payload: &serde_json::Value, now: i64) -> Result<Outcome, Discard> {
        if !self.limiter.check(conn, now) {
            return Err(Discard::RateLimited);
        }
        let draft = gateway::validate_chat(payload, self.config.max_message_len)?;

        let label = [draft.user, self.registry.resolve_name(conn)]
            .into_iter()
            .flatten()
            .map(|label| gateway::cap(label, MAX_NAME_LEN))
            .find(|label| !label.is_empty())
            .unwrap_or_else(|| conn.anon_label());

        self.send_all(ServerEvent::Mensaje(ChatMessage {
            user: gateway::escape(&label),
            text: gateway::escape(&gateway::cap(draft.text, self.config.max_message_len)),
            ts: draft.ts.unwrap_or_else(|| now.into()),
        }));
        Ok(Outcome::Applied)
    }

    fn create_room(&mut self, conn: ConnId, create: CreateRoom, now: i64) -> Result<Outcome, Discard> {
        let owner = self.registered_name(conn)?;

        let invitee = create
            .invite_user
            .and_then(|name| self.registry.resolve_connection(&name).map(|to| (name, to)));

        let (room_id, name) = match &invitee {
            Some((invitee, _)) => {
                let room_id = rooms::dm_room_id(&owner, invitee);
                self.directory.create(
                    &room_id,
                    rooms::dm_room_name(&owner, invitee),
                    owner.clone(),
                    RoomKind::Direct,
                    [owner.clone(), invitee.clone()],
                    now,
                );
                let name = self
                    .directory
                    .get(&room_id)
                    .map(|meta| meta.name.clone())
                    .unwrap_or_else(|| rooms::dm_room_name(&owner, invitee));
                (room_id, name)
            }
            None => {
                let mut room_id = rooms::random_room_id();
                while self.directory.contains(&room_id) || self.membership.is_live(&room_id) {
                    room_id = rooms::random_room_id();
                }
                let requested = create.name.filter(|name| !name.trim().is_empty());
                let name = gateway::cap(
                    &requested.unwrap_or_else(|| format!("Chat de {owner}")),
                    self.config.max_message_len,
                );
                self.directory
                    .create(&room_id, name.clone(), owner.clone(), RoomKind::Public, [], now);
                (room_id, name)
            }
        };
        tracing::info!(%conn, %room_id, direct = invitee.is_some(), "room created");

        self.membership.join(&room_id, conn);

        if let Some((_, to)) = invitee {
            self.send(to, ServerEvent::RoomInvited(RoomInvite {
                room_id: room_id.clone(),
                name: name.clone(),
                owner,
                ts: now,
            }));
            // joined silently so unread messages accrue before the invitee opens it
            self.membership.join(&room_id, to);
        }

        self.broadcast_state();
        self.send(conn, ServerEvent::RoomCreated(RoomCreated { room_id, name }));
        Ok(Outcome::Applied)
    }

    fn join_room(&mut self, conn: ConnId, RoomRef { room_id }: RoomRef, now: i64) -> Result<Outcome, Discard> {
        let user = self.registered_name(conn)?;
        if !self.directory.contains(&room_id) {
            return Ok(self.reject(conn, ErrorCode::RoomNotFound));
        }

        self.membership.join(&room_id, conn);
        self.announce(&room_id, format!("{user} joined the room."), now);
        self.broadcast_state();
        Ok(Outcome::Applied)
    }

    fn leave_room(&mut self, conn: ConnId, RoomRef { room_id }: RoomRef, now: i64) -> Result<Outcome, Discard> {
        let user = self.registered_name(conn)?;
        if !self.directory.contains(&room_id) {
            return Err(Discard::UnknownRoom);
        }

        self.membership.leave(&room_id, conn);
        self.announce(&room_id, format!("{user} left the room."), now);

        if !self.membership.is_live(&room_id) {
            self.directory.delete(&room_id);
            tracing::info!(%room_id, "room emptied");
        }
        if room_id == GENERAL_ROOM_ID {
            self.reconcile_general(now);
        }

        self.broadcast_state();
        Ok(Outcome::Applied)
    }

    fn room_message(&mut self, conn: ConnId, RoomText { room_id, text }: RoomText, now: i64) -> Result<Outcome, Discard> {
        let user = self.registered_name(conn)?;
        if !self.directory.contains(&room_id) {
            return Ok(self.reject(conn, ErrorCode::RoomNotFound));
        }

        let mut text = gateway::room_text(&text, self.config.max_message_len)?;
        if self.config.escape_room_messages {
            text = gateway::escape(&text);
        }

        self.send_room(&room_id, ServerEvent::RoomMessage(RoomMessage {
            room_id: room_id.clone(),
            user,
            text,
            ts: now,
        }));
        Ok(Outcome::Applied)
    }

    fn logout(&mut self, conn: ConnId, now: i64) -> Result<Outcome, Discard> {
        let name = self.registry.resolve_name(conn).unwrap_or("Someone").to_owned();
        self.send_all(ServerEvent::System(Notice {
            text: format!("{name} logged out"),
            ts: now,
        }));

        self.release(conn, now);
        if let Some(outbox) = self.outboxes.remove(&conn) {
            // a full outbox still closes: dropping the sender ends the writer
            let _ = outbox.try_send(Outbound::Close);
        }
        tracing::info!(%conn, %name, "logged out");
        Ok(Outcome::Applied)
    }

    /// Forgets everything tied to `conn` and resyncs the rest.
    fn release(&mut self, conn: ConnId, now: i64) {
        self.limiter.forget(conn);
        self.registry.unregister(conn);
        self.membership.leave_all(conn);
        for room_id in self.directory.sweep_empty(&self.membership) {
            tracing::debug!(%room_id, "room emptied");
        }
        self.reconcile_general(now);
        self.broadcast_state();
    }

    fn reconcile_general(&mut self, now: i64) {
        let transition =
            rooms::reconcile_general(&mut self.directory, &mut self.membership, &self.registry, now);
        if let GeneralTransition::Removed(evicted) = transition {
            tracing::debug!(evicted = evicted.len(), "general room members released");
        }
    }

    fn registered_name(&self, conn: ConnId) -> Result<String, Discard> {
        self.registry
            .resolve_name(conn)
            .map(str::to_owned)
            .ok_or(Discard::Unregistered)
    }

    fn reject(&mut self, conn: ConnId, code: ErrorCode) -> Outcome {
        self.send(conn, ServerEvent::SystemError { code });
        Outcome::Rejected(code)
    }

    fn announce(&mut self, room_id: &str, text: String, now: i64) {
        self.send_room(room_id, ServerEvent::RoomMessage(RoomMessage {
            room_id: room_id.to_owned(),
            user: SYSTEM_OWNER.to_owned(),
            text,
            ts: now,
        }));
    }

    /// Sends presence and the room snapshot to everyone.
    fn broadcast_state(&mut self) {
        let mut presence: Vec<String> = self.registry.names().map(str::to_owned).collect();
        presence.sort();
        let snapshot = self.directory.snapshot(&self.membership, &self.registry).collect();

        self.send_all(ServerEvent::Presence(presence));
        self.send_all(ServerEvent::Rooms(snapshot));
    }

    fn send(&mut self, conn: ConnId, event: ServerEvent) {
        let Some(outbox) = self.outboxes.get(&conn) else {
            return;
        };
        match outbox.try_send(Outbound::Event(event)) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                if !self.stalled.contains(&conn) {
                    self.stalled.push(conn);
                }
            }
            Err(TrySendError::Closed(_)) => tracing::debug!(%conn, "outbox closed"),
        }
    }

    fn send_all(&mut self, event: ServerEvent) {
        let conns: Vec<ConnId> = self.outboxes.keys().copied().collect();
        for conn in conns {
            self.send(conn, event.clone());
        }
    }

    fn send_room(&mut self, room_id: &str, event: ServerEvent) {
        let conns = self.membership.members(room_id).to_vec();
        for conn in conns {
            self.send(conn, event.clone());
        }
    }
}
