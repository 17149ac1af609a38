//! Notification fan-out surface.
//!
//! The parser describes each state change as one [`IrcEvent`]. The engine
//! hands every event to every registered [`IrcListener`] in registration
//! order; there is no priority and no way for a listener to stop delivery.

use std::sync::Arc;

use sbi_proto::{ModeChange, Sender};
use tracing::{debug, info};

use crate::connection::IrcConnection;

/// A parsed notification.
///
/// Events borrow nothing: a listener may clone and keep one, but the
/// connection state it describes can change as soon as the call returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IrcEvent {
    /// Raw data arrived and was queued, not yet parsed.
    NewData,

    // --- registration numerics -------------------------------------------
    /// 001: registration accepted.
    Welcome { nickname: String, message: String },
    /// 002
    YourHost { message: String },
    /// 003
    Created { server: String, message: String },
    /// 004
    MyInfo { message: String },
    /// 005: `supported` is the token list, `message` the trailing text.
    ISupport { supported: String, message: String },

    // --- channel numerics -------------------------------------------------
    /// 331
    NoTopic { channel: String },
    /// 332
    TopicOnJoin { channel: String, topic: String },
    /// 353: one NAMES line was folded into the provisional list.
    Names { channel: String, count: usize },
    /// 366: the provisional list became the member list.
    EndOfNames { channel: String, members: usize },

    /// Post-registration automation has run.
    ConnectionReady,

    // --- commands from others --------------------------------------------
    Cap { subcommand: String, capability: String },
    Invite { instigator: Sender, channel: String },
    Join { channel: String, user: Sender },
    Kick { channel: String, instigator: Sender, kicked: String, message: String },
    Kill { instigator: Sender, target: String, message: String },
    Mode { target: String, instigator: Sender, changes: Vec<ModeChange> },
    Nick { instigator: Sender, nickname: String },
    Notice { instigator: Sender, target: String, message: String },
    Part { channel: String, instigator: Sender, message: String },
    /// `channel` is set for channel messages, `None` for private queries.
    Privmsg { instigator: Sender, channel: Option<String>, target: String, message: String },
    /// CTCP ACTION (`/me`).
    Action { instigator: Sender, target: String, message: String },
    Quit { instigator: Sender, message: String, channels: Vec<String> },
    Topic { channel: String, instigator: Sender, topic: String },

    // --- self-initiated / self-targeted ----------------------------------
    SentInvite { nickname: String, channel: String },
    WeJoined { channel: String },
    WeKicked { channel: String, kicked: String, message: String },
    GotKicked { channel: String, instigator: Sender, message: String },
    GotNickChanged { old: String, nickname: String },
    SentPrivmsg { target: String, message: String },
    GotUserMode { modes: String },
    GotChannelMode { channel: String, instigator: Sender, changes: Vec<ModeChange> },
    GotKilled { instigator: Sender, message: String },
    WeParted { channel: String, message: String },
    WeQuit { message: String },
}

/// Field-less discriminant of [`IrcEvent`], for subscription filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    NewData,
    Welcome,
    YourHost,
    Created,
    MyInfo,
    ISupport,
    NoTopic,
    TopicOnJoin,
    Names,
    EndOfNames,
    ConnectionReady,
    Cap,
    Invite,
    Join,
    Kick,
    Kill,
    Mode,
    Nick,
    Notice,
    Part,
    Privmsg,
    Action,
    Quit,
    Topic,
    SentInvite,
    WeJoined,
    WeKicked,
    GotKicked,
    GotNickChanged,
    SentPrivmsg,
    GotUserMode,
    GotChannelMode,
    GotKilled,
    WeParted,
    WeQuit,
}

impl IrcEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::NewData => EventKind::NewData,
            Self::Welcome { .. } => EventKind::Welcome,
            Self::YourHost { .. } => EventKind::YourHost,
            Self::Created { .. } => EventKind::Created,
            Self::MyInfo { .. } => EventKind::MyInfo,
            Self::ISupport { .. } => EventKind::ISupport,
            Self::NoTopic { .. } => EventKind::NoTopic,
            Self::TopicOnJoin { .. } => EventKind::TopicOnJoin,
            Self::Names { .. } => EventKind::Names,
            Self::EndOfNames { .. } => EventKind::EndOfNames,
            Self::ConnectionReady => EventKind::ConnectionReady,
            Self::Cap { .. } => EventKind::Cap,
            Self::Invite { .. } => EventKind::Invite,
            Self::Join { .. } => EventKind::Join,
            Self::Kick { .. } => EventKind::Kick,
            Self::Kill { .. } => EventKind::Kill,
            Self::Mode { .. } => EventKind::Mode,
            Self::Nick { .. } => EventKind::Nick,
            Self::Notice { .. } => EventKind::Notice,
            Self::Part { .. } => EventKind::Part,
            Self::Privmsg { .. } => EventKind::Privmsg,
            Self::Action { .. } => EventKind::Action,
            Self::Quit { .. } => EventKind::Quit,
            Self::Topic { .. } => EventKind::Topic,
            Self::SentInvite { .. } => EventKind::SentInvite,
            Self::WeJoined { .. } => EventKind::WeJoined,
            Self::WeKicked { .. } => EventKind::WeKicked,
            Self::GotKicked { .. } => EventKind::GotKicked,
            Self::GotNickChanged { .. } => EventKind::GotNickChanged,
            Self::SentPrivmsg { .. } => EventKind::SentPrivmsg,
            Self::GotUserMode { .. } => EventKind::GotUserMode,
            Self::GotChannelMode { .. } => EventKind::GotChannelMode,
            Self::GotKilled { .. } => EventKind::GotKilled,
            Self::WeParted { .. } => EventKind::WeParted,
            Self::WeQuit { .. } => EventKind::WeQuit,
        }
    }
}

/// Observer of parsed IRC activity.
///
/// Called on the parser task (or, for [`IrcEvent::NewData`], on the
/// connection's read task). Implementations must not block.
pub trait IrcListener: Send + Sync {
    fn on_event(&self, connection: &Arc<IrcConnection>, event: &IrcEvent);

    /// Filter consulted before every delivery. Defaults to everything.
    fn accepts(&self, _kind: EventKind) -> bool {
        true
    }
}

/// Listener that writes every event to the `tracing` log.
#[derive(Debug, Default)]
pub struct LoggingListener;

impl IrcListener for LoggingListener {
    fn on_event(&self, connection: &Arc<IrcConnection>, event: &IrcEvent) {
        match event {
            IrcEvent::NewData => {}
            IrcEvent::Privmsg {
                instigator,
                target,
                message,
                ..
            } => info!(
                connection = connection.id(),
                from = %instigator.nickname,
                to = %target,
                "<{}> {}",
                instigator.nickname,
                message
            ),
            IrcEvent::Welcome { nickname, .. } => {
                info!(connection = connection.id(), nickname = %nickname, "registered")
            }
            IrcEvent::WeJoined { channel } => {
                info!(connection = connection.id(), channel = %channel, "joined")
            }
            other => debug!(connection = connection.id(), event = ?other.kind(), "{:?}", other),
        }
    }

    fn accepts(&self, kind: EventKind) -> bool {
        kind != EventKind::NewData
    }
}
