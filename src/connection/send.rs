//! Outgoing commands.
//!
//! Every `send_*` method formats exactly one command line and queues it.
//! Required arguments that are empty fail with
//! [`IrcStatus::MissingParameter`] before anything is queued.

use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use sbi_proto::ctcp;
use tracing::{debug, info};

use super::{ConnState, IrcConnection};
use crate::error::{IrcResult, IrcStatus};
use crate::listener::IrcEvent;

/// Capabilities requested during registration.
const REQUESTED_CAPS: [&str; 2] = ["multi-prefix", "uhnames"];

fn require<'a>(value: &'a str, name: &'static str) -> IrcResult<&'a str> {
    if value.is_empty() {
        Err(IrcStatus::MissingParameter(name))
    } else {
        Ok(value)
    }
}

impl IrcConnection {
    /// Queue the registration handshake.
    ///
    /// Requests CAP extensions, then registers with the current nickname
    /// (or the first configured one) and the profile's USER fields.
    pub fn send_init(&self) -> IrcResult {
        let network = self.network().ok_or(IrcStatus::NoOwner)?;
        let profile = network.profile();

        self.insert_state(ConnState::INIT_SENT);

        self.add_to_send_queue("CAP LS")?;
        for cap in REQUESTED_CAPS {
            self.add_to_send_queue(format!("CAP REQ {cap}"))?;
        }
        self.add_to_send_queue("CAP END")?;

        let nickname = network.with_client(|client| {
            if client.nickname.is_empty() {
                client.nickname = client.nicknames.first().cloned().unwrap_or_default();
            }
            client.nickname.clone()
        });

        self.send_nick(&nickname)?;
        self.send_user(&profile.ident, profile.mode, &profile.real_name)
    }

    pub fn send_away(&self, message: Option<&str>) -> IrcResult {
        match message {
            Some(msg) if !msg.is_empty() => self.add_to_send_queue(format!("AWAY :{msg}")),
            _ => self.add_to_send_queue("AWAY"),
        }
    }

    pub fn send_ctcp(&self, target: &str, message: &str) -> IrcResult {
        let target = require(target, "target")?;
        let message = require(message, "message")?;
        self.add_to_send_queue(format!("PRIVMSG {target} :{}", ctcp::frame(message)))
    }

    pub fn send_ctcp_notice(&self, target: &str, message: &str) -> IrcResult {
        let target = require(target, "target")?;
        let message = require(message, "message")?;
        self.add_to_send_queue(format!("NOTICE {target} :{}", ctcp::frame(message)))
    }

    /// Identify to the configured services nickname.
    pub fn send_identify(&self, password: &str) -> IrcResult {
        let password = require(password, "password")?;
        let service = self
            .network()
            .map(|n| n.client().autoauth_service)
            .filter(|s| !s.is_empty())
            .ok_or(IrcStatus::MissingParameter("service"))?;
        self.add_to_send_queue(format!("PRIVMSG {service} :IDENTIFY {password}"))
    }

    pub fn send_invite(self: &Arc<Self>, channel: &str, nickname: &str) -> IrcResult {
        let channel = require(channel, "channel")?;
        let nickname = require(nickname, "nickname")?;
        self.add_to_send_queue(format!("INVITE {nickname} {channel}"))?;
        self.notify(IrcEvent::SentInvite {
            nickname: nickname.to_string(),
            channel: channel.to_string(),
        });
        Ok(())
    }

    pub fn send_join(&self, channel: &str, key: Option<&str>) -> IrcResult {
        let channel = require(channel, "channel")?;
        match key.filter(|k| !k.is_empty()) {
            Some(key) => self.add_to_send_queue(format!("JOIN {channel} {key}")),
            None => self.add_to_send_queue(format!("JOIN {channel}")),
        }
    }

    /// Without a message the profile's kick reason is used, if any.
    pub fn send_kick(&self, channel: &str, nickname: &str, message: Option<&str>) -> IrcResult {
        let channel = require(channel, "channel")?;
        let nickname = require(nickname, "nickname")?;
        let fallback = self.network().map(|n| n.client().kick_reason);
        match message.or(fallback.as_deref()).filter(|m| !m.is_empty()) {
            Some(msg) => self.add_to_send_queue(format!("KICK {channel} {nickname} :{msg}")),
            None => self.add_to_send_queue(format!("KICK {channel} {nickname}")),
        }
    }

    pub fn send_mode(&self, target: &str, modes: &str) -> IrcResult {
        let target = require(target, "target")?;
        let modes = require(modes, "modes")?;
        self.add_to_send_queue(format!("MODE {target} {modes}"))
    }

    pub fn send_nick(&self, nickname: &str) -> IrcResult {
        let nickname = require(nickname, "nickname")?;
        self.add_to_send_queue(format!("NICK {nickname}"))
    }

    pub fn send_notice(&self, target: &str, message: &str) -> IrcResult {
        let target = require(target, "target")?;
        let message = require(message, "message")?;
        self.add_to_send_queue(format!("NOTICE {target} :{message}"))
    }

    /// Without a message the profile's part reason is used, if any.
    pub fn send_part(&self, channel: &str, message: Option<&str>) -> IrcResult {
        let channel = require(channel, "channel")?;
        let fallback = self.network().map(|n| n.client().part_reason);
        match message.or(fallback.as_deref()).filter(|m| !m.is_empty()) {
            Some(msg) => self.add_to_send_queue(format!("PART {channel} :{msg}")),
            None => self.add_to_send_queue(format!("PART {channel}")),
        }
    }

    pub fn send_privmsg(self: &Arc<Self>, target: &str, message: &str) -> IrcResult {
        let target = require(target, "target")?;
        let message = require(message, "message")?;
        self.add_to_send_queue(format!("PRIVMSG {target} :{message}"))?;
        self.notify(IrcEvent::SentPrivmsg {
            target: target.to_string(),
            message: message.to_string(),
        });
        Ok(())
    }

    /// Send QUIT with `message`, or the profile/engine default reason.
    pub fn send_quit(&self, message: Option<&str>) -> IrcResult {
        let reason = match message.filter(|m| !m.is_empty()) {
            Some(msg) => msg.to_string(),
            None => self.default_quit_reason(),
        };
        self.add_to_send_queue(format!("QUIT :{reason}"))
    }

    /// `None` clears the topic, `Some("")` queries it.
    pub fn send_topic(&self, channel: &str, topic: Option<&str>) -> IrcResult {
        let channel = require(channel, "channel")?;
        match topic {
            None => self.add_to_send_queue(format!("TOPIC {channel} :")),
            Some("") => self.add_to_send_queue(format!("TOPIC {channel}")),
            Some(topic) => self.add_to_send_queue(format!("TOPIC {channel} :{topic}")),
        }
    }

    pub fn send_user(&self, username: &str, mode: u16, real_name: &str) -> IrcResult {
        let username = require(username, "username")?;
        let real_name = require(real_name, "real_name")?;
        self.add_to_send_queue(format!("USER {username} {mode} * :{real_name}"))
    }

    pub fn send_raw(&self, line: &str) -> IrcResult {
        self.add_to_send_queue(require(line, "line")?)
    }

    /// Start a lag probe: `PING :LAG<unix millis>`.
    pub fn send_ping_lag(&self) -> IrcResult {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        self.add_to_send_queue(format!("PING :LAG{millis}"))?;
        *self.lag_probe.lock() = Some(Instant::now());
        Ok(())
    }

    /// Try the next configured nickname after a 432/433.
    ///
    /// Walks the profile's list from the entry after the current nickname.
    /// If the current nickname is not in the list, starts over at the first
    /// entry. Fails with [`IrcStatus::NoMoreNicks`] once the list is
    /// exhausted.
    pub fn auto_change_nick(&self) -> IrcResult {
        let network = self.network().ok_or(IrcStatus::NoOwner)?;

        let next = network.with_client(|client| {
            let next = match client
                .nicknames
                .iter()
                .position(|n| n.eq_ignore_ascii_case(&client.nickname))
            {
                Some(idx) => client.nicknames.get(idx + 1).cloned(),
                None => client.nicknames.first().cloned(),
            };
            if let Some(nick) = &next {
                client.nickname = nick.clone();
            }
            next
        });

        match next {
            Some(nick) => {
                info!(connection = self.id(), nickname = %nick, "nickname unavailable, trying next");
                self.send_nick(&nick)
            }
            None => {
                debug!(connection = self.id(), "nickname list exhausted");
                Err(IrcStatus::NoMoreNicks)
            }
        }
    }

    fn default_quit_reason(&self) -> String {
        self.network()
            .map(|n| n.client().quit_reason)
            .filter(|r| !r.is_empty())
            .or_else(|| self.engine().map(|e| e.config().default_quit_reason.clone()))
            .unwrap_or_else(crate::config::default_quit_reason)
    }

    fn notify(self: &Arc<Self>, event: IrcEvent) {
        if let Some(engine) = self.engine() {
            engine.notify_listeners(self, &event);
        }
    }
}
