//! Handler context.
//!
//! Defines the `Context<'a>` passed to every numeric and command handler:
//! the engine, the connection the line arrived on, and the three parts of
//! the decoded line.

use std::sync::Arc;

use sbi_proto::{Sender, split_sender};

use crate::connection::IrcConnection;
use crate::engine::IrcEngine;
use crate::error::{IrcResult, IrcStatus};
use crate::listener::IrcEvent;
use crate::state::{IrcChannel, IrcNetwork, IrcUser};

/// Everything a handler may touch while processing one line.
pub struct Context<'a> {
    pub engine: &'a IrcEngine,
    pub conn: &'a Arc<IrcConnection>,
    /// Originator, leading `:` stripped.
    pub sender: &'a str,
    pub code: &'a str,
    pub data: &'a str,
}

impl<'a> Context<'a> {
    pub fn new(
        engine: &'a IrcEngine,
        conn: &'a Arc<IrcConnection>,
        sender: &'a str,
        code: &'a str,
        data: &'a str,
    ) -> Self {
        Self {
            engine,
            conn,
            sender,
            code,
            data,
        }
    }

    /// The network this connection belongs to.
    pub fn network(&self) -> IrcResult<Arc<IrcNetwork>> {
        self.conn.network().ok_or(IrcStatus::NoOwner)
    }

    /// Split the sender into nickname, ident and hostmask.
    pub fn instigator(&self) -> IrcResult<Sender> {
        Ok(split_sender(self.sender)?)
    }

    /// True if `nickname` is the local client, under the server's case
    /// mapping.
    pub fn is_self(&self, nickname: &str) -> IrcResult<bool> {
        Ok(self.network()?.is_own_nick(nickname))
    }

    /// A channel this connection tracks.
    pub fn tracked_channel(&self, name: &str) -> IrcResult<Arc<IrcChannel>> {
        self.conn
            .get_channel(name)
            .ok_or_else(|| IrcStatus::not_found(name))
    }

    pub fn notify(&self, event: IrcEvent) {
        self.engine.notify_listeners(self.conn, &event);
    }

    /// Return users to the engine's pool.
    pub fn free_users(&self, users: Vec<Arc<IrcUser>>) {
        if !users.is_empty() {
            self.engine.factory().free_users(users);
        }
    }
}
