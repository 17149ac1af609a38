//! Channel member state.

use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use sbi_proto::{ModeUpdate, PrefixSpec, UserModes};

use super::channel::IrcChannel;

#[derive(Debug, Default)]
struct UserInner {
    nickname: String,
    ident: String,
    hostmask: String,
    modes: UserModes,
}

/// One nickname within one channel.
///
/// The same person in two channels is two `IrcUser`s; each carries the
/// privileges it holds in its own channel.
#[derive(Debug)]
pub struct IrcUser {
    channel: Weak<IrcChannel>,
    inner: RwLock<UserInner>,
}

impl IrcUser {
    pub(crate) fn new(
        channel: Weak<IrcChannel>,
        nickname: &str,
        ident: &str,
        hostmask: &str,
    ) -> Self {
        Self {
            channel,
            inner: RwLock::new(UserInner {
                nickname: nickname.to_string(),
                ident: ident.to_string(),
                hostmask: hostmask.to_string(),
                modes: UserModes::NONE,
            }),
        }
    }

    pub fn nickname(&self) -> String {
        self.inner.read().nickname.clone()
    }

    pub fn ident(&self) -> String {
        self.inner.read().ident.clone()
    }

    pub fn hostmask(&self) -> String {
        self.inner.read().hostmask.clone()
    }

    pub fn modes(&self) -> UserModes {
        self.inner.read().modes
    }

    /// Case-insensitive nickname comparison.
    pub fn is(&self, nickname: &str) -> bool {
        self.inner.read().nickname.eq_ignore_ascii_case(nickname)
    }

    /// The channel this user belongs to, if it still exists.
    pub fn owner(&self) -> Option<Arc<IrcChannel>> {
        self.channel.upgrade()
    }

    /// Update any subset of identity fields and apply a mode delta.
    ///
    /// `None` leaves the corresponding field untouched.
    pub fn update(
        &self,
        nickname: Option<&str>,
        ident: Option<&str>,
        hostmask: Option<&str>,
        modes: Option<&ModeUpdate>,
    ) {
        let mut inner = self.inner.write();
        if let Some(n) = nickname {
            inner.nickname = n.to_string();
        }
        if let Some(i) = ident {
            inner.ident = i.to_string();
        }
        if let Some(h) = hostmask {
            inner.hostmask = h.to_string();
        }
        if let Some(update) = modes {
            inner.modes.apply(update);
        }
    }

    /// Nickname prefixed with the symbol of the highest privilege held.
    ///
    /// Privileges `prefix` has no symbol for are passed over in favour of
    /// the next one down.
    pub fn display_name(&self, prefix: &PrefixSpec<'_>) -> String {
        let inner = self.inner.read();
        let symbol = [
            UserModes::OWNER,
            UserModes::ADMIN,
            UserModes::OP,
            UserModes::HALF_OP,
            UserModes::VOICE,
        ]
        .into_iter()
        .filter(|m| inner.modes != UserModes::UNKNOWN && inner.modes.contains(*m))
        .find_map(|m| prefix.symbol_for(m));

        match symbol {
            Some(c) => format!("{}{}", c, inner.nickname),
            None => inner.nickname.clone(),
        }
    }
}
