//! Channel state.
//!
//! A channel keeps two member lists. The active list is what the client
//! believes the membership to be. The names list is scratch space filled by
//! a 353 burst and swapped into the active list on 366.

use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use sbi_proto::{ChanFlags, ModeUpdate, PrefixSpec, UserModes};

use crate::connection::IrcConnection;
use crate::error::{IrcResult, IrcStatus};

use super::user::IrcUser;

#[derive(Debug, Default)]
struct ChannelInner {
    topic: String,
    flags: ChanFlags,
    users: Vec<Arc<IrcUser>>,
    names: Vec<Arc<IrcUser>>,
    /// A 353 burst has started and not yet been closed by 366.
    names_pending: bool,
}

/// One joined or provisionally tracked channel on one connection.
#[derive(Debug)]
pub struct IrcChannel {
    connection: Weak<IrcConnection>,
    name: String,
    inner: RwLock<ChannelInner>,
}

impl IrcChannel {
    pub(crate) fn new(connection: Weak<IrcConnection>, name: &str) -> Self {
        Self {
            connection,
            name: name.to_string(),
            inner: RwLock::new(ChannelInner::default()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn topic(&self) -> String {
        self.inner.read().topic.clone()
    }

    pub fn update_topic(&self, topic: &str) {
        self.inner.write().topic = topic.to_string();
    }

    pub fn flags(&self) -> ChanFlags {
        self.inner.read().flags
    }

    pub fn set_flags(&self, flags: ChanFlags) {
        self.inner.write().flags = flags;
    }

    pub fn insert_flags(&self, flags: ChanFlags) {
        self.inner.write().flags.insert(flags);
    }

    pub fn remove_flags(&self, flags: ChanFlags) {
        self.inner.write().flags.remove(flags);
    }

    /// True while the local client is a member.
    pub fn is_active(&self) -> bool {
        self.inner.read().flags.contains(ChanFlags::ACTIVE)
    }

    /// The connection owning this channel, if it still exists.
    pub fn owner(&self) -> Option<Arc<IrcConnection>> {
        self.connection.upgrade()
    }

    /// Case-insensitive name comparison.
    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    // ========================================================================
    // Active member list
    // ========================================================================

    /// Snapshot of the active member nicknames.
    pub fn users(&self) -> Vec<String> {
        self.inner.read().users.iter().map(|u| u.nickname()).collect()
    }

    pub fn number_of_users(&self) -> usize {
        self.inner.read().users.len()
    }

    pub fn get_user(&self, nickname: &str) -> Option<Arc<IrcUser>> {
        self.inner
            .read()
            .users
            .iter()
            .find(|u| u.is(nickname))
            .cloned()
    }

    /// Add a member to the active list.
    pub fn add_user(&self, user: Arc<IrcUser>) -> IrcResult {
        let mut inner = self.inner.write();
        let nickname = user.nickname();
        if inner.users.iter().any(|u| u.is(&nickname)) {
            return Err(IrcStatus::ObjectAddError(format!(
                "{} already in {}",
                nickname, self.name
            )));
        }
        inner.users.push(user);
        Ok(())
    }

    /// Remove a member from the active list, handing it back for freeing.
    pub fn remove_user(&self, nickname: &str) -> Option<Arc<IrcUser>> {
        let mut inner = self.inner.write();
        let idx = inner.users.iter().position(|u| u.is(nickname))?;
        Some(inner.users.remove(idx))
    }

    /// Drop every active member, handing them back for freeing.
    pub fn erase_userlist(&self) -> Vec<Arc<IrcUser>> {
        std::mem::take(&mut self.inner.write().users)
    }

    /// Active members as the server would list them, e.g. `@alice`.
    pub fn nicklist(&self, prefix: &PrefixSpec<'_>) -> Vec<String> {
        self.inner
            .read()
            .users
            .iter()
            .map(|u| u.display_name(prefix))
            .collect()
    }

    /// True if `nickname` holds at least `minimum` privilege here.
    pub fn is_authorized(&self, nickname: &str, minimum: UserModes) -> bool {
        self.get_user(nickname)
            .is_some_and(|u| u.modes().highest() >= minimum)
    }

    // ========================================================================
    // NAMES burst
    // ========================================================================

    /// Record one member from a 353 line.
    ///
    /// The first call of a burst discards whatever an earlier, unfinished
    /// burst left behind; those users are returned for freeing.
    pub fn add_names_user(&self, user: Arc<IrcUser>, modes: Option<&ModeUpdate>) -> Vec<Arc<IrcUser>> {
        if modes.is_some() {
            user.update(None, None, None, modes);
        }

        let mut inner = self.inner.write();
        let stale = if inner.names_pending {
            Vec::new()
        } else {
            inner.names_pending = true;
            std::mem::take(&mut inner.names)
        };
        inner.names.push(user);
        stale
    }

    /// Replace the active list with the names list (366).
    ///
    /// Without a burst in progress this changes nothing; otherwise the
    /// replaced members are returned for freeing and the names list is left
    /// empty.
    pub fn populate_userlist(&self) -> Vec<Arc<IrcUser>> {
        let mut inner = self.inner.write();
        if !inner.names_pending {
            return Vec::new();
        }
        inner.names_pending = false;
        let names = std::mem::take(&mut inner.names);
        std::mem::replace(&mut inner.users, names)
    }

    /// Drop any unfinished NAMES burst.
    pub fn erase_nameslist(&self) -> Vec<Arc<IrcUser>> {
        let mut inner = self.inner.write();
        inner.names_pending = false;
        std::mem::take(&mut inner.names)
    }

    /// Number of members collected by the current burst.
    pub fn names_len(&self) -> usize {
        self.inner.read().names.len()
    }

    /// Reset to an untracked state (kicked or parted), handing back every
    /// member for freeing.
    pub fn cleanup(&self) -> Vec<Arc<IrcUser>> {
        self.inner.write().flags = ChanFlags::RAW;
        let mut out = self.erase_userlist();
        out.append(&mut self.erase_nameslist());
        out
    }
}
