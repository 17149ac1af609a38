//! Channel member modes and channel flags.
//!
//! Member privileges are tracked as a small bitmask rather than a mode
//! string, so a nicklist can be ordered and authorisation checked with a
//! single comparison.
//!
//! # Reference
//! - RFC 2812 Section 3.2.3 (Channel Modes)

use std::fmt;

use bitflags::bitflags;

bitflags! {
    /// Privilege bitmask of one user within one channel.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub struct UserModes: u8 {
        /// No privileges.
        const NONE = 0x00;
        /// `+v`
        const VOICE = 0x01;
        /// `+h`
        const HALF_OP = 0x02;
        /// `+o`
        const OP = 0x04;
        /// `+a`
        const ADMIN = 0x08;
        /// `+q`
        const OWNER = 0x10;
        /// A prefix symbol this client has no name for.
        const UNKNOWN = 0xFF;
    }
}

impl UserModes {
    /// Highest single privilege held, ignoring the unknown marker.
    pub fn highest(self) -> Self {
        if self == Self::UNKNOWN {
            return Self::NONE;
        }
        [Self::OWNER, Self::ADMIN, Self::OP, Self::HALF_OP, Self::VOICE]
            .into_iter()
            .find(|m| self.contains(*m))
            .unwrap_or(Self::NONE)
    }

    /// Map a NAMES prefix symbol to its conventional privilege.
    ///
    /// `+` voice, `%` halfop, `@` op, `&` admin, `~` owner; anything else
    /// is [`UserModes::UNKNOWN`].
    pub fn from_symbol(symbol: char) -> Self {
        match symbol {
            '+' => Self::VOICE,
            '%' => Self::HALF_OP,
            '@' => Self::OP,
            '&' => Self::ADMIN,
            '~' => Self::OWNER,
            _ => Self::UNKNOWN,
        }
    }

    /// Map a privilege mode letter to its conventional privilege.
    ///
    /// Only the `v`, `h`, `o`, `a`, `q` letters are recognised. Whether a
    /// letter is a privilege at all is the server's call, see
    /// [`PrefixSpec`](crate::isupport::PrefixSpec).
    pub fn from_mode_char(mode: char) -> Option<Self> {
        match mode {
            'v' => Some(Self::VOICE),
            'h' => Some(Self::HALF_OP),
            'o' => Some(Self::OP),
            'a' => Some(Self::ADMIN),
            'q' => Some(Self::OWNER),
            _ => None,
        }
    }

    /// Apply a mode delta: erase, then add, then remove.
    ///
    /// Each step only runs when its mask is non-empty.
    pub fn apply(&mut self, update: &ModeUpdate) {
        if !update.erase_existing.is_empty() {
            self.remove(update.erase_existing);
        }
        if !update.to_add.is_empty() {
            self.insert(update.to_add);
        }
        if !update.to_remove.is_empty() {
            self.remove(update.to_remove);
        }
    }
}

/// A mode delta for one user.
///
/// `erase_existing` clears bits before the add and remove steps. Use
/// [`UserModes::UNKNOWN`] (all bits) to wipe every privilege.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ModeUpdate {
    /// Bits cleared first.
    pub erase_existing: UserModes,
    /// Bits set second.
    pub to_add: UserModes,
    /// Bits cleared last.
    pub to_remove: UserModes,
}

impl ModeUpdate {
    /// Grant `modes`.
    pub fn add(modes: UserModes) -> Self {
        Self {
            to_add: modes,
            ..Self::default()
        }
    }

    /// Revoke `modes`.
    pub fn remove(modes: UserModes) -> Self {
        Self {
            to_remove: modes,
            ..Self::default()
        }
    }
}

/// One entry of a parsed MODE change list, e.g. the `+o` of `+ov a b`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModeChange {
    /// `+` when true, `-` when false.
    pub is_set: bool,
    /// Whether this mode consumes an argument.
    pub has_data: bool,
    /// The mode letter.
    pub mode: char,
    /// The consumed argument, if any.
    pub data: Option<String>,
}

impl fmt::Display for ModeChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.is_set { '+' } else { '-' };
        match &self.data {
            Some(data) => write!(f, "{}{} {}", sign, self.mode, data),
            None => write!(f, "{}{}", sign, self.mode),
        }
    }
}

/// Split a `+ov-k` style change string into unresolved entries.
///
/// Entries carry no data yet; use `has_argument` to decide which of them
/// will consume an argument. Returns `None` if the string does not start
/// with `+` or `-`.
pub fn split_mode_changes(
    changes: &str,
    mut has_argument: impl FnMut(bool, char) -> bool,
) -> Option<Vec<ModeChange>> {
    let mut chars = changes.chars();
    let mut is_set = match chars.next()? {
        '+' => true,
        '-' => false,
        _ => return None,
    };

    let mut out = Vec::new();
    for c in chars {
        match c {
            '+' => is_set = true,
            '-' => is_set = false,
            mode => out.push(ModeChange {
                is_set,
                has_data: has_argument(is_set, mode),
                mode,
                data: None,
            }),
        }
    }
    Some(out)
}

bitflags! {
    /// Channel state flags.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct ChanFlags: u32 {
        /// Default channel state.
        const RAW = 0x0000_0000;
        /// The local client is a member of the channel.
        const ACTIVE = 0x0000_0001;
        /// `+l`
        const USERLIMIT = 0x0000_0010;
        /// `+k`
        const KEY = 0x0000_0020;
        /// `+p`
        const PRIVATE = 0x0000_0040;
        /// `+s`
        const SECRET = 0x0000_0080;
        /// `+t`
        const TOPIC_PROTECT = 0x0000_0100;
        /// `+n`
        const NO_MESSAGES = 0x0000_0200;
        /// `+i`
        const INVITE_ONLY = 0x0000_0400;
        /// `+m`
        const MODERATED = 0x0000_0800;
        /// Bandwidth saver.
        const BANDWIDTH_SAVE = 0x0000_1000;
        /// SSL-only channel.
        const SECURE_ONLY = 0x0000_2000;
        /// Moderated except for authenticated users.
        const MODERATE_UNREG = 0x0000_4000;
        /// Registered users only.
        const REGGED_ONLY = 0x0000_8000;
        /// IRC operators only.
        const IRC_OPS_ONLY = 0x0001_0000;
    }
}

impl ChanFlags {
    /// Flag for a conventional channel mode letter.
    pub fn from_mode_char(mode: char) -> Option<Self> {
        match mode {
            'l' => Some(Self::USERLIMIT),
            'k' => Some(Self::KEY),
            'p' => Some(Self::PRIVATE),
            's' => Some(Self::SECRET),
            't' => Some(Self::TOPIC_PROTECT),
            'n' => Some(Self::NO_MESSAGES),
            'i' => Some(Self::INVITE_ONLY),
            'm' => Some(Self::MODERATED),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_orders_erase_add_remove() {
        let mut m = UserModes::OP | UserModes::VOICE;
        m.apply(&ModeUpdate {
            erase_existing: UserModes::UNKNOWN,
            to_add: UserModes::VOICE | UserModes::HALF_OP,
            to_remove: UserModes::VOICE,
        });
        assert_eq!(m, UserModes::HALF_OP);
    }

    #[test]
    fn apply_skips_empty_masks() {
        let mut m = UserModes::OWNER;
        m.apply(&ModeUpdate::default());
        assert_eq!(m, UserModes::OWNER);
        m.apply(&ModeUpdate::add(UserModes::OP));
        assert!(m.contains(UserModes::OP));
        m.apply(&ModeUpdate::remove(UserModes::OWNER));
        assert_eq!(m, UserModes::OP);
    }

    #[test]
    fn symbols_and_letters() {
        assert_eq!(UserModes::from_symbol('@'), UserModes::OP);
        assert_eq!(UserModes::from_symbol('~'), UserModes::OWNER);
        assert_eq!(UserModes::from_symbol('!'), UserModes::UNKNOWN);
        assert_eq!(UserModes::from_mode_char('h'), Some(UserModes::HALF_OP));
        assert_eq!(UserModes::from_mode_char('b'), None);
    }

    #[test]
    fn highest_privilege() {
        assert_eq!((UserModes::VOICE | UserModes::OP).highest(), UserModes::OP);
        assert_eq!(UserModes::NONE.highest(), UserModes::NONE);
        assert_eq!(UserModes::UNKNOWN.highest(), UserModes::NONE);
    }

    #[test]
    fn split_changes_tracks_sign() {
        let changes = split_mode_changes("+o-v+l", |set, m| m != 'l' || set).unwrap();
        assert_eq!(changes.len(), 3);
        assert!(changes[0].is_set);
        assert!(!changes[1].is_set);
        assert_eq!(changes[1].mode, 'v');
        assert!(changes[2].has_data);
        assert!(split_mode_changes("o", |_, _| false).is_none());
    }

    #[test]
    fn chan_flags_insert_remove() {
        let mut f = ChanFlags::RAW;
        f.insert(ChanFlags::ACTIVE);
        f.insert(ChanFlags::MODERATED);
        assert!(f.contains(ChanFlags::ACTIVE));
        f.remove(ChanFlags::ACTIVE);
        assert!(!f.contains(ChanFlags::ACTIVE));
        assert_eq!(f.bits(), 0x800);
    }
}
