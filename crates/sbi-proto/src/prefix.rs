//! Message sender handling.
//!
//! A sender is either a bare server name or a user's `nick!ident@host`
//! mask. Both are carried by [`Sender`]; a server only populates
//! `nickname`.
//!
//! # Reference
//! - RFC 2812 Section 2.3.1: Message format

use std::fmt;

use crate::error::{ProtocolError, Result};

/// Originator of a message.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Sender {
    /// Nickname, or server name for server-originated lines.
    pub nickname: String,
    /// Ident (username), empty for servers.
    pub ident: String,
    /// Hostmask, empty for servers.
    pub hostmask: String,
}

impl Sender {
    /// True when the sender carried no `!ident@host` part.
    pub fn is_server(&self) -> bool {
        self.ident.is_empty() && self.hostmask.is_empty()
    }
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_server() {
            f.write_str(&self.nickname)
        } else {
            write!(f, "{}!{}@{}", self.nickname, self.ident, self.hostmask)
        }
    }
}

/// Split `nick!ident@host` into its parts.
///
/// A sender without `!` is a bare server name. A sender with `!` but no
/// `@` is rejected.
///
/// ```
/// use sbi_proto::prefix::split_sender;
///
/// let s = split_sender("trez!tirc@host.example").unwrap();
/// assert_eq!((s.nickname.as_str(), s.ident.as_str(), s.hostmask.as_str()),
///            ("trez", "tirc", "host.example"));
///
/// let s = split_sender("irc.example.org").unwrap();
/// assert!(s.is_server());
/// ```
pub fn split_sender(sender: &str) -> Result<Sender> {
    let Some((nickname, rest)) = sender.split_once('!') else {
        return Ok(Sender {
            nickname: sender.to_string(),
            ..Sender::default()
        });
    };

    let (ident, hostmask) = rest
        .split_once('@')
        .ok_or_else(|| ProtocolError::MalformedSender(sender.to_string()))?;

    Ok(Sender {
        nickname: nickname.to_string(),
        ident: ident.to_string(),
        hostmask: hostmask.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_user() {
        let s = split_sender("op1!o@ops.example").unwrap();
        assert_eq!(s.nickname, "op1");
        assert_eq!(s.ident, "o");
        assert_eq!(s.hostmask, "ops.example");
        assert_eq!(s.to_string(), "op1!o@ops.example");
    }

    #[test]
    fn test_split_server() {
        let s = split_sender("irc.example.org").unwrap();
        assert_eq!(s.nickname, "irc.example.org");
        assert!(s.ident.is_empty());
        assert!(s.hostmask.is_empty());
        assert_eq!(s.to_string(), "irc.example.org");
    }

    #[test]
    fn test_split_missing_host() {
        assert!(matches!(
            split_sender("nick!ident"),
            Err(ProtocolError::MalformedSender(_))
        ));
    }

    #[test]
    fn test_split_host_containing_at() {
        // only the first '@' separates ident from host
        let s = split_sender("n!i@h@x").unwrap();
        assert_eq!(s.ident, "i");
        assert_eq!(s.hostmask, "h@x");
    }
}
