//! CTCP (Client-to-Client Protocol) framing.
//!
//! CTCP requests ride inside PRIVMSG and NOTICE bodies, wrapped in `\x01`.
//!
//! # Reference
//! - CTCP specification: <https://modern.ircdocs.horse/ctcp.html>
//!
//! # Example
//!
//! ```
//! use sbi_proto::ctcp::{Ctcp, CtcpKind};
//!
//! let ctcp = Ctcp::parse("\x01ACTION waves hello\x01").unwrap();
//! assert_eq!(ctcp.kind, CtcpKind::Action);
//! assert_eq!(ctcp.params, Some("waves hello"));
//! assert_eq!(sbi_proto::ctcp::frame("VERSION sbi"), "\x01VERSION sbi\x01");
//! ```

/// The CTCP delimiter character (`\x01`).
pub const CTCP_DELIM: char = '\x01';

/// CTCP commands the client distinguishes.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum CtcpKind {
    /// ACTION, the `/me` command.
    Action,
    /// VERSION request or reply.
    Version,
    /// Anything else.
    Other(String),
}

impl CtcpKind {
    fn parse(name: &str) -> Self {
        match name.to_ascii_uppercase().as_str() {
            "ACTION" => Self::Action,
            "VERSION" => Self::Version,
            _ => Self::Other(name.to_owned()),
        }
    }
}

/// A parsed CTCP message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ctcp<'a> {
    /// The CTCP command.
    pub kind: CtcpKind,
    /// Text after the command, if any.
    pub params: Option<&'a str>,
}

impl<'a> Ctcp<'a> {
    /// Parse a CTCP body. The closing delimiter is optional.
    ///
    /// Returns `None` if `text` is not CTCP framed or is empty inside the
    /// frame.
    pub fn parse(text: &'a str) -> Option<Self> {
        let text = text.strip_prefix(CTCP_DELIM)?;
        let text = text.strip_suffix(CTCP_DELIM).unwrap_or(text);

        if text.is_empty() {
            return None;
        }

        let (command, params) = match text.split_once(' ') {
            Some((command, params)) if !params.is_empty() => (command, Some(params)),
            Some((command, _)) => (command, None),
            None => (text, None),
        };

        Some(Self {
            kind: CtcpKind::parse(command),
            params,
        })
    }

    /// Check if a message body is CTCP framed.
    #[inline]
    pub fn is_ctcp(text: &str) -> bool {
        text.starts_with(CTCP_DELIM)
    }
}

/// Wrap `body` in CTCP delimiters.
pub fn frame(body: &str) -> String {
    format!("{CTCP_DELIM}{body}{CTCP_DELIM}")
}
