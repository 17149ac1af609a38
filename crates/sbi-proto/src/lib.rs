//! # sbi-proto
//!
//! Wire-level building blocks for the Social Bot Interface IRC client.
//!
//! Everything in this crate is sans-IO: it turns bytes and lines into
//! structured values and back, but never touches a socket. The root
//! `sbi-irc` crate layers connections, state tracking and the parser task
//! on top of it.
//!
//! ## Features
//!
//! - Line decomposition into sender, code and data ([`message`])
//! - Positional RFC parameter splitting with skip slots
//! - `nick!ident@host` sender splitting ([`prefix`])
//! - ISUPPORT (005) token handling, `PREFIX` and `CHANMODES` ([`isupport`])
//! - `CASEMAPPING`-aware nickname comparison ([`casemap`])
//! - User mode bitmasks and channel flags ([`mode`])
//! - CTCP framing ([`ctcp`])
//! - Byte-stream reassembly and an outgoing line codec ([`line`])
//!
//! ## Quick Start
//!
//! ```rust
//! use sbi_proto::message::{extract_irc_buf_data, parse_parameters};
//! use sbi_proto::prefix::split_sender;
//!
//! let line = ":nick!user@host PRIVMSG #rust :Hello, world!";
//! let raw = extract_irc_buf_data(line).unwrap();
//! assert_eq!(raw.code, "PRIVMSG");
//!
//! let sender = split_sender(raw.sender).unwrap();
//! assert_eq!(sender.nickname, "nick");
//!
//! let params = parse_parameters(raw.data, &[true, true]);
//! assert_eq!(params[0], Some("#rust"));
//! assert_eq!(params[1], Some("Hello, world!"));
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod casemap;
pub mod ctcp;
pub mod error;
pub mod isupport;
#[cfg(feature = "tokio")]
pub mod line;
pub mod message;
pub mod mode;
pub mod prefix;
pub mod rfc;

pub use self::casemap::CaseMapping;
pub use self::error::ProtocolError;
pub use self::isupport::{ChanModes, PrefixSpec};
pub use self::message::{extract_irc_buf_data, parse_parameters, RawLine};
pub use self::mode::{ChanFlags, ModeChange, ModeUpdate, UserModes};
pub use self::prefix::{split_sender, Sender};
