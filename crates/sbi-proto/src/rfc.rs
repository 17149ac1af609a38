//! Protocol constants from RFC 1459 and RFC 2812.
//!
//! Values prefixed `RFC1459_` are the fallbacks applied while a server has
//! not yet advertised its own limits through ISUPPORT.

/// Maximum length of a message body, excluding the terminating CRLF.
pub const MAX_BUF_IRC_MSG: usize = 511;

/// Maximum length of a message including the terminating CRLF.
pub const MAX_BUF_IRC_MSG_CRLF: usize = 513;

/// Default case mapping.
pub const RFC1459_CASEMAPPING: &str = "rfc1459";

/// Default maximum channel name length.
pub const RFC1459_CHANNEL_LEN: u32 = 200;

/// Default channel type prefixes.
pub const RFC1459_CHAN_TYPES: &str = "#&";

/// Default number of mode changes with parameters per MODE command.
pub const RFC1459_MODES: u32 = 3;

/// Default maximum nickname length.
pub const RFC1459_NICK_LEN: u32 = 9;

/// Default privilege mode letters, the `(ov)` half of `(ov)@+`.
pub const RFC1459_PREFIX_MODES: &str = "ov";

/// Default privilege symbols, the `@+` half of `(ov)@+`.
pub const RFC1459_PREFIX_SYMBOLS: &str = "@+";

/// Longest CHANMODES value accepted from a server.
pub const MAX_CHANMODES_LEN: usize = 55;
