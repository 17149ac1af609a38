//! Error types for the protocol layer.
//!
//! The variants mirror the decision points of line decoding; the client
//! crate maps each one onto its own status taxonomy.

use thiserror::Error;

/// Convenience type alias for Results using [`ProtocolError`].
pub type Result<T, E = ProtocolError> = std::result::Result<T, E>;

/// Wire-level decoding errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ProtocolError {
    /// A required delimiter (space) was missing from the line.
    #[error("missing delimiter after {0}")]
    MissingDelimiter(&'static str),

    /// The command/numeric token was empty.
    #[error("empty command")]
    EmptyCommand,

    /// A sender had `!` but no `@`.
    #[error("malformed sender: {0}")]
    MalformedSender(String),

    /// A line exceeded the protocol maximum.
    #[error("line too long: {actual} bytes (limit {limit})")]
    MessageTooLong {
        /// Observed length.
        actual: usize,
        /// Applicable limit.
        limit: usize,
    },

    /// A line was too short to carry anything meaningful.
    #[error("line too short: {0} bytes")]
    MessageTooShort(usize),

    /// A newline-terminated line did not end in CRLF.
    #[error("line not terminated by CRLF")]
    MissingCarriageReturn,

    /// A PREFIX token lacked its parenthesised mode list.
    #[error("malformed PREFIX token: {0}")]
    InvalidPrefix(String),

    /// A CHANMODES token was malformed.
    #[error("malformed CHANMODES token: {0}")]
    InvalidChanModes(String),

    /// The underlying sink failed while encoding.
    #[error("i/o error: {0}")]
    Io(String),
}

impl From<std::io::Error> for ProtocolError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
