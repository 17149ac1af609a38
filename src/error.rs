//! Unified status handling for the IRC core.
//!
//! Every fallible operation in the crate returns [`IrcResult`]. The
//! variants are deliberately coarse: they describe which decision point
//! rejected the input, and the parser logs them with their
//! [`IrcStatus::error_code`] label before moving on to the next line.

use sbi_proto::ProtocolError;
use thiserror::Error;

// ============================================================================
// Status codes
// ============================================================================

/// Failure (or loop-control) outcome of an IRC core operation.
///
/// Success is `Ok(())`; nothing here represents "OK".
#[derive(Debug, Error)]
pub enum IrcStatus {
    // --- parameter errors -------------------------------------------------
    #[error("missing parameter: {0}")]
    MissingParameter(&'static str),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("invalid data: {0}")]
    InvalidData(String),

    // --- lookup failures --------------------------------------------------
    #[error("object not found: {0}")]
    ObjectNotFound(String),

    #[error("nickname {0} is not the client")]
    NickIsNotClient(String),

    #[error("name lookup failed for {0}")]
    LookupFailed(String),

    // --- structural / sequencing ------------------------------------------
    #[error("invalid state: {0}")]
    InvalidState(&'static str),

    #[error("parsing error: {0}")]
    ParsingError(String),

    #[error("unknown response: {0}")]
    UnknownResponse(String),

    #[error("server closed the connection: {0}")]
    ServerClosed(String),

    #[error("object has no owner")]
    NoOwner,

    // --- resource errors --------------------------------------------------
    #[error("failed to add object: {0}")]
    ObjectAddError(String),

    #[error("failed to free object: {0}")]
    ObjectFreeError(String),

    #[error("limit exceeded: {0}")]
    LimitExceeded(String),

    // --- OS / transport ---------------------------------------------------
    #[error("os error: {0}")]
    Os(#[from] std::io::Error),

    #[error("tls error: {0}")]
    Tls(String),

    // --- loop-control sentinels -------------------------------------------
    #[error("queue empty")]
    QueueEmpty,

    #[error("no more nicknames to try")]
    NoMoreNicks,
}

impl IrcStatus {
    /// Get a static error code string for log labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::MissingParameter(_) => "missing_parameter",
            Self::InvalidParameter(_) => "invalid_parameter",
            Self::InvalidData(_) => "invalid_data",
            Self::ObjectNotFound(_) => "object_not_found",
            Self::NickIsNotClient(_) => "nick_is_not_client",
            Self::LookupFailed(_) => "lookup_failed",
            Self::InvalidState(_) => "invalid_state",
            Self::ParsingError(_) => "parsing_error",
            Self::UnknownResponse(_) => "unknown_response",
            Self::ServerClosed(_) => "server_closed",
            Self::NoOwner => "no_owner",
            Self::ObjectAddError(_) => "object_add_error",
            Self::ObjectFreeError(_) => "object_free_error",
            Self::LimitExceeded(_) => "limit_exceeded",
            Self::Os(_) => "os_error",
            Self::Tls(_) => "tls_error",
            Self::QueueEmpty => "queue_empty",
            Self::NoMoreNicks => "no_more_nicks",
        }
    }

    /// True for values that steer a loop rather than report a failure.
    #[inline]
    pub fn is_sentinel(&self) -> bool {
        matches!(self, Self::QueueEmpty | Self::NoMoreNicks)
    }

    pub(crate) fn not_found(what: impl Into<String>) -> Self {
        Self::ObjectNotFound(what.into())
    }

    pub(crate) fn invalid(what: impl Into<String>) -> Self {
        Self::InvalidData(what.into())
    }
}

impl PartialEq for IrcStatus {
    /// Statuses compare by kind; payloads are diagnostic only.
    fn eq(&self, other: &Self) -> bool {
        self.error_code() == other.error_code()
    }
}

impl From<ProtocolError> for IrcStatus {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::MissingDelimiter(_) | ProtocolError::EmptyCommand => {
                Self::InvalidParameter(err.to_string())
            }
            ProtocolError::MalformedSender(_) => Self::ParsingError(err.to_string()),
            ProtocolError::Io(msg) => Self::Os(std::io::Error::other(msg)),
            _ => Self::InvalidData(err.to_string()),
        }
    }
}

impl From<tokio_rustls::rustls::Error> for IrcStatus {
    fn from(err: tokio_rustls::rustls::Error) -> Self {
        Self::Tls(err.to_string())
    }
}

/// Result type for IRC core operations.
pub type IrcResult<T = ()> = Result<T, IrcStatus>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_errors_map_to_statuses() {
        let s: IrcStatus = ProtocolError::MissingDelimiter("sender").into();
        assert_eq!(s.error_code(), "invalid_parameter");

        let s: IrcStatus = ProtocolError::MalformedSender("a!b".into()).into();
        assert_eq!(s.error_code(), "parsing_error");

        let s: IrcStatus = ProtocolError::InvalidPrefix("ov".into()).into();
        assert_eq!(s.error_code(), "invalid_data");
    }

    #[test]
    fn equality_ignores_payload() {
        assert_eq!(
            IrcStatus::ObjectNotFound("#a".into()),
            IrcStatus::ObjectNotFound("#b".into())
        );
        assert_ne!(IrcStatus::QueueEmpty, IrcStatus::NoMoreNicks);
    }

    #[test]
    fn sentinels() {
        assert!(IrcStatus::QueueEmpty.is_sentinel());
        assert!(IrcStatus::NoMoreNicks.is_sentinel());
        assert!(!IrcStatus::ServerClosed(String::new()).is_sentinel());
    }
}
