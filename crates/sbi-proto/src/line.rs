//! Byte-stream reassembly and the outgoing line codec.
//!
//! Reads off a socket arrive in arbitrary chunks. [`LineAssembler`] carries
//! an incomplete trailing fragment over to the next chunk and hands back only
//! whole CRLF-terminated lines. [`LineCodec`] is the write side: a
//! `tokio_util` encoder that puts CRLF-terminated lines on the wire.

use bytes::{BufMut, BytesMut};
use tokio_util::codec::Encoder;

use crate::error::{ProtocolError, Result};
use crate::rfc::{MAX_BUF_IRC_MSG, MAX_BUF_IRC_MSG_CRLF};

/// Reassembles CRLF-terminated lines from arbitrary read chunks.
#[derive(Debug, Default)]
pub struct LineAssembler {
    partial: BytesMut,
    /// Set while skipping the remainder of an oversized line.
    discarding: bool,
}

impl LineAssembler {
    /// Create an empty assembler.
    pub fn new() -> Self {
        Self::default()
    }

    /// True when a fragment is waiting for the rest of its line.
    pub fn has_partial(&self) -> bool {
        !self.partial.is_empty()
    }

    /// Feed one read's worth of bytes.
    ///
    /// Returns every line completed by this chunk, CRLF stripped, in wire
    /// order. A line terminated by a bare `\n` yields
    /// [`ProtocolError::MissingCarriageReturn`]; a fragment that outgrows the
    /// protocol maximum before its newline arrives yields
    /// [`ProtocolError::MessageTooLong`] once and is skipped.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Result<String>> {
        let mut out = Vec::new();
        self.partial.extend_from_slice(chunk);

        while let Some(pos) = self.partial.iter().position(|b| *b == b'\n') {
            let mut line = self.partial.split_to(pos + 1);
            if std::mem::take(&mut self.discarding) {
                continue;
            }
            line.truncate(pos);
            if line.last() != Some(&b'\r') {
                out.push(Err(ProtocolError::MissingCarriageReturn));
                continue;
            }
            line.truncate(pos - 1);
            out.push(Ok(String::from_utf8_lossy(&line).into_owned()));
        }

        if !self.discarding && self.partial.len() > MAX_BUF_IRC_MSG_CRLF {
            out.push(Err(ProtocolError::MessageTooLong {
                actual: self.partial.len(),
                limit: MAX_BUF_IRC_MSG_CRLF,
            }));
            self.discarding = true;
        }
        if self.discarding {
            self.partial.clear();
        }

        out
    }
}

/// Terminate `line` with CRLF, truncating it to the protocol maximum.
///
/// Returns the wire form and whether truncation happened. Truncation keeps
/// the line on a UTF-8 boundary and always ends it with CRLF.
pub fn terminate_line(line: &str) -> (String, bool) {
    let body = line.trim_end_matches(['\r', '\n']);
    if body.len() <= MAX_BUF_IRC_MSG {
        return (format!("{body}\r\n"), false);
    }

    let mut cut = MAX_BUF_IRC_MSG;
    while !body.is_char_boundary(cut) {
        cut -= 1;
    }
    (format!("{}\r\n", &body[..cut]), true)
}

/// Encoder for outgoing lines.
///
/// Items must already be CRLF terminated (see [`terminate_line`]); lines
/// longer than 513 bytes are refused.
#[derive(Debug, Default, Clone, Copy)]
pub struct LineCodec;

impl Encoder<String> for LineCodec {
    type Error = ProtocolError;

    fn encode(&mut self, msg: String, dst: &mut BytesMut) -> Result<()> {
        if msg.len() > MAX_BUF_IRC_MSG_CRLF {
            return Err(ProtocolError::MessageTooLong {
                actual: msg.len(),
                limit: MAX_BUF_IRC_MSG_CRLF,
            });
        }
        dst.reserve(msg.len());
        dst.put_slice(msg.as_bytes());
        Ok(())
    }
}
