//! Raw line decomposition.
//!
//! A server line has the shape `[:]sender code data`. [`extract_irc_buf_data`]
//! splits it into a borrowed [`RawLine`]; [`parse_parameters`] then splits
//! `data` positionally the way RFC 1459 parameters are laid out.
//!
//! # Reference
//! - RFC 1459 Section 2.3.1: Message format in pseudo-BNF

use smallvec::SmallVec;

use crate::error::{ProtocolError, Result};

/// Positional parameters extracted from a line's data section.
pub type Params<'a> = SmallVec<[Option<&'a str>; 4]>;

/// A received line split into its three top-level parts.
///
/// All fields borrow from the original line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RawLine<'a> {
    /// Originator, with the leading `:` stripped.
    pub sender: &'a str,
    /// Three-digit numeric or text command.
    pub code: &'a str,
    /// Everything after the code.
    pub data: &'a str,
}

impl<'a> RawLine<'a> {
    /// Numeric value of the code, if it is a numeric in `1..=999`.
    pub fn numeric(&self) -> Option<u16> {
        // atoi semantics: leading digits only
        let digits = self
            .code
            .bytes()
            .take_while(|b| b.is_ascii_digit())
            .count();
        if digits == 0 {
            return None;
        }
        match self.code[..digits].parse::<u16>() {
            Ok(n) if n > 0 && n < 1000 => Some(n),
            _ => None,
        }
    }
}

/// Split a raw line into sender, code and data.
///
/// Fails if the sender or the code is not followed by a space, or if the
/// code is empty.
///
/// # Example
///
/// ```
/// use sbi_proto::message::extract_irc_buf_data;
///
/// let raw = extract_irc_buf_data(":irc.example.org 001 trez :Welcome").unwrap();
/// assert_eq!(raw.sender, "irc.example.org");
/// assert_eq!(raw.code, "001");
/// assert_eq!(raw.data, "trez :Welcome");
/// ```
pub fn extract_irc_buf_data(line: &str) -> Result<RawLine<'_>> {
    let rest = line.strip_prefix(':').unwrap_or(line);

    let (sender, rest) = rest
        .split_once(' ')
        .ok_or(ProtocolError::MissingDelimiter("sender"))?;
    let (code, data) = rest
        .split_once(' ')
        .ok_or(ProtocolError::MissingDelimiter("code"))?;

    if code.is_empty() {
        return Err(ProtocolError::EmptyCommand);
    }

    Ok(RawLine { sender, code, data })
}

/// Take one parameter off the front of `data`, advancing it.
///
/// A parameter starting with `:` is the trailing parameter and consumes the
/// rest of the buffer.
fn next_param<'a>(data: &mut &'a str) -> &'a str {
    if let Some(trailing) = data.strip_prefix(':') {
        *data = "";
        return trailing;
    }
    match data.split_once(' ') {
        Some((param, rest)) => {
            *data = rest;
            param
        }
        None => {
            let param = *data;
            *data = "";
            param
        }
    }
}

/// Split `data` into `wanted.len()` positional parameters.
///
/// The last requested parameter receives the remainder of the buffer
/// verbatim, minus a leading `:`. A `false` entry in `wanted` consumes its
/// token but yields `None` in that slot. Parameters missing from the buffer
/// come back as empty strings.
///
/// ```
/// use sbi_proto::message::parse_parameters;
///
/// let params = parse_parameters("trez #test :hello there", &[false, true, true]);
/// assert_eq!(params.as_slice(), &[None, Some("#test"), Some("hello there")]);
/// ```
pub fn parse_parameters<'a>(data: &'a str, wanted: &[bool]) -> Params<'a> {
    let mut cursor = data;
    let mut out = Params::with_capacity(wanted.len());

    for (idx, keep) in wanted.iter().enumerate() {
        let value = if idx + 1 == wanted.len() {
            let last = cursor.strip_prefix(':').unwrap_or(cursor);
            cursor = "";
            last
        } else {
            next_param(&mut cursor)
        };
        out.push(keep.then_some(value));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_numeric() {
        let raw = extract_irc_buf_data(":irc.example.org 005 trez CHANTYPES=# :are supported")
            .unwrap();
        assert_eq!(raw.sender, "irc.example.org");
        assert_eq!(raw.code, "005");
        assert_eq!(raw.data, "trez CHANTYPES=# :are supported");
        assert_eq!(raw.numeric(), Some(5));
    }

    #[test]
    fn test_extract_without_colon_prefix() {
        let raw = extract_irc_buf_data("nick!i@h JOIN :#test").unwrap();
        assert_eq!(raw.sender, "nick!i@h");
        assert_eq!(raw.code, "JOIN");
        assert_eq!(raw.numeric(), None);
    }

    #[test]
    fn test_extract_missing_delimiters() {
        assert_eq!(
            extract_irc_buf_data(":lonely"),
            Err(ProtocolError::MissingDelimiter("sender"))
        );
        assert_eq!(
            extract_irc_buf_data(":server CODE"),
            Err(ProtocolError::MissingDelimiter("code"))
        );
        assert_eq!(
            extract_irc_buf_data(":server  data"),
            Err(ProtocolError::EmptyCommand)
        );
    }

    #[test]
    fn test_numeric_bounds() {
        let raw = RawLine {
            sender: "s",
            code: "000",
            data: "",
        };
        assert_eq!(raw.numeric(), None);
        let raw = RawLine {
            sender: "s",
            code: "1000",
            data: "",
        };
        assert_eq!(raw.numeric(), None);
        let raw = RawLine {
            sender: "s",
            code: "999",
            data: "",
        };
        assert_eq!(raw.numeric(), Some(999));
    }

    #[test]
    fn test_parse_parameters_trailing() {
        let params = parse_parameters("trez = #test :@op1 +voice1 plain1", &[true; 4]);
        assert_eq!(
            params.as_slice(),
            &[
                Some("trez"),
                Some("="),
                Some("#test"),
                Some("@op1 +voice1 plain1")
            ]
        );
    }

    #[test]
    fn test_parse_parameters_early_colon_swallows_rest() {
        let params = parse_parameters("#chan :the topic text here", &[true, true, true]);
        assert_eq!(
            params.as_slice(),
            &[Some("#chan"), Some("the topic text here"), Some("")]
        );
    }

    #[test]
    fn test_parse_parameters_skip_consumes_token() {
        let params = parse_parameters("a b c", &[false, false, true]);
        assert_eq!(params.as_slice(), &[None, None, Some("c")]);
    }

    #[test]
    fn test_parse_parameters_missing_tokens_are_empty() {
        let params = parse_parameters("only", &[true, true, true]);
        assert_eq!(params.as_slice(), &[Some("only"), Some(""), Some("")]);
    }
}
