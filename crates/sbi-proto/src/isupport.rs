//! ISUPPORT (`RPL_ISUPPORT`, numeric 005) token handling.
//!
//! A 005 line carries the target nickname, a run of `KEY` / `KEY=VALUE`
//! tokens, and a trailing human readable text. Servers may split their
//! capability list across several 005 lines, so nothing here resets
//! previously learned values.

use crate::error::{ProtocolError, Result};
use crate::mode::UserModes;
use crate::rfc::{MAX_CHANMODES_LEN, RFC1459_PREFIX_MODES, RFC1459_PREFIX_SYMBOLS};

/// A single ISUPPORT key-value entry.
///
/// Represents a token from an ISUPPORT line, which can be either:
/// - A bare key (e.g., `EXCEPTS`) indicating a feature is supported
/// - A key=value pair (e.g., `NETWORK=Rizon`)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IsupportEntry<'a> {
    /// The token key (e.g., `NETWORK`, `CHANTYPES`).
    pub key: &'a str,
    /// The optional value (e.g., `Rizon` for `NETWORK=Rizon`).
    pub value: Option<&'a str>,
}

/// Parsed body of a 005 line.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IsupportLine<'a> {
    /// Tokens up to the trailing text.
    pub entries: Vec<IsupportEntry<'a>>,
    /// The trailing text (without its `:`), if present.
    pub trailing: Option<&'a str>,
}

impl<'a> IsupportLine<'a> {
    /// Parse the parameters of a 005 line, after the target nickname.
    ///
    /// ```
    /// use sbi_proto::isupport::IsupportLine;
    ///
    /// let line = IsupportLine::parse("CHANTYPES=# EXCEPTS :are supported by this server");
    /// assert_eq!(line.entries.len(), 2);
    /// assert_eq!(line.trailing, Some("are supported by this server"));
    /// ```
    pub fn parse(params: &'a str) -> Self {
        let mut entries = Vec::new();
        let mut rest = params;

        while !rest.is_empty() {
            if let Some(trailing) = rest.strip_prefix(':') {
                return Self {
                    entries,
                    trailing: Some(trailing),
                };
            }
            let (token, next) = rest.split_once(' ').unwrap_or((rest, ""));
            rest = next;
            if token.is_empty() {
                continue;
            }
            let (key, value) = match token.split_once('=') {
                Some((k, v)) => (k, Some(v)),
                None => (token, None),
            };
            entries.push(IsupportEntry { key, value });
        }

        Self {
            entries,
            trailing: None,
        }
    }

    /// Tokens rejoined with single spaces, as the server listed them.
    pub fn supported(&self) -> String {
        self.entries
            .iter()
            .map(|e| match e.value {
                Some(v) => format!("{}={}", e.key, v),
                None => e.key.to_string(),
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Numeric value of a token with C `atoi` semantics.
///
/// Leading digits are read; anything unparsable yields 0. Values larger
/// than `u16::MAX` saturate.
pub fn atoi(value: &str) -> u16 {
    let digits: &str = {
        let end = value
            .bytes()
            .position(|b| !b.is_ascii_digit())
            .unwrap_or(value.len());
        &value[..end]
    };
    if digits.is_empty() {
        return 0;
    }
    digits.parse::<u32>().map_or(u16::MAX, |n| {
        u16::try_from(n).unwrap_or(u16::MAX)
    })
}

/// Parsed `PREFIX` ISUPPORT token.
///
/// Maps channel user modes (like `o`, `v`) to their prefix symbols (`@`, `+`).
///
/// # Example
///
/// ```
/// use sbi_proto::isupport::PrefixSpec;
///
/// let spec = PrefixSpec::parse("(ov)@+").unwrap();
/// assert_eq!(spec.prefix_for_mode('o'), Some('@'));
/// assert_eq!(spec.mode_for_prefix('+'), Some('v'));
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PrefixSpec<'a> {
    /// Mode characters (e.g., `ov` for operator and voice).
    pub modes: &'a str,
    /// Prefix symbols (e.g., `@+` for `@` and `+`).
    pub prefixes: &'a str,
}

impl PrefixSpec<'static> {
    /// The RFC 1459 `(ov)@+` mapping, assumed until a server sends `PREFIX`.
    pub const RFC1459: Self = PrefixSpec {
        modes: RFC1459_PREFIX_MODES,
        prefixes: RFC1459_PREFIX_SYMBOLS,
    };
}

impl<'a> PrefixSpec<'a> {
    /// Parse a `PREFIX` value like `(ov)@+`.
    ///
    /// The value must open with `(`, close the mode list with `)`, and have
    /// both a non-empty mode list and a non-empty symbol list.
    pub fn parse(s: &'a str) -> Result<Self> {
        let invalid = || ProtocolError::InvalidPrefix(s.to_string());

        let inner = s.strip_prefix('(').ok_or_else(invalid)?;
        let (modes, prefixes) = inner.split_once(')').ok_or_else(invalid)?;
        if modes.is_empty() || prefixes.is_empty() {
            return Err(invalid());
        }
        Ok(PrefixSpec { modes, prefixes })
    }

    /// Returns true if the given character is a prefix mode on this server.
    #[inline]
    pub fn is_prefix_mode(&self, mode: char) -> bool {
        self.modes.contains(mode)
    }

    /// Returns the prefix symbol for a given mode character.
    ///
    /// For example, with `PREFIX=(qaohv)~&@%+`:
    /// - `prefix_for_mode('o')` returns `Some('@')`
    /// - `prefix_for_mode('x')` returns `None`
    #[inline]
    pub fn prefix_for_mode(&self, mode: char) -> Option<char> {
        self.modes
            .chars()
            .position(|c| c == mode)
            .and_then(|i| self.prefixes.chars().nth(i))
    }

    /// Returns the mode character for a given prefix symbol.
    #[inline]
    pub fn mode_for_prefix(&self, prefix: char) -> Option<char> {
        self.prefixes
            .chars()
            .position(|c| c == prefix)
            .and_then(|i| self.modes.chars().nth(i))
    }

    /// Privilege granted by a prefix mode letter, `None` if the server does
    /// not list `mode` as one.
    ///
    /// Conventional letters keep their meaning; any other listed letter is
    /// ranked by its symbol, or [`UserModes::UNKNOWN`] if that is
    /// unconventional too.
    pub fn privilege_for_mode(&self, mode: char) -> Option<UserModes> {
        let symbol = self.prefix_for_mode(mode)?;
        Some(UserModes::from_mode_char(mode).unwrap_or_else(|| UserModes::from_symbol(symbol)))
    }

    /// Privilege shown by a NAMES symbol, `None` if the server does not
    /// list `symbol`.
    pub fn privilege_for_symbol(&self, symbol: char) -> Option<UserModes> {
        let mode = self.mode_for_prefix(symbol)?;
        Some(UserModes::from_mode_char(mode).unwrap_or_else(|| UserModes::from_symbol(symbol)))
    }

    /// Symbol the server shows for `privilege`, if it lists one.
    pub fn symbol_for(&self, privilege: UserModes) -> Option<char> {
        self.prefixes
            .chars()
            .find(|&c| self.privilege_for_symbol(c) == Some(privilege))
    }
}

/// Parsed `CHANMODES` ISUPPORT token.
///
/// Channel modes are divided into four categories (A, B, C, D):
/// - **A**: List modes (e.g., `b` for ban)
/// - **B**: Modes with a parameter for both +/- (e.g., `k` for key)
/// - **C**: Modes with a parameter only for + (e.g., `l` for limit)
/// - **D**: Modes without parameters (e.g., `n` for no external messages)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChanModes<'a> {
    /// Type A: List modes (always have a parameter).
    pub a: &'a str,
    /// Type B: Modes that always require a parameter.
    pub b: &'a str,
    /// Type C: Modes that require a parameter when set.
    pub c: &'a str,
    /// Type D: Modes that never have a parameter.
    pub d: &'a str,
    /// Number of classes listed beyond the four known ones.
    pub extra: usize,
}

impl<'a> ChanModes<'a> {
    /// Parse a `CHANMODES` value like `b,k,l,imnpst`.
    ///
    /// Rejects values longer than 55 characters (`a-z`, `A-Z` and three
    /// commas) and values that list no modes at all. Missing trailing
    /// classes are left empty.
    pub fn parse(s: &'a str) -> Result<Self> {
        if s.len() > MAX_CHANMODES_LEN {
            return Err(ProtocolError::InvalidChanModes(s.to_string()));
        }
        if s.chars().all(|c| c == ',') {
            return Err(ProtocolError::InvalidChanModes(s.to_string()));
        }

        let mut parts = s.split(',');
        let a = parts.next().unwrap_or("");
        let b = parts.next().unwrap_or("");
        let c = parts.next().unwrap_or("");
        let d = parts.next().unwrap_or("");
        let extra = parts.count();

        Ok(ChanModes { a, b, c, d, extra })
    }
}
