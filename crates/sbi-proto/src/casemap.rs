//! Nickname comparison under the server's `CASEMAPPING`.
//!
//! Besides ASCII letters, `rfc1459` treats `[]\~` as the upper case of
//! `{}|^`. `strict-rfc1459` leaves `~` and `^` apart, and `ascii` folds
//! letters only.

/// A `CASEMAPPING` ISUPPORT value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CaseMapping {
    /// `ascii`
    Ascii,
    /// `rfc1459`
    #[default]
    Rfc1459,
    /// `strict-rfc1459`
    StrictRfc1459,
}

impl CaseMapping {
    /// Mapping named by a token value. Unknown names fold like `rfc1459`.
    pub fn from_token(value: &str) -> Self {
        match value {
            "ascii" => Self::Ascii,
            "strict-rfc1459" => Self::StrictRfc1459,
            _ => Self::Rfc1459,
        }
    }

    /// Lower case of one character.
    #[inline]
    pub const fn lower(self, c: char) -> char {
        match (self, c) {
            (_, 'A'..='Z') => c.to_ascii_lowercase(),
            (Self::Ascii, _) => c,
            (_, '[') => '{',
            (_, ']') => '}',
            (_, '\\') => '|',
            (Self::Rfc1459, '~') => '^',
            _ => c,
        }
    }

    /// Case-insensitive equality of two nicknames or channel names.
    pub fn equals(self, a: &str, b: &str) -> bool {
        a.len() == b.len()
            && a
                .chars()
                .zip(b.chars())
                .all(|(x, y)| self.lower(x) == self.lower(y))
    }
}
