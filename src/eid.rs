//! Entity identifiers.
//!
//! Saved entities are keyed by a short alphabetic code derived from a
//! per-class sequence: `a`, `b`, ..., `z`, `aa`, `ab`, ... The code is a
//! display convenience; uniqueness comes from the sequence never being
//! rewound.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of an entity within its class.
///
/// Once assigned, an `Eid` never changes.
///
/// # Examples
///
/// ```
/// use storekeep::Eid;
///
/// assert_eq!(Eid::from_sequence(1).as_str(), "a");
/// assert_eq!(Eid::from_sequence(27).as_str(), "aa");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Eid(String);

impl Eid {
    /// Wraps an arbitrary key, as used by direct writes.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Returns the code for the `n`th allocation (1-based).
    ///
    /// Bijective base-26: 1 → `a`, 26 → `z`, 27 → `aa`, 702 → `zz`.
    /// `0` has no code and maps to the empty string.
    #[must_use]
    pub fn from_sequence(n: u64) -> Self {
        let mut n = n;
        let mut letters = Vec::new();
        while n > 0 {
            n -= 1;
            #[allow(clippy::cast_possible_truncation)]
            letters.push(b'a' + (n % 26) as u8);
            n /= 26;
        }
        letters.reverse();
        Self(String::from_utf8(letters).unwrap_or_default())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Eid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Eid {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl From<String> for Eid {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl AsRef<str> for Eid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
