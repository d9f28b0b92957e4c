//! Join code generation and parsing
//!
//! A join code is the short identifier participants type in to find a match.
//! Codes are drawn from an alphabet without look-alike characters (no `0`/`O`,
//! `1`/`I`) and are case-insensitive, so they are easy to read out loud.

use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::constants::join_code::{ALPHABET, LENGTH};

/// The identifier of a match, as typed in by participants
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JoinCode([u8; LENGTH]);

/// Errors that can occur when parsing a join code
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Error {
    /// The code does not have exactly the expected number of characters
    #[error("join code must be {LENGTH} characters long")]
    Length,
    /// The code contains a character outside the code alphabet
    #[error("join code contains an invalid character")]
    Character,
}

impl JoinCode {
    /// Creates a new random join code
    pub fn new() -> Self {
        let mut code = [0; LENGTH];
        for slot in &mut code {
            *slot = ALPHABET[fastrand::usize(..ALPHABET.len())];
        }
        Self(code)
    }

    /// The code as an upper-case string slice
    pub fn as_str(&self) -> &str {
        // Every byte comes from the ASCII alphabet.
        std::str::from_utf8(&self.0).unwrap_or_default()
    }
}

impl Default for JoinCode {
    /// Creates a new random join code (same as `new()`)
    fn default() -> Self {
        Self::new()
    }
}

impl Display for JoinCode {
    /// Formats the code in upper case
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JoinCode {
    type Err = Error;

    /// Parses a join code, ignoring case and surrounding whitespace
    ///
    /// # Errors
    ///
    /// Returns `Error::Length` if the trimmed input is not exactly the code
    /// length and `Error::Character` if any character is outside the alphabet.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.len() != LENGTH {
            return Err(Error::Length);
        }

        let mut code = [0; LENGTH];
        for (slot, byte) in code.iter_mut().zip(s.bytes()) {
            let byte = byte.to_ascii_uppercase();
            if !ALPHABET.contains(&byte) {
                return Err(Error::Character);
            }
            *slot = byte;
        }

        Ok(Self(code))
    }
}

impl Serialize for JoinCode {
    /// Serializes the join code as an upper-case string
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for JoinCode {
    /// Deserializes a join code from a string in any case
    fn deserialize<D>(deserializer: D) -> Result<JoinCode, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        JoinCode::from_str(&s)
            .map_err(|e| serde::de::Error::custom(e.to_string()))
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_new_uses_alphabet() {
        for _ in 0..100 {
            let code = JoinCode::new();
            assert_eq!(code.as_str().len(), LENGTH);
            assert!(code.as_str().bytes().all(|b| ALPHABET.contains(&b)));
        }
    }

    #[test]
    fn test_alphabet_has_no_look_alikes() {
        for confusable in [b'0', b'O', b'1', b'I'] {
            assert!(!ALPHABET.contains(&confusable));
        }
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        let code = JoinCode::from_str("ab3xyz").unwrap();
        assert_eq!(code, JoinCode::from_str("AB3XYZ").unwrap());
        assert_eq!(code.to_string(), "AB3XYZ");
        assert_eq!(JoinCode::from_str("  ab3xyz\n").unwrap(), code);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(JoinCode::from_str("ABC"), Err(Error::Length));
        assert_eq!(JoinCode::from_str("ABCDEFG"), Err(Error::Length));
        assert_eq!(JoinCode::from_str(""), Err(Error::Length));
        assert_eq!(JoinCode::from_str("ABCDE0"), Err(Error::Character));
        assert_eq!(JoinCode::from_str("ABC-DE"), Err(Error::Character));
        assert_eq!(JoinCode::from_str("ABCDEé"), Err(Error::Length));
    }

    #[test]
    fn test_serialization() {
        let code = JoinCode::from_str("k7m2qa").unwrap();
        let serialized = serde_json::to_string(&code).unwrap();
        assert_eq!(serialized, "\"K7M2QA\"");

        let deserialized: JoinCode = serde_json::from_str("\"k7m2qa\"").unwrap();
        assert_eq!(deserialized, code);

        assert!(serde_json::from_str::<JoinCode>("123456").is_err());
        assert!(serde_json::from_str::<JoinCode>("\"K7M2Q0\"").is_err());
    }
}
