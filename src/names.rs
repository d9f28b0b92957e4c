//! Display name management and validation
//!
//! This module validates the display names participants choose when they join
//! a match. Names are trimmed, length-limited, filtered for inappropriate
//! content and kept unique within a match (case-insensitively). Matches can
//! instead hand out generated names.

use std::collections::{HashMap, hash_map::Entry};

use heck::ToTitleCase;
use rustrict::CensorStr;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    constants::names::{MAX_GENERATION_ATTEMPTS, MAX_LENGTH},
    roster::Id,
};

/// How generated display names are built
///
/// The count is the number of words in the name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, garde::Validate)]
pub enum NameStyle {
    /// Latin names such as "Gaius Julius", with an optional third word
    Roman(#[garde(range(min = 2, max = 3))] usize),
    /// Adjectives followed by an animal, such as "Brave Otter"
    Petname(#[garde(range(min = 2, max = 3))] usize),
}

impl Default for NameStyle {
    fn default() -> Self {
        Self::Petname(2)
    }
}

impl NameStyle {
    /// Draws one random name in this style, title-cased
    pub fn generate(&self) -> String {
        let raw = match *self {
            Self::Roman(words) => romanname::romanname(romanname::NameConfig {
                praenomen: words > 2,
            }),
            Self::Petname(words) => {
                let words = u8::try_from(words).unwrap_or(2);
                petname::petname(words, " ").unwrap_or_default()
            }
        };
        raw.to_title_case()
    }
}

/// Why a display name was refused
#[derive(Error, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Another participant of the match already uses the name
    #[error("display name is taken")]
    Used,
    /// The participant was named before
    #[error("participant already has a display name")]
    Assigned,
    /// Nothing is left after trimming
    #[error("display name is blank")]
    Empty,
    /// The profanity filter flagged the name
    #[error("display name is not allowed")]
    Sinful,
    /// Longer than `MAX_LENGTH` characters
    #[error("display name is too long")]
    TooLong,
}

/// Display names held by the participants of one match
#[derive(Debug, Default, Clone)]
pub struct Names {
    by_participant: HashMap<Id, String>,
    /// Lower-cased names in use
    taken: HashMap<String, Id>,
}

impl Names {
    /// The display name of a participant, if they have one
    pub fn get_name(&self, id: &Id) -> Option<&str> {
        self.by_participant.get(id).map(String::as_str)
    }

    /// Validates a requested name and records it for the participant
    ///
    /// Surrounding whitespace is dropped before any check.
    ///
    /// # Returns
    ///
    /// The name as it will be displayed
    ///
    /// # Errors
    ///
    /// * `Error::Empty` - The name is blank
    /// * `Error::TooLong` - The trimmed name exceeds `MAX_LENGTH` characters
    /// * `Error::Sinful` - The profanity filter rejected the name
    /// * `Error::Assigned` - The participant is already named
    /// * `Error::Used` - The name is taken, ignoring case
    pub fn set_name(&mut self, id: Id, name: &str) -> Result<String, Error> {
        let name = rustrict::trim_whitespace(name);
        if name.is_empty() {
            return Err(Error::Empty);
        }
        if name.chars().count() > MAX_LENGTH {
            return Err(Error::TooLong);
        }
        if name.is_inappropriate() {
            return Err(Error::Sinful);
        }
        if self.by_participant.contains_key(&id) {
            return Err(Error::Assigned);
        }

        let Entry::Vacant(slot) = self.taken.entry(name.to_lowercase()) else {
            return Err(Error::Used);
        };
        slot.insert(id);
        self.by_participant.insert(id, name.to_owned());
        Ok(name.to_owned())
    }

    /// Assigns a generated name in the given style
    ///
    /// Unusable draws are retried. After `MAX_GENERATION_ATTEMPTS` failed
    /// draws the participant is numbered instead, as "Player 7".
    ///
    /// # Errors
    ///
    /// Returns `Error::Assigned` if the participant is already named.
    pub fn generate_name(&mut self, id: Id, style: NameStyle) -> Result<String, Error> {
        if self.by_participant.contains_key(&id) {
            return Err(Error::Assigned);
        }

        for _ in 0..MAX_GENERATION_ATTEMPTS {
            if let Ok(name) = self.set_name(id, &style.generate()) {
                return Ok(name);
            }
        }

        let mut number = self.taken.len() + 1;
        loop {
            match self.set_name(id, &format!("Player {number}")) {
                Err(Error::Used) => number += 1,
                result => return result,
            }
        }
    }

    /// Frees a participant's name for reuse
    ///
    /// # Returns
    ///
    /// The freed name, if the participant had one
    pub fn remove(&mut self, id: &Id) -> Option<String> {
        let name = self.by_participant.remove(id)?;
        self.taken.remove(&name.to_lowercase());
        Some(name)
    }
}
