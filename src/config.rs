//! Match options
//!
//! Options are chosen by whoever creates a match and stay fixed for its whole
//! lifetime. They arrive as JSON (durations in milliseconds) and are validated
//! against the limits in [`crate::constants::game`] before a match is built.

use std::time::Duration;

use garde::Validate;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use thiserror::Error;

use crate::{constants::game, names::NameStyle};

/// Validates that a duration is a whole number of seconds within bounds.
///
/// # Generics
///
/// * `MIN_SECONDS` - The minimum allowed duration in seconds (inclusive).
/// * `MAX_SECONDS` - The maximum allowed duration in seconds (inclusive).
///
/// # Errors
///
/// Returns a `garde::Error` if the duration has a sub-second part or is
/// outside the specified bounds.
fn validate_seconds<const MIN_SECONDS: u64, const MAX_SECONDS: u64>(
    val: &Duration,
) -> garde::Result {
    if val.subsec_nanos() != 0 {
        return Err(garde::Error::new("must be a whole number of seconds"));
    }
    if (MIN_SECONDS..=MAX_SECONDS).contains(&val.as_secs()) {
        Ok(())
    } else {
        Err(garde::Error::new(format!(
            "outside of bounds [{MIN_SECONDS},{MAX_SECONDS}]",
        )))
    }
}

fn validate_time_limit(val: &Duration) -> garde::Result {
    validate_seconds::<{ game::MIN_TIME_LIMIT }, { game::MAX_TIME_LIMIT }>(val)
}

fn validate_starting_countdown(val: &Duration) -> garde::Result {
    validate_seconds::<{ game::MIN_STARTING_COUNTDOWN }, { game::MAX_STARTING_COUNTDOWN }>(val)
}

fn validate_result_display(val: &Duration) -> garde::Result {
    validate_seconds::<{ game::MIN_RESULT_DISPLAY }, { game::MAX_RESULT_DISPLAY }>(val)
}

/// Errors that can occur when loading options
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Error {
    /// The document is not valid JSON for options
    #[error("malformed options: {0}")]
    Malformed(String),
    /// A value is outside its allowed range
    #[error("invalid options: {0}")]
    Invalid(String),
}

/// Settings of one match
#[serde_with::serde_as]
#[skip_serializing_none]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct Options {
    /// Time participants have to answer each question
    #[garde(custom(|v, _| validate_time_limit(v)))]
    #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
    time_limit: Duration,
    /// Countdown between the host starting the match and the first question
    #[garde(custom(|v, _| validate_starting_countdown(v)))]
    #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
    starting_countdown: Duration,
    /// How long the correct answer stays revealed before moving on
    #[garde(custom(|v, _| validate_result_display(v)))]
    #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
    result_display: Duration,
    /// Maximum number of participants, host included
    #[garde(range(min = 1, max = game::MAX_PARTICIPANT_COUNT))]
    max_participants: usize,
    /// Style of generated display names (None means participants choose their own)
    #[garde(dive)]
    generated_names: Option<NameStyle>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            time_limit: Duration::from_secs(20),
            starting_countdown: Duration::from_secs(3),
            result_display: Duration::from_secs(5),
            max_participants: 8,
            generated_names: None,
        }
    }
}

impl Options {
    /// Parses and validates options from a JSON document
    ///
    /// Missing fields take their default value.
    ///
    /// # Errors
    ///
    /// Returns `Error::Malformed` if the document cannot be parsed and
    /// `Error::Invalid` if any value is out of range.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        let options: Self =
            serde_json::from_str(json).map_err(|e| Error::Malformed(e.to_string()))?;
        options.check()?;
        Ok(options)
    }

    /// Validates the options
    ///
    /// # Errors
    ///
    /// Returns `Error::Invalid` describing every value that is out of range.
    pub fn check(&self) -> Result<(), Error> {
        self.validate()
            .map_err(|report| Error::Invalid(report.to_string()))
    }

    /// Sets the per-question time limit
    #[must_use]
    pub fn with_time_limit(mut self, time_limit: Duration) -> Self {
        self.time_limit = time_limit;
        self
    }

    /// Sets the countdown before the first question
    #[must_use]
    pub fn with_starting_countdown(mut self, starting_countdown: Duration) -> Self {
        self.starting_countdown = starting_countdown;
        self
    }

    /// Sets how long answers stay revealed
    #[must_use]
    pub fn with_result_display(mut self, result_display: Duration) -> Self {
        self.result_display = result_display;
        self
    }

    /// Sets the participant limit
    #[must_use]
    pub fn with_max_participants(mut self, max_participants: usize) -> Self {
        self.max_participants = max_participants;
        self
    }

    /// Enables generated display names
    #[must_use]
    pub fn with_generated_names(mut self, style: NameStyle) -> Self {
        self.generated_names = Some(style);
        self
    }

    /// Time participants have to answer each question
    pub fn time_limit(&self) -> Duration {
        self.time_limit
    }

    /// Countdown between the start and the first question
    pub fn starting_countdown(&self) -> Duration {
        self.starting_countdown
    }

    /// How long answers stay revealed
    pub fn result_display(&self) -> Duration {
        self.result_display
    }

    /// Maximum number of participants, host included
    pub fn max_participants(&self) -> usize {
        self.max_participants
    }

    /// Style of generated display names, if enabled
    pub fn generated_names(&self) -> Option<NameStyle> {
        self.generated_names
    }
}
