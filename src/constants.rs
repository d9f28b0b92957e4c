//! Configuration constants for the quiz battle engine
//!
//! This module contains the limits and fixed values used throughout the
//! engine to keep match configuration, question content and scoring within
//! consistent boundaries.

/// Match-wide limits
pub mod game {
    /// Maximum number of questions allowed in a single match
    pub const MAX_QUESTION_COUNT: usize = 100;
    /// Maximum number of participants (host included) allowed in a single match
    pub const MAX_PARTICIPANT_COUNT: usize = 100;
    /// Minimum time limit in seconds for answering a question
    pub const MIN_TIME_LIMIT: u64 = 5;
    /// Maximum time limit in seconds for answering a question
    pub const MAX_TIME_LIMIT: u64 = 240;
    /// Minimum length in seconds of the pre-match countdown
    pub const MIN_STARTING_COUNTDOWN: u64 = 0;
    /// Maximum length in seconds of the pre-match countdown
    pub const MAX_STARTING_COUNTDOWN: u64 = 30;
    /// Minimum time in seconds the answer reveal stays on screen
    pub const MIN_RESULT_DISPLAY: u64 = 0;
    /// Maximum time in seconds the answer reveal stays on screen
    pub const MAX_RESULT_DISPLAY: u64 = 60;
}

/// Question content limits
pub mod question {
    /// Maximum length of a question prompt
    pub const MAX_PROMPT_LENGTH: usize = 500;
    /// Maximum length of an explanation shown after the reveal
    pub const MAX_EXPLANATION_LENGTH: usize = 1000;
    /// Minimum number of options for a question
    pub const MIN_OPTION_COUNT: usize = 2;
    /// Maximum number of options for a question
    pub const MAX_OPTION_COUNT: usize = 8;
    /// Maximum length of an option's text
    pub const MAX_OPTION_LENGTH: usize = 200;
}

/// Scoring constants
pub mod scoring {
    /// Points awarded for a correct answer submitted with the full time remaining
    pub const MAX_POINTS: u64 = 1000;
}

/// Display name constants
pub mod names {
    /// Maximum length of a display name in characters, after trimming
    pub const MAX_LENGTH: usize = 30;
    /// Generated names drawn before a numeric suffix is appended
    pub const MAX_GENERATION_ATTEMPTS: usize = 32;
}

/// Join code constants
pub mod join_code {
    /// Number of characters in a join code
    pub const LENGTH: usize = 6;
    /// Characters a join code is drawn from (no 0/O or 1/I to avoid confusion)
    pub const ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
    /// Attempts at finding an unused code before giving up
    pub const MAX_GENERATION_ATTEMPTS: usize = 64;
}

/// Match actor constants
pub mod actor {
    /// Commands that can queue up for one match before senders wait
    pub const COMMAND_BUFFER: usize = 256;
    /// Updates kept for slow subscribers before they start lagging
    pub const UPDATE_BUFFER: usize = 64;
}
