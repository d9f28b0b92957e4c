//! Answer scoring
//!
//! Points reward both correctness and speed: a correct answer is worth
//! [`MAX_POINTS`] scaled by the fraction of the time limit still remaining
//! when it was submitted.

use std::time::Duration;

pub use crate::constants::scoring::MAX_POINTS;

/// Calculates the points awarded for a single answer
///
/// Incorrect answers are worth nothing. Correct answers are worth
/// `round(remaining / limit * MAX_POINTS)`, where `remaining` is first clamped
/// to `[0, limit]` so that clock overshoot can never produce more than
/// [`MAX_POINTS`]. A zero `limit` awards nothing.
///
/// # Arguments
///
/// * `is_correct` - Whether the chosen option was the correct one
/// * `remaining` - Time left on the question clock when the answer was accepted
/// * `limit` - The question's full time limit
///
/// # Returns
///
/// The points earned, between 0 and [`MAX_POINTS`] inclusive
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
/// use quizduel::scoring::score;
///
/// assert_eq!(score(true, Duration::from_secs(15), Duration::from_secs(20)), 750);
/// assert_eq!(score(false, Duration::from_secs(15), Duration::from_secs(20)), 0);
/// ```
pub fn score(is_correct: bool, remaining: Duration, limit: Duration) -> u64 {
    if !is_correct || limit.is_zero() {
        return 0;
    }

    let ratio = remaining.min(limit).as_secs_f64() / limit.as_secs_f64();

    (ratio * MAX_POINTS as f64).round() as u64
}
