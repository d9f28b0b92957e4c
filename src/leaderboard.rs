//! Points ledger and final standings
//!
//! This module records the points every participant earned on every question
//! and turns participants' cumulative scores into ranked standings once a match
//! is over. It never changes a score; the roster owns those.

use std::{cmp::Reverse, collections::HashMap};

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::roster::{Id, Participant};

/// How one participant fared on one question
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    /// The participant
    pub id: Id,
    /// Whether the submitted option was the correct one
    pub correct: bool,
    /// Points awarded for the question
    pub points: u64,
}

/// One entry of the ranked standings
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Standing {
    /// 1-based position in the standings
    pub rank: usize,
    /// The participant
    pub id: Id,
    /// Display name at the time the match ended
    pub display_name: String,
    /// Final cumulative score
    pub score: u64,
}

/// Correct and incorrect answer counts for one question
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QuestionStats {
    /// Participants who picked the correct option
    pub correct: usize,
    /// Participants who picked another option or did not answer
    pub incorrect: usize,
}

/// Aggregated statistics over every recorded question
#[derive(Debug, Clone)]
struct FinalSummary {
    stats: Vec<QuestionStats>,
    mapping: HashMap<Id, Vec<u64>>,
}

/// Per-question points ledger for one match
#[derive(Debug, Default, Serialize)]
pub struct Leaderboard {
    /// Outcomes recorded for each closed question, in question order
    rounds: Vec<Vec<Outcome>>,

    /// Summary derived from `rounds` (computed once when needed)
    #[serde(skip)]
    final_summary: once_cell_serde::sync::OnceCell<FinalSummary>,
}

impl Leaderboard {
    /// Records the outcomes of a closed question
    ///
    /// Any cached summary is discarded since it no longer covers every question.
    ///
    /// # Arguments
    ///
    /// * `outcomes` - One entry per participant present when the question closed
    pub fn add_round(&mut self, outcomes: &[Outcome]) {
        self.rounds.push(outcomes.to_vec());
        self.final_summary = once_cell_serde::sync::OnceCell::new();
    }

    /// Number of questions recorded so far
    pub fn round_count(&self) -> usize {
        self.rounds.len()
    }

    /// Outcomes of the `index`th recorded question
    pub fn round(&self, index: usize) -> Option<&[Outcome]> {
        self.rounds.get(index).map(Vec::as_slice)
    }

    /// Sum of every point recorded for a participant
    pub fn total(&self, id: Id) -> u64 {
        self.rounds
            .iter()
            .flatten()
            .filter(|outcome| outcome.id == id)
            .map(|outcome| outcome.points)
            .sum()
    }

    fn compute_final_summary(&self) -> FinalSummary {
        FinalSummary {
            stats: self
                .rounds
                .iter()
                .map(|outcomes| {
                    let correct = outcomes.iter().filter(|outcome| outcome.correct).count();

                    QuestionStats {
                        correct,
                        incorrect: outcomes.len() - correct,
                    }
                })
                .collect(),
            mapping: self.rounds.iter().enumerate().fold(
                HashMap::new(),
                |mut mapping: HashMap<Id, Vec<u64>>, (index, outcomes)| {
                    for outcome in outcomes {
                        let points = mapping.entry(outcome.id).or_default();
                        points.resize(index, 0);
                        points.push(outcome.points);
                    }
                    for points in mapping.values_mut() {
                        points.resize(index + 1, 0);
                    }
                    mapping
                },
            ),
        }
    }

    fn final_summary(&self) -> &FinalSummary {
        self.final_summary
            .get_or_init(|| self.compute_final_summary())
    }

    /// Correct/incorrect counts for every recorded question
    pub fn question_stats(&self) -> Vec<QuestionStats> {
        self.final_summary().stats.clone()
    }

    /// Points a participant earned on each recorded question
    ///
    /// Questions the participant was not present for count as zero.
    pub fn player_summary(&self, id: Id) -> Vec<u64> {
        self.final_summary()
            .mapping
            .get(&id)
            .map_or(vec![0; self.rounds.len()], Clone::clone)
    }

    /// Ranks participants by score
    ///
    /// Higher scores rank first. Equal scores are ordered by join order, so the
    /// participant who joined first ranks higher. Ranks are 1-based and unique.
    ///
    /// # Arguments
    ///
    /// * `participants` - Everyone to rank, in any order
    ///
    /// # Returns
    ///
    /// The standings, best first
    pub fn standings<'a, I>(participants: I) -> Vec<Standing>
    where
        I: IntoIterator<Item = &'a Participant>,
    {
        participants
            .into_iter()
            .sorted_by_key(|participant| (Reverse(participant.score), participant.join_order))
            .enumerate()
            .map(|(position, participant)| Standing {
                rank: position + 1,
                id: participant.id,
                display_name: participant.display_name.clone(),
                score: participant.score,
            })
            .collect_vec()
    }
}
