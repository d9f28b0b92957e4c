//! Match state machine
//!
//! This module contains the [`Match`] struct, which drives one quiz battle
//! from the waiting room to the final standings. It owns the roster, the
//! submissions to the current question, the countdown clock and the points
//! ledger, and it is the only place where any of them change.
//!
//! A match performs no I/O. Every action returns synchronously and queues the
//! resulting [`UpdateMessage`]s in an outbox that the owner drains with
//! [`Match::drain_events`]. Timing is delegated to a `schedule` callback that
//! receives [`Alarm`]s and is expected to hand them back through
//! [`Match::receive_alarm`] once they are due.

use std::{collections::HashMap, fmt::Debug, sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use thiserror::Error;
use tracing::{debug, info};

use crate::{
    clock::{Alarm, Clock, ClockEvent},
    config::Options,
    join_code::JoinCode,
    leaderboard::{Leaderboard, Outcome, Standing},
    names::{self, Names},
    question::{OptionId, Question, QuestionId, QuestionView},
    roster::{self, Id, Participant, Roster},
    scoring,
};

/// The phase a match is in
///
/// Matches only move forward: `Waiting`, `Starting`, then alternating
/// `Question(i)` and `AnswerResult(i)` for every question, then `Finished`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum State {
    /// Participants are joining and getting ready
    Waiting,
    /// The host started the match; counting down to the first question
    Starting,
    /// Accepting answers to the question at this index
    Question(usize),
    /// Revealing the answer to the question at this index
    AnswerResult(usize),
    /// The match is over
    Finished {
        /// Whether the match ended before every question was played
        incomplete: bool,
    },
}

impl State {
    /// Index of the question being asked or revealed
    pub fn question_index(&self) -> Option<usize> {
        match self {
            Self::Question(index) | Self::AnswerResult(index) => Some(*index),
            _ => None,
        }
    }
}

/// Errors that can occur when acting on a match
///
/// A rejected action never changes the match.
#[derive(Error, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The participant is not part of the match
    #[error("participant is not in this match")]
    UnknownParticipant,
    /// Only the host may perform this action
    #[error("only the host can do this")]
    NotHost,
    /// At least one participant is not ready
    #[error("not every participant is ready")]
    NotAllReady,
    /// There is nobody to play with
    #[error("the match has no participants")]
    NoParticipants,
    /// The match has already left the waiting room
    #[error("the match has already started")]
    AlreadyStarted,
    /// The action is only possible in the waiting room
    #[error("the match is not waiting for participants")]
    NotWaiting,
    /// The participant limit has been reached
    #[error("the match is full")]
    MatchFull,
    /// The participant has already joined
    #[error("participant already joined")]
    AlreadyJoined,
    /// The requested display name was rejected
    #[error("invalid name: {0}")]
    Name(#[from] names::Error),
    /// No question is accepting answers right now
    #[error("the question is closed")]
    QuestionClosed,
    /// The submission names a question other than the current one
    #[error("answer is for a different question")]
    WrongQuestion,
    /// The submission names an option the question does not have
    #[error("no such option")]
    UnknownOption,
    /// The participant already answered this question
    #[error("answer already submitted")]
    AlreadySubmitted,
    /// The match is over
    #[error("the match is finished")]
    Finished,
}

impl From<roster::Error> for Error {
    fn from(error: roster::Error) -> Self {
        match error {
            roster::Error::MaximumParticipants => Self::MatchFull,
            roster::Error::AlreadyJoined => Self::AlreadyJoined,
        }
    }
}

/// A participant's answer to the current question
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Submission {
    /// The chosen option, `None` if the participant did not answer in time
    pub option: Option<OptionId>,
    /// Whether the chosen option is the correct one
    pub correct: bool,
    /// Points awarded for the answer
    pub points: u64,
}

/// How a participant did on the question being revealed
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParticipantResult {
    /// The participant
    pub id: Id,
    /// The chosen option, missing if the participant did not answer
    pub option: Option<OptionId>,
    /// Whether the chosen option is the correct one
    pub correct: bool,
    /// Points awarded for this question
    pub points: u64,
    /// Score after this question
    pub score: u64,
}

/// Events produced by a match, in the order they happened
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize)]
pub enum UpdateMessage {
    /// The match entered a new phase
    StateChanged {
        /// The new phase
        state: State,
        /// The question now being asked, without its answer
        question: Option<QuestionView>,
        /// Total number of questions in the match
        count: usize,
    },
    /// One second passed on the active countdown
    Tick {
        /// Whole seconds left
        remaining: u64,
    },
    /// The answer to a closed question
    QuestionRevealed {
        /// Index of the question
        index: usize,
        /// The question's identifier
        question: QuestionId,
        /// The correct option
        correct_option: OptionId,
        /// Explanation of the correct answer
        explanation: String,
        /// Every participant's result, in join order
        results: Vec<ParticipantResult>,
    },
    /// The match ended
    MatchFinished {
        /// Whether the match ended before every question was played
        incomplete: bool,
        /// Final ranking, best first
        standings: Vec<Standing>,
    },
    /// Someone joined, left, changed readiness or became host
    RosterChanged {
        /// Everyone in the match, in join order
        participants: Vec<Participant>,
    },
}

impl UpdateMessage {
    /// Converts the update message to a JSON string for transmission
    ///
    /// # Errors
    ///
    /// Returns the serializer's error if the message cannot be encoded.
    pub fn to_message(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// A read-only view of a match for display layers
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize)]
pub struct MatchSnapshot {
    /// The match's join code
    pub code: JoinCode,
    /// The current phase
    pub state: State,
    /// Total number of questions
    pub question_count: usize,
    /// The question being asked, without its answer
    pub question: Option<QuestionView>,
    /// Everyone in the match, in join order
    pub participants: Vec<Participant>,
    /// Number of answers received for the current question
    pub submitted: usize,
    /// Whole seconds left on the active countdown
    pub remaining: Option<u64>,
    /// Final ranking once the match is finished
    pub standings: Option<Vec<Standing>>,
}

/// One quiz battle
pub struct Match {
    /// Identifier participants use to find the match
    code: JoinCode,
    /// The questions, in the order they are asked
    questions: Vec<Arc<Question>>,
    /// Settings fixed at creation
    options: Options,
    /// Current phase
    state: State,
    /// Countdown for the current phase
    clock: Clock,
    /// Participants currently in the match
    roster: Roster,
    /// Participants who left after the match started, kept for the standings
    departed: Vec<Participant>,
    /// Display names in use
    names: Names,
    /// Points awarded per question
    leaderboard: Leaderboard,
    /// Answers to the current question
    submissions: HashMap<Id, Submission>,
    /// Standings computed when the match finished
    standings: Option<Vec<Standing>>,
    /// Events not yet handed to the owner
    outbox: Vec<UpdateMessage>,
}

impl Debug for Match {
    /// Custom debug implementation that avoids printing large amounts of data
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Match")
            .field("code", &self.code)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl Match {
    /// Creates a match in the waiting room with its creator as host
    ///
    /// # Arguments
    ///
    /// * `code` - The join code the match is registered under
    /// * `questions` - The questions to ask, in order
    /// * `options` - Validated match options
    /// * `host_id` - The creating participant
    /// * `host_name` - The creator's requested display name
    ///
    /// # Errors
    ///
    /// Returns `Error::Name` if the host's display name is rejected.
    pub fn new(
        code: JoinCode,
        questions: Vec<Arc<Question>>,
        options: Options,
        host_id: Id,
        host_name: &str,
    ) -> Result<Self, Error> {
        let mut names = Names::default();
        let display_name = match options.generated_names() {
            Some(style) => names.generate_name(host_id, style)?,
            None => names.set_name(host_id, host_name)?,
        };

        info!(%code, host = %host_id, questions = questions.len(), "match created");

        Ok(Self {
            code,
            questions,
            options,
            state: State::Waiting,
            clock: Clock::default(),
            roster: Roster::with_host(host_id, display_name, options.max_participants()),
            departed: Vec::new(),
            names,
            leaderboard: Leaderboard::default(),
            submissions: HashMap::new(),
            standings: None,
            outbox: Vec::new(),
        })
    }

    /// The match's join code
    pub fn code(&self) -> JoinCode {
        self.code
    }

    /// The current phase
    pub fn state(&self) -> State {
        self.state
    }

    /// Index of the question being asked or revealed
    pub fn current_question_index(&self) -> Option<usize> {
        self.state.question_index()
    }

    /// Total number of questions
    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    /// The match's options
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Participants currently in the match
    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    /// Points awarded so far, per question
    pub fn leaderboard(&self) -> &Leaderboard {
        &self.leaderboard
    }

    /// A participant's answer to the current question
    pub fn submission(&self, id: Id) -> Option<&Submission> {
        self.submissions.get(&id)
    }

    /// Final standings, once the match is finished
    pub fn standings(&self) -> Option<&[Standing]> {
        self.standings.as_deref()
    }

    /// Whether the match is over
    pub fn is_finished(&self) -> bool {
        matches!(self.state, State::Finished { .. })
    }

    /// Takes every event produced since the last call, oldest first
    pub fn drain_events(&mut self) -> Vec<UpdateMessage> {
        std::mem::take(&mut self.outbox)
    }

    /// Takes a read-only view of the match
    pub fn snapshot(&self) -> MatchSnapshot {
        MatchSnapshot {
            code: self.code,
            state: self.state,
            question_count: self.questions.len(),
            question: match self.state {
                State::Question(index) => self.questions.get(index).map(|q| q.view()),
                _ => None,
            },
            participants: self.roster.iter().cloned().collect(),
            submitted: self.submissions.len(),
            remaining: self.clock.remaining(),
            standings: self.standings.clone(),
        }
    }

    fn announce_roster(&mut self) {
        self.outbox.push(UpdateMessage::RosterChanged {
            participants: self.roster.iter().cloned().collect(),
        });
    }

    fn set_state(&mut self, state: State) {
        self.state = state;
        self.outbox.push(UpdateMessage::StateChanged {
            state,
            question: match state {
                State::Question(index) => self.questions.get(index).map(|q| q.view()),
                _ => None,
            },
            count: self.questions.len(),
        });
    }

    /// Adds a participant to the waiting room
    ///
    /// When the match hands out generated names, `name` is ignored.
    ///
    /// # Arguments
    ///
    /// * `id` - The joining participant
    /// * `name` - The requested display name
    ///
    /// # Returns
    ///
    /// The participant as added to the roster
    ///
    /// # Errors
    ///
    /// * `Error::Finished` - The match is over
    /// * `Error::AlreadyStarted` - The match has left the waiting room
    /// * `Error::AlreadyJoined` - The participant is already in the match
    /// * `Error::MatchFull` - The participant limit has been reached
    /// * `Error::Name` - The display name was rejected
    pub fn join(&mut self, id: Id, name: &str) -> Result<Participant, Error> {
        match self.state {
            State::Waiting => {}
            State::Finished { .. } => return Err(Error::Finished),
            _ => return Err(Error::AlreadyStarted),
        }
        self.roster.check_join(id)?;

        let display_name = match self.options.generated_names() {
            Some(style) => self.names.generate_name(id, style)?,
            None => self.names.set_name(id, name)?,
        };
        let participant = self.roster.join(id, display_name)?.clone();

        info!(
            code = %self.code,
            participant = %id,
            name = %participant.display_name,
            "participant joined"
        );
        self.announce_roster();

        Ok(participant)
    }

    /// Removes a participant from the match
    ///
    /// If the host leaves, the earliest-joined remaining participant becomes
    /// host. If nobody is left, the match finishes as incomplete. Leaving a
    /// finished match does nothing.
    ///
    /// # Arguments
    ///
    /// * `id` - The leaving participant
    /// * `schedule` - Receives alarms if the departure closes the current question
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownParticipant` if the participant is not in the match.
    pub fn leave<S: FnMut(Alarm, Duration)>(&mut self, id: Id, schedule: S) -> Result<(), Error> {
        if self.is_finished() {
            return Ok(());
        }

        let departure = self.roster.leave(id).ok_or(Error::UnknownParticipant)?;
        self.names.remove(&id);
        self.submissions.remove(&id);

        info!(code = %self.code, participant = %id, "participant left");
        if let Some(new_host) = departure.new_host {
            info!(code = %self.code, host = %new_host, "host role handed over");
        }

        if self.state != State::Waiting {
            self.departed.push(departure.participant);
        }
        self.announce_roster();

        if self.roster.is_empty() {
            info!(code = %self.code, state = ?self.state, "every participant left");
            self.finish(true);
            return Ok(());
        }

        if let State::Question(index) = self.state {
            if self.submissions.len() >= self.roster.len() {
                self.close_question(index, schedule);
            }
        }

        Ok(())
    }

    /// Marks a participant as ready or not ready
    ///
    /// # Errors
    ///
    /// * `Error::Finished` - The match is over
    /// * `Error::NotWaiting` - The match has left the waiting room
    /// * `Error::UnknownParticipant` - The participant is not in the match
    pub fn set_ready(&mut self, id: Id, ready: bool) -> Result<(), Error> {
        match self.state {
            State::Waiting => {}
            State::Finished { .. } => return Err(Error::Finished),
            _ => return Err(Error::NotWaiting),
        }
        if !self.roster.set_ready(id, ready) {
            return Err(Error::UnknownParticipant);
        }

        debug!(code = %self.code, participant = %id, ready, "readiness changed");
        self.announce_roster();

        Ok(())
    }

    /// Starts the match on behalf of the host
    ///
    /// The match counts down for the configured starting countdown and then
    /// asks the first question. A zero countdown asks it immediately.
    ///
    /// # Arguments
    ///
    /// * `requester` - The participant asking to start
    /// * `schedule` - Receives the alarms that drive the countdowns
    ///
    /// # Errors
    ///
    /// * `Error::Finished` - The match is over
    /// * `Error::AlreadyStarted` - The match has left the waiting room
    /// * `Error::NoParticipants` - Nobody is in the match
    /// * `Error::UnknownParticipant` - The requester is not in the match
    /// * `Error::NotHost` - The requester is not the host
    /// * `Error::NotAllReady` - Someone is not ready
    pub fn start<S: FnMut(Alarm, Duration)>(
        &mut self,
        requester: Id,
        schedule: S,
    ) -> Result<(), Error> {
        match self.state {
            State::Waiting => {}
            State::Finished { .. } => return Err(Error::Finished),
            _ => return Err(Error::AlreadyStarted),
        }
        if self.roster.is_empty() {
            return Err(Error::NoParticipants);
        }
        let requester = self
            .roster
            .get(requester)
            .ok_or(Error::UnknownParticipant)?;
        if !requester.is_host() {
            return Err(Error::NotHost);
        }
        if !self.roster.all_ready() {
            return Err(Error::NotAllReady);
        }

        info!(code = %self.code, participants = self.roster.len(), "match starting");

        let countdown = self.options.starting_countdown().as_secs();
        if countdown == 0 {
            self.begin_question(0, schedule);
        } else {
            self.set_state(State::Starting);
            self.clock.start(countdown, schedule);
        }

        Ok(())
    }

    /// Records a participant's answer to the current question
    ///
    /// The answer is scored against the seconds left on the question clock.
    /// Once everyone has answered the question closes without waiting for
    /// the clock.
    ///
    /// # Arguments
    ///
    /// * `id` - The answering participant
    /// * `question` - The question being answered
    /// * `option` - The chosen option
    /// * `schedule` - Receives alarms if the answer closes the question
    ///
    /// # Errors
    ///
    /// * `Error::Finished` - The match is over
    /// * `Error::UnknownParticipant` - The participant is not in the match
    /// * `Error::QuestionClosed` - No question is accepting answers
    /// * `Error::WrongQuestion` - `question` is not the current question
    /// * `Error::AlreadySubmitted` - The participant already answered
    /// * `Error::UnknownOption` - The question has no such option
    pub fn submit<S: FnMut(Alarm, Duration)>(
        &mut self,
        id: Id,
        question: &QuestionId,
        option: &OptionId,
        schedule: S,
    ) -> Result<(), Error> {
        if self.is_finished() {
            return Err(Error::Finished);
        }
        if !self.roster.contains(id) {
            return Err(Error::UnknownParticipant);
        }
        let (index, current) = match self.state {
            State::Question(index) => match self.questions.get(index) {
                Some(current) => (index, Arc::clone(current)),
                None => return Err(Error::QuestionClosed),
            },
            _ => {
                debug!(
                    code = %self.code,
                    participant = %id,
                    state = ?self.state,
                    "late answer rejected"
                );
                return Err(Error::QuestionClosed);
            }
        };
        if current.id() != question {
            return Err(Error::WrongQuestion);
        }
        if self.submissions.contains_key(&id) {
            return Err(Error::AlreadySubmitted);
        }
        if !current.has_option(option) {
            return Err(Error::UnknownOption);
        }

        let correct = current.is_correct(option);
        let remaining = Duration::from_secs(self.clock.remaining().unwrap_or_default());
        let points = scoring::score(correct, remaining, self.options.time_limit());

        debug!(code = %self.code, participant = %id, index, correct, points, "answer recorded");
        self.submissions.insert(
            id,
            Submission {
                option: Some(option.clone()),
                correct,
                points,
            },
        );

        if self.submissions.len() >= self.roster.len() {
            self.close_question(index, schedule);
        }

        Ok(())
    }

    /// Delivers an alarm previously handed to a `schedule` callback
    ///
    /// Alarms belonging to a countdown that was cancelled or replaced are
    /// ignored.
    ///
    /// # Arguments
    ///
    /// * `alarm` - The alarm that fired
    /// * `schedule` - Receives follow-up alarms
    pub fn receive_alarm<S: FnMut(Alarm, Duration)>(&mut self, alarm: Alarm, mut schedule: S) {
        if self.is_finished() {
            debug!(code = %self.code, timer = %alarm.handle, "alarm after finish ignored");
            return;
        }

        match self.clock.receive_alarm(alarm, &mut schedule) {
            None => {}
            Some(ClockEvent::Tick { remaining }) => {
                self.outbox.push(UpdateMessage::Tick { remaining });
            }
            Some(ClockEvent::Expired) => match self.state {
                State::Starting => self.begin_question(0, schedule),
                State::Question(index) => {
                    debug!(code = %self.code, index, "question timed out");
                    self.close_question(index, schedule);
                }
                State::AnswerResult(index) => self.begin_question(index + 1, schedule),
                State::Waiting | State::Finished { .. } => {
                    debug!(
                        code = %self.code,
                        state = ?self.state,
                        "expiry with nothing to advance"
                    );
                }
            },
        }
    }

    /// Asks the question at `index`, or finishes if there are no more
    fn begin_question<S: FnMut(Alarm, Duration)>(&mut self, index: usize, schedule: S) {
        if index >= self.questions.len() {
            self.finish(false);
            return;
        }

        self.submissions.clear();
        self.set_state(State::Question(index));
        self.clock.start(self.options.time_limit().as_secs(), schedule);
    }

    /// Scores the question at `index` and reveals its answer
    fn close_question<S: FnMut(Alarm, Duration)>(&mut self, index: usize, schedule: S) {
        self.clock.cancel_active();

        let Some(question) = self.questions.get(index).map(Arc::clone) else {
            return;
        };

        let no_answer = Submission {
            option: None,
            correct: false,
            points: 0,
        };

        let mut outcomes = Vec::with_capacity(self.roster.len());
        let mut results = Vec::with_capacity(self.roster.len());
        let ids = self.roster.ids().collect::<Vec<_>>();
        for id in ids {
            let submission = self
                .submissions
                .entry(id)
                .or_insert_with(|| no_answer.clone())
                .clone();
            let score = self.roster.award(id, submission.points).unwrap_or_default();

            outcomes.push(Outcome {
                id,
                correct: submission.correct,
                points: submission.points,
            });
            results.push(ParticipantResult {
                id,
                option: submission.option,
                correct: submission.correct,
                points: submission.points,
                score,
            });
        }
        self.leaderboard.add_round(&outcomes);

        info!(
            code = %self.code,
            index,
            answered = results.iter().filter(|r| r.option.is_some()).count(),
            "question closed"
        );

        self.set_state(State::AnswerResult(index));
        self.outbox.push(UpdateMessage::QuestionRevealed {
            index,
            question: question.id().clone(),
            correct_option: question.correct_option_id().clone(),
            explanation: question.explanation().to_owned(),
            results,
        });
        self.clock
            .start(self.options.result_display().as_secs(), schedule);
    }

    /// Ends the match and computes the standings
    fn finish(&mut self, incomplete: bool) {
        self.clock.cancel_active();

        let standings = Leaderboard::standings(self.roster.iter().chain(self.departed.iter()));
        self.standings = Some(standings.clone());

        info!(code = %self.code, incomplete, "match finished");

        self.set_state(State::Finished { incomplete });
        self.outbox.push(UpdateMessage::MatchFinished {
            incomplete,
            standings,
        });
    }
}
