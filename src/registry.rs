//! Registry of running matches
//!
//! The registry maps join codes to the handles of running match actors. It
//! holds no match state itself, so any number of tasks can look matches up
//! concurrently while each match keeps processing its own events in order.

use dashmap::{DashMap, mapref::entry::Entry};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::{
    actor::{MatchActor, MatchHandle},
    config::{self, Options},
    constants::{actor::UPDATE_BUFFER, join_code::MAX_GENERATION_ATTEMPTS},
    game::{self, Match, MatchSnapshot, UpdateMessage},
    join_code::JoinCode,
    question::{self, BankQuery, OptionId, QuestionBank, QuestionId},
    roster::{Id, Participant},
};

/// Errors that can occur when reaching a match through the registry
#[derive(Error, Serialize, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// No match is registered under the code
    #[error("no match with this code")]
    UnknownMatch,
    /// The match has stopped
    #[error("the match has closed")]
    MatchClosed,
    /// Every generated code was already taken
    #[error("could not find a free join code")]
    CodesExhausted,
    /// The question bank could not supply the questions
    #[error(transparent)]
    Bank(#[from] question::Error),
    /// The match rejected the action
    #[error(transparent)]
    Game(#[from] game::Error),
    /// The match options are invalid
    #[error(transparent)]
    Options(#[from] config::Error),
}

struct Registered {
    handle: MatchHandle,
    updates: broadcast::Receiver<UpdateMessage>,
}

/// All running matches, by join code
#[derive(Default)]
pub struct MatchRegistry {
    matches: DashMap<JoinCode, Registered>,
}

impl MatchRegistry {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a match and starts its actor
    ///
    /// The questions are drawn from `bank` once, up front. The creator joins
    /// as host. Stopped matches are pruned first. Must be called from within
    /// a Tokio runtime.
    ///
    /// # Arguments
    ///
    /// * `bank` - Source of the questions
    /// * `query` - Which questions to play
    /// * `options` - Match options
    /// * `host` - The creating participant
    /// * `host_name` - The creator's requested display name
    ///
    /// # Returns
    ///
    /// A handle to the new match, whose code participants use to join
    ///
    /// # Errors
    ///
    /// * `Error::Options` - The options are out of range
    /// * `Error::Bank` - The bank cannot satisfy the query
    /// * `Error::Game` - The host's display name was rejected
    /// * `Error::CodesExhausted` - No unused join code was found
    pub fn create<B: QuestionBank + ?Sized>(
        &self,
        bank: &B,
        query: &BankQuery,
        options: Options,
        host: Id,
        host_name: &str,
    ) -> Result<MatchHandle, Error> {
        options.check()?;
        let questions = bank.questions(query)?;
        self.prune();

        for _ in 0..MAX_GENERATION_ATTEMPTS {
            let code = JoinCode::new();
            let entry = self.matches.entry(code);
            if let Entry::Occupied(existing) = &entry {
                // A stopped match gives up its code.
                if !existing.get().handle.is_closed() {
                    continue;
                }
            }

            let game = Match::new(code, questions, options, host, host_name)?;
            let (updates_tx, updates) = broadcast::channel(UPDATE_BUFFER);
            let handle = MatchActor::spawn(game, updates_tx);
            let registered = Registered {
                handle: handle.clone(),
                updates,
            };
            match entry {
                Entry::Vacant(slot) => {
                    slot.insert(registered);
                }
                Entry::Occupied(mut existing) => {
                    existing.insert(registered);
                }
            }

            info!(%code, "match registered");
            return Ok(handle);
        }

        warn!(active = self.matches.len(), "join codes exhausted");
        Err(Error::CodesExhausted)
    }

    /// Looks up a running match
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownMatch` if nothing is registered under the code
    /// and `Error::MatchClosed` if the match has stopped.
    pub fn get(&self, code: JoinCode) -> Result<MatchHandle, Error> {
        let registered = self.matches.get(&code).ok_or(Error::UnknownMatch)?;
        if registered.handle.is_closed() {
            return Err(Error::MatchClosed);
        }
        Ok(registered.handle.clone())
    }

    /// Subscribes to the updates of a match
    ///
    /// Only updates produced after subscribing are received. The receiver
    /// reports closure once the match is over.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownMatch` if nothing is registered under the code
    /// and `Error::MatchClosed` if the match has stopped.
    pub fn subscribe(&self, code: JoinCode) -> Result<broadcast::Receiver<UpdateMessage>, Error> {
        let registered = self.matches.get(&code).ok_or(Error::UnknownMatch)?;
        if registered.handle.is_closed() {
            return Err(Error::MatchClosed);
        }
        Ok(registered.updates.resubscribe())
    }

    /// Adds a participant to a match's waiting room
    ///
    /// # Errors
    ///
    /// Returns lookup errors as for [`MatchRegistry::get`] and `Error::Game`
    /// if the match rejected the participant.
    pub async fn join(&self, code: JoinCode, id: Id, name: &str) -> Result<Participant, Error> {
        self.get(code)?.join(id, name).await
    }

    /// Removes a participant from a match
    ///
    /// # Errors
    ///
    /// Returns lookup errors as for [`MatchRegistry::get`] and `Error::Game`
    /// if the participant is not in the match.
    pub async fn leave(&self, code: JoinCode, id: Id) -> Result<(), Error> {
        self.get(code)?.leave(id).await
    }

    /// Marks a participant as ready or not ready
    ///
    /// # Errors
    ///
    /// Returns lookup errors as for [`MatchRegistry::get`] and `Error::Game`
    /// if the match rejected the change.
    pub async fn set_ready(&self, code: JoinCode, id: Id, ready: bool) -> Result<(), Error> {
        self.get(code)?.set_ready(id, ready).await
    }

    /// Starts a match on behalf of its host
    ///
    /// # Errors
    ///
    /// Returns lookup errors as for [`MatchRegistry::get`] and `Error::Game`
    /// if the match cannot start.
    pub async fn start(&self, code: JoinCode, requester: Id) -> Result<(), Error> {
        self.get(code)?.start(requester).await
    }

    /// Submits an answer to a match's current question
    ///
    /// # Errors
    ///
    /// Returns lookup errors as for [`MatchRegistry::get`] and `Error::Game`
    /// if the answer was rejected.
    pub async fn submit(
        &self,
        code: JoinCode,
        id: Id,
        question: QuestionId,
        option: OptionId,
    ) -> Result<(), Error> {
        self.get(code)?.submit(id, question, option).await
    }

    /// Takes a read-only view of a match
    ///
    /// # Errors
    ///
    /// Returns lookup errors as for [`MatchRegistry::get`].
    pub async fn snapshot(&self, code: JoinCode) -> Result<MatchSnapshot, Error> {
        self.get(code)?.snapshot().await
    }

    /// Unregisters a match without waiting for it to finish
    pub fn remove(&self, code: JoinCode) -> Option<MatchHandle> {
        self.matches
            .remove(&code)
            .map(|(_, registered)| registered.handle)
    }

    /// Unregisters every match whose actor has stopped
    ///
    /// # Returns
    ///
    /// The number of matches removed
    pub fn prune(&self) -> usize {
        let before = self.matches.len();
        self.matches
            .retain(|_, registered| !registered.handle.is_closed());
        let removed = before.saturating_sub(self.matches.len());
        if removed > 0 {
            info!(removed, "pruned finished matches");
        }
        removed
    }

    /// Number of registered matches
    pub fn len(&self) -> usize {
        self.matches.len()
    }

    /// Whether no match is registered
    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        game::State,
        question::{InMemoryBank, Question},
    };

    fn bank() -> InMemoryBank {
        InMemoryBank::new(
            (0..3)
                .map(|i| {
                    Question::new(
                        format!("q{i}"),
                        format!("Question {i}?"),
                        [("a", "Right"), ("b", "Wrong")],
                        "a",
                        "a is right",
                    )
                })
                .collect(),
        )
        .unwrap()
    }

    fn options() -> Options {
        Options::default()
            .with_starting_countdown(Duration::ZERO)
            .with_time_limit(Duration::from_secs(20))
            .with_result_display(Duration::from_secs(5))
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_and_join() {
        let registry = MatchRegistry::new();
        let host = Id::new();
        let handle = registry
            .create(&bank(), &BankQuery::any(3), options(), host, "Host")
            .unwrap();
        let code = handle.code();
        let mut updates = registry.subscribe(code).unwrap();

        let guest = Id::new();
        let participant = registry.join(code, guest, "Guest").await.unwrap();
        assert_eq!(participant.display_name, "Guest");

        let Ok(UpdateMessage::RosterChanged { participants }) = updates.recv().await else {
            panic!("expected a roster update");
        };
        assert_eq!(participants.len(), 2);

        let snapshot = registry.snapshot(code).await.unwrap();
        assert_eq!(snapshot.code, code);
        assert_eq!(snapshot.state, State::Waiting);
        assert_eq!(snapshot.question_count, 3);
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_code() {
        let registry = MatchRegistry::new();
        let code = JoinCode::new();
        assert_eq!(registry.get(code).unwrap_err(), Error::UnknownMatch);
        assert_eq!(
            registry.join(code, Id::new(), "Nobody").await.unwrap_err(),
            Error::UnknownMatch
        );
        assert!(registry.subscribe(code).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_errors_leave_nothing_behind() {
        let registry = MatchRegistry::new();

        assert!(matches!(
            registry.create(&bank(), &BankQuery::any(4), options(), Id::new(), "Host"),
            Err(Error::Bank(question::Error::NotEnoughQuestions {
                requested: 4,
                available: 3
            }))
        ));
        assert!(matches!(
            registry.create(
                &bank(),
                &BankQuery::any(1),
                options().with_time_limit(Duration::from_secs(1)),
                Id::new(),
                "Host"
            ),
            Err(Error::Options(config::Error::Invalid(_)))
        ));
        assert!(matches!(
            registry.create(&bank(), &BankQuery::any(1), options(), Id::new(), " "),
            Err(Error::Game(game::Error::Name(_)))
        ));
        assert!(registry.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_matches_are_independent() {
        let registry = MatchRegistry::new();
        let first_host = Id::new();
        let second_host = Id::new();
        let first = registry
            .create(&bank(), &BankQuery::any(1), options(), first_host, "Host")
            .unwrap()
            .code();
        let second = registry
            .create(&bank(), &BankQuery::any(2), options(), second_host, "Host")
            .unwrap()
            .code();
        assert_ne!(first, second);

        registry.set_ready(first, first_host, true).await.unwrap();
        registry.start(first, first_host).await.unwrap();

        assert_eq!(
            registry.snapshot(first).await.unwrap().state,
            State::Question(0)
        );
        assert_eq!(
            registry.snapshot(second).await.unwrap().state,
            State::Waiting
        );
        assert_eq!(
            registry.start(second, first_host).await.unwrap_err(),
            Error::Game(game::Error::UnknownParticipant)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_finished_matches_are_pruned() {
        let registry = MatchRegistry::new();
        let host = Id::new();
        let code = registry
            .create(&bank(), &BankQuery::any(1), options(), host, "Host")
            .unwrap()
            .code();
        let mut updates = registry.subscribe(code).unwrap();

        registry.set_ready(code, host, true).await.unwrap();
        registry.start(code, host).await.unwrap();
        registry
            .submit(code, host, QuestionId::from("q0"), OptionId::from("a"))
            .await
            .unwrap();

        let mut standings = None;
        loop {
            match updates.recv().await {
                Ok(UpdateMessage::MatchFinished { standings: s, .. }) => standings = Some(s),
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        let standings = standings.unwrap();
        assert_eq!(standings.len(), 1);
        assert_eq!(standings[0].score, 1000);

        assert_eq!(registry.get(code).unwrap_err(), Error::MatchClosed);
        assert_eq!(registry.prune(), 1);
        assert_eq!(registry.get(code).unwrap_err(), Error::UnknownMatch);
        assert_eq!(registry.prune(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_drops_stopped_matches() {
        let registry = MatchRegistry::new();
        let host = Id::new();
        let finished = registry
            .create(&bank(), &BankQuery::any(1), options(), host, "Host")
            .unwrap()
            .code();
        registry.leave(finished, host).await.unwrap();
        tokio::task::yield_now().await;
        assert_eq!(registry.get(finished).unwrap_err(), Error::MatchClosed);

        let running = registry
            .create(&bank(), &BankQuery::any(1), options(), Id::new(), "Host")
            .unwrap()
            .code();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(finished).unwrap_err(), Error::UnknownMatch);
        assert!(registry.get(running).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove() {
        let registry = MatchRegistry::new();
        let code = registry
            .create(&bank(), &BankQuery::any(1), options(), Id::new(), "Host")
            .unwrap()
            .code();
        assert!(registry.remove(code).is_some());
        assert!(registry.remove(code).is_none());
        assert!(registry.is_empty());
    }
}
