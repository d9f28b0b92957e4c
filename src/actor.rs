//! Match actor
//!
//! Every running match is owned by exactly one tokio task. Actions arrive
//! through a mailbox and alarms through a second channel, and the task applies
//! them to its [`Match`] strictly one at a time, forwarding the resulting
//! updates through a [`Tunnel`]. Nothing else ever touches the match.

use std::{fmt::Debug, time::Duration};

use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
    time::Instant,
};
use tracing::{debug, info};

use crate::{
    clock::{Alarm, TimerHandle},
    constants::actor::COMMAND_BUFFER,
    game::{self, Match, MatchSnapshot},
    join_code::JoinCode,
    question::{OptionId, QuestionId},
    registry::Error,
    roster::{Id, Participant},
    session::Tunnel,
};

type Reply<T> = oneshot::Sender<Result<T, game::Error>>;

/// Requests a handle can make of its match
enum Command {
    Join {
        id: Id,
        name: String,
        reply: Reply<Participant>,
    },
    Leave {
        id: Id,
        reply: Reply<()>,
    },
    SetReady {
        id: Id,
        ready: bool,
        reply: Reply<()>,
    },
    Start {
        requester: Id,
        reply: Reply<()>,
    },
    Submit {
        id: Id,
        question: QuestionId,
        option: OptionId,
        reply: Reply<()>,
    },
    Snapshot {
        reply: oneshot::Sender<MatchSnapshot>,
    },
}

/// Cheap, cloneable access to a running match
#[derive(Clone)]
pub struct MatchHandle {
    code: JoinCode,
    commands: mpsc::Sender<Command>,
}

impl Debug for MatchHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatchHandle")
            .field("code", &self.code)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl MatchHandle {
    /// The join code of the match
    pub fn code(&self) -> JoinCode {
        self.code
    }

    /// Whether the match task has stopped
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    async fn request<T>(&self, command: impl FnOnce(Reply<T>) -> Command) -> Result<T, Error> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .await
            .map_err(|_| Error::MatchClosed)?;
        response
            .await
            .map_err(|_| Error::MatchClosed)?
            .map_err(Error::Game)
    }

    /// Adds a participant to the waiting room
    ///
    /// # Errors
    ///
    /// Returns `Error::MatchClosed` if the match is gone and `Error::Game` if
    /// the match rejected the participant.
    pub async fn join(&self, id: Id, name: impl Into<String>) -> Result<Participant, Error> {
        let name = name.into();
        self.request(|reply| Command::Join { id, name, reply })
            .await
    }

    /// Removes a participant from the match
    ///
    /// # Errors
    ///
    /// Returns `Error::MatchClosed` if the match is gone and `Error::Game` if
    /// the participant is not in the match.
    pub async fn leave(&self, id: Id) -> Result<(), Error> {
        self.request(|reply| Command::Leave { id, reply }).await
    }

    /// Marks a participant as ready or not ready
    ///
    /// # Errors
    ///
    /// Returns `Error::MatchClosed` if the match is gone and `Error::Game` if
    /// the match rejected the change.
    pub async fn set_ready(&self, id: Id, ready: bool) -> Result<(), Error> {
        self.request(|reply| Command::SetReady { id, ready, reply })
            .await
    }

    /// Starts the match on behalf of the host
    ///
    /// # Errors
    ///
    /// Returns `Error::MatchClosed` if the match is gone and `Error::Game` if
    /// the match cannot start.
    pub async fn start(&self, requester: Id) -> Result<(), Error> {
        self.request(|reply| Command::Start { requester, reply })
            .await
    }

    /// Submits an answer to the current question
    ///
    /// # Errors
    ///
    /// Returns `Error::MatchClosed` if the match is gone and `Error::Game` if
    /// the answer was rejected.
    pub async fn submit(
        &self,
        id: Id,
        question: QuestionId,
        option: OptionId,
    ) -> Result<(), Error> {
        self.request(|reply| Command::Submit {
            id,
            question,
            option,
            reply,
        })
        .await
    }

    /// Takes a read-only view of the match
    ///
    /// # Errors
    ///
    /// Returns `Error::MatchClosed` if the match is gone.
    pub async fn snapshot(&self) -> Result<MatchSnapshot, Error> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Snapshot { reply })
            .await
            .map_err(|_| Error::MatchClosed)?;
        response.await.map_err(|_| Error::MatchClosed)
    }
}

/// The sleeping task that will deliver the next alarm
///
/// A match has at most one alarm pending, so scheduling a new one aborts the
/// previous task.
#[derive(Default)]
struct Timer {
    anchor: Option<(TimerHandle, Instant)>,
    pending: Option<JoinHandle<()>>,
}

impl Timer {
    /// Sleeps towards `countdown start + offset`, so a slow tick does not
    /// delay the ones after it
    fn schedule(&mut self, alarm: Alarm, offset: Duration, alarms: &mpsc::UnboundedSender<Alarm>) {
        let start = match self.anchor {
            Some((handle, start)) if handle == alarm.handle => start,
            _ => {
                let now = Instant::now();
                self.anchor = Some((alarm.handle, now));
                now
            }
        };

        self.stop();
        let deadline = start + offset;
        let alarms = alarms.clone();
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            // The match may have finished in the meantime.
            let _ = alarms.send(alarm);
        }));
    }

    fn stop(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.abort();
        }
    }
}

/// Builds the callback a match uses to request alarms
fn scheduler<'a>(
    timer: &'a mut Timer,
    alarms: &'a mpsc::UnboundedSender<Alarm>,
) -> impl FnMut(Alarm, Duration) + 'a {
    move |alarm, offset| timer.schedule(alarm, offset, alarms)
}

/// The task that owns a match
pub struct MatchActor<T: Tunnel> {
    game: Match,
    tunnel: T,
    commands: mpsc::Receiver<Command>,
    alarm_tx: mpsc::UnboundedSender<Alarm>,
    alarm_rx: mpsc::UnboundedReceiver<Alarm>,
    timer: Timer,
}

impl<T: Tunnel> MatchActor<T> {
    /// Wraps a match in an actor
    ///
    /// # Arguments
    ///
    /// * `game` - The match to drive
    /// * `tunnel` - Where the match's updates are sent
    ///
    /// # Returns
    ///
    /// The actor, which still has to be run, and a handle to it
    pub fn new(game: Match, tunnel: T) -> (Self, MatchHandle) {
        let (command_tx, commands) = mpsc::channel(COMMAND_BUFFER);
        let (alarm_tx, alarm_rx) = mpsc::unbounded_channel();

        let handle = MatchHandle {
            code: game.code(),
            commands: command_tx,
        };

        (
            Self {
                game,
                tunnel,
                commands,
                alarm_tx,
                alarm_rx,
                timer: Timer::default(),
            },
            handle,
        )
    }

    /// Processes commands and alarms until the match finishes or every
    /// handle is dropped, then closes the tunnel
    pub async fn run(mut self) {
        let code = self.game.code();
        info!(%code, "match actor started");

        self.flush();

        while !self.game.is_finished() {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => self.handle(command),
                    None => {
                        info!(%code, "every handle dropped, stopping match");
                        break;
                    }
                },
                Some(alarm) = self.alarm_rx.recv() => {
                    self.game
                        .receive_alarm(alarm, scheduler(&mut self.timer, &self.alarm_tx));
                }
            }

            self.flush();
        }

        info!(%code, state = ?self.game.state(), "match actor stopped");
        self.timer.stop();
        self.tunnel.close();
    }

    fn flush(&mut self) {
        for message in self.game.drain_events() {
            self.tunnel.send_message(&message);
        }
    }

    fn handle(&mut self, command: Command) {
        let game = &mut self.game;
        let schedule = scheduler(&mut self.timer, &self.alarm_tx);

        let delivered = match command {
            Command::Join { id, name, reply } => reply.send(game.join(id, &name)).is_ok(),
            Command::Leave { id, reply } => reply.send(game.leave(id, schedule)).is_ok(),
            Command::SetReady { id, ready, reply } => reply.send(game.set_ready(id, ready)).is_ok(),
            Command::Start { requester, reply } => {
                reply.send(game.start(requester, schedule)).is_ok()
            }
            Command::Submit {
                id,
                question,
                option,
                reply,
            } => reply
                .send(game.submit(id, &question, &option, schedule))
                .is_ok(),
            Command::Snapshot { reply } => reply.send(game.snapshot()).is_ok(),
        };

        if !delivered {
            debug!(code = %game.code(), "requester went away before the reply");
        }
    }

    /// Spawns the actor on the current tokio runtime
    ///
    /// # Returns
    ///
    /// A handle to the running match
    pub fn spawn(game: Match, tunnel: T) -> MatchHandle
    where
        T: Send + 'static,
    {
        let (actor, handle) = Self::new(game, tunnel);
        tokio::spawn(actor.run());
        handle
    }
}
