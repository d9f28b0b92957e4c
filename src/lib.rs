//! # Quiz Duel Engine
//!
//! This library provides the core logic of a real-time, multi-participant quiz
//! battle: a group of participants answers a fixed sequence of timed questions,
//! every answer is scored on correctness and speed, and the match ends with
//! ranked standings.
//!
//! The [`game::Match`] state machine performs no I/O and can be driven by hand,
//! which is how its tests run. [`actor::MatchActor`] puts a match on its own
//! tokio task, and [`registry::MatchRegistry`] keeps every running match
//! reachable by its [`join_code::JoinCode`].
//!
//! ```rust
//! use std::{sync::Arc, time::Duration};
//!
//! use quizduel::{
//!     config::Options,
//!     game::{Match, State},
//!     join_code::JoinCode,
//!     question::Question,
//!     roster::Id,
//! };
//!
//! let host = Id::new();
//! let question = Arc::new(Question::new(
//!     "q1",
//!     "What is 2 + 2?",
//!     [("a", "4"), ("b", "5")],
//!     "a",
//!     "Basic arithmetic.",
//! ));
//! let options = Options::default().with_starting_countdown(Duration::ZERO);
//!
//! let mut game = Match::new(JoinCode::new(), vec![question], options, host, "Host")?;
//! game.set_ready(host, true)?;
//!
//! let mut alarms = Vec::new();
//! game.start(host, |alarm, _| alarms.push(alarm))?;
//!
//! assert_eq!(game.state(), State::Question(0));
//! assert_eq!(alarms.len(), 1);
//! # Ok::<(), quizduel::game::Error>(())
//! ```

#![cfg_attr(all(coverage_nightly, test), feature(coverage_attribute))]
#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::similar_names)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::ignored_unit_patterns)]
#![allow(clippy::struct_field_names)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::wildcard_imports)]

pub mod constants;

pub mod actor;
pub mod clock;
pub mod config;
pub mod game;
pub mod join_code;
pub mod leaderboard;
pub mod names;
pub mod question;
pub mod registry;
pub mod roster;
pub mod scoring;
pub mod session;
