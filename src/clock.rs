//! Per-match countdown timer
//!
//! The clock never sleeps by itself. Starting a countdown asks the caller's
//! scheduler to deliver an [`Alarm`] one second later; feeding that alarm back
//! through [`Clock::receive_alarm`] produces a [`ClockEvent`] and schedules the
//! following alarm. Only one countdown is active at a time, and alarms that
//! belong to a cancelled or superseded countdown are discarded.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Identifies one started countdown
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
    derive_more::Display,
)]
#[display("timer#{_0}")]
pub struct TimerHandle(u64);

/// A wake-up request produced by the clock
///
/// `tick` counts the seconds elapsed since the countdown started once this
/// alarm fires, which lets the scheduler place it at an absolute deadline
/// instead of chaining relative sleeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alarm {
    /// The countdown this alarm belongs to
    pub handle: TimerHandle,
    /// Seconds elapsed since the countdown started when this alarm fires
    pub tick: u64,
}

impl Alarm {
    /// Offset of this alarm from the start of its countdown
    pub fn offset(&self) -> Duration {
        Duration::from_secs(self.tick)
    }
}

/// Observable result of delivering an alarm to the clock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ClockEvent {
    /// One second passed, `remaining` seconds are left
    Tick {
        /// Whole seconds left on the countdown
        remaining: u64,
    },
    /// The countdown reached zero; no further events follow
    Expired,
}

#[derive(Debug, Clone, Copy)]
struct Countdown {
    handle: TimerHandle,
    duration: u64,
    elapsed: u64,
}

impl Countdown {
    fn remaining(&self) -> u64 {
        self.duration.saturating_sub(self.elapsed)
    }

    fn next_alarm(&self) -> Alarm {
        Alarm {
            handle: self.handle,
            tick: self.elapsed + 1,
        }
    }
}

/// A countdown source holding at most one active timer
#[derive(Debug, Default)]
pub struct Clock {
    issued: u64,
    active: Option<Countdown>,
}

impl Clock {
    /// Starts a countdown of `seconds`, replacing any active one
    ///
    /// The first alarm is handed to `schedule` immediately. A zero-length
    /// countdown schedules a single alarm with no delay which expires it.
    ///
    /// # Arguments
    ///
    /// * `seconds` - Length of the countdown
    /// * `schedule` - Called with each alarm and its offset from the countdown start
    ///
    /// # Returns
    ///
    /// The handle identifying the new countdown
    pub fn start<S: FnMut(Alarm, Duration)>(
        &mut self,
        seconds: u64,
        mut schedule: S,
    ) -> TimerHandle {
        if let Some(previous) = self.active.take() {
            debug!(timer = %previous.handle, "replacing active countdown");
        }

        self.issued += 1;
        let countdown = Countdown {
            handle: TimerHandle(self.issued),
            duration: seconds,
            elapsed: 0,
        };
        self.active = Some(countdown);

        let alarm = if seconds == 0 {
            Alarm {
                handle: countdown.handle,
                tick: 0,
            }
        } else {
            countdown.next_alarm()
        };
        schedule(alarm, alarm.offset());

        countdown.handle
    }

    /// Stops the countdown identified by `handle`
    ///
    /// Cancelling an unknown, expired or already cancelled handle does nothing.
    ///
    /// # Returns
    ///
    /// `true` if an active countdown was stopped
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        match self.active {
            Some(countdown) if countdown.handle == handle => {
                self.active = None;
                true
            }
            _ => false,
        }
    }

    /// Stops whatever countdown is active, if any
    pub fn cancel_active(&mut self) {
        self.active = None;
    }

    /// Handle of the active countdown
    pub fn active(&self) -> Option<TimerHandle> {
        self.active.map(|countdown| countdown.handle)
    }

    /// Whether `handle` is still counting down
    pub fn is_active(&self, handle: TimerHandle) -> bool {
        self.active() == Some(handle)
    }

    /// Whole seconds left on the active countdown
    pub fn remaining(&self) -> Option<u64> {
        self.active.map(|countdown| countdown.remaining())
    }

    /// Delivers a fired alarm to the clock
    ///
    /// Alarms for a countdown that is no longer active, or that arrive out of
    /// sequence, are dropped and yield `None`.
    ///
    /// # Arguments
    ///
    /// * `alarm` - The alarm that fired
    /// * `schedule` - Receives the next alarm when the countdown continues
    ///
    /// # Returns
    ///
    /// The tick or expiry produced by the alarm, or `None` if it was stale
    pub fn receive_alarm<S: FnMut(Alarm, Duration)>(
        &mut self,
        alarm: Alarm,
        mut schedule: S,
    ) -> Option<ClockEvent> {
        let Some(countdown) = self.active.as_mut() else {
            debug!(
                timer = %alarm.handle,
                tick = alarm.tick,
                "discarding alarm with no active countdown"
            );
            return None;
        };

        let expected = if countdown.duration == 0 {
            0
        } else {
            countdown.elapsed + 1
        };

        if countdown.handle != alarm.handle || alarm.tick != expected {
            debug!(
                timer = %alarm.handle,
                tick = alarm.tick,
                active = %countdown.handle,
                "discarding stale alarm"
            );
            return None;
        }

        countdown.elapsed = alarm.tick;

        match countdown.remaining() {
            0 => {
                self.active = None;
                Some(ClockEvent::Expired)
            }
            remaining => {
                let next = countdown.next_alarm();
                schedule(next, next.offset());
                Some(ClockEvent::Tick { remaining })
            }
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn run_to_end(clock: &mut Clock, first: Alarm) -> Vec<ClockEvent> {
        let mut events = Vec::new();
        let mut pending = vec![first];
        while let Some(alarm) = pending.pop() {
            if let Some(event) = clock.receive_alarm(alarm, |next, _| pending.push(next)) {
                events.push(event);
            }
        }
        events
    }

    #[test]
    fn test_countdown_ticks_down_then_expires() {
        let mut clock = Clock::default();
        let mut scheduled = Vec::new();
        let handle = clock.start(3, |alarm, offset| scheduled.push((alarm, offset)));

        assert_eq!(scheduled.len(), 1);
        assert_eq!(scheduled[0].0, Alarm { handle, tick: 1 });
        assert_eq!(scheduled[0].1, Duration::from_secs(1));

        let events = run_to_end(&mut clock, scheduled[0].0);
        assert_eq!(
            events,
            vec![
                ClockEvent::Tick { remaining: 2 },
                ClockEvent::Tick { remaining: 1 },
                ClockEvent::Expired,
            ]
        );
        assert!(!clock.is_active(handle));
        assert_eq!(clock.remaining(), None);
    }

    #[test]
    fn test_alarm_offsets_are_absolute() {
        let mut clock = Clock::default();
        let mut offsets = Vec::new();
        let mut pending = Vec::new();
        clock.start(4, |alarm, offset| {
            offsets.push(offset);
            pending.push(alarm);
        });
        while let Some(alarm) = pending.pop() {
            clock.receive_alarm(alarm, |next, offset| {
                offsets.push(offset);
                pending.push(next);
            });
        }
        assert_eq!(
            offsets,
            (1..=4).map(Duration::from_secs).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_zero_length_countdown_expires_immediately() {
        let mut clock = Clock::default();
        let mut scheduled = Vec::new();
        clock.start(0, |alarm, offset| scheduled.push((alarm, offset)));

        assert_eq!(scheduled[0].1, Duration::ZERO);
        assert_eq!(
            clock.receive_alarm(scheduled[0].0, |_, _| panic!("no follow-up alarm")),
            Some(ClockEvent::Expired)
        );
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let mut clock = Clock::default();
        let handle = clock.start(10, |_, _| {});

        assert!(clock.cancel(handle));
        assert!(!clock.cancel(handle));
        assert!(!clock.cancel(TimerHandle(999)));
        assert_eq!(clock.active(), None);
    }

    #[test]
    fn test_cancelled_countdown_emits_nothing() {
        let mut clock = Clock::default();
        let mut scheduled = Vec::new();
        let handle = clock.start(5, |alarm, _| scheduled.push(alarm));
        clock.cancel(handle);

        assert_eq!(clock.receive_alarm(scheduled[0], |_, _| {}), None);
    }

    #[test]
    fn test_restart_supersedes_previous_countdown() {
        let mut clock = Clock::default();
        let mut scheduled = Vec::new();
        let first = clock.start(5, |alarm, _| scheduled.push(alarm));
        let second = clock.start(5, |alarm, _| scheduled.push(alarm));

        assert_ne!(first, second);
        assert!(!clock.is_active(first));
        assert_eq!(clock.receive_alarm(scheduled[0], |_, _| {}), None);
        assert_eq!(
            clock.receive_alarm(scheduled[1], |_, _| {}),
            Some(ClockEvent::Tick { remaining: 4 })
        );
    }

    #[test]
    fn test_duplicate_alarm_is_discarded() {
        let mut clock = Clock::default();
        let mut scheduled = Vec::new();
        clock.start(5, |alarm, _| scheduled.push(alarm));
        let alarm = scheduled[0];

        assert!(clock.receive_alarm(alarm, |_, _| {}).is_some());
        assert_eq!(clock.receive_alarm(alarm, |_, _| {}), None);
        assert_eq!(clock.remaining(), Some(4));
    }

    #[test]
    fn test_ticks_strictly_decrease() {
        let mut clock = Clock::default();
        let mut first = None;
        clock.start(20, |alarm, _| first = Some(alarm));
        let Some(first) = first else {
            panic!("no alarm scheduled");
        };

        let remaining: Vec<u64> = run_to_end(&mut clock, first)
            .into_iter()
            .filter_map(|event| match event {
                ClockEvent::Tick { remaining } => Some(remaining),
                ClockEvent::Expired => None,
            })
            .collect();

        assert_eq!(remaining.len(), 19);
        assert!(remaining.windows(2).all(|pair| pair[0] == pair[1] + 1));
    }
}
