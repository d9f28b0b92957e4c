//! Participant roster
//!
//! This module tracks everyone taking part in a match: their identity, their
//! role (host or guest), their readiness before the match starts and their
//! cumulative score. Participants are kept in join order, which is also the
//! tie-break order of the final standings.

use std::{collections::HashSet, fmt::Display, str::FromStr};

use enum_map::{Enum, EnumMap};
use serde::{Deserialize, Serialize};
use serde_with::{DeserializeFromStr, SerializeDisplay};
use thiserror::Error;
use uuid::Uuid;

/// A unique identifier for participants in a match
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, DeserializeFromStr, SerializeDisplay,
)]
pub struct Id(Uuid);

impl Id {
    /// Creates a new random participant ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for Id {
    /// Creates a new random participant ID (same as `new()`)
    fn default() -> Self {
        Self::new()
    }
}

impl Display for Id {
    /// Formats the ID as a UUID string
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for Id {
    type Err = uuid::Error;

    /// Parses an ID from a UUID string
    ///
    /// # Errors
    ///
    /// Returns a `uuid::Error` if the string is not a valid UUID.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::from_str(s)?))
    }
}

/// The role a participant holds in a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Enum, Serialize, Deserialize)]
pub enum Role {
    /// Created the match and may start it
    Host,
    /// Joined with the match's code
    Guest,
}

/// A participant and their match-local state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Participant {
    /// Stable identifier
    pub id: Id,
    /// Validated display name
    pub display_name: String,
    /// Host or guest
    pub role: Role,
    /// Readiness toggle used while waiting for the match to start
    pub is_ready: bool,
    /// Sum of points earned so far
    pub score: u64,
    /// Position in the order participants joined (0 for the creator)
    pub join_order: u64,
}

impl Participant {
    /// Whether this participant currently holds the host role
    pub fn is_host(&self) -> bool {
        self.role == Role::Host
    }
}

/// Errors that can occur when changing the roster
#[derive(Error, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The match has reached its participant limit
    #[error("maximum number of participants reached")]
    MaximumParticipants,
    /// A participant with this ID is already in the match
    #[error("participant already joined")]
    AlreadyJoined,
}

/// What happened when a participant left
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Departure {
    /// The participant that was removed
    pub participant: Participant,
    /// The participant promoted to host, if the host left and anyone remains
    pub new_host: Option<Id>,
}

/// All participants of one match, in join order
#[derive(Debug, Clone)]
pub struct Roster {
    participants: Vec<Participant>,
    by_role: EnumMap<Role, HashSet<Id>>,
    next_join_order: u64,
    capacity: usize,
}

impl Roster {
    /// Creates a roster whose first member is the host
    ///
    /// # Arguments
    ///
    /// * `host_id` - The ID of the creating participant
    /// * `display_name` - The host's validated display name
    /// * `capacity` - Maximum number of participants, host included
    pub fn with_host(host_id: Id, display_name: String, capacity: usize) -> Self {
        let mut roster = Self {
            participants: Vec::new(),
            by_role: EnumMap::default(),
            next_join_order: 0,
            capacity,
        };
        roster.insert(host_id, display_name, Role::Host);
        roster
    }

    fn insert(&mut self, id: Id, display_name: String, role: Role) {
        self.participants.push(Participant {
            id,
            display_name,
            role,
            is_ready: false,
            score: 0,
            join_order: self.next_join_order,
        });
        self.by_role[role].insert(id);
        self.next_join_order += 1;
    }

    /// Checks whether `id` could join right now
    ///
    /// # Errors
    ///
    /// Returns `Error::AlreadyJoined` or `Error::MaximumParticipants`.
    pub fn check_join(&self, id: Id) -> Result<(), Error> {
        if self.contains(id) {
            return Err(Error::AlreadyJoined);
        }
        if self.participants.len() >= self.capacity {
            return Err(Error::MaximumParticipants);
        }
        Ok(())
    }

    /// Adds a guest at the end of the join order
    ///
    /// An empty roster (everyone left) makes the newcomer host.
    ///
    /// # Errors
    ///
    /// Returns `Error::AlreadyJoined` if the ID is present and
    /// `Error::MaximumParticipants` if the roster is full.
    pub fn join(&mut self, id: Id, display_name: String) -> Result<&Participant, Error> {
        self.check_join(id)?;

        let role = if self.host().is_some() {
            Role::Guest
        } else {
            Role::Host
        };
        self.insert(id, display_name, role);

        Ok(&self.participants[self.participants.len() - 1])
    }

    /// Removes a participant, handing the host role to the earliest joiner left
    ///
    /// # Returns
    ///
    /// The departure, or `None` if the participant was not in the roster
    pub fn leave(&mut self, id: Id) -> Option<Departure> {
        let position = self.participants.iter().position(|p| p.id == id)?;
        let participant = self.participants.remove(position);
        self.by_role[participant.role].remove(&id);

        let new_host = if participant.is_host() {
            self.participants.first_mut().map(|successor| {
                self.by_role[successor.role].remove(&successor.id);
                successor.role = Role::Host;
                self.by_role[Role::Host].insert(successor.id);
                successor.id
            })
        } else {
            None
        };

        Some(Departure {
            participant,
            new_host,
        })
    }

    /// Looks up a participant
    pub fn get(&self, id: Id) -> Option<&Participant> {
        self.participants.iter().find(|p| p.id == id)
    }

    fn get_mut(&mut self, id: Id) -> Option<&mut Participant> {
        self.participants.iter_mut().find(|p| p.id == id)
    }

    /// Whether the participant is in the roster
    pub fn contains(&self, id: Id) -> bool {
        self.by_role.values().any(|ids| ids.contains(&id))
    }

    /// The current host, if anyone is left
    pub fn host(&self) -> Option<Id> {
        self.by_role[Role::Host].iter().next().copied()
    }

    /// Number of participants holding `role`
    pub fn count(&self, role: Role) -> usize {
        self.by_role[role].len()
    }

    /// Number of participants
    pub fn len(&self) -> usize {
        self.participants.len()
    }

    /// Whether everyone has left
    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    /// Maximum number of participants
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Participants in join order
    pub fn iter(&self) -> impl Iterator<Item = &Participant> {
        self.participants.iter()
    }

    /// Participant IDs in join order
    pub fn ids(&self) -> impl Iterator<Item = Id> + '_ {
        self.participants.iter().map(|p| p.id)
    }

    /// Sets a participant's readiness
    ///
    /// # Returns
    ///
    /// `false` if the participant is not in the roster
    pub fn set_ready(&mut self, id: Id, ready: bool) -> bool {
        match self.get_mut(id) {
            Some(participant) => {
                participant.is_ready = ready;
                true
            }
            None => false,
        }
    }

    /// Whether the roster is non-empty and every participant is ready
    pub fn all_ready(&self) -> bool {
        !self.participants.is_empty() && self.participants.iter().all(|p| p.is_ready)
    }

    /// Adds points to a participant's score
    ///
    /// # Returns
    ///
    /// The new score, or `None` if the participant is not in the roster
    pub fn award(&mut self, id: Id, points: u64) -> Option<u64> {
        let participant = self.get_mut(id)?;
        participant.score = participant.score.saturating_add(points);
        Some(participant.score)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn roster_with_guests(guests: usize) -> (Roster, Vec<Id>) {
        let host = Id::new();
        let mut roster = Roster::with_host(host, "Host".to_string(), 10);
        let mut ids = vec![host];
        for i in 0..guests {
            let id = Id::new();
            roster.join(id, format!("Guest {i}")).unwrap();
            ids.push(id);
        }
        (roster, ids)
    }

    #[test]
    fn test_id_round_trips_through_string() {
        let id = Id::new();
        assert_eq!(Id::from_str(&id.to_string()).unwrap(), id);
        assert!(Id::from_str("not-a-uuid").is_err());
    }

    #[test]
    fn test_with_host() {
        let (roster, ids) = roster_with_guests(0);
        assert_eq!(roster.len(), 1);
        assert_eq!(roster.host(), Some(ids[0]));
        assert!(roster.get(ids[0]).unwrap().is_host());
        assert_eq!(roster.get(ids[0]).unwrap().score, 0);
    }

    #[test]
    fn test_join_order_is_kept() {
        let (roster, ids) = roster_with_guests(3);
        assert_eq!(roster.ids().collect::<Vec<_>>(), ids);
        assert_eq!(
            roster.iter().map(|p| p.join_order).collect::<Vec<_>>(),
            vec![0, 1, 2, 3]
        );
        assert_eq!(roster.count(Role::Guest), 3);
        assert_eq!(roster.count(Role::Host), 1);
    }

    #[test]
    fn test_join_twice_is_rejected() {
        let (mut roster, ids) = roster_with_guests(1);
        assert_eq!(
            roster.join(ids[1], "Again".to_string()).unwrap_err(),
            Error::AlreadyJoined
        );
    }

    #[test]
    fn test_capacity_is_enforced() {
        let mut roster = Roster::with_host(Id::new(), "Host".to_string(), 2);
        roster.join(Id::new(), "Guest".to_string()).unwrap();
        assert_eq!(
            roster.join(Id::new(), "Late".to_string()).unwrap_err(),
            Error::MaximumParticipants
        );
    }

    #[test]
    fn test_guest_leaving_keeps_host() {
        let (mut roster, ids) = roster_with_guests(2);
        let departure = roster.leave(ids[1]).unwrap();
        assert_eq!(departure.participant.id, ids[1]);
        assert_eq!(departure.new_host, None);
        assert_eq!(roster.host(), Some(ids[0]));
        assert!(!roster.contains(ids[1]));
    }

    #[test]
    fn test_host_leaving_promotes_earliest_joiner() {
        let (mut roster, ids) = roster_with_guests(2);
        let departure = roster.leave(ids[0]).unwrap();
        assert_eq!(departure.new_host, Some(ids[1]));
        assert_eq!(roster.host(), Some(ids[1]));
        assert!(roster.get(ids[1]).unwrap().is_host());
        assert_eq!(roster.count(Role::Host), 1);
        assert_eq!(roster.count(Role::Guest), 1);
    }

    #[test]
    fn test_last_participant_leaving() {
        let (mut roster, ids) = roster_with_guests(0);
        let departure = roster.leave(ids[0]).unwrap();
        assert_eq!(departure.new_host, None);
        assert!(roster.is_empty());
        assert_eq!(roster.host(), None);
        assert!(roster.leave(ids[0]).is_none());
    }

    #[test]
    fn test_join_into_empty_roster_becomes_host() {
        let (mut roster, ids) = roster_with_guests(0);
        roster.leave(ids[0]);
        let newcomer = Id::new();
        assert!(roster.join(newcomer, "New".to_string()).unwrap().is_host());
    }

    #[test]
    fn test_all_ready() {
        let (mut roster, ids) = roster_with_guests(1);
        assert!(!roster.all_ready());
        roster.set_ready(ids[0], true);
        assert!(!roster.all_ready());
        roster.set_ready(ids[1], true);
        assert!(roster.all_ready());
        roster.set_ready(ids[1], false);
        assert!(!roster.all_ready());
        assert!(!roster.set_ready(Id::new(), true));
    }

    #[test]
    fn test_award_accumulates() {
        let (mut roster, ids) = roster_with_guests(1);
        assert_eq!(roster.award(ids[1], 750), Some(750));
        assert_eq!(roster.award(ids[1], 0), Some(750));
        assert_eq!(roster.award(ids[1], 250), Some(1000));
        assert_eq!(roster.award(Id::new(), 10), None);
    }
}
