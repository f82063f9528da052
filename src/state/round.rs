use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::scoring::GameType;

/// Lifecycle status of a room's round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RoundStatus {
    /// Lobby: players gather and the creator can start a round.
    #[default]
    Waiting,
    /// A mini-game is running and players are submitting.
    Playing,
    /// Every player submitted; results are shown until the reset.
    RoundEnd,
}

/// Events that move a round along its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundEvent {
    /// Creator starts a round of the given mini-game.
    StartRound(GameType),
    /// The last outstanding player submitted.
    AllSubmitted,
    /// Results were shown; return to the lobby.
    Reset,
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// The status the round was in when the invalid event was received.
    pub from: RoundStatus,
    /// The event that cannot be applied from this status.
    pub event: RoundEvent,
}

impl RoundStatus {
    /// Compute the status reached by applying `event`, if the transition is valid.
    pub fn next(self, event: RoundEvent) -> Result<RoundStatus, InvalidTransition> {
        let next = match (self, event) {
            (RoundStatus::Waiting, RoundEvent::StartRound(_)) => RoundStatus::Playing,
            (RoundStatus::Playing, RoundEvent::AllSubmitted) => RoundStatus::RoundEnd,
            (RoundStatus::RoundEnd, RoundEvent::Reset) => RoundStatus::Waiting,
            (from, event) => return Err(InvalidTransition { from, event }),
        };

        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(status: RoundStatus, event: RoundEvent) -> RoundStatus {
        status.next(event).unwrap()
    }

    #[test]
    fn initial_status_is_waiting() {
        assert_eq!(RoundStatus::default(), RoundStatus::Waiting);
    }

    #[test]
    fn full_cycle_returns_to_waiting() {
        let mut status = RoundStatus::Waiting;
        status = apply(status, RoundEvent::StartRound(GameType::Password));
        assert_eq!(status, RoundStatus::Playing);
        status = apply(status, RoundEvent::AllSubmitted);
        assert_eq!(status, RoundStatus::RoundEnd);
        status = apply(status, RoundEvent::Reset);
        assert_eq!(status, RoundStatus::Waiting);
    }

    #[test]
    fn every_other_pair_is_rejected() {
        let statuses = [RoundStatus::Waiting, RoundStatus::Playing, RoundStatus::RoundEnd];
        let events = [
            RoundEvent::StartRound(GameType::Network),
            RoundEvent::AllSubmitted,
            RoundEvent::Reset,
        ];
        let mut accepted = 0;
        for from in statuses {
            for event in events {
                match from.next(event) {
                    Ok(_) => accepted += 1,
                    Err(invalid) => {
                        assert_eq!(invalid.from, from);
                        assert_eq!(invalid.event, event);
                    }
                }
            }
        }
        assert_eq!(accepted, 3);
    }

    #[test]
    fn cannot_skip_round_end() {
        let err = RoundStatus::Playing.next(RoundEvent::Reset).unwrap_err();
        assert_eq!(err.from, RoundStatus::Playing);
        assert!(RoundStatus::Waiting.next(RoundEvent::AllSubmitted).is_err());
    }
}
