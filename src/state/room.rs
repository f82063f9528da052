use std::time::{Duration, SystemTime};

use indexmap::IndexMap;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    dao::models::{
        GameScoreEntity, GameStateEntity, PlayerEntity, PlayerStatsEntity, RoomEntity,
        RoundSummaryEntity,
    },
    scoring::{GameType, ScoreCard},
    state::round::{InvalidTransition, RoundEvent, RoundStatus},
};

/// Maximum number of players in a room.
pub const MAX_PLAYERS: usize = 8;
/// Players required before the creator can start a round.
pub const MIN_PLAYERS_TO_START: usize = 2;

/// Opaque player identifier.
pub type PlayerId = String;

/// Score recorded for one player in one round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameScore {
    /// Seconds remaining at submission.
    pub time_left: u32,
    /// Game specific performance score.
    pub complexity: u32,
    /// Ranking key.
    pub total: u32,
    /// 1-based rank in submission order.
    pub place: u32,
    /// When the score was recorded.
    pub completed_at: SystemTime,
}

/// Cumulative statistics of a player across rounds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlayerStats {
    /// Rounds completed.
    pub total_games: u32,
    /// Rounds finished in first place.
    pub wins: u32,
    /// Sum of round totals.
    pub total_score: u64,
    /// Highest time left ever submitted with.
    pub best_time: u32,
    /// Sum of places, kept so the average stays exact.
    pub place_sum: u64,
}

impl PlayerStats {
    /// Mean place over every completed round (0 before the first one).
    pub fn average_place(&self) -> f64 {
        if self.total_games == 0 {
            0.0
        } else {
            self.place_sum as f64 / f64::from(self.total_games)
        }
    }

    fn record(&mut self, score: &GameScore) {
        self.total_games += 1;
        if score.place == 1 {
            self.wins += 1;
        }
        self.total_score += u64::from(score.total);
        self.best_time = self.best_time.max(score.time_left);
        self.place_sum += u64::from(score.place);
    }
}

/// Member of a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    /// Opaque identifier.
    pub id: PlayerId,
    /// Display name, not unique.
    pub name: String,
    /// When the player joined.
    pub joined_at: SystemTime,
    /// Current round score.
    pub score: Option<GameScore>,
    /// Whether the player submitted in the current round.
    pub has_submitted: bool,
    /// Cumulative statistics.
    pub stats: PlayerStats,
}

impl Player {
    fn new(id: PlayerId, name: String, now: SystemTime) -> Self {
        Self {
            id,
            name,
            joined_at: now,
            score: None,
            has_submitted: false,
            stats: PlayerStats::default(),
        }
    }

    fn clear_round(&mut self) {
        self.score = None;
        self.has_submitted = false;
    }
}

/// Summary appended to the history when a round ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundSummary {
    /// Mini-game that was played.
    pub game_type: GameType,
    /// Round counter value during the round.
    pub round: u32,
    /// Players in first place.
    pub winners: Vec<PlayerId>,
    /// Every recorded score keyed by player.
    pub scores: IndexMap<PlayerId, GameScore>,
    /// When the last submission arrived.
    pub ended_at: SystemTime,
}

/// Round state of a room.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GameState {
    /// Mini-game of the current or last round.
    pub game_type: Option<GameType>,
    /// Round counter, bumped on start and on reset.
    pub round: u32,
    /// Lifecycle status.
    pub status: RoundStatus,
    /// When the current round started.
    pub start_time: Option<SystemTime>,
    /// When the current round expires.
    pub deadline: Option<SystemTime>,
    /// Finished rounds, oldest first.
    pub round_history: Vec<RoundSummary>,
}

/// Shared room aggregate. Every protocol is a pure transition on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Room {
    /// Room identifier.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Plaintext join secret.
    pub password: String,
    /// Player allowed to start and reset rounds.
    pub creator_id: Option<PlayerId>,
    /// Players keyed by id, in join order.
    pub players: IndexMap<PlayerId, Player>,
    /// Round state.
    pub game_state: GameState,
    /// True iff the room has players and all of them submitted.
    pub all_submitted: bool,
    /// Compare-and-swap counter.
    pub version: u64,
    /// Creation timestamp.
    pub created_at: SystemTime,
    /// Last committed change.
    pub updated_at: SystemTime,
}

/// Reasons a room protocol rejects a request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoomError {
    /// The supplied password does not match.
    #[error("incorrect password")]
    IncorrectPassword,
    /// The room already holds the maximum number of players.
    #[error("room is full ({max} players)")]
    RoomFull {
        /// Capacity of the room.
        max: usize,
    },
    /// The player is not a member of the room.
    #[error("player {0} is not in this room")]
    PlayerNotInRoom(PlayerId),
    /// A player with this id is already a member.
    #[error("player {0} already joined this room")]
    DuplicatePlayer(PlayerId),
    /// A creator-only action was attempted by someone else.
    #[error("only the room creator can {action}")]
    NotAuthorized {
        /// What was attempted.
        action: &'static str,
    },
    /// Not enough players to start a round.
    #[error("at least {required} players are needed to start a round (have {actual})")]
    InsufficientPlayers {
        /// Minimum player count.
        required: usize,
        /// Current player count.
        actual: usize,
    },
    /// The round status does not allow this event.
    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),
    /// Submission outside of a running round.
    #[error("no round is currently being played")]
    RoundNotActive,
    /// Expiry was asserted before the deadline.
    #[error("the round deadline has not been reached yet")]
    DeadlineNotReached,
}

/// Result of a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The score was recorded.
    Recorded {
        /// Place assigned to the submission.
        place: u32,
        /// Whether this submission ended the round.
        round_ended: bool,
    },
    /// The player had already submitted; nothing changed.
    AlreadySubmitted,
}

impl Room {
    /// Create an empty room waiting for its first player.
    pub fn new(name: String, password: String, now: SystemTime) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            password,
            creator_id: None,
            players: IndexMap::new(),
            game_state: GameState::default(),
            all_submitted: false,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether `player_id` is the room creator.
    pub fn is_creator(&self, player_id: &str) -> bool {
        self.creator_id.as_deref() == Some(player_id)
    }

    /// Look up a member.
    pub fn player(&self, player_id: &str) -> Result<&Player, RoomError> {
        self.players
            .get(player_id)
            .ok_or_else(|| RoomError::PlayerNotInRoom(player_id.to_owned()))
    }

    /// Whether the current round's deadline has passed at `now`.
    pub fn deadline_passed(&self, now: SystemTime) -> bool {
        self.game_state.deadline.is_some_and(|deadline| now >= deadline)
    }

    /// Add a player. The first player of an empty room becomes its creator.
    pub fn join(
        &mut self,
        player_id: PlayerId,
        name: String,
        password: &str,
        now: SystemTime,
    ) -> Result<&Player, RoomError> {
        if password != self.password {
            return Err(RoomError::IncorrectPassword);
        }
        if self.players.len() >= MAX_PLAYERS {
            return Err(RoomError::RoomFull { max: MAX_PLAYERS });
        }
        if self.players.contains_key(&player_id) {
            return Err(RoomError::DuplicatePlayer(player_id));
        }

        if self.players.is_empty() {
            self.creator_id = Some(player_id.clone());
        }
        self.players.insert(
            player_id.clone(),
            Player::new(player_id.clone(), name, now),
        );
        self.refresh_all_submitted();
        self.player(&player_id)
    }

    /// Start a round of `game_type` lasting `duration`. Creator only.
    pub fn start_round(
        &mut self,
        caller: &str,
        game_type: GameType,
        duration: Duration,
        now: SystemTime,
    ) -> Result<(), RoomError> {
        if !self.is_creator(caller) {
            return Err(RoomError::NotAuthorized {
                action: "start a round",
            });
        }
        if self.players.len() < MIN_PLAYERS_TO_START {
            return Err(RoomError::InsufficientPlayers {
                required: MIN_PLAYERS_TO_START,
                actual: self.players.len(),
            });
        }
        let next = self
            .game_state
            .status
            .next(RoundEvent::StartRound(game_type))?;

        self.players.values_mut().for_each(Player::clear_round);
        self.game_state.game_type = Some(game_type);
        self.game_state.round += 1;
        self.game_state.status = next;
        self.game_state.start_time = Some(now);
        self.game_state.deadline = Some(now + duration);
        self.all_submitted = false;
        Ok(())
    }

    /// Record a player's result. A second submission in the same round is ignored.
    pub fn submit(
        &mut self,
        player_id: &str,
        card: ScoreCard,
        now: SystemTime,
    ) -> Result<SubmitOutcome, RoomError> {
        if self.player(player_id)?.has_submitted {
            return Ok(SubmitOutcome::AlreadySubmitted);
        }
        let game_type = match (self.game_state.status, self.game_state.game_type) {
            (RoundStatus::Playing, Some(game_type)) => game_type,
            _ => return Err(RoomError::RoundNotActive),
        };

        let place = self.players.values().filter(|p| p.score.is_some()).count() as u32 + 1;
        let score = GameScore {
            time_left: card.time_left,
            complexity: card.complexity,
            total: card.total,
            place,
            completed_at: now,
        };
        if let Some(player) = self.players.get_mut(player_id) {
            player.score = Some(score);
            player.has_submitted = true;
            player.stats.record(&score);
        }
        self.refresh_all_submitted();

        let round_ended = self.all_submitted;
        if round_ended {
            self.finish_round(game_type, now)?;
        }
        Ok(SubmitOutcome::Recorded { place, round_ended })
    }

    /// Return to the lobby after a finished round. No-op when already waiting.
    pub fn reset_round(&mut self) -> Result<bool, RoomError> {
        let status = self.game_state.status;
        if status == RoundStatus::Waiting {
            return Ok(false);
        }
        self.game_state.status = status.next(RoundEvent::Reset)?;
        self.players.values_mut().for_each(Player::clear_round);
        self.game_state.round += 1;
        self.game_state.deadline = None;
        self.refresh_all_submitted();
        Ok(true)
    }

    /// Creator-triggered variant of [`Room::reset_round`].
    pub fn reset_round_by(&mut self, caller: &str) -> Result<bool, RoomError> {
        if !self.is_creator(caller) {
            return Err(RoomError::NotAuthorized {
                action: "reset the round",
            });
        }
        self.reset_round()
    }

    /// Auto-submit every outstanding player once the deadline has passed.
    ///
    /// `partial` provides the score card of a player who ran out of time.
    /// Returns the ids submitted on their behalf, in join order. Outside of a
    /// running round this is a no-op.
    pub fn expire_round(
        &mut self,
        now: SystemTime,
        partial: impl Fn(&Player) -> ScoreCard,
    ) -> Result<Vec<PlayerId>, RoomError> {
        if self.game_state.status != RoundStatus::Playing {
            return Ok(Vec::new());
        }
        if self.game_state.deadline.is_some() && !self.deadline_passed(now) {
            return Err(RoomError::DeadlineNotReached);
        }

        let pending: Vec<(PlayerId, ScoreCard)> = self
            .players
            .values()
            .filter(|p| !p.has_submitted)
            .map(|p| (p.id.clone(), partial(p)))
            .collect();

        let mut submitted = Vec::with_capacity(pending.len());
        for (player_id, card) in pending {
            self.submit(&player_id, card, now)?;
            submitted.push(player_id);
        }
        Ok(submitted)
    }

    fn finish_round(&mut self, game_type: GameType, now: SystemTime) -> Result<(), RoomError> {
        self.game_state.status = self.game_state.status.next(RoundEvent::AllSubmitted)?;
        self.game_state.deadline = None;
        let summary = self.summarize(game_type, now);
        self.game_state.round_history.push(summary);
        Ok(())
    }

    /// Summary of the finished round when the history does not hold it yet.
    ///
    /// A room at `round_end` always owes one entry for its current round.
    pub fn missing_round_summary(&self) -> Option<RoundSummary> {
        let state = &self.game_state;
        if state.status != RoundStatus::RoundEnd {
            return None;
        }
        let game_type = state.game_type?;
        if state
            .round_history
            .iter()
            .any(|summary| summary.round == state.round)
        {
            return None;
        }
        Some(self.summarize(game_type, self.updated_at))
    }

    fn summarize(&self, game_type: GameType, ended_at: SystemTime) -> RoundSummary {
        let scores: IndexMap<PlayerId, GameScore> = self
            .players
            .values()
            .filter_map(|p| p.score.map(|score| (p.id.clone(), score)))
            .collect();
        let winners = scores
            .iter()
            .filter(|(_, score)| score.place == 1)
            .map(|(id, _)| id.clone())
            .collect();
        RoundSummary {
            game_type,
            round: self.game_state.round,
            winners,
            scores,
            ended_at,
        }
    }

    fn refresh_all_submitted(&mut self) {
        self.all_submitted =
            !self.players.is_empty() && self.players.values().all(|p| p.has_submitted);
    }
}

impl From<GameScoreEntity> for GameScore {
    fn from(value: GameScoreEntity) -> Self {
        Self {
            time_left: value.time_left,
            complexity: value.complexity,
            total: value.total,
            place: value.place,
            completed_at: value.completed_at,
        }
    }
}

impl From<GameScore> for GameScoreEntity {
    fn from(value: GameScore) -> Self {
        Self {
            time_left: value.time_left,
            complexity: value.complexity,
            total: value.total,
            place: value.place,
            completed_at: value.completed_at,
        }
    }
}

impl From<PlayerStatsEntity> for PlayerStats {
    fn from(value: PlayerStatsEntity) -> Self {
        Self {
            total_games: value.total_games,
            wins: value.wins,
            total_score: value.total_score,
            best_time: value.best_time,
            place_sum: value.place_sum,
        }
    }
}

impl From<PlayerStats> for PlayerStatsEntity {
    fn from(value: PlayerStats) -> Self {
        Self {
            total_games: value.total_games,
            wins: value.wins,
            total_score: value.total_score,
            best_time: value.best_time,
            place_sum: value.place_sum,
        }
    }
}

impl From<PlayerEntity> for Player {
    fn from(value: PlayerEntity) -> Self {
        Self {
            id: value.id,
            name: value.name,
            joined_at: value.joined_at,
            score: value.score.map(Into::into),
            has_submitted: value.has_submitted,
            stats: value.stats.into(),
        }
    }
}

impl From<Player> for PlayerEntity {
    fn from(value: Player) -> Self {
        Self {
            id: value.id,
            name: value.name,
            joined_at: value.joined_at,
            score: value.score.map(Into::into),
            has_submitted: value.has_submitted,
            stats: value.stats.into(),
        }
    }
}

impl From<RoundSummaryEntity> for RoundSummary {
    fn from(value: RoundSummaryEntity) -> Self {
        Self {
            game_type: value.game_type,
            round: value.round,
            winners: value.winners,
            scores: value
                .scores
                .into_iter()
                .map(|(id, score)| (id, score.into()))
                .collect(),
            ended_at: value.ended_at,
        }
    }
}

impl From<RoundSummary> for RoundSummaryEntity {
    fn from(value: RoundSummary) -> Self {
        Self {
            game_type: value.game_type,
            round: value.round,
            winners: value.winners,
            scores: value
                .scores
                .into_iter()
                .map(|(id, score)| (id, score.into()))
                .collect(),
            ended_at: value.ended_at,
        }
    }
}

impl From<RoomEntity> for Room {
    fn from(value: RoomEntity) -> Self {
        let state = value.game_state;
        Self {
            id: value.id,
            name: value.name,
            password: value.password,
            creator_id: value.creator_id,
            players: value
                .players
                .into_iter()
                .map(|player| (player.id.clone(), player.into()))
                .collect(),
            game_state: GameState {
                game_type: state.game_type,
                round: state.round,
                status: state.status,
                start_time: state.start_time,
                deadline: state.deadline,
                round_history: state.round_history.into_iter().map(Into::into).collect(),
            },
            all_submitted: value.all_submitted,
            version: value.version,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

impl From<Room> for RoomEntity {
    fn from(value: Room) -> Self {
        let state = value.game_state;
        Self {
            id: value.id,
            name: value.name,
            password: value.password,
            creator_id: value.creator_id,
            players: value.players.into_values().map(Into::into).collect(),
            game_state: GameStateEntity {
                game_type: state.game_type,
                round: state.round,
                status: state.status,
                start_time: state.start_time,
                deadline: state.deadline,
                round_history: state.round_history.into_iter().map(Into::into).collect(),
            },
            all_submitted: value.all_submitted,
            version: value.version,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PASSWORD: &str = "letmein";

    fn at(secs: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000 + secs)
    }

    fn card(time_left: u32, complexity: u32) -> ScoreCard {
        ScoreCard {
            time_left,
            complexity,
            total: time_left + complexity,
        }
    }

    fn room_with(players: &[&str]) -> Room {
        let mut room = Room::new("Blue team".into(), PASSWORD.into(), at(0));
        for id in players {
            room.join((*id).into(), id.to_uppercase(), PASSWORD, at(1))
                .unwrap();
        }
        room
    }

    fn started(players: &[&str]) -> Room {
        let mut room = room_with(players);
        room.start_round(
            players[0],
            GameType::Password,
            Duration::from_secs(120),
            at(10),
        )
        .unwrap();
        room
    }

    #[test]
    fn new_room_is_empty_and_waiting() {
        let room = Room::new("r".into(), "p".into(), at(0));
        assert!(room.players.is_empty());
        assert_eq!(room.game_state.round, 0);
        assert_eq!(room.game_state.status, RoundStatus::Waiting);
        assert!(room.creator_id.is_none());
        assert!(!room.all_submitted);
    }

    #[test]
    fn join_rejects_wrong_password() {
        let mut room = room_with(&[]);
        let err = room
            .join("x".into(), "X".into(), "LetMeIn", at(1))
            .unwrap_err();
        assert_eq!(err, RoomError::IncorrectPassword);
        assert!(room.players.is_empty());
    }

    #[test]
    fn capacity_is_capped_at_eight() {
        let ids: Vec<String> = (0..MAX_PLAYERS).map(|i| format!("p{i}")).collect();
        let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        let mut room = room_with(&refs);
        assert_eq!(room.players.len(), MAX_PLAYERS);

        let err = room
            .join("late".into(), "Late".into(), PASSWORD, at(2))
            .unwrap_err();
        assert_eq!(err, RoomError::RoomFull { max: MAX_PLAYERS });
        assert_eq!(room.players.len(), MAX_PLAYERS);
    }

    #[test]
    fn first_joiner_becomes_creator_for_good() {
        let mut room = room_with(&["alice"]);
        assert_eq!(room.creator_id.as_deref(), Some("alice"));
        room.join("bob".into(), "Bob".into(), PASSWORD, at(2))
            .unwrap();
        room.join("carol".into(), "Carol".into(), PASSWORD, at(3))
            .unwrap();
        assert_eq!(room.creator_id.as_deref(), Some("alice"));
        assert!(room.is_creator("alice"));
        assert!(!room.is_creator("bob"));
    }

    #[test]
    fn duplicate_id_is_rejected() {
        let mut room = room_with(&["alice"]);
        let err = room
            .join("alice".into(), "Again".into(), PASSWORD, at(2))
            .unwrap_err();
        assert_eq!(err, RoomError::DuplicatePlayer("alice".into()));
    }

    #[test]
    fn non_creator_cannot_start_and_room_is_unchanged() {
        let mut room = room_with(&["alice", "bob"]);
        let before = room.clone();
        let err = room
            .start_round("bob", GameType::Network, Duration::from_secs(150), at(5))
            .unwrap_err();
        assert!(matches!(err, RoomError::NotAuthorized { .. }));
        assert_eq!(room, before);
    }

    #[test]
    fn start_needs_two_players() {
        let mut room = room_with(&["alice"]);
        let err = room
            .start_round("alice", GameType::Password, Duration::from_secs(120), at(5))
            .unwrap_err();
        assert_eq!(
            err,
            RoomError::InsufficientPlayers {
                required: 2,
                actual: 1
            }
        );
    }

    #[test]
    fn start_sets_round_state() {
        let room = started(&["alice", "bob"]);
        assert_eq!(room.game_state.status, RoundStatus::Playing);
        assert_eq!(room.game_state.round, 1);
        assert_eq!(room.game_state.game_type, Some(GameType::Password));
        assert_eq!(room.game_state.start_time, Some(at(10)));
        assert_eq!(room.game_state.deadline, Some(at(130)));
        assert!(!room.all_submitted);
    }

    #[test]
    fn cannot_start_twice() {
        let mut room = started(&["alice", "bob"]);
        let err = room
            .start_round("alice", GameType::Network, Duration::from_secs(10), at(11))
            .unwrap_err();
        assert!(matches!(err, RoomError::InvalidTransition(_)));
    }

    #[test]
    fn scenario_first_and_second_submission() {
        let mut room = started(&["x", "y"]);

        let first = room.submit("x", card(90, 40), at(40)).unwrap();
        assert_eq!(
            first,
            SubmitOutcome::Recorded {
                place: 1,
                round_ended: false
            }
        );
        let x = room.player("x").unwrap().score.unwrap();
        assert_eq!(x.total, 130);
        assert_eq!(x.place, 1);
        assert!(!room.all_submitted);

        let second = room.submit("y", card(60, 20), at(70)).unwrap();
        assert_eq!(
            second,
            SubmitOutcome::Recorded {
                place: 2,
                round_ended: true
            }
        );
        let y = room.player("y").unwrap().score.unwrap();
        assert_eq!(y.total, 80);
        assert_eq!(y.place, 2);
        assert!(room.all_submitted);
        assert_eq!(room.game_state.status, RoundStatus::RoundEnd);

        let history = &room.game_state.round_history;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].winners, vec!["x".to_string()]);
        assert_eq!(history[0].scores.len(), 2);
        assert_eq!(history[0].game_type, GameType::Password);
    }

    #[test]
    fn second_submission_is_ignored() {
        let mut room = started(&["x", "y", "z"]);
        room.submit("x", card(90, 40), at(40)).unwrap();
        let before = room.clone();
        let again = room.submit("x", card(0, 0), at(41)).unwrap();
        assert_eq!(again, SubmitOutcome::AlreadySubmitted);
        assert_eq!(room, before);
    }

    #[test]
    fn submit_from_stranger_fails() {
        let mut room = started(&["x", "y"]);
        let err = room.submit("ghost", card(1, 1), at(20)).unwrap_err();
        assert_eq!(err, RoomError::PlayerNotInRoom("ghost".into()));
    }

    #[test]
    fn submit_outside_round_fails() {
        let mut room = room_with(&["x", "y"]);
        let err = room.submit("x", card(1, 1), at(20)).unwrap_err();
        assert_eq!(err, RoomError::RoundNotActive);
    }

    #[test]
    fn places_follow_arrival_order_not_score() {
        let mut room = started(&["a", "b", "c", "d"]);
        room.submit("c", card(10, 0), at(20)).unwrap();
        room.submit("a", card(100, 100), at(21)).unwrap();
        room.submit("d", card(50, 0), at(22)).unwrap();
        room.submit("b", card(5, 0), at(23)).unwrap();

        let places: Vec<u32> = ["c", "a", "d", "b"]
            .iter()
            .map(|id| room.player(id).unwrap().score.unwrap().place)
            .collect();
        assert_eq!(places, vec![1, 2, 3, 4]);
    }

    #[test]
    fn all_submitted_tracks_every_submission() {
        let mut room = started(&["a", "b", "c"]);
        for id in ["b", "a", "c"] {
            room.submit(id, card(1, 1), at(30)).unwrap();
            let expected = room.players.values().all(|p| p.has_submitted);
            assert_eq!(room.all_submitted, expected);
        }
        assert!(room.all_submitted);
    }

    #[test]
    fn stats_accumulate_over_rounds() {
        let mut room = room_with(&["a", "b"]);
        let orders = [["a", "b"], ["b", "a"], ["a", "b"]];
        for order in orders {
            room.start_round("a", GameType::Password, Duration::from_secs(120), at(10))
                .unwrap();
            room.submit(order[0], card(30, 10), at(20)).unwrap();
            room.submit(order[1], card(20, 10), at(21)).unwrap();
            assert!(room.reset_round().unwrap());
        }

        let a = room.player("a").unwrap().stats;
        assert_eq!(a.total_games, 3);
        assert_eq!(a.wins, 2);
        assert_eq!(a.total_score, 40 + 30 + 40);
        assert_eq!(a.best_time, 30);
        assert!((a.average_place() - 4.0 / 3.0).abs() < f64::EPSILON);

        let b = room.player("b").unwrap().stats;
        assert_eq!(b.wins, 1);
        assert!((b.average_place() - 5.0 / 3.0).abs() < f64::EPSILON);
        assert_eq!(room.game_state.round, 6);
        assert_eq!(room.game_state.round_history.len(), 3);
    }

    #[test]
    fn reset_clears_round_and_is_idempotent() {
        let mut room = started(&["a", "b"]);
        room.submit("a", card(1, 1), at(20)).unwrap();
        room.submit("b", card(1, 1), at(21)).unwrap();

        assert!(room.reset_round().unwrap());
        assert_eq!(room.game_state.status, RoundStatus::Waiting);
        assert_eq!(room.game_state.round, 2);
        assert!(room.players.values().all(|p| p.score.is_none() && !p.has_submitted));
        assert!(!room.all_submitted);

        let before = room.clone();
        assert!(!room.reset_round().unwrap());
        assert_eq!(room, before);
    }

    #[test]
    fn reset_during_play_is_rejected() {
        let mut room = started(&["a", "b"]);
        let err = room.reset_round().unwrap_err();
        assert!(matches!(err, RoomError::InvalidTransition(_)));
    }

    #[test]
    fn only_creator_resets_manually() {
        let mut room = started(&["a", "b"]);
        room.submit("a", card(1, 1), at(20)).unwrap();
        room.submit("b", card(1, 1), at(21)).unwrap();
        assert!(matches!(
            room.reset_round_by("b").unwrap_err(),
            RoomError::NotAuthorized { .. }
        ));
        assert!(room.reset_round_by("a").unwrap());
    }

    #[test]
    fn expiry_before_deadline_is_rejected() {
        let mut room = started(&["a", "b"]);
        let err = room.expire_round(at(60), |_| ScoreCard::zero()).unwrap_err();
        assert_eq!(err, RoomError::DeadlineNotReached);
    }

    #[test]
    fn expiry_submits_outstanding_players_once() {
        let mut room = started(&["a", "b", "c"]);
        room.submit("b", card(50, 10), at(80)).unwrap();

        let submitted = room
            .expire_round(at(130), |p| {
                if p.id == "c" {
                    card(0, 70)
                } else {
                    ScoreCard::zero()
                }
            })
            .unwrap();
        assert_eq!(submitted, vec!["a".to_string(), "c".to_string()]);
        assert_eq!(room.game_state.status, RoundStatus::RoundEnd);
        assert_eq!(room.player("a").unwrap().score.unwrap().place, 2);
        assert_eq!(room.player("c").unwrap().score.unwrap().total, 70);
        assert_eq!(room.game_state.round_history.len(), 1);

        let again = room.expire_round(at(200), |_| ScoreCard::zero()).unwrap();
        assert!(again.is_empty());
        assert_eq!(room.game_state.round_history.len(), 1);
    }

    #[test]
    fn finished_round_without_history_owes_its_summary() {
        let mut room = started(&["a", "b"]);
        assert!(room.missing_round_summary().is_none());
        room.submit("b", card(40, 10), at(20)).unwrap();
        room.submit("a", card(30, 10), at(30)).unwrap();
        assert!(room.missing_round_summary().is_none());

        let recorded = room.game_state.round_history.pop().unwrap();
        let rebuilt = room.missing_round_summary().unwrap();
        assert_eq!(rebuilt.round, recorded.round);
        assert_eq!(rebuilt.winners, vec!["b".to_string()]);
        assert_eq!(rebuilt.scores, recorded.scores);

        room.reset_round().unwrap();
        assert!(room.missing_round_summary().is_none());
    }

    #[test]
    fn status_only_moves_along_the_cycle() {
        let mut room = room_with(&["a", "b"]);
        let mut seen = vec![room.game_state.status];
        room.start_round("a", GameType::Encryption, Duration::from_secs(180), at(5))
            .unwrap();
        seen.push(room.game_state.status);
        let _ = room.reset_round();
        let _ = room.submit("ghost", card(0, 0), at(6));
        room.submit("a", card(1, 1), at(7)).unwrap();
        seen.push(room.game_state.status);
        room.submit("b", card(1, 1), at(8)).unwrap();
        seen.push(room.game_state.status);
        let _ = room.start_round("a", GameType::Password, Duration::from_secs(1), at(9));
        seen.push(room.game_state.status);
        room.reset_round().unwrap();
        seen.push(room.game_state.status);

        seen.dedup();
        assert_eq!(
            seen,
            vec![
                RoundStatus::Waiting,
                RoundStatus::Playing,
                RoundStatus::RoundEnd,
                RoundStatus::Waiting
            ]
        );
    }

    #[test]
    fn entity_conversion_keeps_join_order() {
        let mut room = started(&["z", "a", "m"]);
        room.submit("a", card(3, 4), at(12)).unwrap();
        let entity: RoomEntity = room.clone().into();
        assert_eq!(
            entity.players.iter().map(|p| p.id.as_str()).collect::<Vec<_>>(),
            vec!["z", "a", "m"]
        );
        let back: Room = entity.into();
        assert_eq!(back, room);
    }
}
