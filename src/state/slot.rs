use std::{collections::HashMap, time::SystemTime};

use dashmap::DashMap;
use tokio::{sync::Mutex, task::JoinHandle};

use crate::{
    scoring::{ScoreCard, encryption::EncryptionRun, network::NetworkRun},
    state::room::{Player, PlayerId},
};

/// Server-side progress of one player through the running mini-game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameProgress {
    /// Rejected password attempts so far.
    Password {
        /// Submissions that failed a requirement.
        rejected: u32,
    },
    /// Position in the question set, with the server clock of the current question.
    Network {
        /// Answers recorded so far.
        run: NetworkRun,
        /// When the current question was shown.
        question_started_at: SystemTime,
    },
    /// Attempts at the round's cipher challenge.
    Encryption(EncryptionRun),
}

/// Progress tagged with the round it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerProgress {
    /// Round counter value the progress was recorded in.
    pub round: u32,
    /// Game specific counters.
    pub game: GameProgress,
}

impl PlayerProgress {
    /// Score card submitted for a player who ran out of time.
    ///
    /// Network answers keep their points; the other games award nothing.
    pub fn partial_card(&self) -> ScoreCard {
        match &self.game {
            GameProgress::Network { run, .. } => run.score_card(),
            GameProgress::Password { .. } | GameProgress::Encryption(_) => ScoreCard::zero(),
        }
    }
}

#[derive(Default)]
struct RoundTimers {
    deadline: Option<JoinHandle<()>>,
    reset: Option<JoinHandle<()>>,
}

/// In-memory companion of a stored room: its transaction gate, player progress and timers.
#[derive(Default)]
pub struct RoomSlot {
    pub(super) gate: Mutex<()>,
    progress: DashMap<PlayerId, PlayerProgress>,
    timers: Mutex<RoundTimers>,
}

impl RoomSlot {
    /// Progress of `player_id` during `round`; stale entries count as absent.
    pub fn progress(&self, player_id: &str, round: u32) -> Option<PlayerProgress> {
        self.progress
            .get(player_id)
            .filter(|entry| entry.round == round)
            .map(|entry| entry.clone())
    }

    /// Store the progress of `player_id`.
    pub fn set_progress(&self, player_id: &str, progress: PlayerProgress) {
        self.progress.insert(player_id.to_owned(), progress);
    }

    /// Forget every player's progress.
    pub fn clear_progress(&self) {
        self.progress.clear();
    }

    /// Start a staged view of the progress for one room transaction.
    pub fn draft(&self) -> ProgressDraft<'_> {
        ProgressDraft {
            slot: self,
            cleared: false,
            staged: HashMap::new(),
        }
    }

    /// Replace the round-deadline timer, aborting the previous one.
    pub async fn replace_deadline_timer(&self, handle: JoinHandle<()>) {
        let mut timers = self.timers.lock().await;
        if let Some(previous) = timers.deadline.replace(handle) {
            previous.abort();
        }
    }

    /// Replace the auto-reset timer, aborting the previous one.
    pub async fn replace_reset_timer(&self, handle: JoinHandle<()>) {
        let mut timers = self.timers.lock().await;
        if let Some(previous) = timers.reset.replace(handle) {
            previous.abort();
        }
    }

    /// Abort the round-deadline timer, if any.
    pub async fn cancel_deadline_timer(&self) {
        if let Some(handle) = self.timers.lock().await.deadline.take() {
            handle.abort();
        }
    }

    /// Abort the auto-reset timer, if any.
    pub async fn cancel_reset_timer(&self) {
        if let Some(handle) = self.timers.lock().await.reset.take() {
            handle.abort();
        }
    }

    /// Abort every timer of the room.
    pub async fn cancel_timers(&self) {
        let mut timers = self.timers.lock().await;
        for handle in [timers.deadline.take(), timers.reset.take()]
            .into_iter()
            .flatten()
        {
            handle.abort();
        }
    }
}

/// Progress changes made inside a room transaction.
///
/// Reads see the staged changes first. Nothing reaches the slot until
/// [`ProgressDraft::apply`] runs after a successful commit.
pub struct ProgressDraft<'a> {
    slot: &'a RoomSlot,
    cleared: bool,
    staged: HashMap<PlayerId, PlayerProgress>,
}

impl ProgressDraft<'_> {
    /// Progress of `player_id` during `round`, staged changes included.
    pub fn progress(&self, player_id: &str, round: u32) -> Option<PlayerProgress> {
        match self.staged.get(player_id) {
            Some(progress) => Some(progress.clone()).filter(|p| p.round == round),
            None if self.cleared => None,
            None => self.slot.progress(player_id, round),
        }
    }

    /// Stage new progress for `player_id`.
    pub fn set_progress(&mut self, player_id: &str, progress: PlayerProgress) {
        self.staged.insert(player_id.to_owned(), progress);
    }

    /// Stage forgetting every player's progress.
    pub fn clear_progress(&mut self) {
        self.cleared = true;
        self.staged.clear();
    }

    /// Partial score card of `player` at expiry time.
    pub fn partial_card(&self, player: &Player, round: u32) -> ScoreCard {
        self.progress(&player.id, round)
            .map(|progress| progress.partial_card())
            .unwrap_or_else(ScoreCard::zero)
    }

    /// Write the staged changes to the slot.
    pub fn apply(self) {
        if self.cleared {
            self.slot.clear_progress();
        }
        for (player_id, progress) in self.staged {
            self.slot.set_progress(&player_id, progress);
        }
    }
}
