use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{Evaluation, GameType, MiniGame, ScoreCard};

/// Streak (correct answers in a row) from which answers earn the multiplier.
pub const STREAK_THRESHOLD: u32 = 2;
/// Points per second left on a correctly answered question.
pub const TIME_BONUS_PER_SECOND: u32 = 10;

/// One multiple choice question of the network-defense quiz.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    /// Stable identifier.
    pub id: u32,
    /// Question prompt.
    pub text: String,
    /// Answer options in display order.
    pub answers: Vec<String>,
    /// Index of the correct option.
    pub correct: usize,
    /// Base points for a correct answer.
    pub points: u32,
    /// Topic the question belongs to.
    #[serde(default)]
    pub category: Option<String>,
    /// Seconds allowed for this question.
    pub time_limit_secs: u32,
}

impl Question {
    /// Time allowed for this question.
    pub fn time_limit(&self) -> Duration {
        Duration::from_secs(u64::from(self.time_limit_secs))
    }
}

/// Points for a correct answer given the streak *before* the answer.
pub fn answer_points(base: u32, time_left: u32, streak: u32) -> u32 {
    let raw = base.saturating_add(time_left.saturating_mul(TIME_BONUS_PER_SECOND));
    if streak >= STREAK_THRESHOLD {
        raw.saturating_mul(3) / 2
    } else {
        raw
    }
}

/// A player's progress through the question set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkRun {
    /// Index of the next question to answer.
    pub index: usize,
    /// Correct answers in a row.
    pub streak: u32,
    /// Points accumulated so far.
    pub score: u32,
    /// Seconds left when the last question was answered.
    pub last_time_left: u32,
}

impl NetworkRun {
    /// Record an answer to `question`; `None` is a timeout.
    pub fn answer(&mut self, question: &Question, choice: Option<usize>, time_left: u32) -> Evaluation {
        self.index += 1;
        self.last_time_left = time_left;
        if choice == Some(question.correct) {
            let points = answer_points(question.points, time_left, self.streak);
            self.streak += 1;
            self.score = self.score.saturating_add(points);
            Evaluation::accepted(points)
        } else {
            self.streak = 0;
            Evaluation::rejected()
        }
    }

    /// Whether every question of a set of `len` has been answered.
    pub fn is_finished(&self, len: usize) -> bool {
        self.index >= len
    }

    /// Score card reflecting everything answered so far.
    pub fn score_card(&self) -> ScoreCard {
        ScoreCard {
            time_left: self.last_time_left,
            complexity: self.score,
            total: self.score,
        }
    }
}

/// Network-defense quiz rules.
#[derive(Debug, Clone)]
pub struct NetworkGame {
    questions: Vec<Question>,
}

impl NetworkGame {
    /// Build the quiz from a question set.
    pub fn new(questions: Vec<Question>) -> Self {
        Self { questions }
    }

    /// Question at `index`, if any.
    pub fn question(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }
}

impl MiniGame for NetworkGame {
    type Content = [Question];

    fn game_type(&self) -> GameType {
        GameType::Network
    }

    // Sum of the per-question limits.
    fn round_duration(&self) -> Duration {
        self.questions.iter().map(Question::time_limit).sum()
    }

    fn content(&self) -> &[Question] {
        &self.questions
    }
}
