use std::time::Duration;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{Evaluation, GameType, MiniGame, ScoreCard};

/// Bonus points per correct answer already in the streak.
pub const STREAK_BONUS: u32 = 25;

/// Cipher family used to produce a challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CipherKind {
    /// Letters shifted by a fixed amount.
    Caesar,
    /// Letters shifted by a repeating keyword.
    Vigenere,
    /// Text reversed.
    Reverse,
    /// Arbitrary letter substitution.
    Substitution,
}

/// A decrypt-the-ciphertext challenge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Challenge {
    /// Ciphertext shown to players.
    pub encrypted_message: String,
    /// Key material (a shift for Caesar).
    pub key: String,
    /// Expected plaintext, uppercase.
    pub correct_answer: String,
    /// Hint shown to players.
    pub hint: String,
    /// Cipher used.
    pub kind: CipherKind,
    /// Base points for solving it.
    pub points: u32,
}

impl Challenge {
    /// Whether the ciphertext really decrypts to the expected answer.
    ///
    /// Only Caesar challenges can be checked; other kinds are trusted.
    pub fn is_consistent(&self) -> bool {
        match self.kind {
            CipherKind::Caesar => match self.key.trim().parse::<i32>() {
                Ok(shift) => caesar_shift(&self.encrypted_message, -shift) == self.correct_answer,
                Err(_) => false,
            },
            CipherKind::Reverse => {
                self.encrypted_message.chars().rev().collect::<String>() == self.correct_answer
            }
            CipherKind::Vigenere | CipherKind::Substitution => true,
        }
    }

    /// Evaluate a player's answer; comparison ignores case and surrounding blanks.
    pub fn check(&self, answer: &str, time_left: u32, streak: u32) -> Evaluation {
        if normalize(answer) == normalize(&self.correct_answer) {
            Evaluation::accepted(
                self.points
                    .saturating_add(time_left / 10)
                    .saturating_add(streak.saturating_mul(STREAK_BONUS)),
            )
        } else {
            Evaluation::rejected()
        }
    }
}

/// Shift ASCII letters by `shift` positions, wrapping around the alphabet.
pub fn caesar_shift(text: &str, shift: i32) -> String {
    let shift = shift.rem_euclid(26) as u8;
    text.chars()
        .map(|c| {
            if c.is_ascii_uppercase() {
                (b'A' + (c as u8 - b'A' + shift) % 26) as char
            } else if c.is_ascii_lowercase() {
                (b'a' + (c as u8 - b'a' + shift) % 26) as char
            } else {
                c
            }
        })
        .collect()
}

fn normalize(text: &str) -> String {
    text.trim().to_uppercase()
}

/// A player's attempts at the current challenge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncryptionRun {
    /// Wrong answers so far.
    pub attempts: u32,
    /// Correct answers in a row.
    pub streak: u32,
    /// Points of the accepted answer, once solved.
    pub solved: Option<ScoreCard>,
}

impl EncryptionRun {
    /// Record an answer to `challenge` given `time_left` seconds.
    pub fn attempt(&mut self, challenge: &Challenge, answer: &str, time_left: u32) -> Evaluation {
        let evaluation = challenge.check(answer, time_left, self.streak);
        if evaluation.passed {
            self.streak += 1;
            self.solved = Some(ScoreCard {
                time_left,
                complexity: evaluation.points,
                total: evaluation.points,
            });
        } else {
            self.attempts += 1;
            self.streak = 0;
        }
        evaluation
    }
}

/// Encryption puzzle rules.
#[derive(Debug, Clone)]
pub struct EncryptionGame {
    challenges: Vec<Challenge>,
    duration: Duration,
}

impl EncryptionGame {
    /// Build the game from a challenge table.
    pub fn new(challenges: Vec<Challenge>, duration: Duration) -> Self {
        Self {
            challenges,
            duration,
        }
    }

    /// Challenge played during `round`, cycling through the table.
    pub fn challenge_for_round(&self, round: u32) -> Option<&Challenge> {
        if self.challenges.is_empty() {
            return None;
        }
        let slot = (round as usize).saturating_sub(1) / 2 % self.challenges.len();
        self.challenges.get(slot)
    }
}

impl MiniGame for EncryptionGame {
    type Content = [Challenge];

    fn game_type(&self) -> GameType {
        GameType::Encryption
    }

    fn round_duration(&self) -> Duration {
        self.duration
    }

    fn content(&self) -> &[Challenge] {
        &self.challenges
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hello_world() -> Challenge {
        Challenge {
            encrypted_message: "KHOOR ZRUOG".into(),
            key: "3".into(),
            correct_answer: "HELLO WORLD".into(),
            hint: "Shift each letter back by the key".into(),
            kind: CipherKind::Caesar,
            points: 100,
        }
    }

    #[test]
    fn wrong_twice_then_correct() {
        let challenge = hello_world();
        let mut run = EncryptionRun::default();
        assert!(!run.attempt(&challenge, "HELLO", 150).passed);
        assert!(!run.attempt(&challenge, "WORLD HELLO", 130).passed);
        assert_eq!(run.attempts, 2);

        let solved = run.attempt(&challenge, "  hello world ", 120);
        assert!(solved.passed);
        assert_eq!(solved.points, 112);
        assert_eq!(run.solved.unwrap().total, 112);
    }

    #[test]
    fn streak_adds_bonus() {
        let challenge = hello_world();
        assert_eq!(challenge.check("HELLO WORLD", 45, 2).points, 100 + 4 + 50);
    }

    #[test]
    fn caesar_round_trip() {
        assert_eq!(caesar_shift("HELLO WORLD", 3), "KHOOR ZRUOG");
        assert_eq!(caesar_shift("XLMW MW E WIGYVMXC XIWX", -4), "THIS IS A SECURITY TEST");
        assert_eq!(caesar_shift("abz", 1), "bca");
    }

    #[test]
    fn inconsistent_challenge_is_detected() {
        let mut challenge = hello_world();
        assert!(challenge.is_consistent());
        challenge.key = "4".into();
        assert!(!challenge.is_consistent());
    }

    #[test]
    fn challenges_cycle_with_played_rounds() {
        let mut second = hello_world();
        second.points = 150;
        let game = EncryptionGame::new(vec![hello_world(), second], Duration::from_secs(180));
        assert_eq!(game.challenge_for_round(1).unwrap().points, 100);
        assert_eq!(game.challenge_for_round(3).unwrap().points, 150);
        assert_eq!(game.challenge_for_round(5).unwrap().points, 100);
    }
}
