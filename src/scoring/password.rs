use std::time::Duration;

use super::{Evaluation, GameType, MiniGame, ScoreCard};

const SPECIALS: &[char] = &['!', '@', '#', '$', '%', '^', '&', '*'];
const CONSONANTS: &str = "bcdfghjklmnpqrstvwxyz";
const VOWELS: &str = "aeiou";
const WEEKDAYS: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

/// Hard gate a password must pass before it can be submitted.
#[derive(Debug, Clone, Copy)]
pub struct Requirement {
    /// Stable identifier shown to clients.
    pub id: u8,
    /// Human readable rule.
    pub description: &'static str,
    check: fn(&str) -> bool,
}

impl Requirement {
    /// Whether `password` satisfies this requirement.
    pub fn is_met(&self, password: &str) -> bool {
        (self.check)(password)
    }
}

/// Scored extra awarded on top of the requirements.
#[derive(Debug, Clone, Copy)]
pub struct Bonus {
    /// Human readable rule.
    pub description: &'static str,
    /// Points added when the rule holds.
    pub points: u32,
    check: fn(&str) -> bool,
}

/// The requirement set every submitted password must satisfy.
pub const REQUIREMENTS: [Requirement; 10] = [
    Requirement {
        id: 1,
        description: "At least 12 characters long",
        check: |pwd| pwd.chars().count() >= 12,
    },
    Requirement {
        id: 2,
        description: "Contains uppercase letter",
        check: |pwd| count(pwd, |c| c.is_ascii_uppercase()) >= 1,
    },
    Requirement {
        id: 3,
        description: "Contains lowercase letter",
        check: |pwd| count(pwd, |c| c.is_ascii_lowercase()) >= 1,
    },
    Requirement {
        id: 4,
        description: "Contains number",
        check: |pwd| count(pwd, |c| c.is_ascii_digit()) >= 1,
    },
    Requirement {
        id: 5,
        description: "Contains special character (!@#$%^&*)",
        check: |pwd| count(pwd, is_special) >= 1,
    },
    Requirement {
        id: 6,
        description: "No repeating characters (e.g., 'aaa')",
        check: |pwd| !has_triple(pwd),
    },
    Requirement {
        id: 7,
        description: "Contains a number that is the sum of the previous two numbers",
        check: has_running_sum,
    },
    Requirement {
        id: 8,
        description: "Contains a day of the week (capitalized)",
        check: |pwd| WEEKDAYS.iter().any(|day| pwd.contains(day)),
    },
    Requirement {
        id: 9,
        description: "Contains alternating consonants and vowels (e.g., 'bike')",
        check: has_consonant_vowel_run,
    },
    Requirement {
        id: 10,
        description: "Contains a math equation (e.g., '2+2=4')",
        check: has_equation,
    },
];

/// Bonuses summed into the complexity score.
pub const BONUSES: [Bonus; 7] = [
    Bonus {
        description: "At least 15 characters",
        points: 20,
        check: |pwd| pwd.chars().count() >= 15,
    },
    Bonus {
        description: "Two or more uppercase letters",
        points: 10,
        check: |pwd| count(pwd, |c| c.is_ascii_uppercase()) >= 2,
    },
    Bonus {
        description: "Two or more lowercase letters",
        points: 10,
        check: |pwd| count(pwd, |c| c.is_ascii_lowercase()) >= 2,
    },
    Bonus {
        description: "Two or more digits",
        points: 10,
        check: |pwd| count(pwd, |c| c.is_ascii_digit()) >= 2,
    },
    Bonus {
        description: "Two or more special characters",
        points: 20,
        check: |pwd| count(pwd, is_special) >= 2,
    },
    Bonus {
        description: "No character repeated three times",
        points: 10,
        check: |pwd| !has_triple(pwd),
    },
    Bonus {
        description: "Uses a character outside letters, digits and !@#$%^&*",
        points: 20,
        check: |pwd| pwd.chars().any(|c| !c.is_ascii_alphanumeric() && !is_special(c)),
    },
];

/// Password challenge rules.
#[derive(Debug, Clone)]
pub struct PasswordGame {
    duration: Duration,
}

impl PasswordGame {
    /// Build the game with the given round duration.
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }

    /// Evaluate a submission: it passes only when every requirement holds.
    pub fn evaluate(&self, password: &str) -> Evaluation {
        if unmet_requirements(password).is_empty() {
            Evaluation::accepted(complexity(password))
        } else {
            Evaluation::rejected()
        }
    }

    /// Final score card for an accepted password.
    pub fn score(&self, password: &str, time_left: u32) -> Option<ScoreCard> {
        let evaluation = self.evaluate(password);
        evaluation.passed.then(|| ScoreCard {
            time_left,
            complexity: evaluation.points,
            total: time_left.saturating_add(evaluation.points),
        })
    }
}

impl MiniGame for PasswordGame {
    type Content = [Requirement];

    fn game_type(&self) -> GameType {
        GameType::Password
    }

    fn round_duration(&self) -> Duration {
        self.duration
    }

    fn content(&self) -> &[Requirement] {
        &REQUIREMENTS
    }
}

/// Ids of the requirements `password` fails.
pub fn unmet_requirements(password: &str) -> Vec<u8> {
    REQUIREMENTS
        .iter()
        .filter(|req| !req.is_met(password))
        .map(|req| req.id)
        .collect()
}

/// Sum of every bonus that applies to `password`.
pub fn complexity(password: &str) -> u32 {
    BONUSES
        .iter()
        .filter(|bonus| (bonus.check)(password))
        .map(|bonus| bonus.points)
        .sum()
}

fn is_special(c: char) -> bool {
    SPECIALS.contains(&c)
}

fn count(pwd: &str, predicate: impl Fn(char) -> bool) -> usize {
    pwd.chars().filter(|c| predicate(*c)).count()
}

fn has_triple(pwd: &str) -> bool {
    let chars: Vec<char> = pwd.chars().collect();
    chars.windows(3).any(|w| w[0] == w[1] && w[1] == w[2])
}

fn numbers(pwd: &str) -> Vec<u64> {
    pwd.split(|c: char| !c.is_ascii_digit())
        .filter(|run| !run.is_empty())
        .map(|run| run.parse::<u64>().unwrap_or(u64::MAX))
        .collect()
}

fn has_running_sum(pwd: &str) -> bool {
    numbers(pwd)
        .windows(3)
        .any(|w| w[0].checked_add(w[1]) == Some(w[2]))
}

fn has_consonant_vowel_run(pwd: &str) -> bool {
    let lowered: Vec<char> = pwd.chars().map(|c| c.to_ascii_lowercase()).collect();
    lowered.windows(4).any(|w| {
        CONSONANTS.contains(w[0])
            && VOWELS.contains(w[1])
            && CONSONANTS.contains(w[2])
            && VOWELS.contains(w[3])
    })
}

fn has_equation(pwd: &str) -> bool {
    let chars: Vec<char> = pwd.chars().collect();
    (0..chars.len()).any(|start| equation_at(&chars[start..]))
}

// digits, operator, digits, '=', digits
fn equation_at(chars: &[char]) -> bool {
    let mut idx = digit_run(chars, 0);
    if idx == 0 {
        return false;
    }
    if !matches!(chars.get(idx), Some('+' | '-' | '*' | '/')) {
        return false;
    }
    idx += 1;
    let rhs = digit_run(chars, idx);
    if rhs == idx || chars.get(rhs) != Some(&'=') {
        return false;
    }
    digit_run(chars, rhs + 1) > rhs + 1
}

fn digit_run(chars: &[char], from: usize) -> usize {
    let mut idx = from;
    while chars.get(idx).is_some_and(|c| c.is_ascii_digit()) {
        idx += 1;
    }
    idx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strong_password_meets_every_requirement() {
        assert!(unmet_requirements("Saturday1*1=2").is_empty());
        assert!(unmet_requirements("Rubik@Monday1+2=3").is_empty());
    }

    #[test]
    fn weak_password_reports_unmet_ids() {
        let unmet = unmet_requirements("password");
        assert!(unmet.contains(&1));
        assert!(unmet.contains(&2));
        assert!(unmet.contains(&8));
        assert!(!unmet.contains(&3));
    }

    #[test]
    fn triple_repeat_is_rejected() {
        assert!(has_triple("abccc"));
        assert!(!has_triple("abcc"));
        assert!(unmet_requirements("Saturday1*1=2aaa").contains(&6));
    }

    #[test]
    fn running_sum_needs_three_numbers() {
        assert!(has_running_sum("a3b5c8"));
        assert!(!has_running_sum("a3b5"));
        assert!(!has_running_sum("a3b5c9"));
    }

    #[test]
    fn equation_requires_full_form() {
        assert!(has_equation("x12*3=36y"));
        assert!(has_equation("9-4=5"));
        assert!(!has_equation("12*3="));
        assert!(!has_equation("12=3"));
        assert!(!has_equation("*3=4"));
    }

    #[test]
    fn consonant_vowel_run_is_case_insensitive() {
        assert!(has_consonant_vowel_run("xBIKEx"));
        assert!(!has_consonant_vowel_run("aeiou"));
    }

    #[test]
    fn complexity_sums_bonuses() {
        assert_eq!(complexity("Saturday1*1=2"), 50);
        assert_eq!(complexity("Rubik@Monday1+2=3"), 80);
    }

    #[test]
    fn score_adds_time_left_to_complexity() {
        let game = PasswordGame::new(Duration::from_secs(120));
        let card = game.score("Rubik@Monday1+2=3", 90).unwrap();
        assert_eq!(card.complexity, 80);
        assert_eq!(card.total, 170);
        assert!(game.score("short", 90).is_none());
    }

    #[test]
    fn score_saturates_on_a_huge_clock() {
        let game = PasswordGame::new(Duration::from_secs(120));
        let card = game.score("Rubik@Monday1+2=3", u32::MAX).unwrap();
        assert_eq!(card.total, u32::MAX);
    }
}
