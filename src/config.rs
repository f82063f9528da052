//! Application-level configuration loading, including the swappable mini-game content.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use serde_with::{DurationMilliSeconds, DurationSeconds, serde_as};
use tracing::{info, warn};

use crate::scoring::{
    GameType, MiniGame,
    encryption::{Challenge, CipherKind, EncryptionGame},
    network::{NetworkGame, Question},
    password::PasswordGame,
};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "CYBERGUARD_CONFIG_PATH";
/// Environment variable that overrides the configured admin token.
const ADMIN_TOKEN_ENV: &str = "CYBERGUARD_ADMIN_TOKEN";

const DEFAULT_PASSWORD_ROUND: Duration = Duration::from_secs(120);
const DEFAULT_ENCRYPTION_ROUND: Duration = Duration::from_secs(180);
const DEFAULT_AUTO_RESET_DELAY: Duration = Duration::from_millis(5000);
/// Upper bound on every configured round length and delay.
const MAX_CONFIGURED_DURATION: Duration = Duration::from_secs(60 * 60);
/// Upper bound on a single network question.
const MAX_QUESTION_SECS: u32 = 600;

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    password: PasswordGame,
    network: NetworkGame,
    encryption: EncryptionGame,
    auto_reset_delay: Duration,
    admin_token: Option<String>,
}

impl AppConfig {
    /// Load the configuration from disk, falling back to the built-in content tables.
    pub fn load() -> Self {
        let path = resolve_config_path();
        let config = match fs::read_to_string(&path) {
            Ok(contents) => match Self::from_json_str(&contents) {
                Ok(config) => {
                    info!(
                        path = %path.display(),
                        questions = config.network.content().len(),
                        challenges = config.encryption.content().len(),
                        "loaded game content from config"
                    );
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        };

        match env::var(ADMIN_TOKEN_ENV) {
            Ok(token) if !token.is_empty() => config.with_admin_token(token),
            _ => config,
        }
    }

    /// Parse a JSON document; missing keys keep their defaults.
    pub fn from_json_str(contents: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<RawConfig>(contents).map(Into::into)
    }

    /// Replace the admin token.
    pub fn with_admin_token(mut self, token: impl Into<String>) -> Self {
        self.admin_token = Some(token.into());
        self
    }

    /// Password challenge rules.
    pub fn password_game(&self) -> &PasswordGame {
        &self.password
    }

    /// Network-defense quiz rules and questions.
    pub fn network_game(&self) -> &NetworkGame {
        &self.network
    }

    /// Encryption puzzle rules and challenges.
    pub fn encryption_game(&self) -> &EncryptionGame {
        &self.encryption
    }

    /// How long a round of `game_type` lasts.
    pub fn round_duration(&self, game_type: GameType) -> Duration {
        match game_type {
            GameType::Password => self.password.round_duration(),
            GameType::Network => self.network.round_duration(),
            GameType::Encryption => self.encryption.round_duration(),
        }
    }

    /// Delay between the end of a round and the automatic return to the lobby.
    pub fn auto_reset_delay(&self) -> Duration {
        self.auto_reset_delay
    }

    /// Token required by administrative endpoints, if any.
    pub fn admin_token(&self) -> Option<&str> {
        self.admin_token.as_deref()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        RawConfig::default().into()
    }
}

#[serde_as]
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    #[serde_as(as = "Option<DurationSeconds<u64>>")]
    password_round_secs: Option<Duration>,
    #[serde_as(as = "Option<DurationSeconds<u64>>")]
    encryption_round_secs: Option<Duration>,
    #[serde_as(as = "Option<DurationMilliSeconds<u64>>")]
    auto_reset_delay_ms: Option<Duration>,
    network_questions: Option<Vec<Question>>,
    encryption_challenges: Option<Vec<Challenge>>,
    admin_token: Option<String>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let questions = value
            .network_questions
            .filter(|questions| questions_are_valid(questions))
            .unwrap_or_else(default_questions);
        let challenges = value
            .encryption_challenges
            .filter(|challenges| challenges_are_valid(challenges))
            .unwrap_or_else(default_challenges);

        Self {
            password: PasswordGame::new(bounded(
                "password_round_secs",
                value.password_round_secs,
                DEFAULT_PASSWORD_ROUND,
            )),
            network: NetworkGame::new(questions),
            encryption: EncryptionGame::new(
                challenges,
                bounded(
                    "encryption_round_secs",
                    value.encryption_round_secs,
                    DEFAULT_ENCRYPTION_ROUND,
                ),
            ),
            auto_reset_delay: bounded(
                "auto_reset_delay_ms",
                value.auto_reset_delay_ms,
                DEFAULT_AUTO_RESET_DELAY,
            ),
            admin_token: value.admin_token.filter(|token| !token.is_empty()),
        }
    }
}

fn bounded(key: &'static str, configured: Option<Duration>, default: Duration) -> Duration {
    match configured {
        Some(duration) if duration > MAX_CONFIGURED_DURATION => {
            warn!(
                key,
                secs = duration.as_secs(),
                max_secs = MAX_CONFIGURED_DURATION.as_secs(),
                "configured duration is too long; capping it"
            );
            MAX_CONFIGURED_DURATION
        }
        Some(duration) => duration,
        None => default,
    }
}

fn questions_are_valid(questions: &[Question]) -> bool {
    if questions.is_empty() {
        warn!("configured question set is empty; using built-in questions");
        return false;
    }
    match questions
        .iter()
        .find(|q| {
            q.correct >= q.answers.len()
                || q.time_limit_secs == 0
                || q.time_limit_secs > MAX_QUESTION_SECS
        })
    {
        Some(question) => {
            warn!(
                question = question.id,
                "configured question is invalid; using built-in questions"
            );
            false
        }
        None => true,
    }
}

fn challenges_are_valid(challenges: &[Challenge]) -> bool {
    if challenges.is_empty() {
        warn!("configured challenge set is empty; using built-in challenges");
        return false;
    }
    match challenges.iter().find(|c| !c.is_consistent()) {
        Some(challenge) => {
            warn!(
                message = %challenge.encrypted_message,
                "configured challenge does not decrypt to its answer; using built-in challenges"
            );
            false
        }
        None => true,
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

fn question(
    id: u32,
    text: &str,
    answers: [&str; 4],
    correct: usize,
    category: &str,
) -> Question {
    Question {
        id,
        text: text.to_owned(),
        answers: answers.iter().map(|a| (*a).to_owned()).collect(),
        correct,
        points: 100,
        category: Some(category.to_owned()),
        time_limit_secs: 15,
    }
}

/// Built-in network-defense questions shipped with the binary.
fn default_questions() -> Vec<Question> {
    vec![
        question(
            1,
            "An attacker is flooding your network with TCP SYN packets. What type of attack is this?",
            ["SQL Injection", "SYN Flood Attack", "Cross-Site Scripting", "Man in the Middle"],
            1,
            "protocol",
        ),
        question(
            2,
            "Which port should be blocked to prevent unauthorized SSH access?",
            ["22", "80", "443", "3389"],
            0,
            "firewall",
        ),
        question(
            3,
            "Software that encrypts your files and demands payment is known as:",
            ["Spyware", "Ransomware", "Adware", "Worms"],
            1,
            "malware",
        ),
        question(
            4,
            "What is the purpose of a honeypot in network security?",
            [
                "To store encrypted data",
                "To attract and detect attackers",
                "To manage network traffic",
                "To backup system files",
            ],
            1,
            "protocol",
        ),
        question(
            5,
            "Which of these is a type of Man-in-the-Middle attack?",
            ["ARP Spoofing", "Buffer Overflow", "SQL Injection", "Zero-day Exploit"],
            0,
            "protocol",
        ),
        question(
            6,
            "What does NAT stand for in networking?",
            [
                "Network Address Translation",
                "Network Authentication Token",
                "Native Access Transfer",
                "Network Authorization Type",
            ],
            0,
            "protocol",
        ),
        question(
            7,
            "Which protocol is used for secure email transmission?",
            ["HTTP", "FTP", "SMTP", "SMTPS"],
            3,
            "protocol",
        ),
        question(
            8,
            "What is the main purpose of an IDS (Intrusion Detection System)?",
            [
                "Block network traffic",
                "Monitor for suspicious activity",
                "Encrypt data",
                "Manage passwords",
            ],
            1,
            "firewall",
        ),
        question(
            9,
            "Which of these is NOT a type of firewall?",
            [
                "Packet filtering",
                "Circuit-level gateway",
                "Memory scanning",
                "Application-level gateway",
            ],
            2,
            "firewall",
        ),
        question(
            10,
            "What type of attack attempts to exhaust system resources?",
            ["Phishing", "DDoS", "SQL Injection", "Cross-site Scripting"],
            1,
            "protocol",
        ),
    ]
}

/// Built-in cipher challenges shipped with the binary.
fn default_challenges() -> Vec<Challenge> {
    vec![
        Challenge {
            encrypted_message: "KHOOR ZRUOG".to_owned(),
            key: "3".to_owned(),
            correct_answer: "HELLO WORLD".to_owned(),
            hint: "Caesar cipher - shift each letter backward by the key number (A→X, B→Y, C→Z)"
                .to_owned(),
            kind: CipherKind::Caesar,
            points: 100,
        },
        Challenge {
            encrypted_message: "XLMW MW E WIGYVMXC XIWX".to_owned(),
            key: "4".to_owned(),
            correct_answer: "THIS IS A SECURITY TEST".to_owned(),
            hint: "Caesar cipher - each letter is shifted by 4 positions".to_owned(),
            kind: CipherKind::Caesar,
            points: 150,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_classic_game() {
        let config = AppConfig::default();
        assert_eq!(config.round_duration(GameType::Password), Duration::from_secs(120));
        assert_eq!(config.round_duration(GameType::Encryption), Duration::from_secs(180));
        assert_eq!(config.round_duration(GameType::Network), Duration::from_secs(150));
        assert_eq!(config.auto_reset_delay(), Duration::from_millis(5000));
        assert!(config.admin_token().is_none());
    }

    #[test]
    fn built_in_challenges_are_consistent() {
        assert!(default_challenges().iter().all(Challenge::is_consistent));
        assert!(questions_are_valid(&default_questions()));
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let config = AppConfig::from_json_str(
            r#"{ "password_round_secs": 30, "auto_reset_delay_ms": 250, "admin_token": "s3cret" }"#,
        )
        .unwrap();
        assert_eq!(config.round_duration(GameType::Password), Duration::from_secs(30));
        assert_eq!(config.auto_reset_delay(), Duration::from_millis(250));
        assert_eq!(config.admin_token(), Some("s3cret"));
        assert_eq!(config.network_game().content().len(), 10);
    }

    #[test]
    fn custom_questions_replace_the_bank() {
        let config = AppConfig::from_json_str(
            r#"{ "network_questions": [
                { "id": 7, "text": "Port for HTTPS?", "answers": ["80", "443"], "correct": 1,
                  "points": 50, "time_limit_secs": 5 }
            ] }"#,
        )
        .unwrap();
        assert_eq!(config.network_game().content().len(), 1);
        assert_eq!(config.round_duration(GameType::Network), Duration::from_secs(5));
    }

    #[test]
    fn invalid_tables_fall_back() {
        let config = AppConfig::from_json_str(
            r#"{
                "network_questions": [
                    { "id": 1, "text": "?", "answers": ["a"], "correct": 3,
                      "points": 10, "time_limit_secs": 5 }
                ],
                "encryption_challenges": [
                    { "encrypted_message": "ABC", "key": "1", "correct_answer": "XYZ",
                      "hint": "", "kind": "caesar", "points": 10 }
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(config.network_game().content().len(), 10);
        assert_eq!(config.encryption_game().content().len(), 2);
    }

    #[test]
    fn oversized_durations_are_capped() {
        let config = AppConfig::from_json_str(
            r#"{
                "password_round_secs": 18446744073709551615,
                "encryption_round_secs": 7200,
                "auto_reset_delay_ms": 99999999999,
                "network_questions": [
                    { "id": 1, "text": "?", "answers": ["a", "b"], "correct": 0,
                      "points": 10, "time_limit_secs": 4294967295 }
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(config.round_duration(GameType::Password), MAX_CONFIGURED_DURATION);
        assert_eq!(config.round_duration(GameType::Encryption), MAX_CONFIGURED_DURATION);
        assert_eq!(config.auto_reset_delay(), MAX_CONFIGURED_DURATION);
        assert_eq!(config.network_game().content().len(), 10);
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(AppConfig::from_json_str("{ not json").is_err());
    }
}
