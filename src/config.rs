//! Configuration file structures for the tallybot.
//!
//! The configuration is read from a YAML file and can be overridden with
//! environment variables prefixed with `TALLYBOT_`, using `__` to separate
//! sections. It is loaded once at start-up and never changes afterwards.
//!
//! # Configuration File Format
//!
//! ```yaml
//! matrix:
//!   # Fully qualified Matrix user ID of the bot account
//!   user_id: "@tallybot:matrix.org"
//!   # Matrix account password
//!   password: "secret-password"
//!   # Only listen to this room (optional, every joined room otherwise)
//!   room_id: "!abcdef:matrix.org"
//!
//! voting:
//!   # Prefix of a vote, e.g. `!forward`
//!   prefix: "!"
//!   # Allowed commands, as a list or a comma-separated string
//!   commands: [forward, back, left, right]
//!   # Length of a vote window in seconds
//!   window_seconds: 10.0
//!   # Votes the top command needs to win a window
//!   min_votes_threshold: 1
//!   # Post each winner into `room_id`
//!   announce: false
//! ```
//!
//! Every `voting` key is optional and falls back to the values above.
//!
//! # Environment Variable Overrides
//!
//! ```bash
//! export TALLYBOT_MATRIX__PASSWORD="secret-from-env"
//! export TALLYBOT_VOTING__COMMANDS="up,down,jump"
//! export TALLYBOT_VOTING__WINDOW_SECONDS=5
//! ```

use std::{fmt, path::Path, time::Duration};

use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Deserializer};

use crate::voting::VotingRules;

/// Prefix of the environment variables overriding the configuration file.
const ENV_PREFIX: &str = "TALLYBOT_";

/// Root configuration structure.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Matrix account configuration
    pub matrix: Matrix,
    /// Vote window configuration
    #[serde(default)]
    pub voting: Voting,
}

/// Matrix account configuration.
#[derive(Debug, Deserialize)]
pub struct Matrix {
    /// Fully qualified Matrix user ID, e.g. `@tallybot:matrix.org`.
    pub user_id: String,

    /// Matrix account password.
    ///
    /// Only used for the first login; the session is restored from the data
    /// directory afterwards.
    pub password: String,

    /// Room to listen to.
    ///
    /// When unset, votes are read from every room the bot has joined and
    /// winners cannot be announced.
    #[serde(default)]
    pub room_id: Option<String>,
}

/// Vote window configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Voting {
    /// Prefix a chat message must start with to count as a vote.
    pub prefix: String,

    /// Allowed commands, lower-cased and de-duplicated, in configured order.
    #[serde(deserialize_with = "deserialize_commands")]
    pub commands: Vec<String>,

    /// Length of a vote window in seconds.
    pub window_seconds: f64,

    /// Votes the top command needs to win a window.
    pub min_votes_threshold: u32,

    /// Whether winners are posted into the configured room.
    pub announce: bool,
}

impl Default for Voting {
    fn default() -> Self {
        Voting {
            prefix: "!".to_owned(),
            commands: ["forward", "back", "left", "right"]
                .iter()
                .map(|c| c.to_string())
                .collect(),
            window_seconds: 10.0,
            min_votes_threshold: 1,
            announce: false,
        }
    }
}

impl Voting {
    /// Converts the section into the aggregator's rules.
    ///
    /// Only meaningful on a validated configuration.
    pub fn rules(&self) -> VotingRules {
        VotingRules {
            prefix: self.prefix.clone(),
            commands: self.commands.clone(),
            window: Duration::from_secs_f64(self.window_seconds),
            min_votes: self.min_votes_threshold,
        }
    }
}

/// Reasons a configuration is refused at start-up.
#[derive(Debug, PartialEq)]
pub enum ConfigError {
    /// `voting.prefix` is empty
    EmptyPrefix,
    /// `voting.commands` has no usable entry
    EmptyCommands,
    /// `voting.window_seconds` is not a positive, finite number of seconds
    InvalidWindow(f64),
    /// `voting.min_votes_threshold` is 0
    InvalidThreshold,
    /// `matrix.room_id` is set but empty
    EmptyRoomId,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::EmptyPrefix => write!(f, "voting.prefix cannot be empty"),
            ConfigError::EmptyCommands => write!(f, "voting.commands cannot be empty"),
            ConfigError::InvalidWindow(seconds) => write!(
                f,
                "voting.window_seconds must be a positive number of seconds, got {}",
                seconds
            ),
            ConfigError::InvalidThreshold => {
                write!(f, "voting.min_votes_threshold must be at least 1")
            }
            ConfigError::EmptyRoomId => write!(f, "matrix.room_id cannot be empty"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    /// Loads and validates the configuration.
    ///
    /// Reads the YAML file at `path`, applies `TALLYBOT_` environment
    /// overrides, then checks the values the vote windows rely on.
    ///
    /// # Errors
    ///
    /// Returns an error if the file does not exist, cannot be parsed, lacks a
    /// required field, or holds an invalid value (see [`ConfigError`]).
    pub fn load(path: &str) -> Result<Config, anyhow::Error> {
        if !Path::new(path).exists() {
            return Err(anyhow::anyhow!("config file {} does not exist", path));
        }

        let config: Config = Figment::new()
            .merge(Yaml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;

        config.validate()?;
        Ok(config)
    }

    /// Checks the invariants the aggregator relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let voting = &self.voting;

        if voting.prefix.is_empty() {
            return Err(ConfigError::EmptyPrefix);
        }
        if voting.commands.is_empty() {
            return Err(ConfigError::EmptyCommands);
        }
        // Values below a nanosecond would round to a zero-length window
        if Duration::try_from_secs_f64(voting.window_seconds)
            .ok()
            .is_none_or(|window| window.is_zero())
        {
            return Err(ConfigError::InvalidWindow(voting.window_seconds));
        }
        if voting.min_votes_threshold == 0 {
            return Err(ConfigError::InvalidThreshold);
        }
        if self.matrix.room_id.as_deref().is_some_and(|r| r.trim().is_empty()) {
            return Err(ConfigError::EmptyRoomId);
        }

        Ok(())
    }
}

/// Accepts the allow-list either as a sequence or as a comma-separated string.
fn deserialize_commands<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Commands {
        List(Vec<String>),
        Csv(String),
    }

    let raw = match Commands::deserialize(deserializer)? {
        Commands::List(list) => list,
        Commands::Csv(csv) => csv.split(',').map(str::to_owned).collect(),
    };

    Ok(normalize_commands(raw))
}

/// Trims and lower-cases commands, dropping blanks and duplicates.
fn normalize_commands(raw: Vec<String>) -> Vec<String> {
    let mut commands: Vec<String> = Vec::new();
    for command in raw {
        let command = command.trim().to_lowercase();
        if !command.is_empty() && !commands.contains(&command) {
            commands.push(command);
        }
    }
    commands
}
