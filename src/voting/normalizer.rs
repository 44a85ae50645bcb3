//! Chat line classification.
//!
//! Turns a raw chat message into a [`VoteCommand`] when it is a prefixed,
//! allow-listed command, and into nothing otherwise.

use std::fmt;

/// A command that passed allow-list validation.
///
/// Only [`CommandNormalizer::normalize`] can build one, so every value that
/// reaches a tally is a lower-cased allow-list member.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VoteCommand(String);

impl VoteCommand {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VoteCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Extracts vote commands from chat messages.
///
/// A message is a vote when it starts with the configured prefix immediately
/// followed by a token, up to the first whitespace, that matches one of the
/// allowed commands case-insensitively. Anything else is ignored.
///
/// # Examples
///
/// ```ignore
/// let normalizer = CommandNormalizer::new("!", &["forward".to_owned()]);
/// assert_eq!(normalizer.normalize("!FORWARD now").unwrap().as_str(), "forward");
/// assert!(normalizer.normalize("forward").is_none());
/// ```
#[derive(Debug, Clone)]
pub struct CommandNormalizer {
    /// Prefix every command must start with, e.g. `!`
    prefix: String,
    /// Allowed commands, lower-cased, in configured order
    commands: Vec<String>,
}

impl CommandNormalizer {
    /// Creates a normalizer for the given prefix and allow-list.
    ///
    /// Allowed commands are lower-cased; configuration validation guarantees
    /// the prefix and the list are not empty.
    pub fn new(prefix: &str, commands: &[String]) -> Self {
        CommandNormalizer {
            prefix: prefix.to_owned(),
            commands: commands.iter().map(|c| c.to_lowercase()).collect(),
        }
    }

    /// Classifies a chat message.
    ///
    /// Returns the validated command, or `None` when the message is not a
    /// vote: no prefix, nothing right after the prefix, or a token outside
    /// the allow-list.
    ///
    /// # Arguments
    ///
    /// * `body` - Raw chat message
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use tallybot::voting::normalizer::CommandNormalizer;
    ///
    /// let commands = vec!["forward".to_string(), "back".to_string()];
    /// let normalizer = CommandNormalizer::new("!", &commands);
    ///
    /// assert_eq!(normalizer.normalize("  !Back please").unwrap().as_str(), "back");
    /// assert!(normalizer.normalize("! back").is_none());
    /// assert!(normalizer.normalize("!jump").is_none());
    /// ```
    pub fn normalize(&self, body: &str) -> Option<VoteCommand> {
        let rest = body.trim_start().strip_prefix(self.prefix.as_str())?;
        let token = rest.split(char::is_whitespace).next()?;
        if token.is_empty() {
            return None;
        }

        let candidate = token.to_lowercase();
        self.commands
            .iter()
            .find(|command| **command == candidate)
            .map(|command| VoteCommand(command.clone()))
    }
}

/// Builds a [`VoteCommand`] without going through a normalizer.
#[cfg(test)]
pub fn vote_command(command: &str) -> VoteCommand {
    VoteCommand(command.to_owned())
}
