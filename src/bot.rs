//! Bot module wiring the Matrix chat to the vote aggregator.
//!
//! # Architecture
//!
//! ```text
//! Matrix sync ──(sender, body)──► VoteSink ──► vote windows ──► ActionDispatcher
//! ```
//!
//! The bot runs two things concurrently:
//!
//! 1. **Matrix Sync**: forwards every new text message of the watched room(s)
//!    to the aggregator
//! 2. **Vote Aggregator**: its own background tasks close a window every
//!    `window_seconds`, pick the winner and dispatch it
//!
//! Both stop when the sync loop ends or the process receives Ctrl-C.

use std::sync::Arc;

use log::{error, info, warn};
use matrix_sdk::ruma::OwnedRoomId;

use crate::{
    actions::{ActionDispatcher, LogAction},
    config::Config,
    matrix::{MatrixClient, UserCredentials},
    voting::{VoteAggregator, VotingRules},
};

/// The running bot: one Matrix account, one vote aggregator.
pub struct Bot {
    /// Chat source
    matrix_client: MatrixClient,
    /// Rules of the vote windows
    rules: VotingRules,
    /// Effect of a winning command
    dispatcher: Arc<dyn ActionDispatcher>,
    /// Watched room, if restricted to one
    room_id: Option<OwnedRoomId>,
}

impl Bot {
    /// Creates the bot from a validated configuration.
    ///
    /// Logs in to Matrix (or restores the session stored in `data_path`) and
    /// picks the action dispatcher. No vote window is opened yet.
    ///
    /// # Errors
    ///
    /// Returns an error if `matrix.room_id` is not a valid room ID or the
    /// Matrix client cannot be set up.
    pub async fn new(config: Config, data_path: &str) -> Result<Self, anyhow::Error> {
        let room_id = config
            .matrix
            .room_id
            .as_deref()
            .map(OwnedRoomId::try_from)
            .transpose()?;

        let matrix_client = MatrixClient::new(
            &UserCredentials {
                user_id: config.matrix.user_id,
                password: config.matrix.password,
            },
            data_path,
            room_id.clone(),
        )
        .await?;

        let dispatcher: Arc<dyn ActionDispatcher> = match (&room_id, config.voting.announce) {
            (Some(room_id), true) => Arc::new(matrix_client.announcer(room_id.clone())),
            (None, true) => {
                warn!("voting.announce needs matrix.room_id, winners will only be logged");
                Arc::new(LogAction)
            }
            (_, false) => Arc::new(LogAction),
        };

        Ok(Bot {
            matrix_client,
            rules: config.voting.rules(),
            dispatcher,
            room_id,
        })
    }

    /// Opens the first vote window and listens to the chat until the sync
    /// loop ends or Ctrl-C is received, then stops the aggregator.
    pub async fn start(self) {
        match &self.room_id {
            Some(room_id) => info!("listening on {}", room_id),
            None => info!("listening on every joined room"),
        }
        info!("commands: {}", describe_commands(&self.rules));
        info!("vote window: {:?}", self.rules.window);

        let aggregator = VoteAggregator::start(&self.rules, Arc::clone(&self.dispatcher));
        let sink = aggregator.sink();
        let on_message = move |sender: String, body: String| {
            sink.submit(&sender, &body);
        };

        tokio::select! {
            () = self.matrix_client.sync(on_message) => warn!("chat stream ended"),
            signal = tokio::signal::ctrl_c() => match signal {
                Ok(()) => info!("received Ctrl-C, shutting down"),
                Err(e) => error!("failed to listen for Ctrl-C: {}", e),
            },
        }

        aggregator.shutdown().await;
    }
}

/// Lists the accepted votes with their prefix, e.g. `!forward, !back`.
fn describe_commands(rules: &VotingRules) -> String {
    rules
        .commands
        .iter()
        .map(|command| format!("{}{}", rules.prefix, command))
        .collect::<Vec<String>>()
        .join(", ")
}
