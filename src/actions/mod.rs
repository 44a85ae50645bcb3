//! Effects triggered by a winning command.
//!
//! The vote aggregator only knows the [`ActionDispatcher`] capability: it hands
//! over the winning command of each window and logs the result. What actually
//! happens is up to the implementation:
//!
//! - [`LogAction`] - logs and prints the command, a stand-in for real controls
//! - [`RoomAnnouncer`](crate::matrix::RoomAnnouncer) - posts the winner back into
//!   the chat room

use std::fmt;

use async_trait::async_trait;
use mockall::automock;

mod log_action;

pub use crate::actions::log_action::LogAction;

/// Capability invoked once per window that produced a winner.
///
/// Implementations must be shareable across tasks: the aggregator calls
/// `dispatch` from its own background task, one command at a time, in the
/// order windows closed.
#[automock]
#[async_trait]
pub trait ActionDispatcher: Send + Sync {
    /// Performs the effect associated with `command`.
    ///
    /// `command` is always a lower-cased member of the configured allow-list.
    async fn dispatch(&self, command: &str) -> Result<(), DispatchError>;
}

/// Failure reported by an [`ActionDispatcher`].
///
/// The aggregator logs it and moves on; nothing is retried.
#[derive(Debug, PartialEq, Eq)]
pub enum DispatchError {
    /// The target of the action is not reachable, e.g. the room is not joined
    Unavailable(String),
    /// The target refused or failed to perform the action
    Failed(String),
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchError::Unavailable(reason) => write!(f, "action target unavailable: {}", reason),
            DispatchError::Failed(reason) => write!(f, "action failed: {}", reason),
        }
    }
}

impl std::error::Error for DispatchError {}
