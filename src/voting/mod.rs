//! Chat vote aggregation.
//!
//! Votes are collected in fixed-length windows. When a window closes the most
//! voted command wins and is handed to an
//! [`ActionDispatcher`](crate::actions::ActionDispatcher), then a fresh window
//! opens right away.
//!
//! # Flow
//!
//! ```text
//! chat message → CommandNormalizer → Tally ⟲ window deadline → select_winner → dispatch
//! ```
//!
//! # Modules
//!
//! - `normalizer` - turns `!Forward` into the `forward` vote, ignores everything else
//! - `tally` - per-window counts, kept in first-vote order
//! - `selector` - highest count wins, earliest command breaks ties, threshold applies
//! - `scheduler` - the task owning the tally and the window timer

use std::time::Duration;

mod normalizer;
mod scheduler;
mod selector;
mod tally;

pub use crate::voting::scheduler::VoteAggregator;

/// Parameters of a voting session, fixed for the process lifetime.
#[derive(Debug, Clone, PartialEq)]
pub struct VotingRules {
    /// Prefix a chat message must start with to be a vote
    pub prefix: String,
    /// Allowed commands, lower-cased, in configured order
    pub commands: Vec<String>,
    /// Length of a vote window
    pub window: Duration,
    /// Votes the top command needs to win a window
    pub min_votes: u32,
}
