//! Winner selection for a closed window.

use crate::voting::{
    normalizer::VoteCommand,
    tally::{TallySnapshot, VoteCount},
};

/// Outcome of a closed window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// A command reached the threshold with the highest count
    Winner { command: VoteCommand, votes: u32 },
    /// Nobody voted, or the top command stayed under the threshold
    NoWinner,
}

/// Picks the winning command of a closed window.
///
/// The highest count wins. Among equal counts the command that received its
/// first vote earliest wins. A top count strictly below `min_votes` gives
/// [`Decision::NoWinner`], as does an empty snapshot.
///
/// # Arguments
///
/// * `snapshot` - Counts of the closed window, in first-vote order
/// * `min_votes` - Votes the top command needs to win
///
/// # Examples
///
/// ```no_run
/// use tallybot::voting::selector::{Decision, select_winner};
/// use tallybot::voting::tally::Tally;
///
/// # fn example(mut tally: Tally) {
/// let snapshot = tally.snapshot_and_reset();
/// match select_winner(&snapshot, 3) {
///     Decision::Winner { command, votes } => println!("{command} wins with {votes}"),
///     Decision::NoWinner => println!("no winner"),
/// }
/// # }
/// ```
pub fn select_winner(snapshot: &TallySnapshot, min_votes: u32) -> Decision {
    let mut best: Option<&VoteCount> = None;
    for entry in snapshot.iter() {
        // Strictly greater keeps the earliest entry on ties
        if best.is_none_or(|b| entry.votes > b.votes) {
            best = Some(entry);
        }
    }

    match best {
        Some(entry) if entry.votes >= min_votes => Decision::Winner {
            command: entry.command.clone(),
            votes: entry.votes,
        },
        _ => Decision::NoWinner,
    }
}
