//! Vote counting for the open window.

use crate::voting::normalizer::VoteCommand;

/// Number of votes a command received in one window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteCount {
    /// The voted command
    pub command: VoteCommand,
    /// Votes received, always at least 1 once the entry exists
    pub votes: u32,
}

/// Vote counts of the currently open window.
///
/// Counts are kept in the order commands first received a vote, which is
/// what breaks ties when the window closes. The allow-list is small, so a
/// vector scan is all the lookup needs.
///
/// `record` and `snapshot_and_reset` both take `&mut self`: whoever owns the
/// tally serializes them, and a vote lands either before or after a snapshot,
/// never across it.
#[derive(Debug, Default)]
pub struct Tally {
    counts: Vec<VoteCount>,
}

impl Tally {
    pub fn new() -> Self {
        Tally::default()
    }

    /// Adds one vote for `command` and returns its new count.
    pub fn record(&mut self, command: &VoteCommand) -> u32 {
        if let Some(entry) = self.counts.iter_mut().find(|e| e.command == *command) {
            entry.votes += 1;
            return entry.votes;
        }

        self.counts.push(VoteCount {
            command: command.clone(),
            votes: 1,
        });
        1
    }

    /// Returns the current counts and leaves the tally empty for a new window.
    pub fn snapshot_and_reset(&mut self) -> TallySnapshot {
        TallySnapshot {
            counts: std::mem::take(&mut self.counts),
        }
    }

    #[cfg(test)]
    pub fn count(&self, command: &str) -> u32 {
        count_in(&self.counts, command)
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Total votes recorded since the last snapshot.
    pub fn total_votes(&self) -> u32 {
        self.counts.iter().map(|e| e.votes).sum()
    }
}

/// Frozen counts of a closed window, in first-vote order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TallySnapshot {
    counts: Vec<VoteCount>,
}

impl TallySnapshot {
    pub fn iter(&self) -> impl Iterator<Item = &VoteCount> {
        self.counts.iter()
    }

    #[cfg(test)]
    pub fn count(&self, command: &str) -> u32 {
        count_in(&self.counts, command)
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn total_votes(&self) -> u32 {
        self.counts.iter().map(|e| e.votes).sum()
    }
}

#[cfg(test)]
fn count_in(counts: &[VoteCount], command: &str) -> u32 {
    counts
        .iter()
        .find(|e| e.command.as_str() == command)
        .map_or(0, |e| e.votes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voting::normalizer::vote_command;

    #[test]
    fn test_record_inserts_and_increments() {
        let mut tally = Tally::new();
        let forward = vote_command("forward");

        assert_eq!(tally.record(&forward), 1);
        assert_eq!(tally.record(&forward), 2);
        assert_eq!(tally.record(&vote_command("left")), 1);

        assert_eq!(tally.count("forward"), 2);
        assert_eq!(tally.count("left"), 1);
        assert_eq!(tally.count("back"), 0);
        assert_eq!(tally.total_votes(), 3);
    }

    #[test]
    fn test_counts_match_recorded_votes() {
        let mut tally = Tally::new();
        let votes = ["left", "right", "left", "back", "left", "right"];
        for vote in votes {
            tally.record(&vote_command(vote));
        }

        for command in ["left", "right", "back", "forward"] {
            let expected = votes.iter().filter(|v| **v == command).count() as u32;
            assert_eq!(tally.count(command), expected, "count for {}", command);
        }
    }

    #[test]
    fn test_snapshot_preserves_first_vote_order() {
        let mut tally = Tally::new();
        for vote in ["back", "forward", "back", "left", "forward"] {
            tally.record(&vote_command(vote));
        }

        let snapshot = tally.snapshot_and_reset();
        let order: Vec<&str> = snapshot.iter().map(|e| e.command.as_str()).collect();
        assert_eq!(order, vec!["back", "forward", "left"]);
        assert_eq!(snapshot.count("back"), 2);
        assert_eq!(snapshot.total_votes(), 5);
    }

    #[test]
    fn test_snapshot_resets_tally() {
        let mut tally = Tally::new();
        tally.record(&vote_command("forward"));

        let snapshot = tally.snapshot_and_reset();
        assert!(!snapshot.is_empty());
        assert!(tally.is_empty());
        assert_eq!(tally.count("forward"), 0);
    }

    #[test]
    fn test_second_snapshot_is_empty() {
        let mut tally = Tally::new();
        tally.record(&vote_command("forward"));
        tally.record(&vote_command("back"));

        let first = tally.snapshot_and_reset();
        let second = tally.snapshot_and_reset();

        assert_eq!(first.total_votes(), 2);
        assert!(second.is_empty());
        assert_eq!(second, TallySnapshot::default());
    }
}
