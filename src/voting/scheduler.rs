//! Vote windows and the task that drives them.
//!
//! A single background task owns the [`Tally`] and reacts to two kinds of
//! events, one at a time: votes coming from the chat and the deadline of the
//! open window. A vote arriving right at a window boundary is therefore
//! counted in exactly one window.
//!
//! ```text
//! VoteSink::submit ──► vote queue ──► WindowScheduler ──► winner queue ──► ActionDispatcher
//!                                     (tally + timer)                       (dispatch task)
//! ```
//!
//! Winners go through a second queue and a second task: a slow action does
//! not delay the next window, and actions run in the order their windows
//! closed.

use std::{sync::Arc, time::Duration};

use log::{debug, error, info, warn};
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
    time::{self, Instant},
};

use crate::{
    actions::ActionDispatcher,
    voting::{
        VotingRules,
        normalizer::{CommandNormalizer, VoteCommand},
        selector::{Decision, select_winner},
        tally::Tally,
    },
};

/// A validated vote waiting to be counted.
#[derive(Debug)]
struct Vote {
    /// Opaque identity of the voter, only used for logging
    identity: String,
    command: VoteCommand,
}

/// Owner of the open window.
///
/// Each window lasts `window` from the instant the previous one was
/// snapshotted, so a late timer wake-up shifts the following windows instead
/// of shortening them.
struct WindowScheduler {
    tally: Tally,
    window: Duration,
    min_votes: u32,
    /// Instant the open window started
    opened_at: Instant,
    /// 1-based number of the open window, for logs
    window_number: u64,
}

impl WindowScheduler {
    fn new(window: Duration, min_votes: u32) -> Self {
        WindowScheduler {
            tally: Tally::new(),
            window,
            min_votes,
            opened_at: Instant::now(),
            window_number: 1,
        }
    }

    fn deadline(&self) -> Instant {
        self.opened_at + self.window
    }

    fn record(&mut self, vote: Vote) {
        let count = self.tally.record(&vote.command);
        debug!(
            "window {}: {} voted {} ({} votes)",
            self.window_number, vote.identity, vote.command, count
        );
    }

    /// Closes the open window, opens the next one and returns the decision.
    fn close_window(&mut self) -> Decision {
        let snapshot = self.tally.snapshot_and_reset();
        self.opened_at = Instant::now();

        let decision = select_winner(&snapshot, self.min_votes);
        match &decision {
            Decision::Winner { command, votes } => info!(
                "window {} closed: {} wins with {}/{} votes",
                self.window_number,
                command,
                votes,
                snapshot.total_votes()
            ),
            Decision::NoWinner => info!(
                "window {} closed without a winner ({} votes)",
                self.window_number,
                snapshot.total_votes()
            ),
        }

        self.window_number += 1;
        decision
    }

    /// Runs windows until `stop` fires or every vote sender is gone.
    ///
    /// The deadline is polled first: a vote that is still queued when the
    /// window expires belongs to the next window.
    async fn run(
        mut self,
        mut votes: mpsc::UnboundedReceiver<Vote>,
        winners: mpsc::UnboundedSender<VoteCommand>,
        mut stop: oneshot::Receiver<()>,
    ) {
        loop {
            tokio::select! {
                biased;
                _ = &mut stop => break,
                () = time::sleep_until(self.deadline()) => {
                    if let Decision::Winner { command, .. } = self.close_window()
                        && winners.send(command).is_err()
                    {
                        warn!("dispatch task is gone, dropping winner");
                    }
                }
                vote = votes.recv() => match vote {
                    Some(vote) => self.record(vote),
                    None => break,
                },
            }
        }

        if !self.tally.is_empty() {
            debug!(
                "discarding open window {} with {} votes",
                self.window_number,
                self.tally.total_votes()
            );
        }
    }
}

/// Hands winning commands to the dispatcher, one at a time.
///
/// Failures are logged and dropped. Returns once the winner queue is closed
/// and drained.
async fn run_dispatch_loop(
    mut winners: mpsc::UnboundedReceiver<VoteCommand>,
    dispatcher: Arc<dyn ActionDispatcher>,
) {
    while let Some(command) = winners.recv().await {
        match dispatcher.dispatch(command.as_str()).await {
            Ok(()) => debug!("dispatched {}", command),
            Err(e) => error!("failed to dispatch {}: {}", command, e),
        }
    }
}

/// Entry point for chat messages.
///
/// Cheap to clone; every clone feeds the same aggregator. Messages are
/// classified on the caller's side and only valid votes are queued.
#[derive(Clone)]
pub struct VoteSink {
    normalizer: Arc<CommandNormalizer>,
    votes: mpsc::UnboundedSender<Vote>,
}

impl VoteSink {
    /// Submits one chat message from `identity`.
    ///
    /// Returns `true` when the message was queued as a vote, `false` when it
    /// is not a vote or the aggregator has stopped.
    pub fn submit(&self, identity: &str, body: &str) -> bool {
        let Some(command) = self.normalizer.normalize(body) else {
            return false;
        };

        let vote = Vote {
            identity: identity.to_owned(),
            command,
        };
        if self.votes.send(vote).is_err() {
            warn!("aggregator stopped, ignoring vote from {}", identity);
            return false;
        }

        true
    }
}

/// Running vote aggregator.
///
/// Created with [`VoteAggregator::start`], which opens the first window
/// immediately. Votes enter through [`VoteAggregator::sink`]; winners are
/// passed to the injected [`ActionDispatcher`].
///
pub struct VoteAggregator {
    sink: VoteSink,
    stop: oneshot::Sender<()>,
    window_task: JoinHandle<()>,
    dispatch_task: JoinHandle<()>,
}

impl VoteAggregator {
    /// Starts the window and dispatch tasks.
    ///
    /// Must be called from within a Tokio runtime. The first window opens
    /// immediately.
    ///
    /// # Arguments
    ///
    /// * `rules` - Prefix, allow-list, window length and threshold. The
    ///   window must not be zero, which configuration validation ensures.
    /// * `dispatcher` - Receives each winning command, in window order
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use std::sync::Arc;
    /// use tallybot::actions::LogAction;
    /// use tallybot::voting::{VoteAggregator, VotingRules};
    ///
    /// # async fn example(rules: VotingRules) {
    /// let aggregator = VoteAggregator::start(&rules, Arc::new(LogAction));
    /// let sink = aggregator.sink();
    /// sink.submit("@alice:example.com", "!forward");
    /// // One window later, LogAction runs with "forward"
    /// aggregator.shutdown().await;
    /// # }
    /// ```
    pub fn start(rules: &VotingRules, dispatcher: Arc<dyn ActionDispatcher>) -> Self {
        let (votes_tx, votes_rx) = mpsc::unbounded_channel();
        let (winners_tx, winners_rx) = mpsc::unbounded_channel();
        let (stop_tx, stop_rx) = oneshot::channel();

        info!(
            "opening vote windows of {:?}, {} vote(s) needed to win",
            rules.window, rules.min_votes
        );

        let scheduler = WindowScheduler::new(rules.window, rules.min_votes);
        let window_task = tokio::spawn(scheduler.run(votes_rx, winners_tx, stop_rx));
        let dispatch_task = tokio::spawn(run_dispatch_loop(winners_rx, dispatcher));

        let sink = VoteSink {
            normalizer: Arc::new(CommandNormalizer::new(&rules.prefix, &rules.commands)),
            votes: votes_tx,
        };

        VoteAggregator {
            sink,
            stop: stop_tx,
            window_task,
            dispatch_task,
        }
    }

    pub fn sink(&self) -> VoteSink {
        self.sink.clone()
    }

    /// Stops the windows and waits for pending dispatches.
    ///
    /// The open window is discarded without a decision. Winners of windows
    /// that already closed are still dispatched.
    pub async fn shutdown(self) {
        // The window task may already be gone, nothing to signal then
        let _ = self.stop.send(());

        if let Err(e) = self.window_task.await {
            error!("window task ended abnormally: {}", e);
        }
        if let Err(e) = self.dispatch_task.await {
            error!("dispatch task ended abnormally: {}", e);
        }

        info!("voting stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{DispatchError, MockActionDispatcher};
    use crate::voting::normalizer::vote_command;
    use async_trait::async_trait;
    use mockall::{Sequence, predicate::eq};

    /// Forwards every dispatched command to a channel the test reads.
    struct ChannelDispatcher {
        dispatched: mpsc::UnboundedSender<String>,
    }

    #[async_trait]
    impl ActionDispatcher for ChannelDispatcher {
        async fn dispatch(&self, command: &str) -> Result<(), DispatchError> {
            self.dispatched.send(command.to_owned()).unwrap();
            Ok(())
        }
    }

    fn channel_dispatcher() -> (Arc<dyn ActionDispatcher>, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(ChannelDispatcher { dispatched: tx }), rx)
    }

    fn create_rules(min_votes: u32) -> VotingRules {
        VotingRules {
            prefix: "!".to_string(),
            commands: ["forward", "back", "left", "right"]
                .iter()
                .map(|c| c.to_string())
                .collect(),
            window: Duration::from_secs(10),
            min_votes,
        }
    }

    fn create_vote(command: &str) -> Vote {
        Vote {
            identity: "@viewer:example.com".to_string(),
            command: vote_command(command),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_end_to_end_most_voted_command_wins() {
        let (dispatcher, mut dispatched) = channel_dispatcher();
        let aggregator = VoteAggregator::start(&create_rules(1), dispatcher);
        let sink = aggregator.sink();

        for body in ["!forward", "!forward", "!left", "!forward"] {
            assert!(sink.submit("@viewer:example.com", body));
        }

        assert_eq!(dispatched.recv().await.unwrap(), "forward");
        aggregator.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_case_variants_share_a_bucket() {
        let (dispatcher, mut dispatched) = channel_dispatcher();
        let aggregator = VoteAggregator::start(&create_rules(3), dispatcher);
        let sink = aggregator.sink();

        for body in ["!FORWARD", "!forward", "!Forward", "!left"] {
            assert!(sink.submit("@viewer:example.com", body));
        }

        assert_eq!(dispatched.recv().await.unwrap(), "forward");
        aggregator.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_window_does_not_dispatch() {
        let (dispatcher, mut dispatched) = channel_dispatcher();
        let started = Instant::now();
        let aggregator = VoteAggregator::start(&create_rules(1), dispatcher);
        let sink = aggregator.sink();

        // First window closes at 10s with nothing to dispatch
        time::sleep(Duration::from_secs(15)).await;
        assert!(sink.submit("@viewer:example.com", "!back"));

        // The first dispatch is the second window's winner
        assert_eq!(dispatched.recv().await.unwrap(), "back");
        assert!(started.elapsed() >= Duration::from_secs(20));
        assert!(started.elapsed() < Duration::from_secs(21));
        aggregator.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_command_is_not_tallied() {
        let (dispatcher, mut dispatched) = channel_dispatcher();
        let aggregator = VoteAggregator::start(&create_rules(1), dispatcher);
        let sink = aggregator.sink();

        assert!(!sink.submit("@viewer:example.com", "!jump"));
        assert!(!sink.submit("@viewer:example.com", "hello there"));

        time::sleep(Duration::from_secs(12)).await;
        assert!(sink.submit("@viewer:example.com", "!left"));

        assert_eq!(dispatched.recv().await.unwrap(), "left");
        aggregator.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_below_threshold_does_not_dispatch() {
        let (dispatcher, mut dispatched) = channel_dispatcher();
        let aggregator = VoteAggregator::start(&create_rules(3), dispatcher);
        let sink = aggregator.sink();

        sink.submit("@a:example.com", "!forward");
        sink.submit("@b:example.com", "!forward");

        time::sleep(Duration::from_secs(12)).await;
        for _ in 0..3 {
            sink.submit("@c:example.com", "!right");
        }

        assert_eq!(dispatched.recv().await.unwrap(), "right");
        aggregator.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_votes_do_not_leak_into_next_window() {
        let (dispatcher, mut dispatched) = channel_dispatcher();
        let aggregator = VoteAggregator::start(&create_rules(1), dispatcher);
        let sink = aggregator.sink();

        sink.submit("@a:example.com", "!back");
        assert_eq!(dispatched.recv().await.unwrap(), "back");

        // A leftover "back" vote would win the tie against "left"
        sink.submit("@a:example.com", "!left");
        assert_eq!(dispatched.recv().await.unwrap(), "left");
        aggregator.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispatches_keep_window_order() {
        let (dispatcher, mut dispatched) = channel_dispatcher();
        let aggregator = VoteAggregator::start(&create_rules(1), dispatcher);
        let sink = aggregator.sink();

        for command in ["!left", "!right", "!back"] {
            sink.submit("@a:example.com", command);
            time::sleep(Duration::from_secs(10)).await;
        }

        assert_eq!(dispatched.recv().await.unwrap(), "left");
        assert_eq!(dispatched.recv().await.unwrap(), "right");
        assert_eq!(dispatched.recv().await.unwrap(), "back");
        aggregator.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_discards_open_window() {
        let (dispatcher, mut dispatched) = channel_dispatcher();
        let aggregator = VoteAggregator::start(&create_rules(1), dispatcher);
        let sink = aggregator.sink();

        sink.submit("@a:example.com", "!forward");
        aggregator.shutdown().await;

        // The dispatcher was dropped without being called
        assert!(dispatched.recv().await.is_none());
        assert!(!sink.submit("@a:example.com", "!forward"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_window_resets_tally_and_restarts_clock() {
        let mut scheduler = WindowScheduler::new(Duration::from_secs(10), 1);
        scheduler.record(create_vote("left"));
        scheduler.record(create_vote("left"));
        scheduler.record(create_vote("back"));

        time::advance(Duration::from_secs(11)).await;
        let closed_at = Instant::now();

        assert_eq!(
            scheduler.close_window(),
            Decision::Winner {
                command: vote_command("left"),
                votes: 2
            }
        );
        assert!(scheduler.tally.is_empty());
        assert_eq!(scheduler.window_number, 2);
        assert_eq!(scheduler.deadline(), closed_at + Duration::from_secs(10));

        assert_eq!(scheduler.close_window(), Decision::NoWinner);
    }

    #[tokio::test]
    async fn test_failed_dispatch_does_not_stop_later_dispatches() {
        let mut dispatcher = MockActionDispatcher::new();
        let mut sequence = Sequence::new();

        dispatcher
            .expect_dispatch()
            .with(eq("forward"))
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_| Err(DispatchError::Failed("controller offline".to_owned())));
        dispatcher
            .expect_dispatch()
            .with(eq("back"))
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_| Ok(()));

        let (winners_tx, winners_rx) = mpsc::unbounded_channel();
        winners_tx.send(vote_command("forward")).unwrap();
        winners_tx.send(vote_command("back")).unwrap();
        drop(winners_tx);

        // Expectations are checked when the mock is dropped at the end of the loop
        run_dispatch_loop(winners_rx, Arc::new(dispatcher)).await;
    }
}
