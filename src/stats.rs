//! Read-only statistics for monitoring consumers
//!
//! The control loop owns every counter. After each step it copies them into
//! an [`EpisodeSnapshot`] and offers it on a bounded channel; a monitor on
//! another thread reads snapshots and never touches the live state. When the
//! monitor falls behind, new snapshots are dropped rather than blocking the
//! control loop.

use crossbeam_channel::{Receiver, Sender, TrySendError};
use serde::{Deserialize, Serialize};

/// Copy of the episode counters after one step
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EpisodeSnapshot {
    /// Episode number (first episode is 1)
    pub episode: u64,
    /// Inner iterations executed in this episode
    pub step: usize,
    /// Reward of the last step
    pub step_reward: f64,
    /// Cumulative episode reward
    pub episode_reward: f64,
    /// Times each action id was requested, indexed by id
    pub action_counts: Vec<u64>,
    /// Confirmed threats since construction
    pub threat_triggers: u64,
    /// Completed escape macros since construction
    pub escapes: u64,
    /// Current stuck counter of the reward engine
    pub stuck_count: u32,
}

/// Non-blocking sender side of the statistics channel
#[derive(Debug)]
pub struct StatsPublisher {
    sender: Sender<EpisodeSnapshot>,
    dropped: u64,
    disconnected: bool,
}

impl StatsPublisher {
    /// Wrap an existing sender
    pub fn new(sender: Sender<EpisodeSnapshot>) -> Self {
        Self { sender, dropped: 0, disconnected: false }
    }

    /// Create a publisher and its receiver with room for `capacity` snapshots.
    ///
    /// A capacity of zero is raised to one; a rendezvous channel would drop
    /// every snapshot offered with `try_send`.
    pub fn bounded(capacity: usize) -> (Self, Receiver<EpisodeSnapshot>) {
        let (sender, receiver) = crossbeam_channel::bounded(capacity.max(1));
        (Self::new(sender), receiver)
    }

    /// Offer a snapshot without blocking; returns whether it was queued
    pub fn publish(&mut self, snapshot: EpisodeSnapshot) -> bool {
        match self.sender.try_send(snapshot) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.dropped += 1;
                false
            }
            Err(TrySendError::Disconnected(_)) => {
                if !self.disconnected {
                    tracing::warn!("statistics receiver dropped; snapshots are discarded");
                    self.disconnected = true;
                }
                self.dropped += 1;
                false
            }
        }
    }

    /// Snapshots that could not be queued
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

/// Drain `receiver` and keep the newest snapshot
pub fn latest(receiver: &Receiver<EpisodeSnapshot>) -> Option<EpisodeSnapshot> {
    receiver.try_iter().last()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(step: usize) -> EpisodeSnapshot {
        EpisodeSnapshot { episode: 1, step, ..EpisodeSnapshot::default() }
    }

    #[test]
    fn test_full_channel_drops_instead_of_blocking() {
        let (mut publisher, receiver) = StatsPublisher::bounded(2);
        assert!(publisher.publish(snapshot(1)));
        assert!(publisher.publish(snapshot(2)));
        assert!(!publisher.publish(snapshot(3)));
        assert_eq!(publisher.dropped(), 1);

        assert_eq!(latest(&receiver).map(|s| s.step), Some(2));
        assert!(latest(&receiver).is_none());
        assert!(publisher.publish(snapshot(4)));
    }

    #[test]
    fn test_zero_capacity_still_queues_one() {
        let (mut publisher, receiver) = StatsPublisher::bounded(0);
        assert!(publisher.publish(snapshot(1)));
        assert!(!publisher.publish(snapshot(2)));
        assert_eq!(latest(&receiver).map(|s| s.step), Some(1));
    }

    #[test]
    fn test_disconnected_receiver() {
        let (mut publisher, receiver) = StatsPublisher::bounded(1);
        drop(receiver);
        assert!(!publisher.publish(snapshot(1)));
        assert!(!publisher.publish(snapshot(2)));
        assert_eq!(publisher.dropped(), 2);
    }

    #[test]
    fn test_snapshot_crosses_threads() {
        let (mut publisher, receiver) = StatsPublisher::bounded(8);
        let monitor = std::thread::spawn(move || receiver.recv().map(|s| s.step_reward));
        publisher.publish(EpisodeSnapshot { step_reward: 1.5, ..snapshot(1) });
        assert_eq!(monitor.join().unwrap().unwrap(), 1.5);
    }
}
