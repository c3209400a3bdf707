use crate::midi::device::OutputChannel;
use std::collections::VecDeque;
use tracing::{debug, warn};

/// FIFO of raw messages submitted while a connection is pending
#[derive(Debug, Default)]
pub struct OutboundQueue {
    messages: VecDeque<Vec<u8>>,
}

impl OutboundQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, message: Vec<u8>) {
        self.messages.push_back(message);
        debug!(queued = self.messages.len(), "queued packet");
    }

    /// Replays every queued message in order over `channel`. The queue is
    /// empty afterwards even if some sends failed. Returns the number of
    /// failed sends.
    pub fn drain_into(&mut self, channel: &mut dyn OutputChannel) -> usize {
        let mut failures = 0;
        while let Some(message) = self.messages.pop_front() {
            debug!("replaying queued packet");
            if let Err(e) = channel.send(&message) {
                failures += 1;
                warn!(error = %e, "replay send failed");
            }
        }
        failures
    }

    pub fn clear(&mut self) {
        if !self.messages.is_empty() {
            debug!(discarded = self.messages.len(), "queue cleared");
        }
        self.messages.clear();
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::mock::MockChannel;

    #[test]
    fn test_drain_preserves_order() {
        let mut queue = OutboundQueue::new();
        queue.enqueue(vec![0x90, 60, 100]);
        queue.enqueue(vec![0xC0, 5]);
        queue.enqueue(vec![0x80, 60, 0]);

        let (mut channel, log) = MockChannel::new();
        assert_eq!(queue.drain_into(&mut channel), 0);

        assert!(queue.is_empty());
        assert_eq!(
            log.sent(),
            vec![vec![0x90, 60, 100], vec![0xC0, 5], vec![0x80, 60, 0]]
        );
    }

    #[test]
    fn test_drain_continues_after_failure() {
        let mut queue = OutboundQueue::new();
        for note in 60..64 {
            queue.enqueue(vec![0x90, note, 100]);
        }

        let (mut channel, log) = MockChannel::new();
        log.fail_send_at(1);
        assert_eq!(queue.drain_into(&mut channel), 1);

        assert!(queue.is_empty());
        assert_eq!(
            log.sent(),
            vec![vec![0x90, 60, 100], vec![0x90, 62, 100], vec![0x90, 63, 100]]
        );
    }

    #[test]
    fn test_clear_is_idempotent() {
        let mut queue = OutboundQueue::new();
        queue.clear();
        queue.enqueue(vec![0xB0, 7, 127]);
        queue.clear();
        queue.clear();
        assert_eq!(queue.len(), 0);
    }
}
