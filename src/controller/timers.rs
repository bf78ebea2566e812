use crate::types::Millis;

/// Work scheduled for later by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deferred {
    /// Clear hover a few ms after a click, so the move handler cannot repaint it.
    ClearHover,
}

/// Deadline queue driven by host timestamps.
#[derive(Debug, Clone, Default)]
pub struct Timers {
    queue: Vec<(Millis, Deferred)>, // sorted by deadline, FIFO among equals
}

impl Timers {
    pub fn new() -> Self { Self::default() }

    pub fn schedule(&mut self, at: Millis, task: Deferred) {
        let index = self.queue.partition_point(|(deadline, _)| *deadline <= at);
        self.queue.insert(index, (at, task));
    }

    /// Remove and return every task due at `now`, earliest first.
    pub fn due(&mut self, now: Millis) -> Vec<Deferred> {
        let split = self.queue.partition_point(|(deadline, _)| *deadline <= now);
        self.queue.drain(..split).map(|(_, task)| task).collect()
    }

    #[inline] pub fn next_deadline(&self) -> Option<Millis> { self.queue.first().map(|(at, _)| *at) }

    #[inline] pub fn is_empty(&self) -> bool { self.queue.is_empty() }

    pub fn clear(&mut self) { self.queue.clear(); }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_in_deadline_order() {
        let mut timers = Timers::new();
        timers.schedule(150, Deferred::ClearHover);
        timers.schedule(100, Deferred::ClearHover);
        assert_eq!(timers.next_deadline(), Some(100));

        assert!(timers.due(99).is_empty());
        assert_eq!(timers.due(120), vec![Deferred::ClearHover]);
        assert_eq!(timers.next_deadline(), Some(150));
        assert_eq!(timers.due(1000).len(), 1);
        assert!(timers.is_empty());
    }
}
