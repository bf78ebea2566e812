use crate::types::Millis;

/// Time gate: admits an event only if at least `interval` ms passed since the last admitted one.
#[derive(Debug, Clone, Copy)]
pub struct Throttle {
    interval: Millis,
    last: Option<Millis>,
}

impl Throttle {
    pub fn new(interval: Millis) -> Self { Self { interval, last: None } }

    #[inline] pub fn interval(&self) -> Millis { self.interval }

    /// Returns `true` (and records `now`) when the event should be processed.
    pub fn admit(&mut self, now: Millis) -> bool {
        match self.last {
            Some(last) if now.saturating_sub(last) < self.interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }

    pub fn reset(&mut self) { self.last = None; }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_at_most_once_per_interval() {
        let mut throttle = Throttle::new(16);
        assert!(throttle.admit(1000));
        assert!(!throttle.admit(1005));
        assert!(!throttle.admit(1015));
        assert!(throttle.admit(1016));
        assert!(!throttle.admit(1020));
    }

    #[test]
    fn reset_admits_immediately() {
        let mut throttle = Throttle::new(16);
        assert!(throttle.admit(10));
        throttle.reset();
        assert!(throttle.admit(11));
    }
}
