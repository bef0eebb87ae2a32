//! # Fibonacci Backoff
//!
//! Delay schedule between ACC reachability probes. It grows more slowly than
//! exponential backoff, which suits a host that comes up after an unknown
//! reboot time: early probes stay frequent, later ones settle at the cap.
//!
//! With the default 5 s minimum and 60 s cap: 5s, 5s, 10s, 15s, 25s, 40s, 60s, 60s, ...

use std::time::Duration;

/// Fibonacci backoff calculator
///
/// Each delay is the sum of the previous two, starting from `min` twice and
/// capped at `max`.
#[derive(Debug, Clone)]
pub struct FibonacciBackoff {
    prev: Duration,
    current: Duration,
    max: Duration,
}

impl FibonacciBackoff {
    #[must_use]
    pub fn new(min: Duration, max: Duration) -> Self {
        Self {
            prev: Duration::ZERO,
            current: min,
            max,
        }
    }

    /// Get the next delay and advance the sequence
    pub fn next_backoff(&mut self) -> Duration {
        let result = self.current;
        let next = self.prev + self.current;
        self.prev = self.current;
        self.current = std::cmp::min(next, self.max);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(backoff: &mut FibonacciBackoff) -> u64 {
        backoff.next_backoff().as_secs()
    }

    #[test]
    fn test_fibonacci_backoff_sequence() {
        let mut backoff = FibonacciBackoff::new(Duration::from_secs(5), Duration::from_secs(60));

        assert_eq!(secs(&mut backoff), 5);
        assert_eq!(secs(&mut backoff), 5);
        assert_eq!(secs(&mut backoff), 10);
        assert_eq!(secs(&mut backoff), 15);
        assert_eq!(secs(&mut backoff), 25);
        assert_eq!(secs(&mut backoff), 40);
        assert_eq!(secs(&mut backoff), 60); // 65 capped
        assert_eq!(secs(&mut backoff), 60);
    }

    #[test]
    fn test_min_above_max_stays_at_min_then_caps() {
        let mut backoff = FibonacciBackoff::new(Duration::from_secs(10), Duration::from_secs(8));
        assert_eq!(secs(&mut backoff), 10);
        assert_eq!(secs(&mut backoff), 8);
        assert_eq!(secs(&mut backoff), 8);
    }
}
