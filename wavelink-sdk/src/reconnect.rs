//! Reconnect policy: bounded exponential backoff as an explicit state
//! machine.
//!
//! The policy is pure — it only decides *whether* and *after how long*
//! to retry. The client loop owns the actual timer and cancels it on
//! explicit close, so no stray attempt can fire after shutdown.
//!
//! Delay before attempt `k` is `base × 2^(k−1)`; a successful open resets
//! the attempt count to zero regardless of history.

use std::time::Duration;

use crate::config::ReconnectConfig;

/// What the client loop should do after an unexpected close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectDecision {
    /// Schedule attempt `attempt` after `delay`.
    RetryAfter { attempt: u32, delay: Duration },
    /// The attempt budget is spent. Terminal until a manual reset.
    Exhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Nothing pending; the next unexpected close starts at attempt 1.
    Idle,
    /// A retry timer is (or should be) running for this attempt.
    Waiting { attempt: u32 },
    /// `open()` for this attempt is in flight.
    Attempting { attempt: u32 },
    /// Budget spent; only `reset()` leaves this state.
    Exhausted,
}

/// Decides if/when to re-establish the channel after an unexpected close.
#[derive(Debug)]
pub struct ReconnectPolicy {
    config: ReconnectConfig,
    state: State,
}

impl ReconnectPolicy {
    pub fn new(config: ReconnectConfig) -> Self {
        Self {
            config,
            state: State::Idle,
        }
    }

    /// The channel closed without an explicit `close()` (or an open
    /// attempt failed). Returns the scheduling decision.
    pub fn on_unexpected_close(&mut self) -> ReconnectDecision {
        let prior = match self.state {
            State::Idle => 0,
            State::Waiting { attempt } | State::Attempting { attempt } => attempt,
            State::Exhausted => return ReconnectDecision::Exhausted,
        };
        let attempt = prior + 1;
        if attempt > self.config.max_attempts {
            self.state = State::Exhausted;
            return ReconnectDecision::Exhausted;
        }
        self.state = State::Waiting { attempt };
        ReconnectDecision::RetryAfter {
            attempt,
            delay: self.delay_for(attempt),
        }
    }

    /// The retry timer fired; the loop is about to call `open()`.
    /// Returns the attempt number for logging.
    pub fn begin_attempt(&mut self) -> u32 {
        if let State::Waiting { attempt } = self.state {
            self.state = State::Attempting { attempt };
            attempt
        } else {
            0
        }
    }

    /// The channel reached Open. Attempt count goes back to zero.
    pub fn on_open(&mut self) {
        self.state = State::Idle;
    }

    /// Explicit close or manual retry: forget any pending attempt.
    pub fn reset(&mut self) {
        self.state = State::Idle;
    }

    pub fn is_exhausted(&self) -> bool {
        self.state == State::Exhausted
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        // attempt starts at 1, so the first delay is exactly base_delay
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.config.base_delay.saturating_mul(factor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(base_ms: u64, max: u32) -> ReconnectPolicy {
        ReconnectPolicy::new(ReconnectConfig {
            base_delay: Duration::from_millis(base_ms),
            max_attempts: max,
        })
    }

    #[test]
    fn delay_doubles_per_attempt() {
        let mut p = policy(1000, 5);
        let mut delays = Vec::new();
        for _ in 0..5 {
            match p.on_unexpected_close() {
                ReconnectDecision::RetryAfter { delay, .. } => {
                    delays.push(delay.as_millis());
                    p.begin_attempt();
                }
                ReconnectDecision::Exhausted => panic!("exhausted too early"),
            }
        }
        assert_eq!(delays, vec![1000, 2000, 4000, 8000, 16000]);
    }

    #[test]
    fn exhausts_after_max_attempts_and_stays_exhausted() {
        let mut p = policy(10, 5);
        for _ in 0..5 {
            assert!(matches!(
                p.on_unexpected_close(),
                ReconnectDecision::RetryAfter { .. }
            ));
            p.begin_attempt();
        }
        assert_eq!(p.on_unexpected_close(), ReconnectDecision::Exhausted);
        assert!(p.is_exhausted());
        // No sixth attempt, ever.
        assert_eq!(p.on_unexpected_close(), ReconnectDecision::Exhausted);
    }

    #[test]
    fn open_resets_attempt_count() {
        let mut p = policy(100, 3);
        for _ in 0..3 {
            p.on_unexpected_close();
            p.begin_attempt();
        }
        p.on_open();
        // Back at attempt 1 with the base delay.
        assert_eq!(
            p.on_unexpected_close(),
            ReconnectDecision::RetryAfter {
                attempt: 1,
                delay: Duration::from_millis(100),
            }
        );
    }

    #[test]
    fn reset_leaves_exhausted_state() {
        let mut p = policy(10, 1);
        p.on_unexpected_close();
        p.begin_attempt();
        assert_eq!(p.on_unexpected_close(), ReconnectDecision::Exhausted);
        p.reset();
        assert!(!p.is_exhausted());
        assert!(matches!(
            p.on_unexpected_close(),
            ReconnectDecision::RetryAfter { attempt: 1, .. }
        ));
    }

    #[test]
    fn attempt_numbers_are_sequential() {
        let mut p = policy(10, 4);
        for expected in 1..=4 {
            match p.on_unexpected_close() {
                ReconnectDecision::RetryAfter { attempt, .. } => {
                    assert_eq!(attempt, expected);
                    assert_eq!(p.begin_attempt(), expected);
                }
                ReconnectDecision::Exhausted => panic!("exhausted at {expected}"),
            }
        }
    }
}
