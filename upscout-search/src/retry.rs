//! Retry and mirror rotation decisions for a single logical request.
//!
//! The state machine is pure: it is fed the outcome of each attempt and
//! answers with what to do next. Sleeping and sending live in the executor.

use std::time::Duration;

use upscout_core::IndexConfig;

use crate::errors::FailureReason;

/// How a single attempt against one mirror ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    /// Connection refused, DNS failure or a dropped connection
    NetworkFailure(String),
    TimeoutFailure,
    /// 5xx or rate limiting, worth retrying on the same mirror
    ServerFailure(u16),
    /// Answer that is not usable index data (HTML, bad JSON, other 4xx)
    ProtocolFailure(String),
}

impl AttemptOutcome {
    fn failure_reason(&self) -> FailureReason {
        match self {
            AttemptOutcome::Success | AttemptOutcome::NetworkFailure(_) => {
                FailureReason::MirrorsExhausted
            }
            AttemptOutcome::TimeoutFailure | AttemptOutcome::ServerFailure(_) => {
                FailureReason::Timeout
            }
            AttemptOutcome::ProtocolFailure(_) => FailureReason::Unparseable,
        }
    }

    /// Whether retrying the same mirror after a pause could help.
    fn is_transient(&self) -> bool {
        matches!(
            self,
            AttemptOutcome::TimeoutFailure | AttemptOutcome::ServerFailure(_)
        )
    }
}

/// Exponential backoff, doubling from `base` and capped at `cap`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub base: Duration,
    pub cap: Duration,
}

impl Backoff {
    /// Delay before the given retry, counting from 1.
    pub fn delay(&self, retry: u32) -> Duration {
        let factor = 1u32
            .checked_shl(retry.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.base.saturating_mul(factor).min(self.cap)
    }
}

/// Limits for one logical request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries allowed after the first attempt, across all mirrors
    pub max_retries: u32,
    /// Attempts allowed on one mirror before rotating
    pub mirror_attempts: u32,
    pub backoff: Backoff,
}

impl RetryPolicy {
    pub fn from_config(config: &IndexConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            mirror_attempts: config.mirror_attempts.max(1),
            backoff: Backoff {
                base: config.backoff_base,
                cap: config.backoff_cap,
            },
        }
    }

    fn total_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&IndexConfig::default())
    }
}

/// Where a request stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    Attempting {
        /// Mirrors moved past since the request started
        mirror_offset: usize,
        attempt: u32,
    },
    Succeeded,
    Exhausted(FailureReason),
}

/// What the executor should do after recording an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryStep {
    /// Retry the same mirror after sleeping
    Backoff(Duration),
    /// Move to the next mirror and send immediately
    Rotate,
    Succeeded,
    Exhausted(FailureReason),
}

/// Retry state for one logical request over a pool of `mirror_count` mirrors.
#[derive(Debug, Clone)]
pub struct RetryMachine {
    policy: RetryPolicy,
    mirror_count: usize,
    attempts: u32,
    mirror_failures: u32,
    state: RetryState,
}

impl RetryMachine {
    pub fn new(policy: RetryPolicy, mirror_count: usize) -> Self {
        Self {
            policy,
            mirror_count: mirror_count.max(1),
            attempts: 0,
            mirror_failures: 0,
            state: RetryState::Attempting {
                mirror_offset: 0,
                attempt: 1,
            },
        }
    }

    pub fn state(&self) -> RetryState {
        self.state
    }

    /// Attempts made so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Records the outcome of the current attempt and decides the next step.
    ///
    /// Once the machine is finished it keeps answering with its final step.
    pub fn record(&mut self, outcome: &AttemptOutcome) -> RetryStep {
        let mirror_offset = match self.state {
            RetryState::Attempting { mirror_offset, .. } => mirror_offset,
            RetryState::Succeeded => return RetryStep::Succeeded,
            RetryState::Exhausted(reason) => return RetryStep::Exhausted(reason),
        };

        self.attempts += 1;
        if *outcome == AttemptOutcome::Success {
            self.state = RetryState::Succeeded;
            return RetryStep::Succeeded;
        }

        self.mirror_failures += 1;
        let budget_left = self.attempts < self.policy.total_attempts();
        if !budget_left {
            return self.exhaust(outcome);
        }

        if outcome.is_transient() && self.mirror_failures < self.policy.mirror_attempts {
            self.state = RetryState::Attempting {
                mirror_offset,
                attempt: self.attempts + 1,
            };
            return RetryStep::Backoff(self.policy.backoff.delay(self.mirror_failures));
        }

        if mirror_offset + 1 >= self.mirror_count {
            return self.exhaust(outcome);
        }

        self.mirror_failures = 0;
        self.state = RetryState::Attempting {
            mirror_offset: mirror_offset + 1,
            attempt: self.attempts + 1,
        };
        RetryStep::Rotate
    }

    fn exhaust(&mut self, last: &AttemptOutcome) -> RetryStep {
        let reason = last.failure_reason();
        self.state = RetryState::Exhausted(reason);
        RetryStep::Exhausted(reason)
    }
}
