//! Bounded retry strategies shared by the readiness pollers.
//!
//! Both pollers run the same loop: probe, and on "not ready" wait before the
//! next probe. The loop shape is selected by [`RetryPolicy`]:
//!
//! - [`FixedInterval`] bounds the number of attempts and waits a constant
//!   interval between failures.
//! - [`ExponentialBackoff`] bounds wall-clock time and doubles the wait after
//!   every failure up to a ceiling.
//!
//! A probe reports transient failures as [`ProbeOutcome::NotReady`]; anything
//! it returns as `Err` aborts the loop at once.

use std::time::Duration;

use thiserror::Error;

use crate::clock::Clock;

/// Fixed-interval policy: at most `max_attempts` probes, `interval` apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedInterval {
    /// Upper bound on probes. Zero means no probe is made.
    pub max_attempts: u32,
    /// Wait between failed probes.
    pub interval: Duration,
}

impl FixedInterval {
    /// Builds a policy, rejecting a zero attempt budget.
    pub const fn new(max_attempts: u32, interval: Duration) -> Result<Self, PolicyError> {
        if max_attempts == 0 {
            return Err(PolicyError::ZeroAttempts);
        }
        Ok(Self {
            max_attempts,
            interval,
        })
    }

    /// Longest time spent waiting between probes when every probe fails.
    #[must_use]
    pub const fn wait_budget(&self) -> Duration {
        self.interval
            .saturating_mul(self.max_attempts.saturating_sub(1))
    }
}

/// Deadline-bounded policy with doubling waits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExponentialBackoff {
    /// Wall-clock budget measured from the first probe.
    pub deadline: Duration,
    /// Wait after the first failed probe.
    pub initial_backoff: Duration,
    /// Ceiling for any single wait.
    pub max_backoff: Duration,
}

impl ExponentialBackoff {
    /// Builds a policy, rejecting zero durations and an inverted range.
    pub fn new(
        deadline: Duration,
        initial_backoff: Duration,
        max_backoff: Duration,
    ) -> Result<Self, PolicyError> {
        if deadline.is_zero() {
            return Err(PolicyError::ZeroDeadline);
        }
        if initial_backoff.is_zero() {
            return Err(PolicyError::ZeroBackoff);
        }
        if initial_backoff > max_backoff {
            return Err(PolicyError::InvertedBackoff {
                initial: initial_backoff,
                max: max_backoff,
            });
        }
        Ok(Self {
            deadline,
            initial_backoff,
            max_backoff,
        })
    }

    /// Sequence of waits applied after consecutive failures.
    #[must_use]
    pub fn schedule(&self) -> BackoffSchedule {
        BackoffSchedule {
            next: self.initial_backoff.min(self.max_backoff),
            max: self.max_backoff,
        }
    }
}

/// Endless, non-decreasing sequence of backoff waits capped at a ceiling.
#[derive(Debug, Clone)]
pub struct BackoffSchedule {
    next: Duration,
    max: Duration,
}

impl Iterator for BackoffSchedule {
    type Item = Duration;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next;
        self.next = current.saturating_mul(2).min(self.max);
        Some(current)
    }
}

/// Shape of a retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPolicy {
    /// Attempt-bounded loop with a constant wait.
    Fixed(FixedInterval),
    /// Time-bounded loop with doubling waits.
    Backoff(ExponentialBackoff),
}

impl From<FixedInterval> for RetryPolicy {
    fn from(policy: FixedInterval) -> Self {
        Self::Fixed(policy)
    }
}

impl From<ExponentialBackoff> for RetryPolicy {
    fn from(policy: ExponentialBackoff) -> Self {
        Self::Backoff(policy)
    }
}

/// Invalid retry policy parameters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    /// A fixed-interval policy must allow at least one attempt.
    #[error("retry policy must allow at least one attempt")]
    ZeroAttempts,
    /// A backoff policy needs time to run in.
    #[error("retry deadline must be greater than zero")]
    ZeroDeadline,
    /// A zero initial backoff would never grow.
    #[error("initial backoff must be greater than zero")]
    ZeroBackoff,
    /// The first wait already exceeds the ceiling.
    #[error("initial backoff {initial:?} exceeds maximum backoff {max:?}")]
    InvertedBackoff {
        /// Configured first wait.
        initial: Duration,
        /// Configured ceiling.
        max: Duration,
    },
}

/// Context handed to each probe invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attempt {
    /// One-based attempt number.
    pub number: u32,
    /// Time left before the deadline, for deadline-bounded policies.
    pub remaining: Option<Duration>,
}

impl Attempt {
    /// Clamps `timeout` so a probe cannot run past the deadline.
    #[must_use]
    pub fn clamp(&self, timeout: Duration) -> Duration {
        self.remaining
            .map_or(timeout, |remaining| timeout.min(remaining))
    }
}

/// Result of a single probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The target is ready; the loop stops.
    Ready,
    /// A transient failure; the loop waits and tries again.
    NotReady(String),
}

/// Result of a whole retry loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryOutcome {
    /// A probe succeeded.
    Ready {
        /// Probes made, including the successful one.
        attempts: u32,
        /// Time from the first probe to success.
        elapsed: Duration,
    },
    /// The attempt budget or deadline ran out.
    Exhausted {
        /// Probes made.
        attempts: u32,
        /// Time spent in the loop.
        elapsed: Duration,
        /// Reason reported by the last failed probe.
        last_reason: Option<String>,
    },
}

impl RetryOutcome {
    /// Whether the loop ended with a successful probe.
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        matches!(self, Self::Ready { .. })
    }

    /// Number of probes made.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        match self {
            Self::Ready { attempts, .. } | Self::Exhausted { attempts, .. } => *attempts,
        }
    }

    /// Time spent in the loop.
    #[must_use]
    pub const fn elapsed(&self) -> Duration {
        match self {
            Self::Ready { elapsed, .. } | Self::Exhausted { elapsed, .. } => *elapsed,
        }
    }
}

/// Runs `probe` under `policy` until it reports ready or the policy is spent.
///
/// # Errors
///
/// `Err` values returned by the probe are propagated immediately without
/// further attempts.
pub fn retry<C, P, E>(policy: &RetryPolicy, clock: &C, probe: P) -> Result<RetryOutcome, E>
where
    C: Clock + ?Sized,
    P: FnMut(&Attempt) -> Result<ProbeOutcome, E>,
{
    match policy {
        RetryPolicy::Fixed(fixed) => retry_fixed(fixed, clock, probe),
        RetryPolicy::Backoff(backoff) => retry_backoff(backoff, clock, probe),
    }
}

fn retry_fixed<C, P, E>(policy: &FixedInterval, clock: &C, mut probe: P) -> Result<RetryOutcome, E>
where
    C: Clock + ?Sized,
    P: FnMut(&Attempt) -> Result<ProbeOutcome, E>,
{
    let started = clock.now();
    let mut last_reason = None;
    for number in 1..=policy.max_attempts {
        let attempt = Attempt {
            number,
            remaining: None,
        };
        match probe(&attempt)? {
            ProbeOutcome::Ready => {
                return Ok(RetryOutcome::Ready {
                    attempts: number,
                    elapsed: clock.now().saturating_duration_since(started),
                });
            }
            ProbeOutcome::NotReady(reason) => last_reason = Some(reason),
        }
        if number < policy.max_attempts {
            clock.sleep(policy.interval);
        }
    }
    Ok(RetryOutcome::Exhausted {
        attempts: policy.max_attempts,
        elapsed: clock.now().saturating_duration_since(started),
        last_reason,
    })
}

fn retry_backoff<C, P, E>(
    policy: &ExponentialBackoff,
    clock: &C,
    mut probe: P,
) -> Result<RetryOutcome, E>
where
    C: Clock + ?Sized,
    P: FnMut(&Attempt) -> Result<ProbeOutcome, E>,
{
    let started = clock.now();
    let remaining = || {
        policy
            .deadline
            .saturating_sub(clock.now().saturating_duration_since(started))
    };
    let mut schedule = policy.schedule();
    let mut attempts: u32 = 0;
    let mut last_reason = None;

    loop {
        let before = remaining();
        if before.is_zero() {
            break;
        }
        attempts = attempts.saturating_add(1);
        let attempt = Attempt {
            number: attempts,
            remaining: Some(before),
        };
        match probe(&attempt)? {
            ProbeOutcome::Ready => {
                return Ok(RetryOutcome::Ready {
                    attempts,
                    elapsed: clock.now().saturating_duration_since(started),
                });
            }
            ProbeOutcome::NotReady(reason) => last_reason = Some(reason),
        }
        let after = remaining();
        if after.is_zero() {
            break;
        }
        // The schedule never ends; the ceiling is only a fallback.
        let wait = schedule.next().unwrap_or(policy.max_backoff);
        // A wait that reaches the deadline leaves no time for another probe.
        if wait >= after {
            break;
        }
        clock.sleep(wait);
    }

    Ok(RetryOutcome::Exhausted {
        attempts,
        elapsed: clock.now().saturating_duration_since(started),
        last_reason,
    })
}

#[cfg(test)]
mod tests {
    #![expect(clippy::expect_used, reason = "tests use expect for clarity")]

    use std::convert::Infallible;

    use rstest::rstest;

    use super::*;
    use crate::clock::ManualClock;

    fn millis(values: &[u64]) -> Vec<Duration> {
        values.iter().copied().map(Duration::from_millis).collect()
    }

    fn backoff() -> ExponentialBackoff {
        ExponentialBackoff::new(
            Duration::from_secs(10),
            Duration::from_millis(100),
            Duration::from_secs(2),
        )
        .expect("valid policy")
    }

    #[test]
    fn schedule_doubles_and_caps() {
        let waits: Vec<Duration> = backoff().schedule().take(8).collect();
        assert_eq!(
            waits,
            millis(&[100, 200, 400, 800, 1600, 2000, 2000, 2000])
        );
    }

    #[test]
    fn schedule_is_non_decreasing() {
        let policy = ExponentialBackoff::new(
            Duration::from_secs(60),
            Duration::from_millis(300),
            Duration::from_millis(1000),
        )
        .expect("valid policy");
        let waits: Vec<Duration> = policy.schedule().take(20).collect();
        assert!(waits.windows(2).all(|pair| pair[0] <= pair[1]));
        assert!(waits.iter().all(|wait| *wait <= policy.max_backoff));
    }

    #[rstest]
    #[case(Duration::ZERO, Duration::from_millis(100), Duration::from_secs(2), PolicyError::ZeroDeadline)]
    #[case(Duration::from_secs(10), Duration::ZERO, Duration::from_secs(2), PolicyError::ZeroBackoff)]
    #[case(
        Duration::from_secs(10),
        Duration::from_secs(3),
        Duration::from_secs(2),
        PolicyError::InvertedBackoff { initial: Duration::from_secs(3), max: Duration::from_secs(2) }
    )]
    fn backoff_rejects_invalid_parameters(
        #[case] deadline: Duration,
        #[case] initial: Duration,
        #[case] max: Duration,
        #[case] expected: PolicyError,
    ) {
        assert_eq!(
            ExponentialBackoff::new(deadline, initial, max),
            Err(expected)
        );
    }

    #[test]
    fn fixed_interval_rejects_zero_attempts() {
        assert_eq!(
            FixedInterval::new(0, Duration::from_millis(100)),
            Err(PolicyError::ZeroAttempts)
        );
    }

    #[test]
    fn fixed_interval_wait_budget_excludes_trailing_sleep() {
        let policy = FixedInterval::new(20, Duration::from_millis(100)).expect("valid policy");
        assert_eq!(policy.wait_budget(), Duration::from_millis(1900));
    }

    #[test]
    fn fixed_exhaustion_makes_exactly_max_attempts() {
        let clock = ManualClock::new();
        let policy = RetryPolicy::Fixed(FixedInterval {
            max_attempts: 4,
            interval: Duration::from_millis(100),
        });
        let mut calls = 0;
        let outcome = retry(&policy, &clock, |_| {
            calls += 1;
            Ok::<_, Infallible>(ProbeOutcome::NotReady(String::from("refused")))
        })
        .expect("infallible");

        assert_eq!(calls, 4);
        assert_eq!(
            outcome,
            RetryOutcome::Exhausted {
                attempts: 4,
                elapsed: Duration::from_millis(300),
                last_reason: Some(String::from("refused")),
            }
        );
        assert_eq!(clock.sleeps(), millis(&[100, 100, 100]));
    }

    #[test]
    fn fixed_with_zero_attempts_never_probes() {
        let clock = ManualClock::new();
        let policy = RetryPolicy::Fixed(FixedInterval {
            max_attempts: 0,
            interval: Duration::from_millis(100),
        });
        let mut calls = 0;
        let outcome = retry(&policy, &clock, |_| {
            calls += 1;
            Ok::<_, Infallible>(ProbeOutcome::Ready)
        })
        .expect("infallible");

        assert_eq!(calls, 0);
        assert!(!outcome.is_ready());
        assert_eq!(outcome.attempts(), 0);
        assert!(clock.sleeps().is_empty());
    }

    #[test]
    fn fixed_stops_on_first_success() {
        let clock = ManualClock::new();
        let policy = RetryPolicy::Fixed(FixedInterval {
            max_attempts: 10,
            interval: Duration::from_millis(50),
        });
        let mut calls = 0;
        let outcome = retry(&policy, &clock, |attempt| {
            calls += 1;
            if attempt.number == 3 {
                Ok::<_, Infallible>(ProbeOutcome::Ready)
            } else {
                Ok(ProbeOutcome::NotReady(String::from("refused")))
            }
        })
        .expect("infallible");

        assert_eq!(calls, 3);
        assert_eq!(
            outcome,
            RetryOutcome::Ready {
                attempts: 3,
                elapsed: Duration::from_millis(100),
            }
        );
    }

    #[test]
    fn probe_errors_abort_the_loop() {
        let clock = ManualClock::new();
        let policy = RetryPolicy::Fixed(FixedInterval {
            max_attempts: 5,
            interval: Duration::from_millis(50),
        });
        let mut calls = 0;
        let result = retry(&policy, &clock, |_| {
            calls += 1;
            Err::<ProbeOutcome, _>("permission denied")
        });

        assert_eq!(result, Err("permission denied"));
        assert_eq!(calls, 1);
        assert!(clock.sleeps().is_empty());
    }

    #[test]
    fn backoff_never_sleeps_past_the_deadline() {
        let clock = ManualClock::new();
        let outcome = retry(&RetryPolicy::Backoff(backoff()), &clock, |_| {
            Ok::<_, Infallible>(ProbeOutcome::NotReady(String::from("status 404")))
        })
        .expect("infallible");

        assert_eq!(
            clock.sleeps(),
            millis(&[100, 200, 400, 800, 1600, 2000, 2000, 2000])
        );
        assert_eq!(outcome.attempts(), 9);
        assert_eq!(outcome.elapsed(), Duration::from_millis(9100));
        assert!(!outcome.is_ready());
    }

    #[rstest]
    #[case(Duration::from_millis(250))]
    #[case(Duration::from_millis(1000))]
    #[case(Duration::from_secs(10))]
    fn backoff_never_ends_on_a_sleep(#[case] deadline: Duration) {
        let clock = ManualClock::new();
        let policy = ExponentialBackoff::new(
            deadline,
            Duration::from_millis(100),
            Duration::from_secs(2),
        )
        .expect("policy");
        let mut probed_at = Vec::new();
        let outcome = retry(&RetryPolicy::Backoff(policy), &clock, |_| {
            probed_at.push(clock.elapsed());
            Ok::<_, Infallible>(ProbeOutcome::NotReady(String::from("status 503")))
        })
        .expect("infallible");

        // Every sleep is followed by a probe, so the run ends on the last probe.
        assert_eq!(probed_at.last().copied(), Some(clock.elapsed()));
        assert_eq!(clock.sleeps().len() + 1, probed_at.len());
        assert!(clock.elapsed() < deadline);
        assert_eq!(outcome.elapsed(), clock.elapsed());
    }

    #[rstest]
    #[case(Duration::ZERO)]
    #[case(Duration::from_millis(250))]
    #[case(Duration::from_millis(1500))]
    fn backoff_with_probe_latency_stays_within_deadline(#[case] latency: Duration) {
        let clock = ManualClock::new();
        let policy = backoff();
        let outcome = retry(&RetryPolicy::Backoff(policy), &clock, |attempt| {
            // A well-behaved probe never runs longer than the time it was given.
            clock.advance(attempt.clamp(latency));
            Ok::<_, Infallible>(ProbeOutcome::NotReady(String::from("connection refused")))
        })
        .expect("infallible");

        assert!(!outcome.is_ready());
        assert!(
            clock.elapsed() <= policy.deadline,
            "elapsed {:?} exceeded the deadline",
            clock.elapsed()
        );
    }

    #[rstest]
    #[case(1)]
    #[case(4)]
    #[case(8)]
    fn backoff_stops_immediately_on_success(#[case] succeed_on: u32) {
        let clock = ManualClock::new();
        let mut calls = 0;
        let outcome = retry(&RetryPolicy::Backoff(backoff()), &clock, |attempt| {
            calls += 1;
            if attempt.number == succeed_on {
                Ok::<_, Infallible>(ProbeOutcome::Ready)
            } else {
                Ok(ProbeOutcome::NotReady(String::from("status 404")))
            }
        })
        .expect("infallible");

        assert!(outcome.is_ready());
        assert_eq!(calls, succeed_on);
        assert_eq!(clock.sleeps().len(), usize::try_from(succeed_on - 1).expect("fits"));
    }

    #[test]
    fn attempts_carry_remaining_time() {
        let clock = ManualClock::new();
        let mut seen = Vec::new();
        let _ = retry(&RetryPolicy::Backoff(backoff()), &clock, |attempt| {
            seen.push(attempt.remaining);
            Ok::<_, Infallible>(ProbeOutcome::NotReady(String::new()))
        });

        assert_eq!(seen.first(), Some(&Some(Duration::from_secs(10))));
        assert_eq!(seen.get(1), Some(&Some(Duration::from_millis(9900))));
        assert_eq!(seen.last(), Some(&Some(Duration::from_millis(900))));
    }

    #[test]
    fn attempt_clamp_limits_to_remaining() {
        let attempt = Attempt {
            number: 1,
            remaining: Some(Duration::from_millis(300)),
        };
        assert_eq!(attempt.clamp(Duration::from_secs(1)), Duration::from_millis(300));
        let unbounded = Attempt {
            number: 1,
            remaining: None,
        };
        assert_eq!(unbounded.clamp(Duration::from_secs(1)), Duration::from_secs(1));
    }
}
