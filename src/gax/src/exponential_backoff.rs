// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Growing delays between polls.
//!
//! Most operations complete within a few polls at the provider's usual
//! interval. Some, such as creating a cluster, run for tens of minutes. For
//! those, polling slower as the wait goes on saves requests and quota.
//!
//! The delay starts at the initial delay, grows by the scaling factor after
//! each poll, and never exceeds the maximum delay. There is no jitter, each
//! waiter polls a single operation.
//!
//! # Example
//! ```
//! # use tpg_gax::exponential_backoff::{InvalidBackoff, ExponentialBackoffBuilder};
//! use std::time::Duration;
//! let policy = ExponentialBackoffBuilder::new()
//!     .with_initial_delay(Duration::from_secs(2))
//!     .with_maximum_delay(Duration::from_secs(60))
//!     .with_scaling(1.5)
//!     .build()?;
//! // Use `policy` with `with_polling_backoff_policy()`.
//! # Ok::<(), InvalidBackoff>(())
//! ```

use crate::polling_backoff_policy::PollingBackoffPolicy;
use std::ops::RangeInclusive;
use std::time::Duration;

// The ranges enforced by `clamp()`.
const MAXIMUM_DELAY_RANGE: RangeInclusive<Duration> =
    Duration::from_secs(1)..=Duration::from_secs(60 * 60);
const SHORTEST_INITIAL_DELAY: Duration = Duration::from_millis(1);
const SCALING_RANGE: RangeInclusive<f64> = 1.0..=32.0;

/// The parameters given to [ExponentialBackoffBuilder::build] are invalid.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum InvalidBackoff {
    #[error("the delays cannot shrink, got a scaling factor of {0}")]
    Scaling(f64),
    #[error("the initial delay must not be zero")]
    InitialDelay,
    #[error("the initial delay ({initial:?}) exceeds the maximum delay ({maximum:?})")]
    Range { initial: Duration, maximum: Duration },
}

/// Configures an [ExponentialBackoff].
///
/// The defaults start at the provider's usual 10 second poll interval and
/// reach two minutes after seven polls.
#[derive(Clone, Debug)]
pub struct ExponentialBackoffBuilder {
    initial_delay: Duration,
    maximum_delay: Duration,
    scaling: f64,
}

impl ExponentialBackoffBuilder {
    pub fn new() -> Self {
        Self {
            initial_delay: Duration::from_secs(10),
            maximum_delay: Duration::from_secs(120),
            scaling: 1.5,
        }
    }

    /// The delay after the first poll.
    pub fn with_initial_delay<V: Into<Duration>>(mut self, v: V) -> Self {
        self.initial_delay = v.into();
        self
    }

    /// The longest delay between polls.
    pub fn with_maximum_delay<V: Into<Duration>>(mut self, v: V) -> Self {
        self.maximum_delay = v.into();
        self
    }

    /// The growth of the delay after each poll.
    pub fn with_scaling<V: Into<f64>>(mut self, v: V) -> Self {
        self.scaling = v.into();
        self
    }

    /// Returns the policy, or an error if the parameters make no sense.
    ///
    /// # Example
    /// ```
    /// # use tpg_gax::exponential_backoff::{InvalidBackoff, ExponentialBackoffBuilder};
    /// # use tpg_gax::polling_backoff_policy::PollingBackoffPolicy;
    /// use std::time::{Duration, Instant};
    /// let backoff = ExponentialBackoffBuilder::new()
    ///     .with_initial_delay(Duration::from_secs(5))
    ///     .with_maximum_delay(Duration::from_secs(50))
    ///     .with_scaling(2.0)
    ///     .build()?;
    /// assert_eq!(backoff.wait_period(Instant::now(), 2), Duration::from_secs(10));
    ///
    /// let err = ExponentialBackoffBuilder::new().with_scaling(0.5).build();
    /// assert!(matches!(err, Err(InvalidBackoff::Scaling(_))));
    /// # Ok::<(), InvalidBackoff>(())
    /// ```
    pub fn build(self) -> Result<ExponentialBackoff, InvalidBackoff> {
        if self.scaling.is_nan() || self.scaling < 1.0 {
            return Err(InvalidBackoff::Scaling(self.scaling));
        }
        if self.initial_delay.is_zero() {
            return Err(InvalidBackoff::InitialDelay);
        }
        if self.initial_delay > self.maximum_delay {
            return Err(InvalidBackoff::Range {
                initial: self.initial_delay,
                maximum: self.maximum_delay,
            });
        }
        Ok(self.into_policy())
    }

    /// Returns a policy, moving invalid or extreme parameters into range.
    ///
    /// The maximum delay is kept between one second and one hour, the
    /// initial delay between one millisecond and the maximum delay. The
    /// scaling factor is kept between 1.0 and 32.0, NaN becomes 1.0.
    pub fn clamp(mut self) -> ExponentialBackoff {
        let (min, max) = MAXIMUM_DELAY_RANGE.into_inner();
        self.maximum_delay = self.maximum_delay.clamp(min, max);
        self.initial_delay = self
            .initial_delay
            .clamp(SHORTEST_INITIAL_DELAY, self.maximum_delay);
        let (low, high) = SCALING_RANGE.into_inner();
        self.scaling = match self.scaling {
            s if s.is_nan() => low,
            s => s.clamp(low, high),
        };
        self.into_policy()
    }

    fn into_policy(self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_delay: self.initial_delay,
            maximum_delay: self.maximum_delay,
            scaling: self.scaling,
        }
    }
}

impl Default for ExponentialBackoffBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Delays that grow exponentially up to a maximum.
///
/// Create instances with [ExponentialBackoffBuilder].
#[derive(Clone, Debug)]
pub struct ExponentialBackoff {
    initial_delay: Duration,
    maximum_delay: Duration,
    scaling: f64,
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        ExponentialBackoffBuilder::new().clamp()
    }
}

impl PollingBackoffPolicy for ExponentialBackoff {
    fn wait_period(&self, _loop_start: std::time::Instant, attempt_count: u32) -> Duration {
        let polls = i32::try_from(attempt_count.saturating_sub(1)).unwrap_or(i32::MAX);
        let seconds = self.initial_delay.as_secs_f64() * self.scaling.powi(polls);
        // Infinite or out of range values saturate at the maximum.
        Duration::try_from_secs_f64(seconds)
            .map_or(self.maximum_delay, |d| d.min(self.maximum_delay))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;
    use test_case::test_case;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    fn delays(policy: &ExponentialBackoff, count: u32) -> Vec<Duration> {
        let start = Instant::now();
        (1..=count).map(|n| policy.wait_period(start, n)).collect()
    }

    #[test]
    fn provider_defaults() {
        let policy = ExponentialBackoff::default();
        let want = [
            secs(10),
            secs(15),
            Duration::from_millis(22_500),
            Duration::from_millis(33_750),
            Duration::from_micros(50_625_000),
            Duration::from_micros(75_937_500),
            Duration::from_micros(113_906_250),
            secs(120),
        ];
        assert_eq!(delays(&policy, 8), want);
        assert_eq!(policy.wait_period(Instant::now(), u32::MAX), secs(120));
    }

    #[test]
    fn doubling_until_the_maximum() -> anyhow::Result<()> {
        let policy = ExponentialBackoffBuilder::new()
            .with_initial_delay(secs(1))
            .with_maximum_delay(secs(4))
            .with_scaling(2.0)
            .build()?;
        assert_eq!(
            delays(&policy, 5),
            [secs(1), secs(2), secs(4), secs(4), secs(4)]
        );
        Ok(())
    }

    #[test]
    fn unit_scaling_is_a_fixed_interval() -> anyhow::Result<()> {
        let policy = ExponentialBackoffBuilder::new()
            .with_initial_delay(secs(3))
            .with_scaling(1.0)
            .build()?;
        assert!(delays(&policy, 50).iter().all(|d| *d == secs(3)));
        Ok(())
    }

    #[test]
    fn huge_delays_saturate() -> anyhow::Result<()> {
        let policy = ExponentialBackoffBuilder::new()
            .with_initial_delay(Duration::from_nanos(1))
            .with_maximum_delay(Duration::MAX)
            .with_scaling(1000.0)
            .build()?;
        assert_eq!(policy.wait_period(Instant::now(), 1_000), Duration::MAX);
        Ok(())
    }

    #[test_case(ExponentialBackoffBuilder::new().with_scaling(0.9); "shrinking")]
    #[test_case(ExponentialBackoffBuilder::new().with_scaling(f64::NAN); "nan scaling")]
    #[test_case(ExponentialBackoffBuilder::new().with_initial_delay(Duration::ZERO); "zero initial delay")]
    #[test_case(ExponentialBackoffBuilder::new().with_initial_delay(secs(300)); "initial over default maximum")]
    fn build_rejects(builder: ExponentialBackoffBuilder) {
        let got = builder.build();
        assert!(got.is_err(), "{got:?}");
    }

    #[test]
    fn build_error_messages() {
        let err = ExponentialBackoffBuilder::new()
            .with_initial_delay(secs(300))
            .build()
            .unwrap_err();
        assert!(matches!(err, InvalidBackoff::Range { .. }), "{err:?}");
        assert!(err.to_string().contains("300s"), "{err}");
    }

    #[test_case(Duration::ZERO, Duration::ZERO, 8.0, Duration::from_millis(1), secs(1), 8.0; "all too small")]
    #[test_case(secs(30), secs(10), 0.1, secs(10), secs(10), 1.0; "initial over maximum")]
    #[test_case(secs(1), Duration::MAX, 1e9, secs(1), secs(3600), 32.0; "all too large")]
    #[test_case(secs(5), secs(60), f64::NAN, secs(5), secs(60), 1.0; "nan scaling")]
    fn clamp(
        initial: Duration,
        maximum: Duration,
        scaling: f64,
        want_initial: Duration,
        want_maximum: Duration,
        want_scaling: f64,
    ) {
        let policy = ExponentialBackoffBuilder::new()
            .with_initial_delay(initial)
            .with_maximum_delay(maximum)
            .with_scaling(scaling)
            .clamp();
        assert_eq!(policy.initial_delay, want_initial, "{policy:?}");
        assert_eq!(policy.maximum_delay, want_maximum, "{policy:?}");
        assert_eq!(policy.scaling, want_scaling, "{policy:?}");
    }
}
