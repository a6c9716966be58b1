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

//! Defines the trait for polling backoff policies and common implementations.
//!
//! The waiters sleep between consecutive polls of an operation. Most services
//! are polled at a flat interval, which is what [FixedInterval] provides. For
//! operations with very uneven durations a truncated exponential backoff,
//! **without** jitter, avoids polling too often once it is clear the operation
//! will take a while. See [ExponentialBackoff].
//!
//! # Example
//! ```
//! # use tpg_gax::polling_backoff_policy::*;
//! use std::time::{Duration, Instant};
//! let policy = FixedInterval::new(Duration::from_secs(5));
//! assert_eq!(policy.wait_period(Instant::now(), 3), Duration::from_secs(5));
//! ```
//!
//! [ExponentialBackoff]: crate::exponential_backoff::ExponentialBackoff

use std::sync::Arc;
use std::time::Duration;

/// Defines the trait implemented by all polling backoff strategies.
pub trait PollingBackoffPolicy: Send + Sync + std::fmt::Debug {
    /// Returns how long to sleep before the next poll.
    ///
    /// # Parameters
    /// * `loop_start` - when the polling loop started.
    /// * `attempt_count` - the number of poll queries so far. This method is
    ///   always called after the first attempt.
    fn wait_period(&self, loop_start: std::time::Instant, attempt_count: u32) -> Duration;
}

/// A helper type to use [PollingBackoffPolicy] in client and request options.
#[derive(Clone, Debug)]
pub struct PollingBackoffPolicyArg(Arc<dyn PollingBackoffPolicy>);

impl PollingBackoffPolicyArg {
    /// Returns the wrapped policy.
    pub fn policy(&self) -> &Arc<dyn PollingBackoffPolicy> {
        &self.0
    }
}

impl<T: PollingBackoffPolicy + 'static> std::convert::From<T> for PollingBackoffPolicyArg {
    fn from(value: T) -> Self {
        Self(Arc::new(value))
    }
}

impl std::convert::From<Arc<dyn PollingBackoffPolicy>> for PollingBackoffPolicyArg {
    fn from(value: Arc<dyn PollingBackoffPolicy>) -> Self {
        Self(value)
    }
}

/// Sleeps the same period between every poll.
#[derive(Clone, Debug, PartialEq)]
pub struct FixedInterval {
    period: Duration,
}

impl FixedInterval {
    /// The default interval between polls, matching the provider default.
    pub const DEFAULT_PERIOD: Duration = Duration::from_secs(10);

    pub fn new(period: Duration) -> Self {
        Self { period }
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}

impl Default for FixedInterval {
    fn default() -> Self {
        Self::new(Self::DEFAULT_PERIOD)
    }
}

impl PollingBackoffPolicy for FixedInterval {
    fn wait_period(&self, _loop_start: std::time::Instant, _attempt_count: u32) -> Duration {
        self.period
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exponential_backoff::ExponentialBackoffBuilder;
    use std::time::Instant;

    #[test]
    fn backoff_policy_arg() {
        let policy = ExponentialBackoffBuilder::default().clamp();
        let _ = PollingBackoffPolicyArg::from(policy);

        let policy: Arc<dyn PollingBackoffPolicy> = Arc::new(FixedInterval::default());
        let arg = PollingBackoffPolicyArg::from(policy.clone());
        assert!(Arc::ptr_eq(arg.policy(), &policy));
    }

    #[test]
    fn fixed_interval() {
        let policy = FixedInterval::new(Duration::from_millis(250));
        let start = Instant::now();
        for attempt in 1..10 {
            assert_eq!(
                policy.wait_period(start, attempt),
                Duration::from_millis(250)
            );
        }
        assert_eq!(policy.period(), Duration::from_millis(250));
    }

    #[test]
    fn fixed_interval_default() {
        let policy = FixedInterval::default();
        assert_eq!(policy.period(), Duration::from_secs(10));
        assert_eq!(policy, FixedInterval::new(FixedInterval::DEFAULT_PERIOD));
    }
}
