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

//! Policies deciding if a waiter keeps polling after an error.
//!
//! A failed poll does not mean the operation failed. The service may be
//! briefly unavailable, a per-minute quota may need to refresh, or Cloud SQL
//! may report that another operation is still running on the instance. The
//! policies in this module classify those errors as transient or permanent,
//! and the decorators bound how long a waiter keeps trying.
//!
//! # Example
//! ```
//! # use tpg_gax::polling_error_policy::*;
//! use std::time::Duration;
//! // Stop after 15 minutes or 50 polls, whichever comes first.
//! let policy = CommonRetryable
//!     .with_time_limit(Duration::from_secs(15 * 60))
//!     .with_attempt_limit(50);
//! ```
//!
//! The waiters enforce the caller's timeout regardless of the policy.

use crate::error::Error;
use crate::error::rpc::Code;
use crate::loop_state::LoopState;
use std::sync::{Arc, LazyLock};
use std::time::{Duration, Instant};

/// Classifies polling errors, and may stop a polling loop that runs too long.
pub trait PollingErrorPolicy: Send + Sync + std::fmt::Debug {
    /// Decides what the loop does after a failed poll.
    ///
    /// # Parameters
    /// * `loop_start` - when the polling loop started.
    /// * `attempt_count` - the number of polls so far, including the one that
    ///   failed. Never zero.
    /// * `error` - the error returned by the failed poll.
    fn on_error(&self, loop_start: Instant, attempt_count: u32, error: Error) -> LoopState;

    /// Called after a successful poll that found the operation still running.
    ///
    /// Returning an error stops the loop, the waiter returns that error.
    fn on_in_progress(
        &self,
        _loop_start: Instant,
        _attempt_count: u32,
        _operation_name: &str,
    ) -> Option<Error> {
        None
    }
}

/// Holds a [PollingErrorPolicy] for the client and request options setters.
#[derive(Clone, Debug)]
pub struct PollingErrorPolicyArg(Arc<dyn PollingErrorPolicy>);

impl PollingErrorPolicyArg {
    pub fn policy(&self) -> &Arc<dyn PollingErrorPolicy> {
        &self.0
    }
}

impl<T: PollingErrorPolicy + 'static> From<T> for PollingErrorPolicyArg {
    fn from(value: T) -> Self {
        Self(Arc::new(value))
    }
}

impl From<Arc<dyn PollingErrorPolicy>> for PollingErrorPolicyArg {
    fn from(value: Arc<dyn PollingErrorPolicy>) -> Self {
        Self(value)
    }
}

/// Adds limits to any [PollingErrorPolicy].
pub trait PollingErrorPolicyExt: PollingErrorPolicy + Sized {
    /// Stops the loop once it has run for `maximum_duration`.
    ///
    /// Time spent sleeping between polls counts towards the limit. The loop
    /// ends with a timeout error.
    ///
    /// # Example
    /// ```
    /// # use tpg_gax::*;
    /// use polling_error_policy::*;
    /// use std::time::{Duration, Instant};
    /// let policy = CommonRetryable.with_time_limit(Duration::from_secs(10));
    /// let start = Instant::now() - Duration::from_secs(20);
    /// let state = policy.on_error(start, 1, error::Error::io("reset"));
    /// assert!(state.is_exhausted());
    /// assert!(state.into_error().is_timeout());
    /// ```
    fn with_time_limit(self, maximum_duration: Duration) -> LimitedElapsedTime<Self> {
        LimitedElapsedTime::custom(self, maximum_duration)
    }

    /// Stops the loop after `maximum_attempts` polls.
    ///
    /// The loop ends with an error satisfying
    /// [is_exhausted][Error::is_exhausted].
    ///
    /// # Example
    /// ```
    /// # use tpg_gax::*;
    /// use polling_error_policy::*;
    /// use std::time::Instant;
    /// let policy = CommonRetryable.with_attempt_limit(2);
    /// let reset = || error::Error::io("connection reset");
    /// assert!(policy.on_error(Instant::now(), 1, reset()).is_continue());
    /// assert!(policy.on_error(Instant::now(), 2, reset()).is_exhausted());
    /// ```
    fn with_attempt_limit(self, maximum_attempts: u32) -> LimitedAttemptCount<Self> {
        LimitedAttemptCount::custom(self, maximum_attempts)
    }
}

impl<T: PollingErrorPolicy> PollingErrorPolicyExt for T {}

fn continue_if(retry: bool, error: Error) -> LoopState {
    if retry {
        LoopState::Continue(error)
    } else {
        LoopState::Permanent(error)
    }
}

// The request never produced a response from the service.
fn before_response(error: &Error) -> bool {
    error.is_io() || error.is_transient_and_before_rpc()
}

/// Follows [AIP-194] to the letter.
///
/// Only `UNAVAILABLE` (or HTTP 503 without a status) and requests that never
/// reached the service are transient.
///
/// # Example
/// ```
/// # use tpg_gax::polling_error_policy::*;
/// use std::time::Instant;
/// use tpg_gax::error::{Error, rpc::Code, rpc::Status};
/// let error = Error::service(Status::default().set_code(Code::Unavailable));
/// assert!(Aip194Strict.on_error(Instant::now(), 1, error).is_continue());
/// let error = Error::service(Status::default().set_code(Code::NotFound));
/// assert!(Aip194Strict.on_error(Instant::now(), 1, error).is_permanent());
/// ```
///
/// [AIP-194]: https://google.aip.dev/194
#[derive(Clone, Debug)]
pub struct Aip194Strict;

impl PollingErrorPolicy for Aip194Strict {
    fn on_error(&self, _loop_start: Instant, _attempt_count: u32, error: Error) -> LoopState {
        let retry = before_response(&error)
            || match error.status() {
                Some(status) => status.code == Code::Unavailable,
                None => error.http_status_code() == Some(503),
            };
        continue_if(retry, error)
    }
}

/// Keeps polling after any error.
///
/// Combine with [with_time_limit][PollingErrorPolicyExt::with_time_limit] or
/// [with_attempt_limit][PollingErrorPolicyExt::with_attempt_limit], or rely
/// on the waiter's timeout.
///
/// # Example
/// ```
/// # use tpg_gax::polling_error_policy::*;
/// use std::time::Instant;
/// use tpg_gax::error::{Error, rpc::Code, rpc::Status};
/// let error = Error::service(Status::default().set_code(Code::Aborted));
/// assert!(AlwaysContinue.on_error(Instant::now(), 1, error).is_continue());
/// ```
#[derive(Clone, Debug)]
pub struct AlwaysContinue;

impl PollingErrorPolicy for AlwaysContinue {
    fn on_error(&self, _loop_start: Instant, _attempt_count: u32, error: Error) -> LoopState {
        LoopState::Continue(error)
    }
}

/// The errors the Terraform provider retries for every Google Cloud service.
///
/// This is the default policy for the waiters. It keeps polling after:
/// - requests that never got a response, including per-request timeouts and
///   transient credential errors,
/// - HTTP 429, 500, 502, and 503,
/// - HTTP 409 reporting `operationInProgress`,
/// - HTTP 400 reporting a `resourceNotReady` subnetwork,
/// - HTTP 403 reporting an exhausted *per minute* quota.
///
/// The body checks look at the raw response, the reasons are often only
/// present in `error.errors[].reason`. All other errors are permanent.
///
/// # Example
/// ```
/// # use tpg_gax::polling_error_policy::*;
/// use std::time::Instant;
/// use tpg_gax::error::Error;
/// let error = Error::http(502, http::HeaderMap::new(), bytes::Bytes::from_static(b"bad gateway"));
/// assert!(CommonRetryable.on_error(Instant::now(), 1, error).is_continue());
/// let error = Error::http(400, http::HeaderMap::new(), bytes::Bytes::from_static(b"bad request"));
/// assert!(CommonRetryable.on_error(Instant::now(), 1, error).is_permanent());
/// ```
#[derive(Clone, Debug)]
pub struct CommonRetryable;

const RETRYABLE_HTTP_CODES: [u16; 4] = [429, 500, 502, 503];

// Compute Engine reports some rate limits as 403 instead of 429.
static PER_MINUTE_QUOTA: LazyLock<Option<regex::Regex>> = LazyLock::new(|| {
    regex::Regex::new(
        r"Quota exceeded for quota metric '(?P<metric>.*)' and limit '(?P<limit>.* per minute)' of service",
    )
    .ok()
});

impl CommonRetryable {
    fn is_retryable(error: &Error) -> bool {
        if before_response(error) {
            return true;
        }
        let Some(code) = error.http_status_code() else {
            return error.status().is_some_and(|s| s.code == Code::Unavailable);
        };
        if RETRYABLE_HTTP_CODES.contains(&code) {
            return true;
        }
        let body = error.http_body_text().unwrap_or_default();
        match code {
            400 => body.contains("resourceNotReady") && body.contains("subnetworks"),
            403 => PER_MINUTE_QUOTA
                .as_ref()
                .is_some_and(|re| re.is_match(&body)),
            409 => body.contains("operationInProgress"),
            _ => false,
        }
    }
}

impl PollingErrorPolicy for CommonRetryable {
    fn on_error(&self, _loop_start: Instant, _attempt_count: u32, error: Error) -> LoopState {
        let retry = Self::is_retryable(&error);
        if retry {
            tracing::debug!("retryable polling error: {error}");
        }
        continue_if(retry, error)
    }
}

// Follows the tokio clock, which matches std time outside tests. The waiters
// take `loop_start` from the same clock.
fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}

// A limit only stops loops the inner policy would continue. The exhaustion
// details are computed after the inner policy decided.
fn limit_on_error<F>(state: LoopState, reached: F, wrap: fn(Exhausted) -> Error) -> LoopState
where
    F: FnOnce() -> Option<Exhausted>,
{
    match state {
        LoopState::Continue(e) => match reached() {
            Some(x) => LoopState::Exhausted(wrap(x.with_last_error(e))),
            None => LoopState::Continue(e),
        },
        state => state,
    }
}

/// Limits the total time in the polling loop.
///
/// Once the limit is reached, errors the inner policy would retry become
/// [Exhausted][LoopState::Exhausted], and an operation still in progress
/// stops the loop. Either way the loop ends with a timeout error.
///
/// # Parameters
/// * `P` - the inner polling policy, defaults to [CommonRetryable].
#[derive(Debug)]
pub struct LimitedElapsedTime<P = CommonRetryable>
where
    P: PollingErrorPolicy,
{
    inner: P,
    maximum_duration: Duration,
}

impl LimitedElapsedTime {
    /// Limits [CommonRetryable] to `maximum_duration`.
    ///
    /// # Example
    /// ```
    /// # use tpg_gax::polling_error_policy::*;
    /// use std::time::{Duration, Instant};
    /// let policy = LimitedElapsedTime::new(Duration::from_secs(10));
    /// let start = Instant::now() - Duration::from_secs(20);
    /// let error = policy.on_in_progress(start, 1, "operations/op-123");
    /// assert!(error.is_some_and(|e| e.is_timeout()));
    /// ```
    pub fn new(maximum_duration: Duration) -> Self {
        Self::custom(CommonRetryable, maximum_duration)
    }
}

impl<P: PollingErrorPolicy> LimitedElapsedTime<P> {
    pub fn custom(inner: P, maximum_duration: Duration) -> Self {
        Self {
            inner,
            maximum_duration,
        }
    }

    fn reached(&self, start: Instant, operation_name: Option<&str>) -> Option<Exhausted> {
        let elapsed = now().saturating_duration_since(start);
        (elapsed >= self.maximum_duration).then(|| {
            Exhausted::new(
                operation_name,
                "elapsed time",
                format!("{elapsed:?}"),
                format!("{:?}", self.maximum_duration),
            )
        })
    }
}

impl<P: PollingErrorPolicy> PollingErrorPolicy for LimitedElapsedTime<P> {
    fn on_error(&self, start: Instant, count: u32, error: Error) -> LoopState {
        let state = self.inner.on_error(start, count, error);
        limit_on_error(state, || self.reached(start, None), Error::timeout)
    }

    fn on_in_progress(&self, start: Instant, count: u32, operation_name: &str) -> Option<Error> {
        self.inner
            .on_in_progress(start, count, operation_name)
            .or_else(|| self.reached(start, Some(operation_name)).map(Error::timeout))
    }
}

/// Limits the number of polls.
///
/// Once `attempt_count` reaches the limit, errors the inner policy would
/// retry become [Exhausted][LoopState::Exhausted], and an operation still in
/// progress stops the loop. The resulting errors satisfy
/// [Error::is_exhausted].
///
/// # Example
/// ```
/// # use tpg_gax::polling_error_policy::*;
/// use std::time::Instant;
/// let policy = LimitedAttemptCount::new(5);
/// let error = policy.on_in_progress(Instant::now(), 5, "operations/op-123");
/// assert!(error.is_some_and(|e| e.is_exhausted()));
/// ```
///
/// # Parameters
/// * `P` - the inner polling policy, defaults to [CommonRetryable].
#[derive(Debug)]
pub struct LimitedAttemptCount<P = CommonRetryable>
where
    P: PollingErrorPolicy,
{
    inner: P,
    maximum_attempts: u32,
}

impl LimitedAttemptCount {
    /// Limits [CommonRetryable] to `maximum_attempts` polls.
    pub fn new(maximum_attempts: u32) -> Self {
        Self::custom(CommonRetryable, maximum_attempts)
    }
}

impl<P: PollingErrorPolicy> LimitedAttemptCount<P> {
    /// Limits a custom inner policy.
    ///
    /// # Example
    /// ```
    /// # use tpg_gax::polling_error_policy::*;
    /// use std::time::Instant;
    /// use tpg_gax::error::{Error, rpc::Code, rpc::Status};
    /// let policy = LimitedAttemptCount::custom(AlwaysContinue, 2);
    /// let aborted = || Error::service(Status::default().set_code(Code::Aborted));
    /// assert!(policy.on_error(Instant::now(), 1, aborted()).is_continue());
    /// assert!(policy.on_error(Instant::now(), 2, aborted()).is_exhausted());
    /// ```
    pub fn custom(inner: P, maximum_attempts: u32) -> Self {
        Self {
            inner,
            maximum_attempts,
        }
    }

    fn reached(&self, count: u32, operation_name: Option<&str>) -> Option<Exhausted> {
        (count >= self.maximum_attempts).then(|| {
            Exhausted::new(
                operation_name,
                "attempt count",
                count.to_string(),
                self.maximum_attempts.to_string(),
            )
        })
    }
}

impl<P: PollingErrorPolicy> PollingErrorPolicy for LimitedAttemptCount<P> {
    fn on_error(&self, start: Instant, count: u32, error: Error) -> LoopState {
        let state = self.inner.on_error(start, count, error);
        limit_on_error(state, || self.reached(count, None), Error::exhausted)
    }

    fn on_in_progress(&self, start: Instant, count: u32, operation_name: &str) -> Option<Error> {
        self.inner
            .on_in_progress(start, count, operation_name)
            .or_else(|| self.reached(count, Some(operation_name)).map(Error::exhausted))
    }
}

/// A polling limit was reached.
///
/// The [source][std::error::Error::source] is the last polling error, if the
/// limit was reached after an error.
#[derive(Debug)]
pub struct Exhausted {
    operation_name: Option<String>,
    limit_name: &'static str,
    value: String,
    limit: String,
    last_error: Option<Box<Error>>,
}

impl Exhausted {
    pub fn new(
        operation_name: Option<&str>,
        limit_name: &'static str,
        value: String,
        limit: String,
    ) -> Self {
        Self {
            operation_name: operation_name.map(str::to_string),
            limit_name,
            value,
            limit,
            last_error: None,
        }
    }

    pub fn with_last_error(mut self, error: Error) -> Self {
        self.last_error = Some(Box::new(error));
        self
    }

    /// The polling error that triggered the exhaustion, if any.
    pub fn last_error(&self) -> Option<&Error> {
        self.last_error.as_deref()
    }
}

impl std::fmt::Display for Exhausted {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "stopped polling")?;
        if let Some(name) = &self.operation_name {
            write!(f, " operation {name}")?;
        }
        write!(
            f,
            ": the {} ({}) reached its limit ({})",
            self.limit_name, self.value, self.limit
        )?;
        match &self.last_error {
            Some(e) => write!(f, ", the last error was: {e}"),
            None => Ok(()),
        }
    }
}

impl std::error::Error for Exhausted {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.last_error
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}
