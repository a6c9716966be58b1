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

use crate::family::OperationFamily;
use crate::options::WaitOptions;
use crate::{Error, Operation, PollingResult, Result};
use gax::loop_state::LoopState;
use gax::polling_backoff_policy::{FixedInterval, PollingBackoffPolicy};
use gax::polling_error_policy::{CommonRetryable, PollingErrorPolicy};
use gaxi::http::Transport;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Polls a single operation until it completes.
///
/// A waiter is created for one operation handle, and it is consumed by the
/// wait. Polls are strictly sequential, the waiter never sends a request
/// before the previous one completes.
///
/// Most applications should use [wait_for_operation][crate::wait_for_operation]
/// instead of using this type directly.
///
/// # Parameters
/// * `T` - the transport used to query the operation status.
/// * `F` - the service family of the operation.
#[derive(Debug)]
pub struct Waiter<'a, T, F>
where
    T: Transport,
    F: OperationFamily + ?Sized,
{
    transport: &'a T,
    family: &'a F,
    options: WaitOptions,
    name: String,
    url: String,
    start: Option<Operation>,
    done: bool,
    error_policy: Arc<dyn PollingErrorPolicy>,
    backoff_policy: Arc<dyn PollingBackoffPolicy>,
    loop_start: Instant,
    attempt_count: u32,
}

impl<'a, T, F> Waiter<'a, T, F>
where
    T: Transport,
    F: OperationFamily + ?Sized,
{
    /// Creates a waiter for the operation in `handle`.
    ///
    /// Returns `Ok(None)` if the handle has no name: the call that returned
    /// it completed synchronously and there is nothing to wait for.
    ///
    /// Fails if the handle is not an operation, or if the family cannot build
    /// a status URL for it. No requests are sent in either case.
    pub fn new(
        transport: &'a T,
        family: &'a F,
        handle: serde_json::Value,
        options: WaitOptions,
    ) -> Result<Option<Self>> {
        let operation = Operation::from_handle(handle)?;
        let Some(name) = operation.name().map(str::to_string) else {
            return Ok(None);
        };
        let url = family.status_url(&operation, options.project())?;
        let error_policy = options
            .request_options
            .polling_error_policy()
            .clone()
            .or_else(|| transport.polling_error_policy())
            .unwrap_or_else(|| Arc::new(CommonRetryable));
        let backoff_policy = Self::backoff_policy(transport, &options);
        Ok(Some(Self {
            transport,
            family,
            options,
            name,
            url,
            start: Some(operation),
            done: false,
            error_policy,
            backoff_policy,
            // Same clock as the deadline and the elapsed time policies.
            loop_start: tokio::time::Instant::now().into_std(),
            attempt_count: 0,
        }))
    }

    fn backoff_policy(transport: &T, options: &WaitOptions) -> Arc<dyn PollingBackoffPolicy> {
        if let Some(p) = options.request_options.polling_backoff_policy() {
            return p.clone();
        }
        if let Some(period) = options.poll_interval() {
            return Arc::new(FixedInterval::new(period));
        }
        transport
            .polling_backoff_policy()
            .unwrap_or_else(|| Arc::new(FixedInterval::default()))
    }

    /// The name of the operation.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The URL used to query the operation status.
    pub fn status_url(&self) -> &str {
        &self.url
    }

    /// Performs one step of the wait.
    ///
    /// The first step evaluates the initial handle, which may already be
    /// complete. In that case no request is sent. Otherwise each step sends
    /// exactly one request.
    ///
    /// Returns `None` once the operation completed, or polling stopped due to
    /// an error. Does not sleep between polls, see
    /// [until_done][Self::until_done].
    pub async fn poll(&mut self) -> Option<PollingResult> {
        if self.done {
            return None;
        }
        if let Some(start) = self.start.take() {
            if self.family.is_done(&start) {
                return Some(self.handle_done(start));
            }
        }
        self.attempt_count += 1;
        tracing::debug!(
            operation = %self.name,
            activity = %self.options.activity,
            attempt = self.attempt_count,
            "polling operation"
        );
        let result = self
            .transport
            .get(&self.url, &self.options.request_options)
            .await
            .and_then(Operation::from_handle);
        let poll = self.handle_poll(result);
        Some(poll)
    }

    /// Polls the operation until it completes, fails, or the wait times out.
    ///
    /// Sleeps between polls as determined by the polling backoff policy. The
    /// timeout in the wait options bounds the complete wait, including the
    /// time spent in requests and sleeping. The waiter never sleeps past the
    /// deadline, nor starts a poll at it.
    pub async fn until_done(mut self) -> Result<Operation> {
        let deadline = tokio::time::Instant::now() + self.options.timeout();
        let result = tokio::time::timeout_at(deadline, self.poll_loop(deadline)).await;
        match result {
            Ok(result) => result,
            Err(_) => Err(self.timeout_error()),
        }
    }

    async fn poll_loop(&mut self, deadline: tokio::time::Instant) -> Result<Operation> {
        while let Some(p) = self.poll().await {
            match p {
                // Return, the operation completed or the polling policy stopped
                // the loop.
                PollingResult::Completed(r) => return r,
                // Continue, the operation is still running.
                PollingResult::InProgress(_) => (),
                // Continue, the polling policy decided the error is
                // recoverable.
                PollingResult::PollingError(_) => (),
            }
            let period = self
                .backoff_policy
                .wait_period(self.loop_start, self.attempt_count);
            match tokio::time::Instant::now().checked_add(period) {
                Some(next) if next < deadline => tokio::time::sleep_until(next).await,
                _ => {
                    tokio::time::sleep_until(deadline).await;
                    return Err(self.timeout_error());
                }
            }
        }
        Err(Error::exhausted(format!(
            "the wait for operation {} already completed",
            self.name
        )))
    }

    fn timeout_error(&self) -> Error {
        Error::timeout(WaitTimeout {
            activity: self.options.activity.clone(),
            operation: self.name.clone(),
            timeout: self.options.timeout(),
        })
    }

    fn handle_poll(&mut self, result: Result<Operation>) -> PollingResult {
        match result {
            Err(e) => {
                let state = self
                    .error_policy
                    .on_error(self.loop_start, self.attempt_count, e);
                self.handle_polling_error(state)
            }
            Ok(op) if self.family.is_done(&op) => self.handle_done(op),
            Ok(op) => match self.error_policy.on_in_progress(
                self.loop_start,
                self.attempt_count,
                &self.name,
            ) {
                None => PollingResult::InProgress(op),
                Some(e) => self.complete(Err(e)),
            },
        }
    }

    fn handle_polling_error(&mut self, state: LoopState) -> PollingResult {
        match state {
            LoopState::Continue(e) => {
                tracing::warn!(
                    operation = %self.name,
                    activity = %self.options.activity,
                    attempt = self.attempt_count,
                    "retryable error polling operation: {e}"
                );
                PollingResult::PollingError(e)
            }
            LoopState::Exhausted(e) | LoopState::Permanent(e) => self.complete(Err(e)),
        }
    }

    fn handle_done(&mut self, op: Operation) -> PollingResult {
        match self.family.error(&op) {
            Some(e) => self.complete(Err(Error::operation(e))),
            None => {
                tracing::info!(
                    operation = %self.name,
                    activity = %self.options.activity,
                    "operation completed"
                );
                self.complete(Ok(op))
            }
        }
    }

    fn complete(&mut self, result: Result<Operation>) -> PollingResult {
        self.done = true;
        PollingResult::Completed(result)
    }
}

/// The wall-clock budget for a wait elapsed before the operation completed.
#[derive(Debug)]
struct WaitTimeout {
    activity: String,
    operation: String,
    timeout: Duration,
}

impl std::fmt::Display for WaitTimeout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "while waiting {:?} for {} on operation {}, the operation may still be running",
            self.timeout, self.activity, self.operation
        )
    }
}

impl std::error::Error for WaitTimeout {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::family::{Aip151, Compute, Endpoint};
    use gax::error::rpc::{Code, Status};
    use gax::options::{RequestOptions, RequestOptionsBuilder};
    use gax::polling_error_policy::{Aip194Strict, PollingErrorPolicyExt};
    use serde_json::{Value, json};
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::time::Instant as TokioInstant;

    const NAME: &str = "projects/p/locations/us-central1/operations/op-123";
    const URL: &str =
        "https://example.googleapis.com/v1/projects/p/locations/us-central1/operations/op-123";

    /// Returns a scripted sequence of responses, and records the requests.
    #[derive(Debug, Default)]
    struct Scripted {
        responses: Mutex<VecDeque<Result<Value>>>,
        requests: Mutex<Vec<(String, TokioInstant)>>,
        in_flight: AtomicBool,
        error_policy: Option<Arc<dyn PollingErrorPolicy>>,
        backoff_policy: Option<Arc<dyn PollingBackoffPolicy>>,
    }

    impl Scripted {
        fn new<I: IntoIterator<Item = Result<Value>>>(responses: I) -> Self {
            Self {
                responses: Mutex::new(responses.into_iter().collect()),
                ..Default::default()
            }
        }

        fn requests(&self) -> Vec<(String, TokioInstant)> {
            self.requests.lock().unwrap().clone()
        }
    }

    impl Transport for Scripted {
        async fn get(&self, url: &str, _options: &RequestOptions) -> Result<Value> {
            assert!(
                !self.in_flight.swap(true, Ordering::SeqCst),
                "concurrent requests to {url}"
            );
            self.requests
                .lock()
                .unwrap()
                .push((url.to_string(), TokioInstant::now()));
            tokio::task::yield_now().await;
            self.in_flight.store(false, Ordering::SeqCst);
            let next = self.responses.lock().unwrap().pop_front();
            next.unwrap_or_else(|| Ok(json!({"name": NAME, "done": false})))
        }

        fn polling_error_policy(&self) -> Option<Arc<dyn PollingErrorPolicy>> {
            self.error_policy.clone()
        }

        fn polling_backoff_policy(&self) -> Option<Arc<dyn PollingBackoffPolicy>> {
            self.backoff_policy.clone()
        }
    }

    fn family() -> Aip151 {
        Aip151::new(Endpoint::global("https://example.googleapis.com/v1/"))
    }

    fn handle() -> Value {
        json!({"name": NAME})
    }

    fn options() -> WaitOptions {
        WaitOptions::new()
            .with_poll_interval(Duration::from_secs(1))
            .with_timeout(Duration::from_secs(10))
    }

    fn unavailable() -> Error {
        Error::service_with_http_metadata(
            Status::default()
                .set_code(Code::Unavailable)
                .set_message("try again"),
            Some(503),
            None,
        )
    }

    #[test]
    fn synchronous_handle() -> anyhow::Result<()> {
        let transport = Scripted::default();
        let family = family();
        let waiter = Waiter::new(&transport, &family, json!({"name": ""}), options())?;
        assert!(waiter.is_none(), "{waiter:?}");
        let waiter = Waiter::new(&transport, &family, json!({"done": false}), options())?;
        assert!(waiter.is_none(), "{waiter:?}");
        assert!(transport.requests().is_empty());
        Ok(())
    }

    #[test]
    fn malformed_handle() {
        let transport = Scripted::default();
        let family = family();
        let err = Waiter::new(&transport, &family, json!("op-123"), options()).unwrap_err();
        assert!(err.is_malformed_operation(), "{err:?}");
        assert!(transport.requests().is_empty());
    }

    #[test]
    fn url_failure() {
        let transport = Scripted::default();
        let family = Compute::new();
        let err = Waiter::new(&transport, &family, json!({"name": "operation-123"}), options())
            .unwrap_err();
        assert!(err.is_malformed_operation(), "{err:?}");
        assert!(transport.requests().is_empty());
    }

    #[test]
    fn accessors() -> anyhow::Result<()> {
        let transport = Scripted::default();
        let family = family();
        let waiter = Waiter::new(&transport, &family, handle(), options())?.unwrap();
        assert_eq!(waiter.name(), NAME);
        assert_eq!(waiter.status_url(), URL);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn poll_steps() -> anyhow::Result<()> {
        let transport = Scripted::new([
            Ok(json!({"name": NAME, "done": false})),
            Err(unavailable()),
            Ok(json!({"name": NAME, "done": true, "response": {"id": "abc"}})),
        ]);
        let family = family();
        let mut waiter = Waiter::new(&transport, &family, handle(), options())?.unwrap();

        let p = waiter.poll().await;
        assert!(matches!(p, Some(PollingResult::InProgress(_))), "{p:?}");
        let p = waiter.poll().await;
        assert!(
            matches!(&p, Some(PollingResult::PollingError(e)) if e.http_status_code() == Some(503)),
            "{p:?}"
        );
        let p = waiter.poll().await;
        match p {
            Some(PollingResult::Completed(Ok(op))) => {
                assert_eq!(op.response, Some(json!({"id": "abc"})));
            }
            p => panic!("unexpected polling result {p:?}"),
        }
        let p = waiter.poll().await;
        assert!(p.is_none(), "{p:?}");

        let requests = transport.requests();
        assert_eq!(requests.len(), 3);
        assert!(requests.iter().all(|(url, _)| url == URL), "{requests:?}");
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn done_handle_sends_no_requests() -> anyhow::Result<()> {
        let transport = Scripted::default();
        let family = family();
        let handle = json!({"name": NAME, "done": true, "response": {"id": "abc"}});
        let waiter = Waiter::new(&transport, &family, handle, options())?.unwrap();
        let op = waiter.until_done().await?;
        assert_eq!(op.response, Some(json!({"id": "abc"})));
        assert!(transport.requests().is_empty());
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn done_handle_with_error() -> anyhow::Result<()> {
        let transport = Scripted::default();
        let family = family();
        let handle = json!({"name": NAME, "done": true, "error": {"code": 13, "details": [{"reason": "R"}]}});
        let mut waiter = Waiter::new(&transport, &family, handle, options())?.unwrap();
        let p = waiter.poll().await;
        match p {
            Some(PollingResult::Completed(Err(e))) => {
                assert!(e.is_operation(), "{e:?}");
                assert_eq!(e.to_string(), json!({"reason": "R"}).to_string());
            }
            p => panic!("unexpected polling result {p:?}"),
        }
        assert!(transport.requests().is_empty());
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn sequential_polls_with_fixed_interval() -> anyhow::Result<()> {
        let transport = Scripted::new([
            Ok(json!({"name": NAME, "done": false})),
            Ok(json!({"name": NAME, "done": false})),
            Ok(json!({"name": NAME, "done": true, "response": {"id": "abc"}})),
        ]);
        let family = family();
        let start = TokioInstant::now();
        let waiter = Waiter::new(&transport, &family, handle(), options())?.unwrap();
        let op = waiter.until_done().await?;
        assert_eq!(op.response, Some(json!({"id": "abc"})));
        assert_eq!(start.elapsed(), Duration::from_secs(2));

        let requests = transport.requests();
        assert_eq!(requests.len(), 3, "{requests:?}");
        assert_eq!(requests[0].1, start);
        for w in requests.windows(2) {
            assert_eq!(w[1].1 - w[0].1, Duration::from_secs(1), "{requests:?}");
        }
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn timeout() -> anyhow::Result<()> {
        let transport = Scripted::default();
        let family = family();
        let start = TokioInstant::now();
        let waiter = Waiter::new(
            &transport,
            &family,
            handle(),
            options().with_activity("Creating Stream"),
        )?
        .unwrap();
        let err = waiter.until_done().await.unwrap_err();
        assert!(err.is_timeout(), "{err:?}");
        let fmt = err.to_string();
        assert!(fmt.contains("Creating Stream"), "{fmt}");
        assert!(fmt.contains(NAME), "{fmt}");
        assert_eq!(start.elapsed(), Duration::from_secs(10));
        // One poll at the start and after each second, none at the deadline.
        assert_eq!(transport.requests().len(), 10);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_interrupts_long_sleep() -> anyhow::Result<()> {
        let transport = Scripted::default();
        let family = family();
        let start = TokioInstant::now();
        let options = options()
            .with_poll_interval(Duration::from_secs(60))
            .with_timeout(Duration::from_secs(5));
        let waiter = Waiter::new(&transport, &family, handle(), options)?.unwrap();
        let err = waiter.until_done().await.unwrap_err();
        assert!(err.is_timeout(), "{err:?}");
        assert_eq!(start.elapsed(), Duration::from_secs(5));
        assert_eq!(transport.requests().len(), 1);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn retryable_errors_continue() -> anyhow::Result<()> {
        let transport = Scripted::new([
            Err(unavailable()),
            Err(Error::io("connection reset")),
            Ok(json!({"name": NAME, "done": true})),
        ]);
        let family = family();
        let waiter = Waiter::new(&transport, &family, handle(), options())?.unwrap();
        let op = waiter.until_done().await?;
        assert!(op.done, "{op:?}");
        assert_eq!(transport.requests().len(), 3);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_error_stops() -> anyhow::Result<()> {
        let not_found = Error::service_with_http_metadata(
            Status::default().set_code(Code::NotFound),
            Some(404),
            None,
        );
        let transport = Scripted::new([Err(not_found)]);
        let family = family();
        let waiter = Waiter::new(&transport, &family, handle(), options())?.unwrap();
        let err = waiter.until_done().await.unwrap_err();
        assert_eq!(err.http_status_code(), Some(404), "{err:?}");
        assert_eq!(transport.requests().len(), 1);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_response_stops() -> anyhow::Result<()> {
        let transport = Scripted::new([Ok(json!(["not", "an", "operation"]))]);
        let family = family();
        let waiter = Waiter::new(&transport, &family, handle(), options())?.unwrap();
        let err = waiter.until_done().await.unwrap_err();
        assert!(err.is_malformed_operation(), "{err:?}");
        assert_eq!(transport.requests().len(), 1);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn request_options_policies_win() -> anyhow::Result<()> {
        let transport = Scripted {
            error_policy: Some(Arc::new(CommonRetryable)),
            backoff_policy: Some(Arc::new(FixedInterval::new(Duration::from_secs(7)))),
            ..Scripted::new([Err(unavailable()), Ok(json!({"name": NAME, "done": true}))])
        };
        let family = family();
        let options = options()
            .with_polling_error_policy(Aip194Strict.with_attempt_limit(1))
            .with_polling_backoff_policy(FixedInterval::new(Duration::from_secs(3)));
        let waiter = Waiter::new(&transport, &family, handle(), options)?.unwrap();
        let err = waiter.until_done().await.unwrap_err();
        assert!(err.is_exhausted(), "{err:?}");
        assert_eq!(transport.requests().len(), 1);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn poll_interval_beats_transport_backoff() -> anyhow::Result<()> {
        let transport = Scripted {
            backoff_policy: Some(Arc::new(FixedInterval::new(Duration::from_secs(7)))),
            ..Scripted::new([
                Ok(json!({"name": NAME, "done": false})),
                Ok(json!({"name": NAME, "done": true})),
            ])
        };
        let family = family();
        let start = TokioInstant::now();
        let waiter = Waiter::new(&transport, &family, handle(), options())?.unwrap();
        waiter.until_done().await?;
        assert_eq!(start.elapsed(), Duration::from_secs(1));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn transport_policies() -> anyhow::Result<()> {
        let transport = Scripted {
            backoff_policy: Some(Arc::new(FixedInterval::new(Duration::from_secs(7)))),
            ..Scripted::new([
                Ok(json!({"name": NAME, "done": false})),
                Ok(json!({"name": NAME, "done": true})),
            ])
        };
        let family = family();
        let start = TokioInstant::now();
        let options = WaitOptions::new().with_timeout(Duration::from_secs(60));
        let waiter = Waiter::new(&transport, &family, handle(), options)?.unwrap();
        waiter.until_done().await?;
        assert_eq!(start.elapsed(), Duration::from_secs(7));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn default_poll_interval() -> anyhow::Result<()> {
        let transport = Scripted::new([
            Ok(json!({"name": NAME, "done": false})),
            Ok(json!({"name": NAME, "done": true})),
        ]);
        let family = family();
        let start = TokioInstant::now();
        let waiter = Waiter::new(&transport, &family, handle(), WaitOptions::new())?.unwrap();
        waiter.until_done().await?;
        assert_eq!(start.elapsed(), Duration::from_secs(10));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn until_done_after_completion() -> anyhow::Result<()> {
        let transport = Scripted::default();
        let family = family();
        let handle = json!({"name": NAME, "done": true});
        let mut waiter = Waiter::new(&transport, &family, handle, options())?.unwrap();
        let p = waiter.poll().await;
        assert!(matches!(p, Some(PollingResult::Completed(Ok(_)))), "{p:?}");
        let err = waiter.until_done().await.unwrap_err();
        assert!(err.is_exhausted(), "{err:?}");
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn elapsed_time_policy_uses_wait_clock() -> anyhow::Result<()> {
        let options = options()
            .with_timeout(Duration::from_secs(60))
            .with_polling_error_policy(CommonRetryable.with_time_limit(Duration::from_secs(5)));
        let transport = Scripted::default();
        let family = family();
        let start = TokioInstant::now();
        let waiter = Waiter::new(&transport, &family, handle(), options)?.unwrap();
        let err = waiter.until_done().await.unwrap_err();
        assert!(err.is_timeout(), "{err:?}");
        assert!(err.to_string().contains("elapsed time"), "{err}");
        assert_eq!(start.elapsed(), Duration::from_secs(5));
        assert_eq!(transport.requests().len(), 6);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn compute_operation() -> anyhow::Result<()> {
        let link = "https://compute.googleapis.com/compute/v1/projects/p/zones/us-central1-a/operations/operation-123";
        let e1 = json!({"code": "QUOTA_EXCEEDED", "message": "first"});
        let e2 = json!({"code": "QUOTA_EXCEEDED", "message": "second"});
        let transport = Scripted::new([
            Ok(json!({"name": "operation-123", "status": "RUNNING", "selfLink": link})),
            Ok(json!({"name": "operation-123", "status": "DONE", "selfLink": link, "error": {"errors": [e1, e2]}})),
        ]);
        let family = Compute::new();
        let handle = json!({"name": "operation-123", "status": "PENDING", "selfLink": link});
        let waiter = Waiter::new(&transport, &family, handle, options())?.unwrap();
        let err = waiter.until_done().await.unwrap_err();
        assert!(err.is_operation(), "{err:?}");
        assert_eq!(err.to_string(), format!("{e1}\n{e2}"));
        let requests = transport.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests.iter().all(|(url, _)| url == link), "{requests:?}");
        Ok(())
    }
}
