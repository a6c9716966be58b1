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

//! Waits for Google Cloud long-running operations (LROs).
//!
//! Many Google Cloud APIs return an operation from create, update, and delete
//! calls. The resource is not ready until the operation completes. The
//! functions in this crate poll the operation until it completes, fails, or
//! the wait times out, and return the operation result.
//!
//! # Example
//! ```no_run
//! # async fn sample(handle: serde_json::Value) -> anyhow::Result<()> {
//! use gaxi::http::ReqwestClient;
//! use gaxi::options::ClientConfig;
//! use tpg_lro::family::Aip151;
//! use tpg_lro::options::WaitOptions;
//!
//! #[derive(Debug, serde::Deserialize)]
//! struct Stream {
//!     name: String,
//! }
//!
//! let client = ReqwestClient::new(ClientConfig::from_env()?)?;
//! let options = WaitOptions::new().with_activity("Creating Stream");
//! let stream: Option<Stream> =
//!     tpg_lro::wait_for_operation(&client, &Aip151::datastream(), handle, options).await?;
//! println!("created {stream:?}");
//! # Ok(()) }
//! ```

pub use gax::Result;
pub use gax::error::Error;
use gaxi::http::Transport;

pub mod family;
mod operation;
pub use operation::Operation;
pub mod options;
mod waiter;
pub use waiter::Waiter;

use family::OperationFamily;
use options::WaitOptions;

/// The result of one step of a [Waiter].
#[derive(Debug)]
pub enum PollingResult {
    /// The operation is still in progress. This is the last fetched value.
    InProgress(Operation),
    /// The operation completed, or polling stopped. This is the final
    /// outcome.
    ///
    /// An operation that completed with an error is reported as an error
    /// satisfying [Error::is_operation].
    Completed(Result<Operation>),
    /// An error trying to poll the operation.
    ///
    /// The polling error policy decided the error is recoverable, for
    /// example, the service was temporarily unavailable. The next step polls
    /// again.
    PollingError(Error),
}

/// Waits for an operation and decodes its response.
///
/// Returns `Ok(None)` without sending any requests if the handle has no name,
/// as the triggering call completed synchronously. Also returns `Ok(None)` if
/// the operation completes successfully without a response payload.
///
/// # Parameters
/// * `transport` - sends the requests to query the operation status.
/// * `family` - the conventions used by the service that owns the operation.
/// * `handle` - the operation, as returned by the triggering call.
/// * `options` - configures the wait.
pub async fn wait_for_operation<R, T, F>(
    transport: &T,
    family: &F,
    handle: serde_json::Value,
    options: WaitOptions,
) -> Result<Option<R>>
where
    R: serde::de::DeserializeOwned,
    T: Transport,
    F: OperationFamily + ?Sized,
{
    let Some(waiter) = Waiter::new(transport, family, handle, options)? else {
        return Ok(None);
    };
    let operation = waiter.until_done().await?;
    family
        .response(&operation)
        .map(|v| R::deserialize(v).map_err(Error::deser))
        .transpose()
}

/// Waits for an operation, ignoring any response payload.
///
/// Use this function for operations where the caller only needs to know that
/// the operation succeeded, such as deletes.
pub async fn wait_for_completion<T, F>(
    transport: &T,
    family: &F,
    handle: serde_json::Value,
    options: WaitOptions,
) -> Result<()>
where
    T: Transport,
    F: OperationFamily + ?Sized,
{
    if let Some(waiter) = Waiter::new(transport, family, handle, options)? {
        waiter.until_done().await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use family::{Aip151, Compute, Endpoint};
    use gax::options::RequestOptions;
    use serde_json::{Value, json};
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Debug, Default)]
    struct Scripted {
        responses: Mutex<VecDeque<Value>>,
        count: Mutex<usize>,
    }

    impl Scripted {
        fn new<I: IntoIterator<Item = Value>>(responses: I) -> Self {
            Self {
                responses: Mutex::new(responses.into_iter().collect()),
                ..Default::default()
            }
        }

        fn count(&self) -> usize {
            *self.count.lock().unwrap()
        }
    }

    impl Transport for Scripted {
        async fn get(&self, _url: &str, _options: &RequestOptions) -> Result<Value> {
            *self.count.lock().unwrap() += 1;
            let next = self.responses.lock().unwrap().pop_front();
            Ok(next.unwrap_or_else(|| json!({"name": "operations/op-123", "done": false})))
        }
    }

    #[derive(Debug, PartialEq, serde::Deserialize)]
    struct Payload {
        id: String,
    }

    fn family() -> Aip151 {
        Aip151::new(Endpoint::global("https://example.googleapis.com/v1/"))
    }

    fn options() -> WaitOptions {
        WaitOptions::new()
            .with_poll_interval(Duration::from_secs(1))
            .with_timeout(Duration::from_secs(10))
    }

    #[test]
    fn synchronous_handles() -> anyhow::Result<()> {
        let transport = Scripted::default();
        let family = family();
        for handle in [json!({}), json!({"name": ""}), json!({"name": null})] {
            let got = tokio_test::block_on(wait_for_operation::<Payload, _, _>(
                &transport,
                &family,
                handle.clone(),
                options(),
            ))?;
            assert_eq!(got, None, "{handle}");
            tokio_test::block_on(wait_for_completion(&transport, &family, handle, options()))?;
        }
        assert_eq!(transport.count(), 0);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn decoded_response() -> anyhow::Result<()> {
        let transport = Scripted::new([
            json!({"name": "operations/op-123", "done": false}),
            json!({"name": "operations/op-123", "done": false}),
            json!({"name": "operations/op-123", "done": true, "response": {"id": "abc"}}),
        ]);
        let start = tokio::time::Instant::now();
        let got = wait_for_operation::<Payload, _, _>(
            &transport,
            &family(),
            json!({"name": "operations/op-123"}),
            options(),
        )
        .await?;
        assert_eq!(got, Some(Payload { id: "abc".into() }));
        assert_eq!(transport.count(), 3);
        assert_eq!(start.elapsed(), Duration::from_secs(2));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn raw_response() -> anyhow::Result<()> {
        let transport = Scripted::new([json!({
            "name": "operations/op-123",
            "done": true,
            "response": {"id": "abc", "extra": [1, 2]},
        })]);
        let got = wait_for_operation::<Value, _, _>(
            &transport,
            &family(),
            json!({"name": "operations/op-123"}),
            options(),
        )
        .await?;
        assert_eq!(got, Some(json!({"id": "abc", "extra": [1, 2]})));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn done_without_response() -> anyhow::Result<()> {
        let transport = Scripted::new([json!({"name": "operations/op-123", "done": true})]);
        let got = wait_for_operation::<Payload, _, _>(
            &transport,
            &family(),
            json!({"name": "operations/op-123"}),
            options(),
        )
        .await?;
        assert_eq!(got, None);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn response_with_wrong_shape() -> anyhow::Result<()> {
        let transport = Scripted::new([json!({
            "name": "operations/op-123",
            "done": true,
            "response": {"id": 42},
        })]);
        let got = wait_for_operation::<Payload, _, _>(
            &transport,
            &family(),
            json!({"name": "operations/op-123"}),
            options(),
        )
        .await;
        assert!(matches!(&got, Err(e) if e.is_deserialization()), "{got:?}");
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn completion_ignores_response() -> anyhow::Result<()> {
        let transport = Scripted::new([json!({
            "name": "operations/op-123",
            "done": true,
            "response": {"id": 42},
        })]);
        wait_for_completion(
            &transport,
            &family(),
            json!({"name": "operations/op-123"}),
            options(),
        )
        .await?;
        assert_eq!(transport.count(), 1);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn completion_reports_operation_errors() -> anyhow::Result<()> {
        let transport = Scripted::new([json!({
            "name": "operation-123",
            "status": "DONE",
            "error": {"errors": [{"code": "RESOURCE_IN_USE_BY_ANOTHER_RESOURCE"}]},
        })]);
        let family: &dyn OperationFamily = &Compute::new();
        let err = wait_for_completion(
            &transport,
            family,
            json!({"name": "operation-123", "status": "RUNNING", "selfLink": "https://example.com/op"}),
            options(),
        )
        .await
        .unwrap_err();
        assert!(err.is_operation(), "{err:?}");
        assert!(
            err.to_string().contains("RESOURCE_IN_USE_BY_ANOTHER_RESOURCE"),
            "{err}"
        );
        Ok(())
    }
}
