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

//! Options for a single wait.

use gax::options::RequestOptions;
use std::time::Duration;

/// The default budget for a complete wait.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20 * 60);

const DEFAULT_ACTIVITY: &str = "operation";

/// Configures a single call to wait for an operation.
///
/// The request options (user agent, billing project, polling policies) are
/// set with the [RequestOptionsBuilder][gax::options::RequestOptionsBuilder]
/// setters.
///
/// # Example
/// ```
/// # use tpg_lro::options::WaitOptions;
/// use gax::options::RequestOptionsBuilder;
/// use std::time::Duration;
/// let options = WaitOptions::new()
///     .with_activity("Creating Stream")
///     .with_timeout(Duration::from_secs(30 * 60))
///     .with_user_agent("terraform-provider-google/6.0");
/// assert_eq!(options.activity(), "Creating Stream");
/// ```
#[derive(Clone, Debug)]
pub struct WaitOptions {
    pub(crate) poll_interval: Option<Duration>,
    pub(crate) timeout: Duration,
    pub(crate) activity: String,
    pub(crate) project: Option<String>,
    pub(crate) request_options: RequestOptions,
}

impl WaitOptions {
    pub fn new() -> Self {
        Self {
            poll_interval: None,
            timeout: DEFAULT_TIMEOUT,
            activity: DEFAULT_ACTIVITY.to_string(),
            project: None,
            request_options: RequestOptions::default(),
        }
    }

    /// Sets a fixed delay between polls.
    ///
    /// A polling backoff policy in the request options takes precedence.
    /// Without either, the waiter uses the policy from the client
    /// configuration, or polls every 10 seconds.
    pub fn with_poll_interval(mut self, v: Duration) -> Self {
        self.poll_interval = Some(v);
        self
    }

    /// The fixed delay between polls, if set.
    pub fn poll_interval(&self) -> Option<Duration> {
        self.poll_interval
    }

    /// Sets the wall-clock budget for the wait.
    ///
    /// Once it elapses the waiter returns a timeout error. The operation may
    /// still be running in the service.
    pub fn with_timeout(mut self, v: Duration) -> Self {
        self.timeout = v;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Describes the wait in log messages and errors, e.g. "Creating Stream".
    pub fn with_activity<T: Into<String>>(mut self, v: T) -> Self {
        self.activity = v.into();
        self
    }

    pub fn activity(&self) -> &str {
        &self.activity
    }

    /// Sets the project that owns the resource.
    ///
    /// Families that query operations by project, such as Compute Engine
    /// operations without a `selfLink`, use it to build status URLs. The
    /// transport bills it when the user project override is enabled and no
    /// other billing project is set.
    pub fn with_project<T: Into<String>>(mut self, v: T) -> Self {
        let v = v.into();
        self.request_options.set_resource_project(v.clone());
        self.project = Some(v);
        self
    }

    pub fn project(&self) -> Option<&str> {
        self.project.as_deref()
    }
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl gax::options::internal::RequestBuilder for WaitOptions {
    fn request_options(&mut self) -> &mut RequestOptions {
        &mut self.request_options
    }
}
