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

//! Per request options.
//!
//! The client configuration provides defaults for every request: the user
//! agent, the billing project, and the polling policies. Individual waits
//! sometimes need different values, for example, a resource may be billed to
//! a different project, or a slow service may need a longer per-request
//! timeout. Any type implementing [internal::RequestBuilder] gets the setters
//! in [RequestOptionsBuilder].

use crate::polling_backoff_policy::{PollingBackoffPolicy, PollingBackoffPolicyArg};
use crate::polling_error_policy::{PollingErrorPolicy, PollingErrorPolicyArg};
use std::sync::Arc;

/// A set of options configuring a single request.
///
/// Applications typically use this type indirectly, via the
/// [RequestOptionsBuilder] setters on the wait options.
#[derive(Clone, Debug, Default)]
pub struct RequestOptions {
    user_agent: Option<String>,
    user_project: Option<String>,
    resource_project: Option<String>,
    request_reason: Option<String>,
    attempt_timeout: Option<std::time::Duration>,
    polling_error_policy: Option<Arc<dyn PollingErrorPolicy>>,
    polling_backoff_policy: Option<Arc<dyn PollingBackoffPolicy>>,
}

impl RequestOptions {
    /// Sets the user agent header value.
    ///
    /// The Terraform provider identifies itself, its version, and the
    /// Terraform version in this header.
    pub fn set_user_agent<T: Into<String>>(&mut self, v: T) {
        self.user_agent = Some(v.into());
    }

    /// Gets the current user agent.
    pub fn user_agent(&self) -> &Option<String> {
        &self.user_agent
    }

    /// Sets the project billed for the request.
    ///
    /// This is the resource's own billing project. It is only sent, in the
    /// `X-Goog-User-Project` header, when the client configuration enables
    /// the user project override. It takes precedence over the billing
    /// project in the client configuration.
    pub fn set_user_project<T: Into<String>>(&mut self, v: T) {
        self.user_project = Some(v.into());
    }

    /// Gets the project billed for the request, if any.
    pub fn user_project(&self) -> &Option<String> {
        &self.user_project
    }

    /// Sets the project that owns the resource.
    ///
    /// Billed when the user project override is enabled and neither the
    /// request nor the client configuration name a billing project.
    pub fn set_resource_project<T: Into<String>>(&mut self, v: T) {
        self.resource_project = Some(v.into());
    }

    /// Gets the project that owns the resource, if any.
    pub fn resource_project(&self) -> &Option<String> {
        &self.resource_project
    }

    /// Sets the request reason, sent in the `X-Goog-Request-Reason` header.
    pub fn set_request_reason<T: Into<String>>(&mut self, v: T) {
        self.request_reason = Some(v.into());
    }

    /// Gets the request reason, if any.
    pub fn request_reason(&self) -> &Option<String> {
        &self.request_reason
    }

    /// Sets the timeout for each HTTP request.
    ///
    /// When polling, this affects the timeout for each poll. The timeout for
    /// the complete wait is set in the wait options.
    pub fn set_attempt_timeout<T: Into<std::time::Duration>>(&mut self, v: T) {
        self.attempt_timeout = Some(v.into());
    }

    /// Gets the current per-request timeout.
    pub fn attempt_timeout(&self) -> &Option<std::time::Duration> {
        &self.attempt_timeout
    }

    /// Get the current polling error policy override, if any.
    pub fn polling_error_policy(&self) -> &Option<Arc<dyn PollingErrorPolicy>> {
        &self.polling_error_policy
    }

    /// Sets the polling error policy.
    pub fn set_polling_error_policy<V: Into<PollingErrorPolicyArg>>(&mut self, v: V) {
        self.polling_error_policy = Some(v.into().policy().clone());
    }

    /// Get the current polling backoff policy override, if any.
    pub fn polling_backoff_policy(&self) -> &Option<Arc<dyn PollingBackoffPolicy>> {
        &self.polling_backoff_policy
    }

    /// Sets the polling backoff policy.
    pub fn set_polling_backoff_policy<V: Into<PollingBackoffPolicyArg>>(&mut self, v: V) {
        self.polling_backoff_policy = Some(v.into().policy().clone());
    }
}

/// Implementations of this trait provide setters to configure request options.
pub trait RequestOptionsBuilder: internal::RequestBuilder {
    /// Set the user agent header.
    fn with_user_agent<V: Into<String>>(self, v: V) -> Self;

    /// Set the project billed for the request.
    fn with_user_project<V: Into<String>>(self, v: V) -> Self;

    /// Set the request reason header.
    fn with_request_reason<V: Into<String>>(self, v: V) -> Self;

    /// Sets the per-request timeout.
    fn with_attempt_timeout<V: Into<std::time::Duration>>(self, v: V) -> Self;

    /// Sets the polling error policy configuration.
    fn with_polling_error_policy<V: Into<PollingErrorPolicyArg>>(self, v: V) -> Self;

    /// Sets the polling backoff policy configuration.
    fn with_polling_backoff_policy<V: Into<PollingBackoffPolicyArg>>(self, v: V) -> Self;
}

pub mod internal {
    //! This module contains implementation details. Types and functions in
    //! this module may be changed or removed without warnings.
    use super::RequestOptions;

    /// Simplify implementation of the [super::RequestOptionsBuilder] trait.
    pub trait RequestBuilder {
        fn request_options(&mut self) -> &mut RequestOptions;
    }
}

/// Implements the sealed [RequestOptionsBuilder] trait.
impl<T> RequestOptionsBuilder for T
where
    T: internal::RequestBuilder,
{
    fn with_user_agent<V: Into<String>>(mut self, v: V) -> Self {
        self.request_options().set_user_agent(v);
        self
    }

    fn with_user_project<V: Into<String>>(mut self, v: V) -> Self {
        self.request_options().set_user_project(v);
        self
    }

    fn with_request_reason<V: Into<String>>(mut self, v: V) -> Self {
        self.request_options().set_request_reason(v);
        self
    }

    fn with_attempt_timeout<V: Into<std::time::Duration>>(mut self, v: V) -> Self {
        self.request_options().set_attempt_timeout(v);
        self
    }

    fn with_polling_error_policy<V: Into<PollingErrorPolicyArg>>(mut self, v: V) -> Self {
        self.request_options().set_polling_error_policy(v);
        self
    }

    fn with_polling_backoff_policy<V: Into<PollingBackoffPolicyArg>>(mut self, v: V) -> Self {
        self.request_options().set_polling_backoff_policy(v);
        self
    }
}
