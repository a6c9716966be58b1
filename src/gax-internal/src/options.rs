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

use crate::credentials::{Credentials, access_token};
use gax::polling_backoff_policy::{PollingBackoffPolicy, PollingBackoffPolicyArg};
use gax::polling_error_policy::{PollingErrorPolicy, PollingErrorPolicyArg};
use std::sync::Arc;
use std::time::Duration;

pub(crate) const LOGGING_VAR: &str = "TPG_LOGGING";
pub(crate) const BILLING_PROJECT_VAR: &str = "GOOGLE_BILLING_PROJECT";
pub(crate) const USER_PROJECT_OVERRIDE_VAR: &str = "USER_PROJECT_OVERRIDE";
pub(crate) const REQUEST_REASON_VAR: &str = "CLOUDSDK_CORE_REQUEST_REASON";
pub(crate) const ACCESS_TOKEN_VAR: &str = "GOOGLE_OAUTH_ACCESS_TOKEN";

/// Errors detected while configuring the transport.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("invalid boolean value for {name}: {value:?}")]
    InvalidBool { name: &'static str, value: String },
    #[error("the {name} value cannot be used as an HTTP header value: {value:?}")]
    InvalidHeader { name: &'static str, value: String },
    #[error("the request timeout must be greater than zero")]
    ZeroTimeout,
    #[error("cannot create the HTTP client")]
    Transport(#[source] reqwest::Error),
}

/// The configuration shared by all the requests made through one transport.
///
/// The configuration is built once, when the provider is configured, and
/// passed by value to [ReqwestClient::new][crate::http::ReqwestClient::new].
#[derive(Clone, Debug, Default)]
pub struct ClientConfig {
    pub(crate) credentials: Option<Credentials>,
    pub(crate) user_agent: Option<String>,
    pub(crate) billing_project: Option<String>,
    pub(crate) user_project_override: bool,
    pub(crate) request_reason: Option<String>,
    pub(crate) request_timeout: Option<Duration>,
    pub(crate) tracing: bool,
    pub(crate) polling_error_policy: Option<Arc<dyn PollingErrorPolicy>>,
    pub(crate) polling_backoff_policy: Option<Arc<dyn PollingBackoffPolicy>>,
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration from the environment variables the provider
    /// documents.
    ///
    /// * `GOOGLE_BILLING_PROJECT`: the billing project.
    /// * `USER_PROJECT_OVERRIDE`: send the billing project in each request.
    /// * `CLOUDSDK_CORE_REQUEST_REASON`: the request reason header.
    /// * `GOOGLE_OAUTH_ACCESS_TOKEN`: use a fixed access token.
    /// * `TPG_LOGGING`: enable request tracing.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.billing_project = non_empty_var(BILLING_PROJECT_VAR);
        config.request_reason = non_empty_var(REQUEST_REASON_VAR);
        config.credentials =
            non_empty_var(ACCESS_TOKEN_VAR).map(|t| access_token::Builder::new(t).build());
        if let Some(v) = non_empty_var(USER_PROJECT_OVERRIDE_VAR) {
            config.user_project_override = parse_bool(USER_PROJECT_OVERRIDE_VAR, &v)?;
        }
        if let Some(v) = non_empty_var(LOGGING_VAR) {
            config.tracing = parse_bool(LOGGING_VAR, &v)?;
        }
        Ok(config)
    }

    pub fn with_credentials<T: Into<Credentials>>(mut self, v: T) -> Self {
        self.credentials = Some(v.into());
        self
    }

    pub fn with_user_agent<T: Into<String>>(mut self, v: T) -> Self {
        self.user_agent = Some(v.into());
        self
    }

    pub fn with_billing_project<T: Into<String>>(mut self, v: T) -> Self {
        self.billing_project = Some(v.into());
        self
    }

    /// Sends the `X-Goog-User-Project` header with each request.
    ///
    /// The billed project is the request's user project if set, then the
    /// billing project, then the project that owns the resource. Without the
    /// override no header is sent.
    pub fn with_user_project_override(mut self, v: bool) -> Self {
        self.user_project_override = v;
        self
    }

    pub fn with_request_reason<T: Into<String>>(mut self, v: T) -> Self {
        self.request_reason = Some(v.into());
        self
    }

    pub fn with_request_timeout(mut self, v: Duration) -> Self {
        self.request_timeout = Some(v);
        self
    }

    pub fn with_tracing(mut self) -> Self {
        self.tracing = true;
        self
    }

    pub fn with_polling_error_policy<V: Into<PollingErrorPolicyArg>>(mut self, v: V) -> Self {
        self.polling_error_policy = Some(v.into().policy().clone());
        self
    }

    pub fn with_polling_backoff_policy<V: Into<PollingBackoffPolicyArg>>(mut self, v: V) -> Self {
        self.polling_backoff_policy = Some(v.into().policy().clone());
        self
    }

    /// The project used to bill requests, if `user_project_override` is set.
    pub fn effective_billing_project(&self) -> Option<&str> {
        if !self.user_project_override {
            return None;
        }
        self.billing_project.as_deref()
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        let headers = [
            ("user agent", &self.user_agent),
            ("billing project", &self.billing_project),
            ("request reason", &self.request_reason),
        ];
        for (name, value) in headers {
            if let Some(v) = value {
                if http::HeaderValue::from_str(v).is_err() {
                    return Err(ConfigError::InvalidHeader {
                        name,
                        value: v.clone(),
                    });
                }
            }
        }
        if self.request_timeout.is_some_and(|t| t.is_zero()) {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }
}

// Returns true if the environment or client configuration enables tracing.
pub fn tracing_enabled(config: &ClientConfig) -> bool {
    if config.tracing {
        return true;
    }
    std::env::var(LOGGING_VAR)
        .ok()
        .and_then(|v| parse_bool(LOGGING_VAR, &v).ok())
        .unwrap_or(false)
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

// Accepts the same spellings as the provider: 1, t, T, TRUE, true, True, and
// their negative counterparts.
fn parse_bool(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Ok(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Ok(false),
        _ => Err(ConfigError::InvalidBool {
            name,
            value: value.to_string(),
        }),
    }
}
