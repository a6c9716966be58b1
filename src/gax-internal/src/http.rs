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

use crate::credentials::{Credentials, anonymous};
use crate::options::{ClientConfig, ConfigError, tracing_enabled};
use gax::Result;
use gax::error::Error;
use gax::options::RequestOptions;
use gax::polling_backoff_policy::PollingBackoffPolicy;
use gax::polling_error_policy::PollingErrorPolicy;
use std::sync::Arc;
use std::time::Duration;

pub(crate) const USER_PROJECT_HEADER: &str = "x-goog-user-project";
pub(crate) const REQUEST_REASON_HEADER: &str = "x-goog-request-reason";

/// The HTTP collaborator used by the operation waiters.
///
/// The waiters are generic over this trait, so tests can replace the network
/// with a scripted sequence of responses.
pub trait Transport: Send + Sync + std::fmt::Debug {
    /// Sends a GET request to `url` and returns the decoded JSON body.
    fn get(
        &self,
        url: &str,
        options: &RequestOptions,
    ) -> impl Future<Output = Result<serde_json::Value>> + Send;

    /// The polling error policy configured for the transport, if any.
    fn polling_error_policy(&self) -> Option<Arc<dyn PollingErrorPolicy>> {
        None
    }

    /// The polling backoff policy configured for the transport, if any.
    fn polling_backoff_policy(&self) -> Option<Arc<dyn PollingBackoffPolicy>> {
        None
    }
}

#[derive(Clone, Debug)]
pub struct ReqwestClient {
    inner: reqwest::Client,
    cred: Credentials,
    user_agent: Option<String>,
    billing_project: Option<String>,
    user_project_override: bool,
    request_reason: Option<String>,
    request_timeout: Option<Duration>,
    tracing: bool,
    polling_error_policy: Option<Arc<dyn PollingErrorPolicy>>,
    polling_backoff_policy: Option<Arc<dyn PollingBackoffPolicy>>,
}

impl ReqwestClient {
    pub fn new(config: ClientConfig) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        let inner = reqwest::Client::builder()
            .build()
            .map_err(ConfigError::Transport)?;
        let tracing = tracing_enabled(&config);
        let billing_project = config.effective_billing_project().map(str::to_string);
        let cred = config
            .credentials
            .unwrap_or_else(|| anonymous::Builder::new().build());
        Ok(Self {
            inner,
            cred,
            user_agent: config.user_agent,
            billing_project,
            user_project_override: config.user_project_override,
            request_reason: config.request_reason,
            request_timeout: config.request_timeout,
            tracing,
            polling_error_policy: config.polling_error_policy,
            polling_backoff_policy: config.polling_backoff_policy,
        })
    }

    pub fn builder(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.inner.request(method, url)
    }

    pub async fn execute<I: serde::ser::Serialize, O: serde::de::DeserializeOwned + Default>(
        &self,
        mut builder: reqwest::RequestBuilder,
        body: Option<I>,
        options: &RequestOptions,
    ) -> Result<O> {
        let user_agent = options.user_agent().as_ref().or(self.user_agent.as_ref());
        if let Some(user_agent) = user_agent {
            builder = builder.header(
                reqwest::header::USER_AGENT,
                reqwest::header::HeaderValue::from_str(user_agent).map_err(Error::ser)?,
            );
        }
        if let Some(project) = self.user_project(options) {
            builder = builder.header(
                USER_PROJECT_HEADER,
                reqwest::header::HeaderValue::from_str(project).map_err(Error::ser)?,
            );
        }
        let reason = options
            .request_reason()
            .as_ref()
            .or(self.request_reason.as_ref());
        if let Some(reason) = reason {
            builder = builder.header(
                REQUEST_REASON_HEADER,
                reqwest::header::HeaderValue::from_str(reason).map_err(Error::ser)?,
            );
        }
        if let Some(body) = body {
            builder = builder.json(&body);
        }
        self.request_attempt::<O>(builder, options).await
    }

    async fn request_attempt<O: serde::de::DeserializeOwned + Default>(
        &self,
        mut builder: reqwest::RequestBuilder,
        options: &RequestOptions,
    ) -> Result<O> {
        if let Some(timeout) = (*options.attempt_timeout()).or(self.request_timeout) {
            builder = builder.timeout(timeout);
        }
        let auth_headers = self.cred.headers().await.map_err(Error::authentication)?;
        for (key, value) in auth_headers.iter() {
            builder = builder.header(key, value);
        }
        let request = builder.build().map_err(Error::ser)?;
        tracing::debug!(method = %request.method(), url = %request.url(), "sending request");
        let response = self
            .inner
            .execute(request)
            .await
            .map_err(Self::map_send_error)?;
        if self.tracing {
            tracing::debug!(status = response.status().as_u16(), headers = ?response.headers(), "received response");
        }
        if !response.status().is_success() {
            return self::to_http_error(response).await;
        }

        self::to_http_response(response).await
    }

    // The project billed for the request, only with the override enabled.
    fn user_project<'a>(&'a self, options: &'a RequestOptions) -> Option<&'a String> {
        if !self.user_project_override {
            return None;
        }
        options
            .user_project()
            .as_ref()
            .or(self.billing_project.as_ref())
            .or(options.resource_project().as_ref())
    }

    // A request that times out never got a response, the waiter may retry it.
    // Only the wait budget produces timeout errors.
    fn map_send_error(err: reqwest::Error) -> Error {
        Error::io(err)
    }
}

impl Transport for ReqwestClient {
    async fn get(&self, url: &str, options: &RequestOptions) -> Result<serde_json::Value> {
        let builder = self.builder(reqwest::Method::GET, url);
        self.execute::<NoBody, serde_json::Value>(builder, None, options)
            .await
    }

    fn polling_error_policy(&self) -> Option<Arc<dyn PollingErrorPolicy>> {
        self.polling_error_policy.clone()
    }

    fn polling_backoff_policy(&self) -> Option<Arc<dyn PollingBackoffPolicy>> {
        self.polling_backoff_policy.clone()
    }
}

#[derive(serde::Serialize)]
pub struct NoBody;

pub async fn to_http_error<O>(response: reqwest::Response) -> Result<O> {
    let status_code = response.status().as_u16();
    let headers = response.headers().clone();
    let body = response.bytes().await.map_err(Error::io)?;

    let error = match gax::error::rpc::Status::try_from(&body) {
        Ok(status) => Error::service_with_http_response(status, status_code, headers, body),
        Err(_) => Error::http(status_code, headers, body),
    };
    Err(error)
}

async fn to_http_response<O: serde::de::DeserializeOwned + Default>(
    response: reqwest::Response,
) -> Result<O> {
    // 204 No Content has no body and throws EOF error if we try to parse with serde::json
    let no_content_status = response.status() == reqwest::StatusCode::NO_CONTENT;
    let body = response.bytes().await.map_err(Error::io)?;

    match body {
        content if content.is_empty() && no_content_status => Ok(O::default()),
        content => serde_json::from_slice::<O>(&content).map_err(Error::deser),
    }
}
