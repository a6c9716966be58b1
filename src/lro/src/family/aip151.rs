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

use super::{OperationFamily, join};
use crate::{Error, Operation, Result};
use gax::error::OperationError;
use gax::error::rpc::Status;
use serde_json::Value;

const LOCATION_PLACEHOLDER: &str = "{location}";

/// Where to find the operations of an AIP-151 service.
///
/// # Example
/// ```
/// # use tpg_lro::family::Endpoint;
/// let global = Endpoint::global("https://datastream.googleapis.com/v1/");
/// let regional = Endpoint::regional("https://{location}-gkemulticloud.googleapis.com/v1/");
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct Endpoint(Inner);

#[derive(Clone, Debug, PartialEq)]
enum Inner {
    Global(String),
    Regional(String),
}

impl Endpoint {
    /// The status URL is the operation name appended to `base`.
    pub fn global<T: Into<String>>(base: T) -> Self {
        Self(Inner::Global(base.into()))
    }

    /// The status URL depends on the location of the operation.
    ///
    /// Any `{location}` in `template` is replaced by the segment following
    /// `locations/` in the operation name, and then the operation name is
    /// appended. Operations without a location cannot be polled.
    pub fn regional<T: Into<String>>(template: T) -> Self {
        Self(Inner::Regional(template.into()))
    }

    fn url(&self, name: &str) -> Result<String> {
        match &self.0 {
            Inner::Global(base) => Ok(join(base, name)),
            Inner::Regional(template) => {
                let location = location(name).ok_or_else(|| {
                    Error::malformed_operation(format!(
                        "cannot find the location in the operation name {name:?}"
                    ))
                })?;
                Ok(join(&template.replace(LOCATION_PLACEHOLDER, location), name))
            }
        }
    }
}

fn location(name: &str) -> Option<&str> {
    let mut segments = name.split('/');
    segments.find(|s| *s == "locations")?;
    segments.next().filter(|s| !s.is_empty())
}

/// The family of services following [AIP-151].
///
/// The operations have a boolean `done` field. Completed operations contain
/// either a `google.rpc.Status` in `error`, or the result in `response`.
///
/// # Example
/// ```
/// # use tpg_lro::family::{Aip151, Endpoint, OperationFamily};
/// # use tpg_lro::Operation;
/// use serde_json::json;
/// let family = Aip151::new(Endpoint::global("https://example.googleapis.com/v1/"));
/// let op = Operation::from_handle(json!({"name": "operations/op-123"}))?;
/// let url = family.status_url(&op, None)?;
/// assert_eq!(url, "https://example.googleapis.com/v1/operations/op-123");
/// # Ok::<(), tpg_lro::Error>(())
/// ```
///
/// [AIP-151]: https://google.aip.dev/151
#[derive(Clone, Debug)]
pub struct Aip151 {
    endpoint: Endpoint,
    validation_results: bool,
}

impl Aip151 {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            validation_results: false,
        }
    }

    /// Datastream operations.
    ///
    /// Datastream reports failed validations in the operation metadata, this
    /// family includes them in the operation errors.
    pub fn datastream() -> Self {
        Self::new(Endpoint::global("https://datastream.googleapis.com/v1/"))
            .with_validation_results()
    }

    /// GKE attached clusters operations, served from regional endpoints.
    pub fn container_attached() -> Self {
        Self::new(Endpoint::regional(
            "https://{location}-gkemulticloud.googleapis.com/v1/",
        ))
    }

    /// Firebase App Hosting operations.
    pub fn firebase_app_hosting() -> Self {
        Self::new(Endpoint::global(
            "https://firebaseapphosting.googleapis.com/v1beta/",
        ))
    }

    /// Include the failed entries of `metadata.validationResult.validations`
    /// in the operation errors.
    pub fn with_validation_results(mut self) -> Self {
        self.validation_results = true;
        self
    }

    fn failed_validations(operation: &Operation) -> impl Iterator<Item = String> + '_ {
        operation
            .metadata
            .as_ref()
            .and_then(|m| m.pointer("/validationResult/validations"))
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter(|v| v.get("state").and_then(Value::as_str) == Some("FAILED"))
            .map(Value::to_string)
    }
}

impl OperationFamily for Aip151 {
    fn status_url(&self, operation: &Operation, _project: Option<&str>) -> Result<String> {
        let name = operation
            .name()
            .ok_or_else(|| Error::malformed_operation("the operation has no name"))?;
        self.endpoint.url(name)
    }

    fn error(&self, operation: &Operation) -> Option<OperationError> {
        let error = operation.error.as_ref()?;
        let name = operation.name().unwrap_or_default();
        let (details, status) = match serde_json::from_value::<Status>(error.clone()) {
            Ok(status) => {
                let details = status.details.iter().map(Value::to_string).collect();
                (details, Some(status))
            }
            // Keep the raw error if it does not follow `google.rpc.Status`.
            Err(_) => (vec![error.to_string()], None),
        };
        let mut error = OperationError::new(name)
            .set_details(details)
            .set_status(status);
        if self.validation_results {
            Self::failed_validations(operation).for_each(|v| error.push_detail(v));
        }
        Some(error)
    }
}
