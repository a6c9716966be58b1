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

use super::{OperationFamily, error_list, join, last_segment};
use crate::{Error, Operation, Result};
use gax::error::OperationError;
use serde_json::Value;

const DEFAULT_BASE_PATH: &str = "https://compute.googleapis.com/compute/v1/";

/// The family of Compute Engine operations.
///
/// Compute Engine operations report their progress in a `status` field, which
/// is `DONE` once the operation completes. Failures are reported as a list in
/// `error.errors`. The operations do not carry a response payload.
///
/// The operations are zonal, regional, or global. The waiter polls the
/// `selfLink` of the operation if present, otherwise it builds the URL from
/// the project, the zone or region, and the operation name.
#[derive(Clone, Debug)]
pub struct Compute {
    base_path: String,
}

impl Compute {
    pub fn new() -> Self {
        Self {
            base_path: DEFAULT_BASE_PATH.to_string(),
        }
    }

    /// Changes the base path, e.g. to use a custom endpoint or the beta API.
    ///
    /// The base path is only used for operations without a `selfLink`.
    pub fn with_base_path<T: Into<String>>(mut self, v: T) -> Self {
        self.base_path = v.into();
        self
    }
}

impl Default for Compute {
    fn default() -> Self {
        Self::new()
    }
}

fn non_empty(v: &Option<String>) -> Option<&str> {
    v.as_deref().filter(|s| !s.is_empty())
}

impl OperationFamily for Compute {
    fn status_url(&self, operation: &Operation, project: Option<&str>) -> Result<String> {
        if let Some(link) = non_empty(&operation.self_link) {
            return Ok(link.to_string());
        }
        let name = operation
            .name()
            .ok_or_else(|| Error::malformed_operation("the operation has no name"))?;
        let project = project.ok_or_else(|| {
            Error::malformed_operation(format!(
                "a project is required to poll operation {name}, which has no selfLink"
            ))
        })?;
        let path = match (non_empty(&operation.zone), non_empty(&operation.region)) {
            (Some(zone), _) => format!(
                "projects/{project}/zones/{}/operations/{name}",
                last_segment(zone)
            ),
            (None, Some(region)) => format!(
                "projects/{project}/regions/{}/operations/{name}",
                last_segment(region)
            ),
            (None, None) => format!("projects/{project}/global/operations/{name}"),
        };
        Ok(join(&self.base_path, &path))
    }

    fn is_done(&self, operation: &Operation) -> bool {
        operation.status.as_deref() == Some("DONE")
    }

    fn error(&self, operation: &Operation) -> Option<OperationError> {
        error_list(operation)
    }

    fn response<'a>(&self, _operation: &'a Operation) -> Option<&'a Value> {
        None
    }
}
