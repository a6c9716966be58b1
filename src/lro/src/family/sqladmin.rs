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

use super::{OperationFamily, error_list, join};
use crate::{Error, Operation, Result};
use gax::error::OperationError;
use serde_json::Value;

const DEFAULT_BASE_PATH: &str = "https://sqladmin.googleapis.com/sql/v1beta4/";

/// The family of Cloud SQL Admin operations.
///
/// Like Compute Engine, the operations use a `status` enum and report
/// failures in `error.errors`. The operations are always queried by project
/// and name. If the wait options do not name a project the waiter uses the
/// `targetProject` of the operation.
#[derive(Clone, Debug)]
pub struct SqlAdmin {
    base_path: String,
}

impl SqlAdmin {
    pub fn new() -> Self {
        Self {
            base_path: DEFAULT_BASE_PATH.to_string(),
        }
    }

    /// Changes the base path, e.g. to use a custom endpoint.
    pub fn with_base_path<T: Into<String>>(mut self, v: T) -> Self {
        self.base_path = v.into();
        self
    }
}

impl Default for SqlAdmin {
    fn default() -> Self {
        Self::new()
    }
}

impl OperationFamily for SqlAdmin {
    fn status_url(&self, operation: &Operation, project: Option<&str>) -> Result<String> {
        let name = operation
            .name()
            .ok_or_else(|| Error::malformed_operation("the operation has no name"))?;
        let non_empty = |p: &&str| !p.is_empty();
        let project = project
            .filter(non_empty)
            .or_else(|| {
                operation
                    .extra
                    .get("targetProject")
                    .and_then(Value::as_str)
                    .filter(non_empty)
            })
            .ok_or_else(|| {
                Error::malformed_operation(format!(
                    "cannot determine the project for operation {name}"
                ))
            })?;
        Ok(join(
            &self.base_path,
            &format!("projects/{project}/operations/{name}"),
        ))
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
