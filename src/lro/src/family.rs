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

//! Service families and their operation conventions.
//!
//! Every Google Cloud service returns operations, but not all services agree
//! on how to find the operation status, how to detect that the operation
//! completed, or how to report errors. The waiter captures these differences
//! in the [OperationFamily] trait, the polling loop is shared.
//!
//! Most services follow [AIP-151], use [Aip151] for them. Compute Engine and
//! Cloud SQL predate AIP-151, and have their own families.
//!
//! [AIP-151]: https://google.aip.dev/151

use crate::{Operation, Result};
use gax::error::OperationError;
use serde_json::Value;

mod aip151;
pub use aip151::{Aip151, Endpoint};
mod compute;
pub use compute::Compute;
mod sqladmin;
pub use sqladmin::SqlAdmin;

/// The per-service behavior of an operation waiter.
///
/// Implement this trait to support services with unusual operations. The
/// default implementations follow the AIP-151 conventions.
pub trait OperationFamily: Send + Sync + std::fmt::Debug {
    /// Returns the URL to query the status of `operation`.
    ///
    /// The waiter calls this function once, with the initial handle. Errors
    /// are returned to the caller before any request is sent.
    ///
    /// # Parameters
    /// * `operation` - the operation handle.
    /// * `project` - the project configured in the wait options, if any.
    fn status_url(&self, operation: &Operation, project: Option<&str>) -> Result<String>;

    /// Returns true if `operation` reached a terminal state, with or without
    /// an error.
    fn is_done(&self, operation: &Operation) -> bool {
        operation.done
    }

    /// Extracts the error from a completed operation.
    ///
    /// Returns `None` if the operation completed successfully.
    fn error(&self, operation: &Operation) -> Option<OperationError>;

    /// Returns the payload of a successfully completed operation, if any.
    fn response<'a>(&self, operation: &'a Operation) -> Option<&'a Value> {
        operation.response.as_ref()
    }
}

/// Appends `path` to `base`, inserting a `/` separator if needed.
pub(crate) fn join(base: &str, path: &str) -> String {
    match (base.ends_with('/'), path.starts_with('/')) {
        (true, true) => format!("{base}{}", &path[1..]),
        (false, false) => format!("{base}/{path}"),
        _ => format!("{base}{path}"),
    }
}

/// Returns the last segment of a resource name or URL.
///
/// Compute Engine reports zones and regions as full URLs in some responses.
pub(crate) fn last_segment(v: &str) -> &str {
    v.rsplit('/').next().unwrap_or(v)
}

/// Collects the `errors[]` list used by Compute Engine and Cloud SQL.
pub(crate) fn error_list(operation: &Operation) -> Option<OperationError> {
    let errors = operation
        .error
        .as_ref()?
        .get("errors")
        .and_then(Value::as_array)
        .filter(|e| !e.is_empty())?;
    let name = operation.name().unwrap_or_default();
    Some(OperationError::new(name).set_details(errors.iter().map(Value::to_string)))
}
