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

use super::rpc::Status;

/// The error reported by a long-running operation that completed with a
/// failure.
///
/// The service accepted the request that started the operation, the operation
/// ran, and it failed. Callers typically treat the triggering create, update,
/// or delete as not applied.
///
/// The error keeps the raw detail payloads, in the order the service reported
/// them, as compact JSON. Some services also report structured validation
/// results in the operation metadata; the waiters append the failed entries
/// to the same list.
///
/// # Example
/// ```
/// use tpg_gax::error::OperationError;
/// let error = OperationError::new("operations/op-123")
///     .set_details(["first problem", "second problem"]);
/// assert_eq!(error.to_string(), "first problem\nsecond problem");
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
#[non_exhaustive]
pub struct OperationError {
    name: String,
    details: Vec<String>,
    status: Option<Status>,
}

impl OperationError {
    /// Creates an error for the operation called `name`, without details.
    pub fn new<T: Into<String>>(name: T) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Replaces the raw detail payloads.
    pub fn set_details<T, I>(mut self, v: T) -> Self
    where
        T: IntoIterator<Item = I>,
        I: Into<String>,
    {
        self.details = v.into_iter().map(|v| v.into()).collect();
        self
    }

    /// Appends one raw detail payload.
    pub fn push_detail<T: Into<String>>(&mut self, v: T) {
        self.details.push(v.into());
    }

    /// Sets the status reported by the operation, if any.
    pub fn set_status<T: Into<Option<Status>>>(mut self, v: T) -> Self {
        self.status = v.into();
        self
    }

    /// The name of the failed operation.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The raw detail payloads, in the order reported by the service.
    pub fn details(&self) -> &[String] {
        &self.details
    }

    /// The code and message reported by the operation, if the service uses
    /// the `google.rpc.Status` error model.
    pub fn status(&self) -> Option<&Status> {
        self.status.as_ref()
    }
}

impl std::fmt::Display for OperationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if !self.details.is_empty() {
            return f.write_str(&self.details.join("\n"));
        }
        match &self.status {
            Some(s) => write!(
                f,
                "operation {} failed with code {}: {}",
                self.name, s.code, s.message
            ),
            None => write!(f, "operation {} failed without details", self.name),
        }
    }
}

impl std::error::Error for OperationError {}
