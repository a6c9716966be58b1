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

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A typed view over the JSON representation of an operation.
///
/// Services disagree on the shape of their operations. Some follow
/// [AIP-151] and report a boolean `done`, with the outcome in `error` or
/// `response`. Others (Compute Engine, Cloud SQL) report a `status` enum and
/// a list of errors. This type captures the union of the fields the waiters
/// need, and preserves any other field in [extra][Operation::extra].
///
/// The waiter replaces its copy of the operation on every poll. Nothing here
/// is ever patched in place.
///
/// [AIP-151]: https://google.aip.dev/151
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
#[non_exhaustive]
pub struct Operation {
    /// The server-assigned name. Missing or empty names identify synchronous
    /// calls, see [Operation::name].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Set by AIP-151 services when the operation completes.
    pub done: bool,

    /// Set by services using a status enum, e.g. `PENDING`, `RUNNING`, `DONE`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    /// The full URL of the operation, when the service provides one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub self_link: Option<String>,

    /// The zone (name or URL) of zonal Compute Engine operations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,

    /// The region (name or URL) of regional Compute Engine operations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    /// The error reported by the operation, its schema depends on the service.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,

    /// Service-specific progress information.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,

    /// The result of a successful operation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,

    /// Any other fields returned by the service.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Operation {
    /// Interprets the raw JSON returned by the service as an operation.
    ///
    /// The handle must be a JSON object, and the known fields must have the
    /// expected types. Any other input is a malformed operation, and it is
    /// never retried.
    ///
    /// # Example
    /// ```
    /// # use tpg_lro::Operation;
    /// use serde_json::json;
    /// let op = Operation::from_handle(json!({"name": "operations/op-123"}))?;
    /// assert_eq!(op.name(), Some("operations/op-123"));
    /// assert!(!op.done);
    ///
    /// let err = Operation::from_handle(json!(["not", "an", "operation"])).unwrap_err();
    /// assert!(err.is_malformed_operation(), "{err:?}");
    /// # Ok::<(), tpg_lro::Error>(())
    /// ```
    pub fn from_handle(handle: Value) -> Result<Self> {
        if !handle.is_object() {
            return Err(Error::malformed_operation(format!(
                "expected a JSON object as the operation handle, got {}",
                json_type(&handle)
            )));
        }
        serde_json::from_value(handle).map_err(Error::malformed_operation)
    }

    /// The name of the operation.
    ///
    /// Returns `None` if the name is missing *or* empty. Both mean the call
    /// that returned this handle completed synchronously.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref().filter(|n| !n.is_empty())
    }
}

fn json_type(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use test_case::test_case;

    #[test]
    fn aip151() -> anyhow::Result<()> {
        let op = Operation::from_handle(json!({
            "name": "projects/p/locations/us-central1/operations/op-123",
            "done": true,
            "metadata": {"@type": "type.googleapis.com/google.cloud.datastream.v1.OperationMetadata"},
            "response": {"name": "projects/p/locations/us-central1/streams/s"},
        }))?;
        assert_eq!(
            op.name(),
            Some("projects/p/locations/us-central1/operations/op-123")
        );
        assert!(op.done);
        assert!(op.metadata.is_some(), "{op:?}");
        assert_eq!(
            op.response,
            Some(json!({"name": "projects/p/locations/us-central1/streams/s"}))
        );
        assert!(op.error.is_none(), "{op:?}");
        assert!(op.extra.is_empty(), "{op:?}");
        Ok(())
    }

    #[test]
    fn compute() -> anyhow::Result<()> {
        let op = Operation::from_handle(json!({
            "kind": "compute#operation",
            "id": "1234567890",
            "name": "operation-123",
            "status": "RUNNING",
            "zone": "https://www.googleapis.com/compute/v1/projects/p/zones/us-central1-a",
            "selfLink": "https://www.googleapis.com/compute/v1/projects/p/zones/us-central1-a/operations/operation-123",
        }))?;
        assert_eq!(op.name(), Some("operation-123"));
        assert!(!op.done);
        assert_eq!(op.status.as_deref(), Some("RUNNING"));
        assert!(op.self_link.is_some(), "{op:?}");
        assert!(op.zone.is_some(), "{op:?}");
        assert!(op.region.is_none(), "{op:?}");
        assert_eq!(op.extra.get("kind"), Some(&json!("compute#operation")));
        assert_eq!(op.extra.get("id"), Some(&json!("1234567890")));
        Ok(())
    }

    #[test]
    fn null_fields() -> anyhow::Result<()> {
        let op = Operation::from_handle(json!({"name": "op", "error": null, "response": null}))?;
        assert!(op.error.is_none(), "{op:?}");
        assert!(op.response.is_none(), "{op:?}");
        Ok(())
    }

    #[test_case(json!({}); "missing")]
    #[test_case(json!({"name": ""}); "empty")]
    #[test_case(json!({"name": null}); "null")]
    fn synchronous(handle: Value) -> anyhow::Result<()> {
        let op = Operation::from_handle(handle)?;
        assert_eq!(op.name(), None, "{op:?}");
        Ok(())
    }

    #[test_case(Value::Null; "null")]
    #[test_case(json!("operations/op-123"); "string")]
    #[test_case(json!(42); "number")]
    #[test_case(json!([{"name": "op"}]); "array")]
    #[test_case(json!({"name": 42}); "ill-typed name")]
    #[test_case(json!({"name": "op", "done": "yes"}); "ill-typed done")]
    #[test_case(json!({"name": "op", "selfLink": ["a"]}); "ill-typed self link")]
    fn malformed(handle: Value) {
        let err = Operation::from_handle(handle).unwrap_err();
        assert!(err.is_malformed_operation(), "{err:?}");
    }

    #[test]
    fn serialize() -> anyhow::Result<()> {
        let input = json!({
            "name": "operation-123",
            "done": false,
            "status": "DONE",
            "selfLink": "https://example.com/operation-123",
            "targetProject": "p",
        });
        let op = Operation::from_handle(input.clone())?;
        let got = serde_json::to_value(&op)?;
        assert_eq!(got, input);
        Ok(())
    }
}
