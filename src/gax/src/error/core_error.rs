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

use super::CredentialsError;
use super::OperationError;
use super::rpc::Status;
use http::HeaderMap;
use std::error::Error as StdError;

type BoxError = Box<dyn StdError + Send + Sync>;

/// The core error returned by the operation waiters.
///
/// Waiting for an operation fails in several distinct ways:
/// - a poll request could not be sent or was rejected by the service,
/// - the wait budget elapsed before the operation reached a terminal state,
/// - the operation completed, but reported a failure,
/// - the handle returned by the triggering request is not an operation.
///
/// This type offers a series of predicates to determine the error kind, and
/// accessors to query the most common error details. Applications can query
/// the error [source][std::error::Error::source] for deeper information.
///
/// # Example
/// ```
/// use tpg_gax::error::Error;
/// match example_function() {
///     Err(e) if e.is_operation() => {
///         println!("the operation failed, the resource was not created: {e}");
///     },
///     Err(e) if e.is_timeout() => { println!("the operation may still be running {e}"); },
///     Err(e) => { println!("some other error {e}"); },
///     Ok(_) => { println!("success, how boring"); },
/// }
///
/// fn example_function() -> Result<String, Error> {
///     // ... details omitted ...
///     # use tpg_gax::error::rpc::{Code, Status};
///     # Err(Error::service(Status::default().set_code(Code::NotFound).set_message("NOT FOUND")))
/// }
/// ```
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    source: Option<BoxError>,
}

impl Error {
    /// Creates an error with the information returned by Google Cloud services.
    ///
    /// # Example
    /// ```
    /// use tpg_gax::error::Error;
    /// use tpg_gax::error::rpc::{Code, Status};
    /// let status = Status::default().set_code(Code::NotFound).set_message("NOT FOUND");
    /// let error = Error::service(status.clone());
    /// assert_eq!(error.status(), Some(&status));
    /// ```
    pub fn service(status: Status) -> Self {
        Self::service_with_http_metadata(status, None, None)
    }

    /// Creates a service error that also carries the HTTP response metadata.
    pub fn service_with_http_metadata(
        status: Status,
        status_code: Option<u16>,
        headers: Option<HeaderMap>,
    ) -> Self {
        let details = ServiceDetails {
            status_code,
            headers,
            payload: None,
            status,
        };
        Self {
            kind: ErrorKind::Service(Box::new(details)),
            source: None,
        }
    }

    /// Creates a service error from a complete HTTP error response.
    ///
    /// The raw `payload` is kept, some services only report the cause in
    /// fields the [Status] does not capture, such as `error.errors[].reason`.
    ///
    /// # Example
    /// ```
    /// use tpg_gax::error::Error;
    /// use tpg_gax::error::rpc::Status;
    /// let payload = bytes::Bytes::from_static(
    ///     br#"{"error": {"code": 409, "message": "busy", "errors": [{"reason": "operationInProgress"}]}}"#);
    /// let status = Status::try_from(&payload)?;
    /// let error = Error::service_with_http_response(status, 409, http::HeaderMap::new(), payload.clone());
    /// assert_eq!(error.http_status_code(), Some(409));
    /// assert_eq!(error.http_payload(), Some(&payload));
    /// # Ok::<(), Error>(())
    /// ```
    pub fn service_with_http_response(
        status: Status,
        status_code: u16,
        headers: HeaderMap,
        payload: bytes::Bytes,
    ) -> Self {
        let details = ServiceDetails {
            status_code: Some(status_code),
            headers: Some(headers),
            payload: Some(payload),
            status,
        };
        Self {
            kind: ErrorKind::Service(Box::new(details)),
            source: None,
        }
    }

    /// Creates an error representing a timeout.
    ///
    /// # Example
    /// ```
    /// use std::error::Error as _;
    /// use tpg_gax::error::Error;
    /// let error = Error::timeout("simulated timeout");
    /// assert!(error.is_timeout());
    /// assert!(error.source().is_some());
    /// ```
    pub fn timeout<T: Into<BoxError>>(source: T) -> Self {
        Self {
            kind: ErrorKind::Timeout,
            source: Some(source.into()),
        }
    }

    /// The wait could not complete before its deadline.
    ///
    /// This is always a client-side generated error. A single request that
    /// times out is an [io][Error::is_io] error instead, and the waiters
    /// keep polling after it. When returned by a
    /// waiter, the operation may still be running in the service. Google
    /// Cloud does not cancel operations because a client stopped waiting.
    ///
    /// # Troubleshooting
    ///
    /// Some operations (e.g. creating a cluster) routinely take tens of
    /// minutes. Consider increasing the timeout for the resource.
    pub fn is_timeout(&self) -> bool {
        matches!(self.kind, ErrorKind::Timeout)
    }

    /// Creates an error representing an exhausted polling policy.
    ///
    /// # Example
    /// ```
    /// use std::error::Error as _;
    /// use tpg_gax::error::Error;
    /// let error = Error::exhausted("too many polling attempts");
    /// assert!(error.is_exhausted());
    /// assert!(error.source().is_some());
    /// ```
    pub fn exhausted<T: Into<BoxError>>(source: T) -> Self {
        Self {
            kind: ErrorKind::Exhausted,
            source: Some(source.into()),
        }
    }

    /// The polling policy stopped the loop before the operation completed.
    ///
    /// This is always a client-side generated error, but it may be the result
    /// of multiple errors received from the service.
    pub fn is_exhausted(&self) -> bool {
        matches!(self.kind, ErrorKind::Exhausted)
    }

    /// Creates an error for an operation that completed with a failure.
    ///
    /// # Example
    /// ```
    /// use tpg_gax::error::{Error, OperationError};
    /// let error = Error::operation(OperationError::new("op-1").set_details(["d1", "d2"]));
    /// assert!(error.is_operation());
    /// assert_eq!(error.to_string(), "d1\nd2");
    /// ```
    pub fn operation(error: OperationError) -> Self {
        Self {
            kind: ErrorKind::Operation(Box::new(error)),
            source: None,
        }
    }

    /// The operation completed, but reported a failure.
    ///
    /// Unlike all other errors, this indicates the service executed the
    /// request and rejected it. The triggering create, update, or delete
    /// should be treated as not applied.
    pub fn is_operation(&self) -> bool {
        matches!(self.kind, ErrorKind::Operation(_))
    }

    /// The details of a failed operation.
    pub fn operation_error(&self) -> Option<&OperationError> {
        match &self.kind {
            ErrorKind::Operation(e) => Some(e.as_ref()),
            _ => None,
        }
    }

    /// Creates an error for a value that cannot be interpreted as an
    /// operation.
    ///
    /// # Example
    /// ```
    /// use tpg_gax::error::Error;
    /// let error = Error::malformed_operation("expected a JSON object");
    /// assert!(error.is_malformed_operation());
    /// ```
    pub fn malformed_operation<T: Into<BoxError>>(source: T) -> Self {
        Self {
            kind: ErrorKind::MalformedOperation,
            source: Some(source.into()),
        }
    }

    /// The operation handle could not be interpreted as an operation.
    ///
    /// This error is never retried. It typically indicates the triggering
    /// request returned something other than an operation, or the wrong
    /// waiter was used for the service.
    pub fn is_malformed_operation(&self) -> bool {
        matches!(self.kind, ErrorKind::MalformedOperation)
    }

    /// Creates an error representing a deserialization problem.
    ///
    /// # Example
    /// ```
    /// use std::error::Error as _;
    /// use tpg_gax::error::Error;
    /// let error = Error::deser("simulated problem");
    /// assert!(error.is_deserialization());
    /// assert!(error.source().is_some());
    /// ```
    pub fn deser<T: Into<BoxError>>(source: T) -> Self {
        Self {
            kind: ErrorKind::Deserialization,
            source: Some(source.into()),
        }
    }

    /// The response, or the operation payload, could not be deserialized.
    ///
    /// # Troubleshooting
    ///
    /// The most common cause is a mismatch between the type the caller
    /// expects in the operation `response` field and the type the service
    /// actually returns.
    pub fn is_deserialization(&self) -> bool {
        matches!(self.kind, ErrorKind::Deserialization)
    }

    /// Creates an error representing a serialization problem.
    ///
    /// # Example
    /// ```
    /// use std::error::Error as _;
    /// use tpg_gax::error::Error;
    /// let error = Error::ser("simulated problem");
    /// assert!(error.is_serialization());
    /// assert!(error.source().is_some());
    /// ```
    pub fn ser<T: Into<BoxError>>(source: T) -> Self {
        Self {
            kind: ErrorKind::Serialization,
            source: Some(source.into()),
        }
    }

    /// The request could not be serialized.
    ///
    /// This is always a client-side generated error, generated before the
    /// request is made. This error is never transient.
    pub fn is_serialization(&self) -> bool {
        matches!(self.kind, ErrorKind::Serialization)
    }

    /// Creates an error representing a problem creating the auth headers.
    pub fn authentication(source: CredentialsError) -> Self {
        Self {
            kind: ErrorKind::Authentication,
            source: Some(source.into()),
        }
    }

    /// The request could not be authenticated.
    pub fn is_authentication(&self) -> bool {
        matches!(self.kind, ErrorKind::Authentication)
    }

    /// The [Status] payload associated with this error.
    ///
    /// # Example
    /// ```
    /// use tpg_gax::error::{Error, rpc::{Code, Status}};
    /// let error = Error::service(Status::default().set_code(Code::NotFound));
    /// if let Some(status) = error.status() {
    ///     if status.code == Code::NotFound {
    ///         println!("the operation is gone, more details in {:?}", status.details);
    ///     }
    /// }
    /// ```
    pub fn status(&self) -> Option<&Status> {
        match &self.kind {
            ErrorKind::Service(d) => Some(&d.as_ref().status),
            ErrorKind::Operation(e) => e.status(),
            _ => None,
        }
    }

    /// The HTTP status code, if any, associated with this error.
    pub fn http_status_code(&self) -> Option<u16> {
        match &self.kind {
            ErrorKind::Transport(d) => d.as_ref().status_code,
            ErrorKind::Service(d) => d.as_ref().status_code,
            _ => None,
        }
    }

    /// The headers, if any, associated with this error.
    pub fn http_headers(&self) -> Option<&http::HeaderMap> {
        match &self.kind {
            ErrorKind::Transport(d) => d.as_ref().headers.as_ref(),
            ErrorKind::Service(d) => d.as_ref().headers.as_ref(),
            _ => None,
        }
    }

    /// The payload, if any, associated with this error.
    ///
    /// Set for any error created from an HTTP response, whether or not the
    /// body parsed as a Google Cloud error envelope.
    pub fn http_payload(&self) -> Option<&bytes::Bytes> {
        match &self.kind {
            ErrorKind::Transport(d) => d.payload.as_ref(),
            ErrorKind::Service(d) => d.payload.as_ref(),
            _ => None,
        }
    }

    /// Creates an error from an HTTP response without a parseable status.
    pub fn http(status_code: u16, headers: HeaderMap, payload: bytes::Bytes) -> Self {
        let details = TransportDetails {
            status_code: Some(status_code),
            headers: Some(headers),
            payload: Some(payload),
        };
        Self {
            kind: ErrorKind::Transport(Box::new(details)),
            source: None,
        }
    }

    /// Creates an error for a request that did not produce a response.
    pub fn io<T: Into<BoxError>>(source: T) -> Self {
        let details = TransportDetails {
            status_code: None,
            headers: None,
            payload: None,
        };
        Self {
            kind: ErrorKind::Transport(Box::new(details)),
            source: Some(source.into()),
        }
    }

    /// A problem sending the request, or receiving the response.
    pub fn is_io(&self) -> bool {
        matches!(
        &self.kind,
        ErrorKind::Transport(d) if matches!(**d, TransportDetails {
            status_code: None,
            headers: None,
            payload: None,
        }))
    }

    /// Any error reported by the HTTP transport, with or without a response.
    pub fn is_transport(&self) -> bool {
        matches!(&self.kind, ErrorKind::Transport(_))
    }

    pub(crate) fn is_transient_and_before_rpc(&self) -> bool {
        if !matches!(&self.kind, ErrorKind::Authentication) {
            return false;
        }
        self.source
            .as_ref()
            .and_then(|e| e.downcast_ref::<CredentialsError>())
            .map(|e| e.is_transient())
            .unwrap_or(false)
    }

    /// The body of an HTTP error as text, whether or not it was parsed.
    ///
    /// Service errors built without a payload fall back to the status
    /// message and details.
    pub(crate) fn http_body_text(&self) -> Option<String> {
        match &self.kind {
            ErrorKind::Transport(d) => d
                .payload
                .as_ref()
                .map(|p| String::from_utf8_lossy(p).into_owned()),
            ErrorKind::Service(d) => Some(match &d.payload {
                Some(p) => String::from_utf8_lossy(p).into_owned(),
                None => format!(
                    "{} {}",
                    d.status.message,
                    serde_json::Value::from(d.status.details.clone())
                ),
            }),
            _ => None,
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.kind, &self.source) {
            (ErrorKind::Serialization, Some(e)) => write!(f, "cannot serialize the request {e}"),
            (ErrorKind::Deserialization, Some(e)) => {
                write!(f, "cannot deserialize the response {e}")
            }
            (ErrorKind::Authentication, Some(e)) => {
                write!(f, "cannot create the authentication headers {e}")
            }
            (ErrorKind::Timeout, Some(e)) => {
                write!(f, "the wait exceeded its deadline {e}")
            }
            (ErrorKind::Exhausted, Some(e)) => {
                write!(f, "{e}")
            }
            (ErrorKind::MalformedOperation, Some(e)) => {
                write!(f, "the value is not a valid operation: {e}")
            }
            (ErrorKind::Operation(e), _) => write!(f, "{e}"),
            (ErrorKind::Transport(details), _) => details.display(self.source(), f),
            (ErrorKind::Service(d), _) => {
                write!(
                    f,
                    "the service reports an error with code {} described as: {}",
                    d.status.code, d.status.message
                )
            }
            (_, None) => unreachable!("no constructor allows this"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            ErrorKind::Operation(e) => Some(e.as_ref()),
            _ => self
                .source
                .as_ref()
                .map(|e| e.as_ref() as &(dyn std::error::Error)),
        }
    }
}

/// The type of error held by an [Error] instance.
#[derive(Debug)]
enum ErrorKind {
    Serialization,
    Deserialization,
    Authentication,
    Timeout,
    Exhausted,
    MalformedOperation,
    Operation(Box<OperationError>),
    Transport(Box<TransportDetails>),
    Service(Box<ServiceDetails>),
}

#[derive(Debug)]
struct TransportDetails {
    status_code: Option<u16>,
    headers: Option<HeaderMap>,
    payload: Option<bytes::Bytes>,
}

impl TransportDetails {
    fn display(
        &self,
        source: Option<&(dyn StdError + 'static)>,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match (source, &self) {
            (
                _,
                TransportDetails {
                    status_code: Some(code),
                    payload: Some(p),
                    ..
                },
            ) => {
                if let Ok(message) = std::str::from_utf8(p.as_ref()) {
                    write!(f, "the HTTP transport reports a [{code}] error: {message}")
                } else {
                    write!(f, "the HTTP transport reports a [{code}] error: {p:?}")
                }
            }
            (Some(source), _) => {
                write!(f, "the transport reports an error: {source}")
            }
            (None, _) => unreachable!("no Error constructor allows this"),
        }
    }
}

#[derive(Debug)]
struct ServiceDetails {
    status_code: Option<u16>,
    headers: Option<HeaderMap>,
    payload: Option<bytes::Bytes>,
    status: Status,
}
