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

//! Authentication headers for the poll requests.
//!
//! Resolving credentials (service account keys, impersonation, metadata
//! server, etc.) is the job of the provider configuration. The transport
//! only needs a source of auth headers, which is what [Credentials] wraps.

use gax::error::CredentialsError;
use http::HeaderMap;
use std::sync::Arc;

pub type Result<T> = std::result::Result<T, CredentialsError>;

/// Implemented by all sources of authentication headers.
///
/// Implement this trait to plug a custom credential type into the transport,
/// or to mock credentials in tests.
pub trait CredentialsProvider: std::fmt::Debug {
    /// Asynchronously computes the auth headers for a request.
    fn headers(&self) -> impl Future<Output = Result<HeaderMap>> + Send;
}

pub(crate) mod dynamic {
    use super::Result;
    use http::HeaderMap;

    /// A dyn-compatible, crate-private version of `CredentialsProvider`.
    #[async_trait::async_trait]
    pub trait CredentialsProvider: Send + Sync + std::fmt::Debug {
        async fn headers(&self) -> Result<HeaderMap>;
    }

    #[async_trait::async_trait]
    impl<T> CredentialsProvider for T
    where
        T: super::CredentialsProvider + Send + Sync,
    {
        async fn headers(&self) -> Result<HeaderMap> {
            T::headers(self).await
        }
    }
}

/// A cloneable handle to a source of auth headers.
#[derive(Clone, Debug)]
pub struct Credentials {
    inner: Arc<dyn dynamic::CredentialsProvider>,
}

impl Credentials {
    pub async fn headers(&self) -> Result<HeaderMap> {
        self.inner.headers().await
    }
}

impl<T> std::convert::From<T> for Credentials
where
    T: CredentialsProvider + Send + Sync + 'static,
{
    fn from(value: T) -> Self {
        Self {
            inner: Arc::new(value),
        }
    }
}

pub mod anonymous {
    //! Credentials that do not add any headers.
    //!
    //! Useful with emulators and in tests.

    use super::{Credentials, CredentialsProvider, Result};
    use http::HeaderMap;

    #[derive(Debug)]
    struct AnonymousCredentials;

    impl CredentialsProvider for AnonymousCredentials {
        async fn headers(&self) -> Result<HeaderMap> {
            Ok(HeaderMap::new())
        }
    }

    /// A builder for creating anonymous credentials.
    #[derive(Debug, Default)]
    pub struct Builder {}

    impl Builder {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn build(self) -> Credentials {
            Credentials::from(AnonymousCredentials)
        }
    }
}

pub mod access_token {
    //! Credentials using a fixed OAuth2 access token.
    //!
    //! The provider accepts a raw access token, e.g. from
    //! `GOOGLE_OAUTH_ACCESS_TOKEN`. These tokens are never refreshed, once
    //! they expire all requests fail with `UNAUTHENTICATED`.

    use super::{Credentials, CredentialsProvider, Result};
    use gax::error::CredentialsError;
    use http::{HeaderMap, HeaderValue, header::AUTHORIZATION};

    struct AccessTokenCredentials {
        token: String,
    }

    // Never print the token.
    impl std::fmt::Debug for AccessTokenCredentials {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("AccessTokenCredentials")
                .field("token", &"[censored]")
                .finish()
        }
    }

    impl CredentialsProvider for AccessTokenCredentials {
        async fn headers(&self) -> Result<HeaderMap> {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", self.token))
                .map_err(|e| CredentialsError::new(false, e))?;
            value.set_sensitive(true);
            let mut headers = HeaderMap::new();
            headers.insert(AUTHORIZATION, value);
            Ok(headers)
        }
    }

    /// A builder for access token credentials.
    #[derive(Debug)]
    pub struct Builder {
        token: String,
    }

    impl Builder {
        pub fn new<T: Into<String>>(token: T) -> Self {
            Self {
                token: token.into(),
            }
        }

        pub fn build(self) -> Credentials {
            Credentials::from(AccessTokenCredentials { token: self.token })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header::AUTHORIZATION;

    #[derive(Debug)]
    struct Failing;

    impl CredentialsProvider for Failing {
        async fn headers(&self) -> Result<HeaderMap> {
            Err(CredentialsError::from_msg(true, "metadata server unreachable"))
        }
    }

    #[tokio::test]
    async fn anonymous() -> anyhow::Result<()> {
        let creds = anonymous::Builder::new().build();
        let headers = creds.headers().await?;
        assert!(headers.is_empty(), "{headers:?}");
        Ok(())
    }

    #[tokio::test]
    async fn access_token() -> anyhow::Result<()> {
        let creds = access_token::Builder::new("test-token").build();
        let headers = creds.headers().await?;
        let value = headers.get(AUTHORIZATION).unwrap();
        assert_eq!(value.to_str()?, "Bearer test-token");
        assert!(value.is_sensitive(), "{value:?}");

        let fmt = format!("{creds:?}");
        assert!(!fmt.contains("test-token"), "{fmt}");
        Ok(())
    }

    #[tokio::test]
    async fn access_token_invalid() {
        let creds = access_token::Builder::new("bad\ntoken").build();
        let err = creds.headers().await.unwrap_err();
        assert!(!err.is_transient(), "{err:?}");
    }

    #[tokio::test]
    async fn custom_provider() {
        let creds = Credentials::from(Failing);
        let err = creds.clone().headers().await.unwrap_err();
        assert!(err.is_transient(), "{err:?}");
        assert!(err.to_string().contains("unreachable"), "{err}");
    }
}
