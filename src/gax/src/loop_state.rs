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

//! Loop control for operation waiters.
//!
//! Applications only need these types when implementing their own polling
//! error policies.

use crate::error::Error;

/// What the polling loop should do after a failed poll.
#[derive(Debug)]
pub enum LoopState {
    /// The error will not go away, stop polling and return it.
    Permanent(Error),

    /// The error may go away, but the policy refuses more polls.
    ///
    /// For example, the policy only allows a fixed number of attempts.
    Exhausted(Error),

    /// The error may go away, poll again after the backoff period.
    Continue(Error),
}

impl LoopState {
    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::Permanent(_))
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted(_))
    }

    pub fn is_continue(&self) -> bool {
        matches!(self, Self::Continue(_))
    }

    /// Consumes the state, returning the error that produced it.
    pub fn into_error(self) -> Error {
        match self {
            Self::Permanent(e) | Self::Exhausted(e) | Self::Continue(e) => e,
        }
    }
}
