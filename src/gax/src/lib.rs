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

//! Common types shared by the operation waiters in the Google Cloud
//! Terraform provider.
//!
//! This crate contains the error model, the policies controlling polling
//! loops, and the per-request options. The types are independent of any
//! particular service: each service specializes the waiter by describing the
//! shape of its operations, while the loop control lives here.

/// An alias of [std::result::Result] where the error is always [Error][crate::error::Error].
///
/// This is the result type used by all functions wrapping RPCs.
pub type Result<T> = std::result::Result<T, crate::error::Error>;

pub mod error;
pub mod exponential_backoff;
pub mod loop_state;
pub mod options;
pub mod polling_backoff_policy;
pub mod polling_error_policy;
