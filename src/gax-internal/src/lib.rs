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

//! Implementation details for the operation waiters.
//!
//! This crate contains the HTTP transport used to poll operations, its
//! configuration, and the sources of authentication headers. The types are
//! not intended for general use: the provider configures a
//! [ReqwestClient][http::ReqwestClient] once and hands it to the waiters.

pub mod credentials;
pub mod http;
pub mod options;
