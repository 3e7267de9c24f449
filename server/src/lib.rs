//
// Copyright 2017-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! PBX Server - TCP front end for the PBX simulation
//!
//! This crate wraps [`pbx_core`] in a blocking, thread-per-connection TCP
//! server: an acceptor thread hands each connection to a dedicated service
//! thread, which registers a telephone unit, reads `\r\n`-terminated command
//! lines and dispatches them to the core, and unregisters the unit when the
//! client goes away.
//!
//! The `pbx` binary (`pbx -p <port>`) adds CLI parsing, logging setup, and
//! signal-driven shutdown on top of [`PbxServer`].

pub mod config;
pub mod connection;
pub mod error;
pub mod metrics;
pub mod server;
pub mod signal;

pub use config::{ServerConfig, DEFAULT_READ_BUFFER_SIZE};
pub use error::{Result, ServerError};
pub use metrics::{MetricsSnapshot, ServerMetrics};
pub use server::PbxServer;
