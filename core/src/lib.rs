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

//! PBX Core - Telephone unit state machine and extension registry
//!
//! This crate is the heart of the PBX simulation: a concurrent finite state
//! machine for "telephone units" (one per client connection) and the registry
//! that maps extension numbers to units and coordinates shutdown.
//!
//! # Overview
//!
//! Each accepted client socket is wrapped in a [`Tu`]. A [`Pbx`] assigns the
//! unit an [`Extension`] and mediates calls between units. All state
//! transitions ([`Tu::pickup`], [`Tu::hangup`], [`Tu::dial`], [`Tu::chat`])
//! notify the affected clients with one line per affected socket, written
//! while the unit's lock is held so bytes on a connection never interleave.
//!
//! Two-party transitions (dialing, answering, hanging up on a live call) take
//! both units' locks in a total order derived from each unit's [`TuId`] and
//! re-validate the peer link after acquiring them, so concurrent commands on
//! the two ends cannot deadlock or observe a half-linked call.
//!
//! The registry lock is strictly above the unit locks in the hierarchy: no
//! registry operation holds its lock while acquiring a unit lock.
//!
//! # Quick Start
//!
//! ```no_run
//! use pbx_core::{Extension, Pbx, PbxConfig, Tu};
//! use std::net::TcpListener;
//!
//! # fn main() -> pbx_core::Result<()> {
//! let pbx = Pbx::new(PbxConfig::default());
//!
//! let listener = TcpListener::bind("0.0.0.0:3333")?;
//! let (socket, _) = listener.accept()?;
//!
//! // The caller picks the extension; the socket fd is a common choice.
//! let tu = Tu::new(socket)?;
//! pbx.register(&tu, Extension::new(4))?;
//!
//! tu.pickup()?; // client sees "DIAL TONE\r\n"
//!
//! pbx.unregister(&tu)?;
//! pbx.shutdown();
//! # Ok(())
//! # }
//! ```

mod codec;
mod config;
mod error;
mod pbx;
mod tu;
mod types;

#[cfg(test)]
pub(crate) mod testutil;

pub use codec::{next_line, Command, Notification, LINE_TERMINATOR};
pub use config::{PbxConfig, DEFAULT_MAX_EXTENSIONS};
pub use error::{PbxError, Result};
pub use pbx::Pbx;
pub use tu::Tu;
pub use types::{Extension, PbxSnapshot, TuId, TuState};
