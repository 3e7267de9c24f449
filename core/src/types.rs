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

//! Core types for the PBX

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identifier for a telephone unit (monotonically increasing, never
/// reused). The identifier doubles as the total order in which two unit
/// locks are acquired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TuId(u64);

impl TuId {
    /// Allocate the next process-unique identifier.
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the underlying u64 value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TuId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tu-{}", self.0)
    }
}

/// Extension number under which a telephone unit is registered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Extension(u32);

impl Extension {
    /// Create an extension from its number
    pub fn new(number: u32) -> Self {
        Self(number)
    }

    /// Get the underlying number
    pub fn as_u32(&self) -> u32 {
        self.0
    }

    /// The registry slot index this extension occupies
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Extension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// State of a telephone unit, as seen by its client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TuState {
    /// Handset on the switchhook, no call in progress
    OnHook,
    /// An incoming call is ringing this unit
    Ringing,
    /// Handset lifted, ready to dial
    DialTone,
    /// Waiting for the dialed party to answer
    RingBack,
    /// The dialed party was unavailable (or was this unit itself)
    BusySignal,
    /// In a call with a peer unit
    Connected,
    /// Dialed an extension with no unit behind it
    Error,
}

impl TuState {
    /// States in which the unit is linked to a peer.
    pub fn has_peer(self) -> bool {
        matches!(self, Self::Ringing | Self::RingBack | Self::Connected)
    }

    /// Check whether the unit is idle (no call, nothing ringing).
    pub fn is_idle(self) -> bool {
        matches!(self, Self::OnHook | Self::DialTone)
    }
}

impl fmt::Display for TuState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OnHook => write!(f, "on hook"),
            Self::Ringing => write!(f, "ringing"),
            Self::DialTone => write!(f, "dial tone"),
            Self::RingBack => write!(f, "ring back"),
            Self::BusySignal => write!(f, "busy signal"),
            Self::Connected => write!(f, "connected"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Registry snapshot for non-blocking debug information
#[derive(Debug, Clone)]
pub struct PbxSnapshot {
    /// Number of registered telephone units
    pub active: usize,
    /// Total number of extension slots
    pub capacity: usize,
    /// Extensions currently occupied
    pub occupied: Vec<Extension>,
}

impl fmt::Display for PbxSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Pbx {{ active: {}, capacity: {} }}",
            self.active, self.capacity
        )
    }
}
