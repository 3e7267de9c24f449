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

//! Error types for the PBX core

use crate::types::Extension;
use thiserror::Error;

/// Result type for operations
pub type Result<T> = std::result::Result<T, PbxError>;

/// PBX error types
#[derive(Debug, Error)]
pub enum PbxError {
    /// I/O error from the underlying TCP stream
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Extension number outside the registry's slot range
    #[error("extension {0} is out of range")]
    ExtensionOutOfRange(Extension),

    /// Another telephone unit already occupies the extension
    #[error("extension {0} is already in use")]
    ExtensionInUse(Extension),

    /// The telephone unit was already assigned an extension
    #[error("telephone unit already has an extension")]
    ExtensionAssigned,

    /// The telephone unit is not registered with this PBX
    #[error("telephone unit is not registered")]
    NotRegistered,

    /// No telephone unit behind the dialed extension
    #[error("no telephone unit at the dialed extension")]
    NoSuchTarget,

    /// Chat attempted outside of a connected call
    #[error("no call in progress")]
    NoCallInProgress,

    /// Invalid configuration value
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl PbxError {
    /// Check if the error reports an invalid argument
    ///
    /// Invalid-argument errors indicate the caller handed the registry a
    /// value it could never accept, as opposed to a call that merely failed
    /// to connect.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(
            self,
            PbxError::ExtensionOutOfRange(_)
                | PbxError::ExtensionInUse(_)
                | PbxError::ExtensionAssigned
                | PbxError::NotRegistered
        )
    }

    /// Check if the error is an I/O error
    pub fn is_io(&self) -> bool {
        matches!(self, PbxError::Io(_))
    }
}
