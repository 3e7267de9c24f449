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

//! Error types for the PBX server

use thiserror::Error;

/// Result type for server operations
pub type Result<T> = std::result::Result<T, ServerError>;

/// PBX server error types
#[derive(Debug, Error)]
pub enum ServerError {
    /// I/O error from the listener or a connection
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error from the PBX core
    #[error("PBX error: {0}")]
    Core(#[from] pbx_core::PbxError),

    /// The server was asked to run while already running
    #[error("server is already running")]
    AlreadyRunning,

    /// Invalid configuration value
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            ServerError::AlreadyRunning.to_string(),
            "server is already running"
        );
        assert_eq!(
            ServerError::InvalidConfig("read_buffer_size must be non-zero".to_string())
                .to_string(),
            "invalid configuration: read_buffer_size must be non-zero"
        );
    }

    #[test]
    fn test_core_error_conversion() {
        let err = ServerError::from(pbx_core::PbxError::NotRegistered);
        assert!(matches!(err, ServerError::Core(_)));
    }
}
