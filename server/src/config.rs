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

//! Server configuration

use crate::error::{Result, ServerError};
use pbx_core::PbxConfig;
use std::net::SocketAddr;

/// Default read chunk size for the per-connection loop.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 2048;

/// PBX server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the listener binds to
    pub bind_address: SocketAddr,
    /// Size of the per-connection read chunk. Lines themselves are
    /// unbounded; this only sizes the read(2) calls.
    pub read_buffer_size: usize,
    /// Number of extension slots in the registry
    pub max_extensions: usize,
}

impl ServerConfig {
    /// Create a configuration binding to the given address
    pub fn new(bind_address: SocketAddr) -> Self {
        Self {
            bind_address,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            max_extensions: pbx_core::DEFAULT_MAX_EXTENSIONS,
        }
    }

    /// Set the read chunk size
    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size;
        self
    }

    /// Set the number of extension slots
    pub fn with_max_extensions(mut self, max_extensions: usize) -> Self {
        self.max_extensions = max_extensions;
        self
    }

    /// The registry configuration this server configuration implies
    pub fn pbx_config(&self) -> PbxConfig {
        PbxConfig::default().with_max_extensions(self.max_extensions)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.read_buffer_size == 0 {
            return Err(ServerError::InvalidConfig(
                "read_buffer_size must be non-zero".to_string(),
            ));
        }
        self.pbx_config().validate()?;
        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new(SocketAddr::from(([0, 0, 0, 0], 0)))
    }
}
