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

//! Registry configuration

use crate::error::{PbxError, Result};

/// Default number of extension slots in the registry.
pub const DEFAULT_MAX_EXTENSIONS: usize = 1024;

/// PBX registry configuration
#[derive(Debug, Clone)]
pub struct PbxConfig {
    /// Number of extension slots; valid extensions are `0..max_extensions`.
    pub max_extensions: usize,
}

impl Default for PbxConfig {
    fn default() -> Self {
        Self {
            max_extensions: DEFAULT_MAX_EXTENSIONS,
        }
    }
}

impl PbxConfig {
    /// Set the number of extension slots
    pub fn with_max_extensions(mut self, max_extensions: usize) -> Self {
        self.max_extensions = max_extensions;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_extensions == 0 {
            return Err(PbxError::InvalidConfig(
                "max_extensions must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
