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

//! Extension registry
//!
//! The [`Pbx`] owns the dense extension → telephone-unit mapping and
//! coordinates shutdown. It is the one lock above the unit locks in the
//! hierarchy, and the hierarchy is strict: no registry operation holds the
//! registry lock while acquiring a unit lock. Registration greets the
//! client after the slot is published; unregistration tears the call down
//! after the slot is cleared; dialing resolves and pins the target under
//! the lock but transitions the units after releasing it; shutdown only
//! touches sockets, which needs no unit lock at all.

use crate::config::PbxConfig;
use crate::error::{PbxError, Result};
use crate::tu::Tu;
use crate::types::{Extension, PbxSnapshot};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// The PBX registry: extension slots plus the shutdown rendezvous.
pub struct Pbx {
    /// Slot table and active count, guarded by the registry lock
    registry: Mutex<Registry>,
    /// Signaled by [`Pbx::unregister`] when the last unit leaves
    drained: Condvar,
    /// Registry configuration
    config: PbxConfig,
}

struct Registry {
    /// `slots[e]` holds the unit registered at extension `e`
    slots: Vec<Option<Arc<Tu>>>,
    /// Number of occupied slots
    active: usize,
}

impl Pbx {
    /// Create a registry with `config.max_extensions` empty slots.
    pub fn new(config: PbxConfig) -> Self {
        Self {
            registry: Mutex::new(Registry {
                slots: vec![None; config.max_extensions],
                active: 0,
            }),
            drained: Condvar::new(),
            config,
        }
    }

    /// Total number of extension slots
    pub fn capacity(&self) -> usize {
        self.config.max_extensions
    }

    /// Number of currently registered units
    pub fn active_count(&self) -> usize {
        self.registry.lock().active
    }

    /// Point-in-time view of the registry
    pub fn snapshot(&self) -> PbxSnapshot {
        let registry = self.registry.lock();
        PbxSnapshot {
            active: registry.active,
            capacity: self.config.max_extensions,
            occupied: registry
                .slots
                .iter()
                .enumerate()
                .filter_map(|(index, slot)| slot.as_ref().map(|_| Extension::new(index as u32)))
                .collect(),
        }
    }

    /// Register a telephone unit at the given extension.
    ///
    /// The registry takes its own handle on the unit, assigns the extension
    /// and greets the client with `ON HOOK <ext>`. Fails if the extension is
    /// out of range or occupied, or if the unit was already registered (an
    /// extension is assigned at most once, ever).
    pub fn register(&self, tu: &Arc<Tu>, ext: Extension) -> Result<()> {
        let index = ext.index();
        if index >= self.config.max_extensions {
            return Err(PbxError::ExtensionOutOfRange(ext));
        }
        if tu.extension().is_some() {
            return Err(PbxError::ExtensionAssigned);
        }
        {
            let mut registry = self.registry.lock();
            if registry.slots[index].is_some() {
                return Err(PbxError::ExtensionInUse(ext));
            }
            registry.slots[index] = Some(Arc::clone(tu));
            registry.active += 1;
        }
        // The greeting takes the unit's lock, so it happens strictly after
        // the registry lock is released. If a concurrent register of the
        // same unit won the assignment race, give the slot back.
        if let Err(err) = tu.set_extension(ext) {
            let mut registry = self.registry.lock();
            if registry.slots[index]
                .as_ref()
                .is_some_and(|slot| Arc::ptr_eq(slot, tu))
            {
                registry.slots[index] = None;
                registry.active -= 1;
            }
            return Err(err);
        }
        debug!("telephone unit registered on extension {}", ext);
        Ok(())
    }

    /// Unregister a telephone unit.
    ///
    /// Clears the unit's slot, hangs up whatever call it was part of (which
    /// may notify the peer's client), drops the registry's handle, and wakes
    /// a pending [`Pbx::shutdown`] if this was the last unit. Fails if the
    /// unit is not the one registered at its extension.
    pub fn unregister(&self, tu: &Arc<Tu>) -> Result<()> {
        let ext = tu.extension().ok_or(PbxError::NotRegistered)?;
        let index = ext.index();
        let removed = {
            let mut registry = self.registry.lock();
            match registry.slots.get(index) {
                Some(Some(slot)) if Arc::ptr_eq(slot, tu) => {}
                _ => return Err(PbxError::NotRegistered),
            }
            registry.active -= 1;
            registry.slots[index].take()
        };
        // Call teardown takes unit locks, so it runs outside the registry
        // lock.
        if let Err(err) = tu.hangup() {
            warn!("teardown hangup on extension {} failed: {}", ext, err);
        }
        drop(removed);
        let registry = self.registry.lock();
        if registry.active == 0 {
            self.drained.notify_all();
        }
        debug!("telephone unit unregistered from extension {}", ext);
        Ok(())
    }

    /// Initiate a call from `origin` to the unit at `ext`.
    ///
    /// The target is resolved and pinned under the registry lock, then the
    /// lock is released before the unit layer runs the dial transition. An
    /// out-of-range or empty extension resolves to no target, which sends
    /// the originating unit to the error state.
    pub fn dial(&self, origin: &Arc<Tu>, ext: Extension) -> Result<()> {
        let target = {
            let registry = self.registry.lock();
            registry.slots.get(ext.index()).and_then(|slot| slot.clone())
        };
        origin.dial(target)
    }

    /// Shut down the PBX.
    ///
    /// Every registered unit's socket is shut down in both directions, which
    /// makes its service adapter's read return end-of-file; the adapters
    /// then unregister their units. Blocks until the registry is empty. The
    /// units are pinned while their sockets are shut so a concurrent
    /// unregister cannot destroy one mid-loop.
    pub fn shutdown(&self) {
        let mut registry = self.registry.lock();
        let pinned: Vec<Arc<Tu>> = registry.slots.iter().flatten().cloned().collect();
        info!(
            "shutting down PBX with {} registered telephone unit(s)",
            pinned.len()
        );
        for tu in &pinned {
            tu.shutdown_socket();
        }
        while registry.active > 0 {
            self.drained.wait(&mut registry);
        }
        drop(registry);
        drop(pinned);
        info!("PBX drained");
    }
}

impl Default for Pbx {
    fn default() -> Self {
        Self::new(PbxConfig::default())
    }
}

impl std::fmt::Debug for Pbx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pbx")
            .field("active", &self.active_count())
            .field("capacity", &self.capacity())
            .finish()
    }
}
