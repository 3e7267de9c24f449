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

//! Telephone unit state machine
//!
//! A [`Tu`] owns one client socket and the unit's call state. Commands from
//! the owning client ([`Tu::pickup`], [`Tu::hangup`], [`Tu::dial`],
//! [`Tu::chat`]) and side effects of a peer's commands drive the state
//! machine; every operation answers the commanding client with exactly one
//! state line, and also notifies the peer's client when the peer changed
//! state.
//!
//! # Locking
//!
//! All mutable state, including the notification writer, lives behind the
//! unit's mutex, so a state transition and the line announcing it are a
//! single critical section and writes to one socket never interleave.
//! Transitions that touch two units hold both mutexes, acquired in [`TuId`]
//! order via [`Tu::lock_pair`], and re-validate the peer link after
//! acquisition: the link may have been cut between dropping one lock and
//! taking two.
//!
//! # Lifetime
//!
//! `Arc<Tu>` is the unit's reference count. The service adapter, the
//! registry slot, and a peer's link each hold a strong handle; when the last
//! one drops, the socket closes. Peer links are only ever created and cut in
//! pairs, inside the two-lock critical section, so the mutual-reference
//! cycle of a call always unwinds.

use crate::codec::Notification;
use crate::error::{PbxError, Result};
use crate::types::{Extension, TuId, TuState};
use parking_lot::{Mutex, MutexGuard};
use std::io::Write;
use std::net::{Shutdown, TcpStream};
use std::os::unix::io::{AsRawFd, RawFd};
use std::sync::{Arc, OnceLock, Weak};
use tracing::debug;

/// A telephone unit: one client connection's state machine.
pub struct Tu {
    /// Stable identity; defines the two-lock acquisition order
    id: TuId,
    /// Extension assigned at registration, set at most once
    ext: OnceLock<Extension>,
    /// Self-handle, needed to install the symmetric peer link when dialing
    me: Weak<Tu>,
    /// Read/shutdown side of the connection. The service adapter reads from
    /// it and the registry shuts it down; it is never written through.
    stream: TcpStream,
    /// Call state and the write side, serialized under one lock
    inner: Mutex<TuInner>,
}

struct TuInner {
    /// Write side of the connection (same socket as `stream`)
    writer: TcpStream,
    /// Current state of the unit
    state: TuState,
    /// Peer unit while ringing, ring-back or connected
    peer: Option<Arc<Tu>>,
}

impl Tu {
    /// Wrap an accepted client socket in a new unit in the `OnHook` state.
    ///
    /// Fails only if the socket handle cannot be duplicated for the write
    /// side; the unit is then never created and the caller's socket closes
    /// on drop.
    pub fn new(stream: TcpStream) -> Result<Arc<Self>> {
        let writer = stream.try_clone()?;
        Ok(Arc::new_cyclic(|me| Self {
            id: TuId::next(),
            ext: OnceLock::new(),
            me: me.clone(),
            stream,
            inner: Mutex::new(TuInner {
                writer,
                state: TuState::OnHook,
                peer: None,
            }),
        }))
    }

    /// The unit's stable identity
    pub fn id(&self) -> TuId {
        self.id
    }

    /// The extension this unit is registered under, if any
    pub fn extension(&self) -> Option<Extension> {
        self.ext.get().copied()
    }

    /// Assign the unit's extension and greet the client with
    /// `ON HOOK <ext>`. An extension can be assigned at most once; a second
    /// attempt fails and changes nothing.
    pub fn set_extension(&self, ext: Extension) -> Result<()> {
        self.ext.set(ext).map_err(|_| PbxError::ExtensionAssigned)?;
        let mut inner = self.inner.lock();
        self.send_line(&mut inner, &Notification::OnHook(ext));
        Ok(())
    }

    /// Current state of the unit
    pub fn state(&self) -> TuState {
        self.inner.lock().state
    }

    /// The peer this unit is linked to, if any
    pub fn peer(&self) -> Option<Arc<Tu>> {
        self.inner.lock().peer.clone()
    }

    /// Read side of the connection, for the service adapter. All output to
    /// the client goes through the unit's own operations.
    pub fn stream(&self) -> &TcpStream {
        &self.stream
    }

    /// Shut down both halves of the client socket, forcing the adapter's
    /// blocked read to return end-of-file. Takes no lock, so it is safe to
    /// call while the registry lock is held.
    pub fn shutdown_socket(&self) {
        if let Err(err) = self.stream.shutdown(Shutdown::Both) {
            debug!("socket shutdown on fd {} failed: {}", self.as_raw_fd(), err);
        }
    }

    /// Lift the handset.
    ///
    /// `OnHook` goes to `DialTone`; `Ringing` answers the call, moving this
    /// unit and its ring-back peer to `Connected` together. Any other state
    /// is unchanged and re-announced.
    pub fn pickup(&self) -> Result<()> {
        loop {
            let mut inner = self.inner.lock();
            match inner.state {
                TuState::OnHook => {
                    inner.state = TuState::DialTone;
                    self.send_line(&mut inner, &Notification::DialTone);
                    return Ok(());
                }
                TuState::Ringing => {
                    let Some(peer) = inner.peer.clone() else {
                        self.notify_current(&mut inner);
                        return Ok(());
                    };
                    drop(inner);
                    let (mut mine, mut theirs) = self.lock_pair(&peer);
                    if mine.state != TuState::Ringing || !peer_matches(&mine, &peer) {
                        // The caller hung up or vanished between the locks;
                        // restart from whatever state that left us in.
                        continue;
                    }
                    mine.state = TuState::Connected;
                    theirs.state = TuState::Connected;
                    self.send_line(
                        &mut mine,
                        &Notification::Connected(peer.extension().unwrap_or_default()),
                    );
                    peer.send_line(
                        &mut theirs,
                        &Notification::Connected(self.extension().unwrap_or_default()),
                    );
                    return Ok(());
                }
                _ => {
                    self.notify_current(&mut inner);
                    return Ok(());
                }
            }
        }
    }

    /// Replace the handset.
    ///
    /// From `Connected` or `Ringing` the peer is released to `DialTone`;
    /// from `RingBack` the ringing callee is returned to `OnHook`. The
    /// single-party states fall back to `OnHook`, and `OnHook` itself is a
    /// no-op that re-announces.
    pub fn hangup(&self) -> Result<()> {
        loop {
            let mut inner = self.inner.lock();
            match inner.state {
                TuState::Connected | TuState::Ringing => {
                    let Some(peer) = inner.peer.clone() else {
                        self.notify_current(&mut inner);
                        return Ok(());
                    };
                    drop(inner);
                    let (mut mine, mut theirs) = self.lock_pair(&peer);
                    if !matches!(mine.state, TuState::Connected | TuState::Ringing)
                        || !peer_matches(&mine, &peer)
                    {
                        continue;
                    }
                    mine.state = TuState::OnHook;
                    theirs.state = TuState::DialTone;
                    // The `peer` local and `&self` pin both allocations, so
                    // neither taken handle can be the last one while a lock
                    // is still held.
                    let peer_link = mine.peer.take();
                    let self_link = theirs.peer.take();
                    self.send_line(
                        &mut mine,
                        &Notification::OnHook(self.extension().unwrap_or_default()),
                    );
                    peer.send_line(&mut theirs, &Notification::DialTone);
                    drop(mine);
                    drop(theirs);
                    drop(peer_link);
                    drop(self_link);
                    return Ok(());
                }
                TuState::RingBack => {
                    let Some(peer) = inner.peer.clone() else {
                        self.notify_current(&mut inner);
                        return Ok(());
                    };
                    drop(inner);
                    let (mut mine, mut theirs) = self.lock_pair(&peer);
                    if mine.state != TuState::RingBack || !peer_matches(&mine, &peer) {
                        continue;
                    }
                    mine.state = TuState::OnHook;
                    theirs.state = TuState::OnHook;
                    let peer_link = mine.peer.take();
                    let self_link = theirs.peer.take();
                    self.send_line(
                        &mut mine,
                        &Notification::OnHook(self.extension().unwrap_or_default()),
                    );
                    peer.send_line(
                        &mut theirs,
                        &Notification::OnHook(peer.extension().unwrap_or_default()),
                    );
                    drop(mine);
                    drop(theirs);
                    drop(peer_link);
                    drop(self_link);
                    return Ok(());
                }
                TuState::DialTone | TuState::BusySignal | TuState::Error => {
                    inner.state = TuState::OnHook;
                    self.send_line(
                        &mut inner,
                        &Notification::OnHook(self.extension().unwrap_or_default()),
                    );
                    return Ok(());
                }
                TuState::OnHook => {
                    self.notify_current(&mut inner);
                    return Ok(());
                }
            }
        }
    }

    /// Initiate a call to `target`.
    ///
    /// Only a unit in `DialTone` can dial; any other state is unchanged and
    /// re-announced. With no target the unit falls to `Error`. Dialing
    /// itself, or a target that is off-hook or already in a call, yields
    /// `BusySignal` with no effect on the target. Otherwise both units are
    /// linked as peers, this one moving to `RingBack` and the target to
    /// `Ringing`.
    pub fn dial(&self, target: Option<Arc<Tu>>) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.state != TuState::DialTone {
            self.notify_current(&mut inner);
            return Ok(());
        }
        let Some(target) = target else {
            inner.state = TuState::Error;
            self.send_line(&mut inner, &Notification::Error);
            return Err(PbxError::NoSuchTarget);
        };
        if self.id == target.id {
            inner.state = TuState::BusySignal;
            self.send_line(&mut inner, &Notification::BusySignal);
            return Ok(());
        }
        drop(inner);

        let (mut mine, mut theirs) = self.lock_pair(&target);
        if mine.state != TuState::DialTone {
            // Single client commands are serialized, but hold the discipline
            // anyway: anything that moved us re-announces instead.
            self.notify_current(&mut mine);
            return Ok(());
        }
        if theirs.state != TuState::OnHook || theirs.peer.is_some() {
            mine.state = TuState::BusySignal;
            self.send_line(&mut mine, &Notification::BusySignal);
            return Ok(());
        }
        mine.peer = Some(Arc::clone(&target));
        theirs.peer = Some(self.handle());
        mine.state = TuState::RingBack;
        theirs.state = TuState::Ringing;
        self.send_line(&mut mine, &Notification::RingBack);
        target.send_line(&mut theirs, &Notification::Ringing);
        Ok(())
    }

    /// Relay a chat message to the connected peer.
    ///
    /// Outside of `Connected` nothing is sent and the current state is
    /// re-announced to the sender. On success the peer's client receives
    /// `CHAT <text>` and the sender's client is re-sent
    /// `CONNECTED <peer-ext>`; neither unit changes state.
    pub fn chat(&self, text: &str) -> Result<()> {
        loop {
            let mut inner = self.inner.lock();
            if inner.state != TuState::Connected {
                self.notify_current(&mut inner);
                return Err(PbxError::NoCallInProgress);
            }
            let Some(peer) = inner.peer.clone() else {
                self.notify_current(&mut inner);
                return Err(PbxError::NoCallInProgress);
            };
            drop(inner);

            let (mut mine, mut theirs) = self.lock_pair(&peer);
            if mine.state != TuState::Connected || !peer_matches(&mine, &peer) {
                continue;
            }
            peer.send_line(&mut theirs, &Notification::Chat(text.to_string()));
            self.send_line(
                &mut mine,
                &Notification::Connected(peer.extension().unwrap_or_default()),
            );
            return Ok(());
        }
    }

    /// Acquire this unit's lock and `other`'s in `TuId` order.
    ///
    /// Returns the guards as `(mine, theirs)` regardless of which was locked
    /// first. The two units must be distinct.
    fn lock_pair<'a>(
        &'a self,
        other: &'a Tu,
    ) -> (MutexGuard<'a, TuInner>, MutexGuard<'a, TuInner>) {
        debug_assert_ne!(self.id, other.id);
        if self.id < other.id {
            let mine = self.inner.lock();
            let theirs = other.inner.lock();
            (mine, theirs)
        } else {
            let theirs = other.inner.lock();
            let mine = self.inner.lock();
            (mine, theirs)
        }
    }

    /// A strong handle to this unit. A live `&self` implies at least one
    /// strong handle exists, so the upgrade cannot fail.
    fn handle(&self) -> Arc<Tu> {
        self.me.upgrade().expect("live TU without a strong handle")
    }

    /// Re-announce the unit's current state to its own client.
    fn notify_current(&self, inner: &mut TuInner) {
        let note = match inner.state {
            TuState::OnHook => Notification::OnHook(self.extension().unwrap_or_default()),
            TuState::Ringing => Notification::Ringing,
            TuState::DialTone => Notification::DialTone,
            TuState::RingBack => Notification::RingBack,
            TuState::BusySignal => Notification::BusySignal,
            TuState::Connected => Notification::Connected(
                inner
                    .peer
                    .as_ref()
                    .and_then(|peer| peer.extension())
                    .unwrap_or_default(),
            ),
            TuState::Error => Notification::Error,
        };
        self.send_line(inner, &note);
    }

    /// Write one notification line to this unit's client. Must be called
    /// with the unit's guard, which serializes bytes on the socket. A failed
    /// write is logged and otherwise ignored; the dead connection is reaped
    /// when the adapter's read side sees it.
    fn send_line(&self, inner: &mut TuInner, note: &Notification) {
        if let Err(err) = inner.writer.write_all(note.encode().as_bytes()) {
            debug!(
                "failed to notify client on fd {}: {}",
                self.as_raw_fd(),
                err
            );
        }
    }
}

/// True when `inner` still points at the peer we locked.
fn peer_matches(inner: &TuInner, peer: &Arc<Tu>) -> bool {
    inner.peer.as_ref().is_some_and(|p| Arc::ptr_eq(p, peer))
}

impl AsRawFd for Tu {
    fn as_raw_fd(&self) -> RawFd {
        self.stream.as_raw_fd()
    }
}

impl std::fmt::Debug for Tu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("Tu");
        s.field("id", &self.id).field("ext", &self.extension());
        match self.inner.try_lock() {
            Some(inner) => s.field("state", &inner.state),
            None => s.field("state", &"<locked>"),
        };
        s.finish()
    }
}
