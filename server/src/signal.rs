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

//! Termination signal handling
//!
//! SIGHUP, SIGINT and SIGTERM are funneled through a self-pipe: the handler
//! performs a single `write(2)` (async-signal-safe), and
//! [`ShutdownSignal::wait`] blocks reading the other end. The waiting thread
//! can then run the ordinary shutdown path outside of signal context.

use std::io;
use std::os::unix::io::RawFd;
use std::sync::atomic::{AtomicI32, Ordering};

/// Write end of the self-pipe, published for the handler.
static SIGNAL_PIPE_WRITE: AtomicI32 = AtomicI32::new(-1);

/// Signal handler: forward the signal as one byte on the self-pipe.
extern "C" fn forward_signal(_signal: libc::c_int) {
    let fd = SIGNAL_PIPE_WRITE.load(Ordering::Relaxed);
    if fd >= 0 {
        // SAFETY: write(2) is async-signal-safe per POSIX; the fd stays open
        // for the life of the process once installed.
        let _ = unsafe { libc::write(fd, [0u8].as_ptr() as *const libc::c_void, 1) };
    }
}

/// Receiver half of the installed signal handlers.
#[derive(Debug)]
pub struct ShutdownSignal {
    read_fd: RawFd,
}

/// Install handlers for SIGHUP, SIGINT and SIGTERM.
///
/// Call once, before spawning the acceptor. The returned [`ShutdownSignal`]
/// is the only way to observe a delivered signal.
pub fn install() -> io::Result<ShutdownSignal> {
    let mut fds: [libc::c_int; 2] = [-1, -1];
    // SAFETY: pipe(2) with a valid two-element out-array.
    if unsafe { libc::pipe(fds.as_mut_ptr()) } != 0 {
        return Err(io::Error::last_os_error());
    }
    SIGNAL_PIPE_WRITE.store(fds[1], Ordering::Relaxed);

    let handler: extern "C" fn(libc::c_int) = forward_signal;
    for signal in [libc::SIGHUP, libc::SIGINT, libc::SIGTERM] {
        // SAFETY: the handler has a stable address and only performs an
        // async-signal-safe write.
        unsafe {
            let mut action: libc::sigaction = std::mem::zeroed();
            action.sa_sigaction = handler as usize;
            libc::sigemptyset(&mut action.sa_mask);
            if libc::sigaction(signal, &action, std::ptr::null_mut()) != 0 {
                return Err(io::Error::last_os_error());
            }
        }
    }

    Ok(ShutdownSignal { read_fd: fds[0] })
}

impl ShutdownSignal {
    /// Block until a termination signal is delivered.
    pub fn wait(&self) {
        let mut byte = [0u8; 1];
        loop {
            // SAFETY: read(2) on the pipe fd owned by this struct.
            let n = unsafe {
                libc::read(self.read_fd, byte.as_mut_ptr() as *mut libc::c_void, 1)
            };
            if n == 1 {
                return;
            }
            if n < 0 && io::Error::last_os_error().kind() == io::ErrorKind::Interrupted {
                continue;
            }
            // Closed pipe or unexpected error: treat as a shutdown request
            // rather than spinning.
            return;
        }
    }
}

impl Drop for ShutdownSignal {
    fn drop(&mut self) {
        // The write end stays open for the handler; only the read side is
        // ours to release.
        // SAFETY: the fd was obtained from pipe(2) and is not used after.
        let _ = unsafe { libc::close(self.read_fd) };
    }
}
