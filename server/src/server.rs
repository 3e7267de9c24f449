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

//! PBX server implementation
//!
//! The [`PbxServer`] owns the TCP listener and the registry. [`PbxServer::run`]
//! is the acceptor loop: each accepted connection gets its own named service
//! thread running the client-service adapter. [`PbxServer::shutdown`] stops
//! the loop, after which `run` drains the registry and returns.

use crate::config::ServerConfig;
use crate::connection;
use crate::error::{Result, ServerError};
use crate::metrics::ServerMetrics;
use pbx_core::Pbx;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, TcpListener, TcpStream};
use std::os::unix::io::AsRawFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::{debug, error, info, warn};

/// The PBX TCP server.
///
/// # Example
///
/// ```no_run
/// use pbx_server::{PbxServer, ServerConfig};
/// use std::sync::Arc;
/// use std::thread;
///
/// # fn main() -> pbx_server::Result<()> {
/// let config = ServerConfig::new("0.0.0.0:2333".parse().unwrap());
/// let server = Arc::new(PbxServer::bind(config)?);
///
/// let acceptor = {
///     let server = Arc::clone(&server);
///     thread::spawn(move || server.run())
/// };
///
/// // ... later, from a signal handler or controller thread:
/// server.shutdown();
/// acceptor.join().expect("acceptor panicked")?;
/// # Ok(())
/// # }
/// ```
pub struct PbxServer {
    /// Server configuration
    config: ServerConfig,
    /// The extension registry shared with every service thread
    pbx: Arc<Pbx>,
    /// Server metrics
    metrics: Arc<ServerMetrics>,
    /// Listening socket
    listener: TcpListener,
    /// Actual bind address
    local_addr: SocketAddr,
    /// Running flag; cleared by [`PbxServer::shutdown`]
    running: AtomicBool,
}

impl PbxServer {
    /// Bind the listener and build the registry.
    ///
    /// Does not accept connections yet; call [`PbxServer::run`] for that.
    pub fn bind(config: ServerConfig) -> Result<Self> {
        config.validate()?;
        let listener = TcpListener::bind(config.bind_address)?;
        let local_addr = listener.local_addr()?;
        let pbx = Arc::new(Pbx::new(config.pbx_config()));

        info!("PBX server listening on {}", local_addr);

        Ok(Self {
            config,
            pbx,
            metrics: Arc::new(ServerMetrics::new()),
            listener,
            local_addr,
            running: AtomicBool::new(false),
        })
    }

    /// The address the listener actually bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// The extension registry
    pub fn pbx(&self) -> Arc<Pbx> {
        Arc::clone(&self.pbx)
    }

    /// The server metrics
    pub fn metrics(&self) -> Arc<ServerMetrics> {
        Arc::clone(&self.metrics)
    }

    /// The server configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Check if the acceptor loop is running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Run the acceptor loop on the calling thread.
    ///
    /// Each accepted connection is handed to a dedicated service thread.
    /// Returns after [`PbxServer::shutdown`] has been called and the
    /// registry has drained. Fails if the server is already running.
    pub fn run(&self) -> Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(ServerError::AlreadyRunning);
        }

        for incoming in self.listener.incoming() {
            if !self.running.load(Ordering::SeqCst) {
                // Includes the wake-up connection shutdown() makes.
                drop(incoming);
                break;
            }
            match incoming {
                Ok(stream) => self.spawn_service(stream),
                Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    error!("failed to accept connection: {}", err);
                    self.metrics.connection_error();
                }
            }
        }

        info!("accept loop terminated, draining telephone units");
        self.pbx.shutdown();

        let snapshot = self.metrics.snapshot();
        info!(
            "PBX server stopped: {} connections served, {} commands, {} lines ignored",
            snapshot.total_connections, snapshot.commands_accepted, snapshot.commands_ignored
        );
        Ok(())
    }

    /// Stop the acceptor loop.
    ///
    /// Clears the running flag and wakes the blocking `accept` with a
    /// loopback connection; `run` then drains the registry before
    /// returning. Safe to call more than once.
    pub fn shutdown(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        info!("shutting down PBX server on {}", self.local_addr);
        if let Err(err) = TcpStream::connect(self.wake_addr()) {
            warn!("failed to wake the acceptor: {}", err);
        }
    }

    /// Spawn the service thread for one accepted connection.
    fn spawn_service(&self, stream: TcpStream) {
        let fd = stream.as_raw_fd();
        debug!(
            "accepted connection from {} on fd {}",
            stream
                .peer_addr()
                .map(|addr| addr.to_string())
                .unwrap_or_else(|_| "<unknown>".to_string()),
            fd
        );

        let pbx = Arc::clone(&self.pbx);
        let metrics = Arc::clone(&self.metrics);
        let config = self.config.clone();
        let spawned = thread::Builder::new()
            .name(format!("pbx-conn-{fd}"))
            .spawn(move || connection::serve(pbx, stream, metrics, config));
        if let Err(err) = spawned {
            error!("failed to spawn service thread: {}", err);
            self.metrics.connection_error();
        }
    }

    /// Where to connect to reach our own listener (an unspecified bind
    /// address is reachable over loopback).
    fn wake_addr(&self) -> SocketAddr {
        let mut addr = self.local_addr;
        if addr.ip().is_unspecified() {
            match addr.ip() {
                IpAddr::V4(_) => addr.set_ip(IpAddr::V4(Ipv4Addr::LOCALHOST)),
                IpAddr::V6(_) => addr.set_ip(IpAddr::V6(Ipv6Addr::LOCALHOST)),
            }
        }
        addr
    }
}

impl std::fmt::Debug for PbxServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PbxServer")
            .field("local_addr", &self.local_addr)
            .field("running", &self.is_running())
            .field("active_units", &self.pbx.active_count())
            .finish()
    }
}

impl Drop for PbxServer {
    fn drop(&mut self) {
        if self.is_running() {
            warn!("PbxServer dropped while still running");
        }
    }
}
