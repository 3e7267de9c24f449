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

//! Client-service adapter
//!
//! One invocation of [`serve`] drives one client connection for its whole
//! life: it wraps the socket in a telephone unit, registers it under the
//! socket's file descriptor as the extension, then loops reading bytes,
//! reassembling `\r\n`-terminated lines and dispatching each well-formed
//! command to the core. On end-of-file or a read error it unregisters the
//! unit and returns, dropping the adapter's handle.
//!
//! The adapter never writes to the socket; all output to the client is
//! emitted by the unit's own operations.

use crate::config::ServerConfig;
use crate::metrics::ServerMetrics;
use bytes::BytesMut;
use pbx_core::{next_line, Command, Extension, Pbx, Tu};
use std::io::{ErrorKind, Read};
use std::os::unix::io::AsRawFd;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, trace, warn};

/// Serve one client connection to completion.
pub fn serve(pbx: Arc<Pbx>, stream: std::net::TcpStream, metrics: Arc<ServerMetrics>, config: ServerConfig) {
    let started = Instant::now();
    let peer = stream
        .peer_addr()
        .map(|addr| addr.to_string())
        .unwrap_or_else(|_| "<unknown>".to_string());
    let ext = Extension::new(stream.as_raw_fd() as u32);

    let tu = match Tu::new(stream) {
        Ok(tu) => tu,
        Err(err) => {
            error!("failed to initialize telephone unit for {}: {}", peer, err);
            metrics.connection_error();
            return;
        }
    };
    if let Err(err) = pbx.register(&tu, ext) {
        warn!("failed to register {} on extension {}: {}", peer, ext, err);
        metrics.connection_error();
        return;
    }
    metrics.connection_opened();
    info!("client {} connected on extension {}", peer, ext);

    let mut chunk = vec![0u8; config.read_buffer_size];
    let mut buffer = BytesMut::with_capacity(config.read_buffer_size);
    let mut reader = tu.stream();
    loop {
        match reader.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                metrics.bytes_received(n as u64);
                buffer.extend_from_slice(&chunk[..n]);
                while let Some(line) = next_line(&mut buffer) {
                    dispatch(&pbx, &tu, ext, &line, &metrics);
                }
            }
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => {
                debug!("read error on extension {}: {}", ext, err);
                break;
            }
        }
    }

    if let Err(err) = pbx.unregister(&tu) {
        debug!("unregister of extension {} failed: {}", ext, err);
    }
    metrics.connection_closed(started.elapsed());
    info!("client {} disconnected from extension {}", peer, ext);
}

/// Parse one line and run the matching core operation. Malformed lines are
/// dropped without a response; command-level errors are logged and ignored,
/// since every command already answered the client with its state line.
fn dispatch(pbx: &Pbx, tu: &Arc<Tu>, ext: Extension, line: &str, metrics: &ServerMetrics) {
    let Some(command) = Command::parse(line) else {
        metrics.command_ignored();
        trace!("ignoring malformed command on extension {}: {:?}", ext, line);
        return;
    };
    metrics.command_accepted();
    let result = match command {
        Command::Pickup => tu.pickup(),
        Command::Hangup => tu.hangup(),
        Command::Dial(target) => pbx.dial(tu, target),
        Command::Chat(text) => tu.chat(&text),
    };
    if let Err(err) = result {
        debug!("command on extension {} completed with error: {}", ext, err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pbx_core::PbxConfig;
    use std::io::{BufRead, BufReader, Write};
    use std::net::{TcpListener, TcpStream};
    use std::thread;
    use std::time::Duration;

    fn adapter_under_test() -> (Arc<Pbx>, TcpStream, thread::JoinHandle<()>) {
        let pbx = Arc::new(Pbx::new(PbxConfig::default()));
        let metrics = Arc::new(ServerMetrics::new());
        let config = ServerConfig::default();

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).unwrap();
        client
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        let (server, _) = listener.accept().unwrap();

        let handle = {
            let pbx = Arc::clone(&pbx);
            thread::spawn(move || serve(pbx, server, metrics, config))
        };
        (pbx, client, handle)
    }

    fn read_line(reader: &mut BufReader<TcpStream>) -> String {
        let mut line = String::new();
        reader.read_line(&mut line).unwrap();
        line.trim_end_matches("\r\n").to_string()
    }

    #[test]
    fn test_adapter_registers_and_serves_commands() {
        let (pbx, client, handle) = adapter_under_test();
        let mut reader = BufReader::new(client.try_clone().unwrap());

        let greeting = read_line(&mut reader);
        assert!(greeting.starts_with("ON HOOK "));
        assert_eq!(pbx.active_count(), 1);

        (&client).write_all(b"pickup\r\n").unwrap();
        assert_eq!(read_line(&mut reader), "DIAL TONE");

        // Malformed input is dropped without a response
        (&client).write_all(b"PICKUP\r\nnonsense\r\nhangup\r\n").unwrap();
        assert!(read_line(&mut reader).starts_with("ON HOOK "));

        drop(reader);
        drop(client);
        handle.join().unwrap();
        assert_eq!(pbx.active_count(), 0);
    }

    #[test]
    fn test_adapter_handles_fragmented_lines() {
        let (_pbx, client, handle) = adapter_under_test();
        let mut reader = BufReader::new(client.try_clone().unwrap());

        let _greeting = read_line(&mut reader);

        // One command delivered a few bytes at a time
        for fragment in [&b"pic"[..], &b"ku"[..], &b"p\r"[..], &b"\n"[..]] {
            (&client).write_all(fragment).unwrap();
            std::thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(read_line(&mut reader), "DIAL TONE");

        drop(reader);
        drop(client);
        handle.join().unwrap();
    }

    #[test]
    fn test_adapter_unregisters_on_disconnect() {
        let (pbx, client, handle) = adapter_under_test();
        let mut reader = BufReader::new(client.try_clone().unwrap());
        let _greeting = read_line(&mut reader);

        drop(reader);
        drop(client);
        handle.join().unwrap();
        assert_eq!(pbx.active_count(), 0);
        assert!(pbx.snapshot().occupied.is_empty());
    }
}
