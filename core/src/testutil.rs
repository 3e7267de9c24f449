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

//! Shared helpers for the in-crate tests: real socket pairs over loopback
//! and line-level assertions on what the "client" end receives.

use crate::tu::Tu;
use crate::types::Extension;
use std::io::{BufRead, BufReader};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::time::Duration;

const READ_TIMEOUT: Duration = Duration::from_secs(5);
const SILENCE_WINDOW: Duration = Duration::from_millis(100);

/// A connected (server socket, client socket) pair over loopback.
pub(crate) fn socket_pair() -> (TcpStream, TcpStream) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let client = TcpStream::connect(addr).unwrap();
    let (server, _) = listener.accept().unwrap();
    client.set_read_timeout(Some(READ_TIMEOUT)).unwrap();
    (server, client)
}

/// A telephone unit with the given extension assigned, plus the client end
/// of its connection. The `ON HOOK <ext>` greeting is already consumed.
pub(crate) fn tu_pair(ext: u32) -> (Arc<Tu>, BufReader<TcpStream>) {
    let (server, client) = socket_pair();
    let tu = Tu::new(server).unwrap();
    let mut reader = BufReader::new(client);
    tu.set_extension(Extension::new(ext)).unwrap();
    expect_line(&mut reader, &format!("ON HOOK {ext}"));
    (tu, reader)
}

/// Two units at extensions 4 and 5 with a call set up between them: the
/// caller (4) is in ring-back and the callee (5) is ringing. All lines
/// emitted so far are consumed.
#[allow(clippy::type_complexity)]
pub(crate) fn call_pair() -> (
    (Arc<Tu>, BufReader<TcpStream>),
    (Arc<Tu>, BufReader<TcpStream>),
) {
    let (caller, mut caller_client) = tu_pair(4);
    let (callee, mut callee_client) = tu_pair(5);

    caller.pickup().unwrap();
    expect_line(&mut caller_client, "DIAL TONE");
    caller.dial(Some(Arc::clone(&callee))).unwrap();
    expect_line(&mut caller_client, "RING BACK");
    expect_line(&mut callee_client, "RINGING");

    ((caller, caller_client), (callee, callee_client))
}

/// Read one line from the client end and assert its content (without the
/// terminator).
pub(crate) fn expect_line(reader: &mut BufReader<TcpStream>, expected: &str) {
    let mut line = String::new();
    reader.read_line(&mut line).unwrap();
    assert_eq!(line, format!("{expected}\r\n"));
}

/// Assert that nothing arrives on the client end within a short window.
pub(crate) fn assert_silent(reader: &mut BufReader<TcpStream>) {
    reader
        .get_ref()
        .set_read_timeout(Some(SILENCE_WINDOW))
        .unwrap();
    match reader.fill_buf() {
        Ok(data) => assert!(data.is_empty(), "unexpected data: {:?}", data),
        Err(err) => assert!(
            matches!(
                err.kind(),
                std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
            ),
            "unexpected read error: {err}"
        ),
    }
    reader.get_ref().set_read_timeout(Some(READ_TIMEOUT)).unwrap();
}
