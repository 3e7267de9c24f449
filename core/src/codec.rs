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

//! Wire protocol for the PBX
//!
//! The protocol is line-oriented ASCII. Clients send commands, the server
//! sends state notifications; every line is terminated by `\r\n` and there
//! is no a-priori bound on line length.
//!
//! Command keywords are case-sensitive and matched strictly: `pickup `
//! (trailing blank) or `PICKUP` are not commands, and malformed lines are
//! dropped without a response.

use crate::types::Extension;
use bytes::{Buf, BytesMut};
use std::fmt;

/// Line terminator for both directions of the wire protocol.
pub const LINE_TERMINATOR: &str = "\r\n";

/// A command received from a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Lift the handset
    Pickup,
    /// Replace the handset
    Hangup,
    /// Call another extension
    Dial(Extension),
    /// Send a message to the connected peer
    Chat(String),
}

impl Command {
    /// Parse a single line (without its terminator) into a command.
    ///
    /// Returns `None` for anything that is not exactly one of the four
    /// commands: unknown keywords, wrong case, trailing whitespace, a `dial`
    /// argument that is not all digits, or a bare `dial`/`chat` with no
    /// argument at all.
    ///
    /// # Example
    /// ```
    /// use pbx_core::{Command, Extension};
    ///
    /// assert_eq!(Command::parse("pickup"), Some(Command::Pickup));
    /// assert_eq!(Command::parse("dial  42"), Some(Command::Dial(Extension::new(42))));
    /// assert_eq!(Command::parse("PICKUP"), None);
    /// ```
    pub fn parse(line: &str) -> Option<Command> {
        if line == "pickup" {
            Some(Command::Pickup)
        } else if line == "hangup" {
            Some(Command::Hangup)
        } else if let Some(rest) = line.strip_prefix("dial ") {
            let digits = rest.trim_start_matches(' ');
            if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            digits.parse().ok().map(|n| Command::Dial(Extension::new(n)))
        } else if let Some(rest) = line.strip_prefix("chat ") {
            Some(Command::Chat(rest.to_string()))
        } else {
            None
        }
    }
}

/// A notification sent to a client, reflecting its unit's state after an
/// operation (or relaying a peer's chat message).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// `ON HOOK <ext>`
    OnHook(Extension),
    /// `RINGING`
    Ringing,
    /// `DIAL TONE`
    DialTone,
    /// `RING BACK`
    RingBack,
    /// `BUSY SIGNAL`
    BusySignal,
    /// `CONNECTED <peer-ext>`
    Connected(Extension),
    /// `ERROR`
    Error,
    /// `CHAT <text>`, delivered to the peer of a connected unit
    Chat(String),
}

impl Notification {
    /// Encode the notification as a terminated wire line.
    pub fn encode(&self) -> String {
        format!("{}{}", self, LINE_TERMINATOR)
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OnHook(ext) => write!(f, "ON HOOK {}", ext),
            Self::Ringing => write!(f, "RINGING"),
            Self::DialTone => write!(f, "DIAL TONE"),
            Self::RingBack => write!(f, "RING BACK"),
            Self::BusySignal => write!(f, "BUSY SIGNAL"),
            Self::Connected(ext) => write!(f, "CONNECTED {}", ext),
            Self::Error => write!(f, "ERROR"),
            Self::Chat(text) => write!(f, "CHAT {}", text),
        }
    }
}

/// Split the next complete `\r\n`-terminated line off the front of `buffer`.
///
/// Returns `None` when no full line has arrived yet; the partial contents
/// stay in the buffer for the next read. The terminator is consumed but not
/// returned. Bytes that are not valid UTF-8 are replaced, which makes the
/// line fail keyword matching and be dropped like any other malformed input.
pub fn next_line(buffer: &mut BytesMut) -> Option<String> {
    let pos = buffer
        .windows(LINE_TERMINATOR.len())
        .position(|window| window == LINE_TERMINATOR.as_bytes())?;
    let line = buffer.split_to(pos);
    buffer.advance(LINE_TERMINATOR.len());
    Some(String::from_utf8_lossy(&line).into_owned())
}
