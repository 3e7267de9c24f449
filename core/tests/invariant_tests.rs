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

//! Concurrency invariant tests
//!
//! These tests hammer a registry with concurrent commands and then, at a
//! quiescent point, check the structural invariants of the unit graph:
//! peer links are symmetric, linked units are in one of the three legal
//! state pairings, and the active count matches the occupied slots.

use pbx_core::{Extension, Pbx, PbxConfig, Tu, TuState};
use rand::Rng;
use std::io::Read;
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;

const UNITS: u32 = 8;
const BASE_EXT: u32 = 100;
const ROUNDS: usize = 300;

/// Register `UNITS` fresh telephone units, returning them along with the
/// client ends of their connections.
fn populate(pbx: &Pbx) -> (Vec<Arc<Tu>>, Vec<TcpStream>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let mut units = Vec::new();
    let mut clients = Vec::new();
    for ext in 0..UNITS {
        let client = TcpStream::connect(addr).unwrap();
        let (server, _) = listener.accept().unwrap();
        let tu = Tu::new(server).unwrap();
        pbx.register(&tu, Extension::new(BASE_EXT + ext)).unwrap();
        units.push(tu);
        clients.push(client);
    }
    (units, clients)
}

/// Drain everything the server writes so notification writes never block on
/// a full socket buffer. The threads exit when the server side closes.
fn spawn_drains(clients: Vec<TcpStream>) -> Vec<thread::JoinHandle<()>> {
    clients
        .into_iter()
        .map(|mut client| {
            thread::spawn(move || {
                let mut sink = [0u8; 1024];
                loop {
                    match client.read(&mut sink) {
                        Ok(0) | Err(_) => break,
                        Ok(_) => {}
                    }
                }
            })
        })
        .collect()
}

#[test]
fn concurrent_command_storm_preserves_invariants() {
    let pbx = Arc::new(Pbx::new(PbxConfig::default()));
    let (units, clients) = populate(&pbx);
    let drains = spawn_drains(clients);

    // One worker per unit, preserving the one-in-flight-command-per-unit
    // contract the service adapter provides.
    let workers: Vec<_> = units
        .iter()
        .map(|tu| {
            let tu = Arc::clone(tu);
            let pbx = Arc::clone(&pbx);
            thread::spawn(move || {
                let mut rng = rand::thread_rng();
                for _ in 0..ROUNDS {
                    match rng.gen_range(0..4) {
                        0 => {
                            let _ = tu.pickup();
                        }
                        1 => {
                            let _ = tu.hangup();
                        }
                        2 => {
                            let target = BASE_EXT + rng.gen_range(0..UNITS);
                            let _ = pbx.dial(&tu, Extension::new(target));
                        }
                        _ => {
                            let _ = tu.chat("storm");
                        }
                    }
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    // Quiescent: no commands in flight, so the graph must be consistent.
    let snapshot = pbx.snapshot();
    assert_eq!(snapshot.active, snapshot.occupied.len());
    assert_eq!(snapshot.active, UNITS as usize);

    for tu in &units {
        match tu.peer() {
            Some(peer) => {
                let back = peer.peer().expect("peer link must be symmetric");
                assert!(Arc::ptr_eq(&back, tu), "peer link must point back");
                let pairing = (tu.state(), peer.state());
                assert!(
                    matches!(
                        pairing,
                        (TuState::RingBack, TuState::Ringing)
                            | (TuState::Ringing, TuState::RingBack)
                            | (TuState::Connected, TuState::Connected)
                    ),
                    "illegal state pairing: {:?}",
                    pairing
                );
            }
            None => {
                assert!(
                    !tu.state().has_peer(),
                    "state {} requires a peer",
                    tu.state()
                );
            }
        }
    }

    for tu in &units {
        pbx.unregister(tu).unwrap();
    }
    assert_eq!(pbx.active_count(), 0);
    pbx.shutdown();

    drop(units);
    for drain in drains {
        drain.join().unwrap();
    }
}

#[test]
fn shutdown_returns_only_after_every_unit_unregisters() {
    let pbx = Arc::new(Pbx::new(PbxConfig::default()));
    let (units, clients) = populate(&pbx);
    let drains = spawn_drains(clients);

    // Service adapters: blocked reading, unregister on end-of-file.
    let adapters: Vec<_> = units
        .into_iter()
        .map(|tu| {
            let pbx = Arc::clone(&pbx);
            thread::spawn(move || {
                let mut reader = tu.stream();
                let mut sink = [0u8; 256];
                loop {
                    match reader.read(&mut sink) {
                        Ok(0) | Err(_) => break,
                        Ok(_) => {}
                    }
                }
                pbx.unregister(&tu).unwrap();
            })
        })
        .collect();

    // Shutdown cancels the blocked readers and must not return before every
    // adapter has unregistered its unit.
    pbx.shutdown();
    assert_eq!(pbx.active_count(), 0);
    assert!(pbx.snapshot().occupied.is_empty());

    for adapter in adapters {
        adapter.join().unwrap();
    }
    for drain in drains {
        drain.join().unwrap();
    }
}
