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

//! PBX telephone exchange simulation server
//!
//! Usage: `pbx -p <port>`. A termination signal (SIGHUP, SIGINT or SIGTERM)
//! shuts the exchange down, draining every connected telephone unit before
//! the process exits.

use clap::Parser;
use pbx_server::{signal, PbxServer, ServerConfig};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::process::ExitCode;
use std::sync::Arc;
use std::thread;
use tracing::{error, info};

/// Private branch exchange simulation server
#[derive(Debug, Parser)]
#[command(name = "pbx")]
struct Args {
    /// TCP port to listen on
    #[arg(short = 'p', long = "port", value_parser = clap::value_parser!(u16).range(1..))]
    port: u16,

    /// Address to bind
    #[arg(long = "bind", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    bind: IpAddr,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();
    let config = ServerConfig::new(SocketAddr::new(args.bind, args.port));

    let server = match PbxServer::bind(config) {
        Ok(server) => Arc::new(server),
        Err(err) => {
            error!("failed to start PBX server: {}", err);
            return ExitCode::FAILURE;
        }
    };

    let shutdown = match signal::install() {
        Ok(shutdown) => shutdown,
        Err(err) => {
            error!("failed to install signal handlers: {}", err);
            return ExitCode::FAILURE;
        }
    };

    let acceptor = {
        let server = Arc::clone(&server);
        thread::Builder::new()
            .name("pbx-accept".to_string())
            .spawn(move || server.run())
    };
    let acceptor = match acceptor {
        Ok(handle) => handle,
        Err(err) => {
            error!("failed to spawn acceptor thread: {}", err);
            return ExitCode::FAILURE;
        }
    };

    shutdown.wait();
    info!("termination signal received, shutting down");
    server.shutdown();

    match acceptor.join() {
        Ok(Ok(())) => ExitCode::SUCCESS,
        Ok(Err(err)) => {
            error!("accept loop failed: {}", err);
            ExitCode::FAILURE
        }
        Err(_) => {
            error!("accept loop panicked");
            ExitCode::FAILURE
        }
    }
}
