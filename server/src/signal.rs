// Copyright (c) 2023 - 2026 Silo developers.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

// Unix-specific signal handling
#[cfg(unix)]
mod platform {
    use std::io::Write;

    use tokio::signal::unix::{signal, SignalKind};
    use tracing::{info, warn};

    use silo_types::config::Configuration;

    pub async fn shutdown() -> &'static str {
        let signal = tokio::select! {
            () = await_signal(SignalKind::interrupt()) => "SIGINT",
            () = await_signal(SignalKind::terminate()) => "SIGTERM"
        };

        info!(%signal, "Received signal, starting shutdown.");
        signal
    }

    /// Dump the configuration to stderr on SIGUSR1
    pub async fn sigusr1_dump_config(configuration: &Configuration) {
        let mut stream = match signal(SignalKind::user_defined1()) {
            Ok(stream) => stream,
            Err(err) => {
                warn!("Failed to register handler for SIGUSR1: {}", err);
                return std::future::pending().await;
            }
        };

        loop {
            stream.recv().await;
            warn!("Received SIGUSR1, dumping configuration");
            match configuration.dump() {
                Err(e) => warn!("Failed to dump configuration: {}", e),
                Ok(config) => {
                    let mut stderr = std::io::stderr().lock();
                    let _ = writeln!(&mut stderr, "{config}");
                }
            }
        }
    }

    async fn await_signal(kind: SignalKind) {
        match signal(kind) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!("Failed to register signal handler: {}", err);
                std::future::pending::<()>().await
            }
        }
    }
}

// Windows-specific signal handling
#[cfg(windows)]
mod platform {
    use tracing::{info, warn};

    use silo_types::config::Configuration;

    pub async fn shutdown() -> &'static str {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for ctrl-c: {}", err);
            std::future::pending::<()>().await
        }
        info!("Received CTRL_C, starting shutdown.");
        "CTRL_C"
    }

    /// No-op on Windows - SIGUSR1 doesn't exist
    pub async fn sigusr1_dump_config(_configuration: &Configuration) {
        std::future::pending::<()>().await
    }
}

pub(super) use platform::*;
