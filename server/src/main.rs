// Copyright (c) 2023 - 2026 Silo developers.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info};

use silo_server::build_info;
use silo_server::rt::build_tokio;
use silo_server::Application;
use silo_tracing_instrumentation::init_logging;
use silo_types::config_loader::ConfigLoaderBuilder;

mod signal;

#[derive(Debug, clap::Parser)]
#[command(author, version, about)]
struct SiloArguments {
    /// Set a configuration file to use for the controller.
    #[arg(short, long = "config-file", env = "SILO_CONFIG", value_name = "FILE")]
    config_file: Option<PathBuf>,

    /// Dumps the loaded configuration (or default if no config-file is set) to stdout and exits.
    /// Defaults will include any values overridden by environment variables.
    #[clap(long)]
    dump_config: bool,
}

const EXIT_CODE_FAILURE: i32 = 1;

fn main() {
    if let Err(err) = run(SiloArguments::parse()) {
        // tracing might not be configured yet
        eprintln!("silo controller failed: {err:#}");
        std::process::exit(EXIT_CODE_FAILURE);
    }
}

fn run(cli_args: SiloArguments) -> anyhow::Result<()> {
    let config_loader = ConfigLoaderBuilder::default()
        .load_env(true)
        .path(cli_args.config_file.clone())
        .build()?;
    let config = config_loader.load_once()?;

    if cli_args.dump_config {
        println!("{}", config.dump()?);
        return Ok(());
    }

    let runtime = build_tokio(&config.common)?;
    runtime.block_on(async move {
        let _tracing_guard = init_logging(&config.common)?;

        info!("Starting silo controller {}", build_info::build_info());
        match &cli_args.config_file {
            Some(path) => info!("Loading configuration file from {}", path.display()),
            None => info!("Loading default built-in configuration"),
        }

        let running = Application::new(&config)?.start();

        tokio::select! {
            signal_name = signal::shutdown() => {
                info!("Received shutdown signal {}.", signal_name);
            },
            _ = signal::sigusr1_dump_config(&config) => {},
        }

        if let Err(err) = running
            .shutdown(config.common.shutdown_grace_period())
            .await
        {
            error!("{}", err);
        }
        info!("Silo controller terminated");
        Ok::<_, anyhow::Error>(())
    })
}
