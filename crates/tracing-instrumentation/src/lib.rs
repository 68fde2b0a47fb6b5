// Copyright (c) 2023 - 2026 Silo developers.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use tracing::{info, Level};
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::reload::Handle;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, Layer, Registry};

use silo_types::config::{CommonOptions, LogFormat};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(
        "cannot parse log configuration {} environment variable: {0}",
        EnvFilter::DEFAULT_ENV
    )]
    LogDirectiveParseError(#[from] ParseError),
    #[error("a global tracing subscriber is already installed: {0}")]
    AlreadyInitialized(#[from] TryInitError),
}

fn build_logging_layer<S>(common_opts: &CommonOptions) -> Box<dyn Layer<S> + Send + Sync>
where
    S: tracing::Subscriber + for<'span> tracing_subscriber::registry::LookupSpan<'span>,
{
    let ansi = !common_opts.log_disable_ansi_codes;
    match common_opts.log_format {
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .pretty()
            .with_writer(
                // Write WARN and ERR to stderr, everything else to stdout
                std::io::stderr
                    .with_max_level(Level::WARN)
                    .or_else(std::io::stdout),
            )
            .with_ansi(ansi)
            .boxed(),
        LogFormat::Compact => tracing_subscriber::fmt::layer()
            .compact()
            .with_ansi(ansi)
            .boxed(),
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_ansi(false)
            .boxed(),
    }
}

/// Installs the global logging subscriber. The returned [`TracingGuard`] allows changing the log
/// filter at runtime.
///
/// Fails if `log-filter` cannot be parsed or if a global subscriber is already installed.
pub fn init_logging(common_opts: &CommonOptions) -> Result<TracingGuard, Error> {
    let filter = EnvFilter::try_new(&common_opts.log_filter)?;
    let (filter, reload_handle) = tracing_subscriber::reload::Layer::new(filter);

    tracing_subscriber::registry()
        .with(build_logging_layer(common_opts).with_filter(filter))
        .try_init()?;

    Ok(TracingGuard { reload_handle })
}

#[derive(Debug)]
pub struct TracingGuard {
    reload_handle: Handle<EnvFilter, Registry>,
}

impl TracingGuard {
    pub fn reload_log_filter(&self, common_opts: &CommonOptions) {
        info!("Setting log filter to '{}'", common_opts.log_filter);
        let _ = &self.reload_handle.modify(|f| {
            let new_filter = EnvFilter::try_new(&common_opts.log_filter);
            match new_filter {
                Ok(new_filter) => {
                    *f = new_filter;
                }
                // don't use logging here, tracing will panic!
                Err(e) => eprintln!("Failed to reload log filter: '{}'", e),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use silo_test_util::let_assert;

    use super::*;

    #[test]
    fn invalid_filter_is_rejected() {
        let mut opts = CommonOptions::default();
        opts.log_filter = "silo=notalevel".to_owned();
        let_assert!(Err(Error::LogDirectiveParseError(_)) = init_logging(&opts));
    }
}
