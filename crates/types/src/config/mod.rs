// Copyright (c) 2023 - 2026 Silo developers.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

mod common;
mod node_registry;

pub use common::*;
pub use node_registry::*;

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum InvalidConfigurationError {
    #[error("{0} must be larger than zero")]
    ZeroInterval(&'static str),
    #[error(
        "dead-node-interval ({dead}) must be larger than stale-node-interval ({stale})"
    )]
    LivenessThresholds {
        stale: humantime::Duration,
        dead: humantime::Duration,
    },
}

/// # Silo controller configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize, derive_builder::Builder, PartialEq)]
#[builder(default)]
#[serde(rename_all = "kebab-case")]
pub struct Configuration {
    #[serde(flatten)]
    pub common: CommonOptions,
    pub node_registry: NodeRegistryOptions,
}

impl Configuration {
    pub fn validate(&self) -> Result<(), InvalidConfigurationError> {
        self.node_registry.validate()
    }

    /// Dumps the configuration to a string
    pub fn dump(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}
