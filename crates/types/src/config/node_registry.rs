// Copyright (c) 2023 - 2026 Silo developers.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::num::{NonZeroU32, NonZeroUsize};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_with::serde_as;

/// # Node registry options
///
/// Controls how the controller classifies the liveness of storage nodes and how much work it
/// queues up for them.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, derive_builder::Builder, PartialEq)]
#[serde(rename_all = "kebab-case")]
#[builder(default)]
pub struct NodeRegistryOptions {
    /// # Liveness check interval
    ///
    /// How often the liveness monitor re-evaluates the health of every registered node. This is
    /// independent of how often nodes heartbeat.
    #[serde_as(as = "serde_with::DisplayFromStr")]
    pub liveness_check_interval: humantime::Duration,

    /// # Stale node interval
    ///
    /// A node that has not heartbeated for longer than this is marked stale.
    #[serde_as(as = "serde_with::DisplayFromStr")]
    pub stale_node_interval: humantime::Duration,

    /// # Dead node interval
    ///
    /// A node that has not heartbeated for longer than this is marked dead. Must be larger than
    /// `stale-node-interval`.
    #[serde_as(as = "serde_with::DisplayFromStr")]
    pub dead_node_interval: humantime::Duration,

    /// # Command queue limit
    ///
    /// Maximum number of commands queued for a single node. Commands enqueued beyond this limit
    /// are rejected. Unset means unbounded.
    #[builder(setter(strip_option))]
    pub command_queue_limit: Option<NonZeroUsize>,

    /// # Datanode pipeline limit
    ///
    /// Fixed number of pipelines a single node may participate in. When unset, the limit is
    /// derived from the node's healthy metadata volumes and `pipelines-per-volume`.
    #[builder(setter(strip_option))]
    pub datanode_pipeline_limit: Option<NonZeroU32>,

    /// # Pipelines per metadata volume
    ///
    /// Pipelines a node may join per healthy metadata volume it reports.
    pub pipelines_per_volume: NonZeroU32,
}

impl NodeRegistryOptions {
    pub fn liveness_check_interval(&self) -> Duration {
        *self.liveness_check_interval
    }

    pub fn stale_node_interval(&self) -> Duration {
        *self.stale_node_interval
    }

    pub fn dead_node_interval(&self) -> Duration {
        *self.dead_node_interval
    }

    pub fn validate(&self) -> Result<(), super::InvalidConfigurationError> {
        use super::InvalidConfigurationError as E;

        if self.liveness_check_interval().is_zero() {
            return Err(E::ZeroInterval("liveness-check-interval"));
        }
        if self.stale_node_interval().is_zero() {
            return Err(E::ZeroInterval("stale-node-interval"));
        }
        if self.dead_node_interval() <= self.stale_node_interval() {
            return Err(E::LivenessThresholds {
                stale: self.stale_node_interval,
                dead: self.dead_node_interval,
            });
        }
        Ok(())
    }
}

impl Default for NodeRegistryOptions {
    fn default() -> Self {
        Self {
            liveness_check_interval: Duration::from_secs(3).into(),
            stale_node_interval: Duration::from_secs(90).into(),
            dead_node_interval: Duration::from_secs(600).into(),
            command_queue_limit: None,
            datanode_pipeline_limit: None,
            pipelines_per_volume: NonZeroU32::new(2).expect("be non zero"),
        }
    }
}
