// Copyright (c) 2023 - 2026 Silo developers.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Registry of the storage nodes known to the cluster controller.
//!
//! [`NodeRegistry`] tracks every registered node's identity, health, operational state, storage
//! statistics and layout versions, queues commands for delivery on the next heartbeat, and
//! indexes container and pipeline membership. The [`LivenessMonitor`] periodically derives each
//! node's health from the age of its last heartbeat.

mod commands;
mod error;
mod ext;
mod health_watch;
mod layout;
mod liveness;
mod membership;
pub mod metric_definitions;
mod node_entry;
mod registry;

pub use error::Error;
pub use ext::NodeRegistryExt;
pub use health_watch::NodeHealthWatch;
pub use liveness::{LivenessCheck, LivenessMonitor, LivenessMonitorHandle};
pub use node_entry::{health_for_elapsed, NodeRecord};
pub use registry::{NodeCountMatrix, NodeRegistry};
