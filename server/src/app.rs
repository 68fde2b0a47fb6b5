// Copyright (c) 2023 - 2026 Silo developers.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::time::Duration;

use tracing::{info, warn};

use silo_node_registry::{LivenessMonitorHandle, NodeRegistry};
use silo_types::config::{Configuration, InvalidConfigurationError};

#[derive(Debug, thiserror::Error)]
#[error("components did not stop within the shutdown grace period of {0:?}")]
pub struct ShutdownTimeout(Duration);

/// The controller's long-running components.
pub struct Application {
    registry: NodeRegistry,
}

impl Application {
    pub fn new(configuration: &Configuration) -> Result<Self, InvalidConfigurationError> {
        silo_node_registry::metric_definitions::describe_metrics();
        Ok(Self {
            registry: NodeRegistry::new(configuration.node_registry.clone())?,
        })
    }

    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    /// Starts background tasks on the current runtime.
    pub fn start(self) -> RunningApplication {
        let liveness_monitor = self.registry.start_liveness_monitor();
        info!("Controller started");
        RunningApplication {
            registry: self.registry,
            liveness_monitor,
        }
    }
}

pub struct RunningApplication {
    registry: NodeRegistry,
    liveness_monitor: LivenessMonitorHandle,
}

impl RunningApplication {
    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    /// Stops all background tasks, giving up after `grace_period`.
    pub async fn shutdown(self, grace_period: Duration) -> Result<(), ShutdownTimeout> {
        match tokio::time::timeout(grace_period, self.liveness_monitor.stop()).await {
            Ok(()) => {
                info!(
                    nodes = self.registry.all_nodes().len(),
                    "Controller has been gracefully shut down"
                );
                Ok(())
            }
            Err(_) => {
                warn!("Could not gracefully shut down the controller, terminating now.");
                Err(ShutdownTimeout(grace_period))
            }
        }
    }
}
