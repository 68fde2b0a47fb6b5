// Copyright (c) 2023 - 2026 Silo developers.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use tracing::debug;

use silo_types::commands::NodeCommand;
use silo_types::layout::NodeLayout;
use silo_types::node::NodeDetails;
use silo_types::NodeId;

use crate::{Error, NodeRecord, NodeRegistry};

/// Shortcuts for the node-facing request handlers.
pub trait NodeRegistryExt {
    /// Registers a node that did not report layout versions, assuming it runs and has finalized
    /// the latest layout this controller knows.
    fn register_with_default_layout(&self, details: NodeDetails) -> NodeRecord;

    /// Records a heartbeat and returns the commands to piggyback on the response. A node the
    /// registry does not know is told to register again.
    fn heartbeat_and_drain(&self, node_id: &NodeId) -> Result<Vec<NodeCommand>, Error>;
}

impl NodeRegistryExt for NodeRegistry {
    fn register_with_default_layout(&self, details: NodeDetails) -> NodeRecord {
        let layout = NodeLayout::uniform(self.layout_features().latest_version());
        self.register(details, layout)
    }

    fn heartbeat_and_drain(&self, node_id: &NodeId) -> Result<Vec<NodeCommand>, Error> {
        match self.heartbeat(node_id) {
            Ok(()) => self.drain(node_id),
            Err(err) if err.requires_reregistration() => {
                debug!(
                    node_id = %err.node_id(),
                    "Heartbeat from unregistered node, asking it to re-register"
                );
                Ok(vec![NodeCommand::Reregister])
            }
            Err(err) => Err(err),
        }
    }
}
