// Copyright (c) 2023 - 2026 Silo developers.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use tracing::{debug, warn};

use silo_types::layout::{LayoutVersion, NodeLayout};
use silo_types::node::NodeOperationalState;
use silo_types::NodeId;

use crate::{Error, NodeRegistry};

impl NodeRegistry {
    /// Records the layout versions a node reports.
    ///
    /// `current` may never go backwards; a lower value is rejected with
    /// [`Error::VersionRegression`] and the recorded layout stays as it was.
    pub fn process_layout_version_report(
        &self,
        node_id: &NodeId,
        current: LayoutVersion,
        finalized: LayoutVersion,
    ) -> Result<(), Error> {
        let entry = self.entry(node_id)?;
        let layout = NodeLayout::new(current, finalized);
        {
            let mut state = entry.state.lock();
            let recorded = state.layout.current;
            if current < recorded {
                warn!(
                    %node_id,
                    "Node reported layout version {} lower than the recorded {}",
                    current,
                    recorded
                );
                return Err(Error::VersionRegression {
                    node_id: *node_id,
                    recorded,
                    reported: current,
                });
            }
            state.layout = layout;
        }

        let latest = self.layout_features().latest_version();
        if current > latest {
            warn!(
                %node_id,
                "Node runs layout version {} which is newer than the latest known version {}",
                current,
                latest
            );
        } else if layout.needs_finalization() {
            debug!(%node_id, %current, %finalized, "Node has not finalized its layout version");
        }
        Ok(())
    }

    /// Lowest finalized layout version among nodes that may still be alive and are not
    /// decommissioned. `None` if there are no such nodes.
    pub fn cluster_minimum_finalized_version(&self) -> Option<LayoutVersion> {
        self.entries()
            .iter()
            .filter_map(|entry| {
                let state = entry.state.lock();
                (state.health.is_potentially_alive()
                    && state.operational_state != NodeOperationalState::Decommissioned)
                    .then_some(state.layout.finalized)
            })
            .min()
    }

    /// Nodes that have not yet finalized `version`, ordered by node id.
    pub fn nodes_below_layout(&self, version: LayoutVersion) -> Vec<NodeId> {
        let mut nodes: Vec<_> = self
            .entries()
            .iter()
            .filter(|entry| entry.state.lock().layout.finalized < version)
            .map(|entry| entry.node_id())
            .collect();
        nodes.sort();
        nodes
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use googletest::prelude::*;
    use silo_test_util::let_assert;
    use silo_types::config::NodeRegistryOptionsBuilder;
    use test_log::test;

    use super::*;

    fn v(version: u32) -> LayoutVersion {
        LayoutVersion::new(version)
    }

    fn registry() -> NodeRegistry {
        NodeRegistry::new(
            NodeRegistryOptionsBuilder::default()
                .stale_node_interval(Duration::from_secs(30).into())
                .dead_node_interval(Duration::from_secs(90).into())
                .build()
                .unwrap(),
        )
        .unwrap()
    }

    fn register(registry: &NodeRegistry, layout: NodeLayout) -> NodeId {
        registry
            .register(silo_test_util::rand::node_details(), layout)
            .node_id()
    }

    #[test]
    fn regression_is_rejected_and_leaves_record_unchanged() {
        let registry = registry();
        let node_id = register(&registry, NodeLayout::uniform(v(0)));

        registry
            .process_layout_version_report(&node_id, v(1), v(0))
            .unwrap();
        let_assert!(
            Err(Error::VersionRegression {
                recorded,
                reported,
                ..
            }) = registry.process_layout_version_report(&node_id, v(0), v(0))
        );
        assert_eq!(v(1), recorded);
        assert_eq!(v(0), reported);
        assert_eq!(
            NodeLayout::new(v(1), v(0)),
            registry.get_node(&node_id).unwrap().layout
        );

        // same version with progressed finalization is accepted
        registry
            .process_layout_version_report(&node_id, v(1), v(1))
            .unwrap();
        assert_eq!(
            NodeLayout::uniform(v(1)),
            registry.get_node(&node_id).unwrap().layout
        );
    }

    #[test]
    fn unknown_node_is_rejected() {
        let registry = registry();
        let_assert!(
            Err(Error::NodeNotFound(_)) =
                registry.process_layout_version_report(&NodeId::random(), v(1), v(1))
        );
    }

    #[test]
    fn empty_cluster_has_no_minimum() {
        assert_that!(registry().cluster_minimum_finalized_version(), none());
    }

    #[test(tokio::test(start_paused = true))]
    async fn minimum_ignores_dead_and_decommissioned_nodes() {
        let registry = registry();
        let old = register(&registry, NodeLayout::uniform(v(0)));
        let decommissioned = register(&registry, NodeLayout::uniform(v(0)));
        let _fresh = register(&registry, NodeLayout::uniform(v(1)));
        registry
            .set_operational_state(&decommissioned, NodeOperationalState::Decommissioned, None)
            .unwrap();

        assert_that!(registry.cluster_minimum_finalized_version(), some(eq(v(0))));
        assert_eq!(vec![old], {
            let mut below = registry.nodes_below_layout(v(1));
            below.retain(|node| *node != decommissioned);
            below
        });

        // old stops heartbeating and is declared dead
        tokio::time::advance(Duration::from_secs(60)).await;
        for node in registry.all_nodes() {
            if node.node_id() != old {
                registry.heartbeat(&node.node_id()).unwrap();
            }
        }
        tokio::time::advance(Duration::from_secs(60)).await;
        registry.check_liveness();

        assert_that!(registry.cluster_minimum_finalized_version(), some(eq(v(1))));
    }
}
