// Copyright (c) 2023 - 2026 Silo developers.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::collections::{BTreeSet, VecDeque};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::time::Instant;

use silo_types::commands::NodeCommand;
use silo_types::layout::NodeLayout;
use silo_types::node::{NodeDetails, NodeHealthState, NodeOperationalState, NodeStatus};
use silo_types::storage_report::{NodeReport, StorageStats};
use silo_types::time::SecondsSinceEpoch;
use silo_types::{ContainerId, NodeId, PipelineId};

/// Classifies a node by the time since its last heartbeat. Both thresholds are exclusive: a node
/// whose heartbeat is exactly `stale` old is still healthy.
pub fn health_for_elapsed(elapsed: Duration, stale: Duration, dead: Duration) -> NodeHealthState {
    if elapsed > dead {
        NodeHealthState::Dead
    } else if elapsed > stale {
        NodeHealthState::Stale
    } else {
        NodeHealthState::Healthy
    }
}

/// Everything the registry tracks about a single node.
///
/// The three mutexes are independent. The only place that holds more than one of them is
/// [`NodeEntry::snapshot`], which always locks `state` before `membership`.
pub(crate) struct NodeEntry {
    node_id: NodeId,
    pub(crate) state: Mutex<NodeState>,
    pub(crate) commands: Mutex<VecDeque<NodeCommand>>,
    pub(crate) membership: Mutex<Membership>,
    health_watch: watch::Sender<NodeHealthState>,
}

pub(crate) struct NodeState {
    pub details: NodeDetails,
    pub health: NodeHealthState,
    pub operational_state: NodeOperationalState,
    pub operational_state_expiry: Option<SecondsSinceEpoch>,
    pub last_heartbeat: Instant,
    pub layout: NodeLayout,
    pub storage_stats: StorageStats,
    pub healthy_volumes: usize,
    pub healthy_metadata_volumes: usize,
    pub failed_volumes: usize,
}

#[derive(Default)]
pub(crate) struct Membership {
    pub containers: BTreeSet<ContainerId>,
    pub pipelines: BTreeSet<PipelineId>,
}

impl NodeState {
    pub fn status(&self) -> NodeStatus {
        NodeStatus {
            health: self.health,
            operational_state: self.operational_state,
            operational_state_expiry: self.operational_state_expiry,
        }
    }

    pub fn apply_report(&mut self, report: &NodeReport) {
        self.storage_stats = report.storage_stats();
        self.healthy_volumes = report.healthy_volume_count();
        self.healthy_metadata_volumes = report.healthy_metadata_volume_count();
        self.failed_volumes = report.failed_volume_count();
    }
}

impl NodeEntry {
    pub fn new(details: NodeDetails, layout: NodeLayout, now: Instant) -> Self {
        let node_id = details.node_id;
        Self {
            node_id,
            state: Mutex::new(NodeState {
                details,
                health: NodeHealthState::Healthy,
                operational_state: NodeOperationalState::InService,
                operational_state_expiry: None,
                last_heartbeat: now,
                layout,
                storage_stats: StorageStats::ZERO,
                healthy_volumes: 0,
                healthy_metadata_volumes: 0,
                failed_volumes: 0,
            }),
            commands: Mutex::default(),
            membership: Mutex::default(),
            health_watch: watch::Sender::new(NodeHealthState::Healthy),
        }
    }

    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    /// Moves the node to `health` while the caller holds the state lock. Returns the previous
    /// state if this was a transition.
    pub fn transition_health(
        &self,
        state: &mut NodeState,
        health: NodeHealthState,
    ) -> Option<NodeHealthState> {
        if state.health == health {
            return None;
        }
        let previous = std::mem::replace(&mut state.health, health);
        self.health_watch.send_replace(health);
        Some(previous)
    }

    pub fn subscribe_health(&self) -> watch::Receiver<NodeHealthState> {
        self.health_watch.subscribe()
    }

    pub fn snapshot(&self) -> NodeRecord {
        let state = self.state.lock();
        let membership = self.membership.lock();
        NodeRecord {
            details: state.details.clone(),
            status: state.status(),
            last_heartbeat: state.last_heartbeat,
            layout: state.layout,
            storage_stats: state.storage_stats,
            healthy_volumes: state.healthy_volumes,
            failed_volumes: state.failed_volumes,
            container_count: membership.containers.len(),
            pipeline_count: membership.pipelines.len(),
        }
    }
}

/// Point-in-time copy of a node's record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeRecord {
    pub details: NodeDetails,
    pub status: NodeStatus,
    pub last_heartbeat: Instant,
    pub layout: NodeLayout,
    pub storage_stats: StorageStats,
    pub healthy_volumes: usize,
    pub failed_volumes: usize,
    pub container_count: usize,
    pub pipeline_count: usize,
}

impl NodeRecord {
    pub fn node_id(&self) -> NodeId {
        self.details.node_id
    }

    pub fn health(&self) -> NodeHealthState {
        self.status.health
    }

    pub fn operational_state(&self) -> NodeOperationalState {
        self.status.operational_state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use googletest::prelude::*;

    const STALE: Duration = Duration::from_secs(30);
    const DEAD: Duration = Duration::from_secs(90);

    #[test]
    fn health_thresholds_are_exclusive() {
        assert_that!(
            health_for_elapsed(Duration::ZERO, STALE, DEAD),
            eq(NodeHealthState::Healthy)
        );
        assert_that!(
            health_for_elapsed(STALE, STALE, DEAD),
            eq(NodeHealthState::Healthy)
        );
        assert_that!(
            health_for_elapsed(STALE + Duration::from_millis(1), STALE, DEAD),
            eq(NodeHealthState::Stale)
        );
        assert_that!(
            health_for_elapsed(DEAD, STALE, DEAD),
            eq(NodeHealthState::Stale)
        );
        assert_that!(
            health_for_elapsed(Duration::from_secs(3600), STALE, DEAD),
            eq(NodeHealthState::Dead)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn transition_publishes_on_watch() {
        let details = silo_test_util::rand::node_details();
        let entry = NodeEntry::new(details, NodeLayout::default(), Instant::now());
        let mut rx = entry.subscribe_health();

        {
            let mut state = entry.state.lock();
            assert_eq!(None, entry.transition_health(&mut state, NodeHealthState::Healthy));
            assert_eq!(
                Some(NodeHealthState::Healthy),
                entry.transition_health(&mut state, NodeHealthState::Stale)
            );
        }

        assert!(rx.has_changed().unwrap());
        assert_eq!(NodeHealthState::Stale, *rx.borrow_and_update());
        assert_eq!(NodeHealthState::Stale, entry.snapshot().health());
    }
}
