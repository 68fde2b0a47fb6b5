// Copyright (c) 2023 - 2026 Silo developers.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::collections::hash_map::Entry;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use metrics::counter;
use parking_lot::RwLock;
use strum::IntoEnumIterator;
use tokio::sync::futures::Notified;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use silo_types::config::{InvalidConfigurationError, NodeRegistryOptions};
use silo_types::layout::{LayoutFeatureCatalog, NodeLayout};
use silo_types::node::{
    NodeDetails, NodeFilter, NodeHealthState, NodeOperationalState, NodeStatus,
};
use silo_types::pipeline::Pipeline;
use silo_types::storage_report::{NodeReport, StorageStats};
use silo_types::time::SecondsSinceEpoch;
use silo_types::{NodeId, PipelineId};

use crate::health_watch::NodeHealthWatch;
use crate::metric_definitions::{HEALTH_TRANSITIONS, HEARTBEATS};
use crate::node_entry::{NodeEntry, NodeRecord};
use crate::Error;

/// Number of nodes per operational and health state.
pub type NodeCountMatrix = BTreeMap<(NodeOperationalState, NodeHealthState), usize>;

/// Shared, cloneable handle to the set of storage nodes known to the controller.
///
/// The node map is only write-locked to add or remove a node. Everything else takes the read lock
/// just long enough to clone the node's entry and then works on that node's own locks, so
/// operations on different nodes never wait for each other.
#[derive(Clone)]
pub struct NodeRegistry {
    inner: Arc<Inner>,
}

struct Inner {
    nodes: RwLock<ahash::HashMap<NodeId, Arc<NodeEntry>>>,
    pipelines: DashMap<PipelineId, Pipeline>,
    options: NodeRegistryOptions,
    layout_features: LayoutFeatureCatalog,
    health_changed: Notify,
}

impl NodeRegistry {
    pub fn new(options: NodeRegistryOptions) -> Result<Self, InvalidConfigurationError> {
        Self::with_layout_features(options, LayoutFeatureCatalog::builtin())
    }

    /// Fails if the liveness intervals in `options` are zero or out of order.
    pub fn with_layout_features(
        options: NodeRegistryOptions,
        layout_features: LayoutFeatureCatalog,
    ) -> Result<Self, InvalidConfigurationError> {
        options.validate()?;
        Ok(Self {
            inner: Arc::new(Inner {
                nodes: RwLock::default(),
                pipelines: DashMap::default(),
                options,
                layout_features,
                health_changed: Notify::new(),
            }),
        })
    }

    pub fn options(&self) -> &NodeRegistryOptions {
        &self.inner.options
    }

    pub fn layout_features(&self) -> &LayoutFeatureCatalog {
        &self.inner.layout_features
    }

    pub(crate) fn known_pipelines(&self) -> &DashMap<PipelineId, Pipeline> {
        &self.inner.pipelines
    }

    pub(crate) fn entry(&self, node_id: &NodeId) -> Result<Arc<NodeEntry>, Error> {
        self.try_entry(node_id).ok_or(Error::NodeNotFound(*node_id))
    }

    pub(crate) fn try_entry(&self, node_id: &NodeId) -> Option<Arc<NodeEntry>> {
        self.inner.nodes.read().get(node_id).cloned()
    }

    pub(crate) fn entries(&self) -> Vec<Arc<NodeEntry>> {
        self.inner.nodes.read().values().cloned().collect()
    }

    /// Adds a node or refreshes the details of a node that registered before.
    ///
    /// A new node starts healthy and in service with its heartbeat clock set to now. For a known
    /// node only the details change, plus the layout if the node now runs a newer version.
    pub fn register(&self, details: NodeDetails, layout: NodeLayout) -> NodeRecord {
        let node_id = details.node_id;
        if let Some(entry) = self.try_entry(&node_id) {
            Self::update_registration(&entry, details, layout);
            return entry.snapshot();
        }

        let (entry, created) = {
            let mut nodes = self.inner.nodes.write();
            match nodes.entry(node_id) {
                Entry::Occupied(occupied) => (Arc::clone(occupied.get()), false),
                Entry::Vacant(vacant) => {
                    let entry = Arc::new(NodeEntry::new(details.clone(), layout, Instant::now()));
                    (Arc::clone(vacant.insert(entry)), true)
                }
            }
        };

        if created {
            info!(
                %node_id,
                host = %details.host_name,
                ip = %details.ip_address,
                layout_version = %layout.current,
                "Registered new node"
            );
        } else {
            Self::update_registration(&entry, details, layout);
        }
        entry.snapshot()
    }

    fn update_registration(entry: &NodeEntry, details: NodeDetails, layout: NodeLayout) {
        let node_id = entry.node_id();
        let mut state = entry.state.lock();
        if state.details != details {
            debug!(%node_id, "Updating details of re-registered node: {}", details);
            state.details = details;
        }

        if layout.current < state.layout.current {
            warn!(
                %node_id,
                "Node re-registered with layout version {} lower than the recorded {}, ignoring it",
                layout.current,
                state.layout.current,
            );
        } else if layout != state.layout {
            debug!(%node_id, "Node re-registered with layout {:?}", layout);
            state.layout = layout;
        }
    }

    /// Records a sign of life. The node becomes healthy again no matter what state it was in.
    pub fn heartbeat(&self, node_id: &NodeId) -> Result<(), Error> {
        let entry = self.entry(node_id)?;
        let previous = {
            let mut state = entry.state.lock();
            let now = Instant::now();
            if now > state.last_heartbeat {
                state.last_heartbeat = now;
            }
            entry.transition_health(&mut state, NodeHealthState::Healthy)
        };

        trace!(%node_id, "Heartbeat");
        counter!(HEARTBEATS).increment(1);
        if let Some(previous) = previous {
            self.on_health_transition(node_id, previous, NodeHealthState::Healthy);
            self.inner.health_changed.notify_waiters();
        }
        Ok(())
    }

    pub(crate) fn on_health_transition(
        &self,
        node_id: &NodeId,
        previous: NodeHealthState,
        current: NodeHealthState,
    ) {
        if previous.is_dead() || current.is_dead() {
            info!(%node_id, "Node health changed from {} to {}", previous, current);
        } else {
            debug!(%node_id, "Node health changed from {} to {}", previous, current);
        }
        counter!(HEALTH_TRANSITIONS, "to" => <&'static str>::from(current)).increment(1);
    }

    pub(crate) fn notify_health_changed(&self) {
        self.inner.health_changed.notify_waiters();
    }

    /// Replaces the storage statistics of a node with the ones derived from `report`.
    pub fn process_node_report(&self, node_id: &NodeId, report: &NodeReport) -> Result<(), Error> {
        let entry = self.entry(node_id)?;
        entry.state.lock().apply_report(report);
        trace!(%node_id, volumes = report.storage_reports.len(), "Processed node report");
        Ok(())
    }

    pub fn get_status(&self, node_id: &NodeId) -> Result<NodeStatus, Error> {
        Ok(self.entry(node_id)?.state.lock().status())
    }

    /// Overwrites the operational state of a node. Any state may follow any other; the expiry is
    /// recorded but never acted upon by the registry itself.
    pub fn set_operational_state(
        &self,
        node_id: &NodeId,
        operational_state: NodeOperationalState,
        expiry: Option<SecondsSinceEpoch>,
    ) -> Result<(), Error> {
        let entry = self.entry(node_id)?;
        let previous = {
            let mut state = entry.state.lock();
            state.operational_state_expiry = expiry;
            std::mem::replace(&mut state.operational_state, operational_state)
        };

        if previous != operational_state {
            info!(
                %node_id,
                "Node operational state changed from {} to {}",
                previous,
                operational_state
            );
        }
        Ok(())
    }

    pub fn get_node(&self, node_id: &NodeId) -> Result<NodeRecord, Error> {
        Ok(self.entry(node_id)?.snapshot())
    }

    /// Looks up a node by the textual form of its id. Unparsable or unknown ids yield `None`.
    pub fn node_by_uuid_str(&self, node_id: &str) -> Option<NodeRecord> {
        let node_id = node_id.parse::<NodeId>().ok()?;
        self.try_entry(&node_id).map(|entry| entry.snapshot())
    }

    /// Nodes whose ip address or host name equals `address`.
    pub fn nodes_by_address(&self, address: &str) -> Vec<NodeRecord> {
        let mut records: Vec<_> = self
            .entries()
            .into_iter()
            .filter(|entry| entry.state.lock().details.matches_address(address))
            .map(|entry| entry.snapshot())
            .collect();
        records.sort_by_key(NodeRecord::node_id);
        records
    }

    /// Snapshot of every node matching `filter`, ordered by node id.
    pub fn list_nodes(&self, filter: NodeFilter) -> Vec<NodeRecord> {
        let mut records: Vec<_> = self
            .entries()
            .into_iter()
            .map(|entry| entry.snapshot())
            .filter(|record| filter.matches(&record.status))
            .collect();
        records.sort_by_key(NodeRecord::node_id);
        records
    }

    pub fn all_nodes(&self) -> Vec<NodeRecord> {
        self.list_nodes(NodeFilter::all())
    }

    pub fn node_count(&self, filter: NodeFilter) -> usize {
        self.entries()
            .iter()
            .filter(|entry| filter.matches(&entry.state.lock().status()))
            .count()
    }

    /// Node counts for every combination of operational and health state, including empty ones.
    pub fn node_count_matrix(&self) -> NodeCountMatrix {
        let mut matrix = empty_count_matrix();
        for entry in self.entries() {
            let status = entry.state.lock().status();
            *matrix
                .entry((status.operational_state, status.health))
                .or_default() += 1;
        }
        matrix
    }

    /// Sum of the storage statistics of all nodes that are not decommissioned.
    pub fn aggregate_stats(&self) -> StorageStats {
        self.entries()
            .iter()
            .filter_map(|entry| {
                let state = entry.state.lock();
                (state.operational_state != NodeOperationalState::Decommissioned)
                    .then_some(state.storage_stats)
            })
            .sum()
    }

    pub fn node_stats(&self) -> BTreeMap<NodeId, StorageStats> {
        self.entries()
            .iter()
            .map(|entry| (entry.node_id(), entry.state.lock().storage_stats))
            .collect()
    }

    pub fn node_stat(&self, node_id: &NodeId) -> Result<StorageStats, Error> {
        Ok(self.entry(node_id)?.state.lock().storage_stats)
    }

    pub fn last_heartbeat_age(&self, node_id: &NodeId) -> Result<Duration, Error> {
        let entry = self.entry(node_id)?;
        let last_heartbeat = entry.state.lock().last_heartbeat;
        Ok(Instant::now().saturating_duration_since(last_heartbeat))
    }

    /// Forgets a node. It is dropped from every pipeline it was a member of and its pending
    /// commands are discarded. Health watchers observe the node as dead.
    pub fn remove_node(&self, node_id: &NodeId) -> Result<NodeRecord, Error> {
        let entry = self
            .inner
            .nodes
            .write()
            .remove(node_id)
            .ok_or(Error::NodeNotFound(*node_id))?;

        let record = entry.snapshot();
        let pipelines = std::mem::take(&mut entry.membership.lock().pipelines);
        for pipeline_id in &pipelines {
            if let Some(mut pipeline) = self.inner.pipelines.get_mut(pipeline_id) {
                pipeline.members.retain(|member| member != node_id);
            }
        }
        let discarded = entry.commands.lock().len();

        info!(
            %node_id,
            pipelines = pipelines.len(),
            discarded_commands = discarded,
            "Removed node"
        );
        self.notify_health_changed();
        Ok(record)
    }

    /// Smallest number of healthy volumes among the given nodes. Unknown nodes are ignored.
    pub fn min_healthy_volume_count(&self, node_ids: &[NodeId]) -> Option<usize> {
        node_ids
            .iter()
            .filter_map(|node_id| self.try_entry(node_id))
            .map(|entry| entry.state.lock().healthy_volumes)
            .min()
    }

    /// How many pipelines the node may be a member of.
    pub fn pipeline_limit(&self, node_id: &NodeId) -> Result<usize, Error> {
        let entry = self.entry(node_id)?;
        let metadata_volumes = entry.state.lock().healthy_metadata_volumes;
        Ok(self.pipeline_limit_for(metadata_volumes))
    }

    fn pipeline_limit_for(&self, healthy_metadata_volumes: usize) -> usize {
        match self.inner.options.datanode_pipeline_limit {
            Some(limit) => limit.get() as usize,
            None => {
                healthy_metadata_volumes * self.inner.options.pipelines_per_volume.get() as usize
            }
        }
    }

    /// Smallest pipeline limit among the given nodes. Unknown nodes are ignored.
    pub fn min_pipeline_limit(&self, node_ids: &[NodeId]) -> Option<usize> {
        node_ids
            .iter()
            .filter_map(|node_id| self.try_entry(node_id))
            .map(|entry| {
                let metadata_volumes = entry.state.lock().healthy_metadata_volumes;
                self.pipeline_limit_for(metadata_volumes)
            })
            .min()
    }

    /// Nodes whose operational state carries an expiry at or before `now`.
    ///
    /// The registry never reverts an expired state on its own; this is meant for whoever drives
    /// decommissioning and maintenance.
    pub fn expired_operational_states(&self, now: SecondsSinceEpoch) -> Vec<(NodeId, NodeStatus)> {
        let mut expired: Vec<_> = self
            .entries()
            .iter()
            .filter_map(|entry| {
                let status = entry.state.lock().status();
                status
                    .operational_state_expired(now)
                    .then_some((entry.node_id(), status))
            })
            .collect();
        expired.sort_by_key(|(node_id, _)| *node_id);
        expired
    }

    pub fn watch_health(&self, node_id: &NodeId) -> Result<NodeHealthWatch, Error> {
        let entry = self.entry(node_id)?;
        Ok(NodeHealthWatch::new(*node_id, entry.subscribe_health()))
    }

    /// Resolves on the next health transition of any node, or when a node is removed.
    ///
    /// Only transitions that happen after the returned future was first polled (or
    /// [`Notified::enable`]d) are observed.
    pub fn health_changed(&self) -> Notified<'_> {
        self.inner.health_changed.notified()
    }
}

pub(crate) fn empty_count_matrix() -> NodeCountMatrix {
    NodeOperationalState::iter()
        .flat_map(|op| NodeHealthState::iter().map(move |health| ((op, health), 0)))
        .collect()
}
