// Copyright (c) 2023 - 2026 Silo developers.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::fmt;
use std::net::IpAddr;

use crate::identifiers::NodeId;
use crate::time::SecondsSinceEpoch;

/// Liveness classification of a node, derived from how recently it heartbeated.
///
/// Transitions are `Healthy <-> Stale <-> Dead`, and any heartbeat short-circuits straight back
/// to `Healthy` regardless of the current state. There is no terminal state.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    derive_more::IsVariant,
    strum::Display,
    strum::EnumIter,
    strum::IntoStaticStr,
    serde::Serialize,
    serde::Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeHealthState {
    #[default]
    Healthy,
    Stale,
    Dead,
}

impl NodeHealthState {
    /// Healthy and stale nodes may still be serving; only dead nodes are considered gone.
    pub fn is_potentially_alive(&self) -> bool {
        matches!(self, NodeHealthState::Healthy | NodeHealthState::Stale)
    }
}

/// Administrator controlled lifecycle state. Orthogonal to [`NodeHealthState`].
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    derive_more::IsVariant,
    strum::Display,
    strum::EnumIter,
    strum::IntoStaticStr,
    serde::Serialize,
    serde::Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeOperationalState {
    #[default]
    InService,
    Decommissioning,
    Decommissioned,
    EnteringMaintenance,
    InMaintenance,
}

/// Combined health and operational view of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct NodeStatus {
    pub health: NodeHealthState,
    pub operational_state: NodeOperationalState,
    /// `None` means the operational state never expires.
    pub operational_state_expiry: Option<SecondsSinceEpoch>,
}

impl NodeStatus {
    pub fn new(health: NodeHealthState, operational_state: NodeOperationalState) -> Self {
        Self {
            health,
            operational_state,
            operational_state_expiry: None,
        }
    }

    pub fn in_service_healthy() -> Self {
        Self::new(NodeHealthState::Healthy, NodeOperationalState::InService)
    }

    /// True if the operational state carries an expiry that has already passed at `now`.
    pub fn operational_state_expired(&self, now: SecondsSinceEpoch) -> bool {
        self.operational_state_expiry
            .is_some_and(|expiry| expiry <= now)
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.operational_state, self.health)
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    strum::Display,
    serde::Serialize,
    serde::Deserialize,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum PortName {
    /// Client data channel
    Data,
    /// Administrative/control channel
    Admin,
    /// Replication channel between pipeline members
    Replication,
    /// Channel used by single-node (standalone) pipelines
    Standalone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Port {
    pub name: PortName,
    pub value: u16,
}

impl Port {
    pub fn new(name: PortName, value: u16) -> Self {
        Self { name, value }
    }
}

/// Network identity of a storage node as supplied during registration.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct NodeDetails {
    pub node_id: NodeId,
    pub host_name: String,
    pub ip_address: IpAddr,
    pub ports: Vec<Port>,
    /// Location in the network topology, e.g. `/dc1/rack7`.
    #[serde(default)]
    pub network_location: Option<String>,
    /// Software version string the node runs, informational only.
    #[serde(default)]
    pub software_version: Option<String>,
}

impl NodeDetails {
    pub fn new(node_id: NodeId, host_name: impl Into<String>, ip_address: IpAddr) -> Self {
        Self {
            node_id,
            host_name: host_name.into(),
            ip_address,
            ports: Vec::new(),
            network_location: None,
            software_version: None,
        }
    }

    pub fn with_port(mut self, name: PortName, value: u16) -> Self {
        self.ports.retain(|p| p.name != name);
        self.ports.push(Port::new(name, value));
        self
    }

    pub fn port(&self, name: PortName) -> Option<u16> {
        self.ports.iter().find(|p| p.name == name).map(|p| p.value)
    }

    /// True if `address` is this node's ip address (textual form) or host name.
    pub fn matches_address(&self, address: &str) -> bool {
        self.host_name == address || self.ip_address.to_string() == address
    }
}

impl fmt::Display for NodeDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}/{})", self.node_id, self.host_name, self.ip_address)
    }
}

/// Predicate over node states used by listing and counting queries. `None` matches anything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NodeFilter {
    pub operational_state: Option<NodeOperationalState>,
    pub health: Option<NodeHealthState>,
}

impl NodeFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_health(health: NodeHealthState) -> Self {
        Self {
            operational_state: None,
            health: Some(health),
        }
    }

    pub fn with_operational_state(operational_state: NodeOperationalState) -> Self {
        Self {
            operational_state: Some(operational_state),
            health: None,
        }
    }

    pub fn exact(operational_state: NodeOperationalState, health: NodeHealthState) -> Self {
        Self {
            operational_state: Some(operational_state),
            health: Some(health),
        }
    }

    pub fn matches(&self, status: &NodeStatus) -> bool {
        self.operational_state
            .is_none_or_eq(status.operational_state)
            && self.health.is_none_or_eq(status.health)
    }
}

trait OptionExt<T> {
    fn is_none_or_eq(&self, other: T) -> bool;
}

impl<T: PartialEq> OptionExt<T> for Option<T> {
    fn is_none_or_eq(&self, other: T) -> bool {
        self.as_ref().map_or(true, |v| *v == other)
    }
}
