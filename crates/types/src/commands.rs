// Copyright (c) 2023 - 2026 Silo developers.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Instructions the controller hands to storage nodes on their next heartbeat response.

use crate::identifiers::{ContainerId, NodeId, PipelineId};
use crate::layout::LayoutVersion;
use crate::node::{NodeDetails, NodeOperationalState};
use crate::pipeline::ReplicationFactor;
use crate::time::SecondsSinceEpoch;

#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    strum::EnumDiscriminants,
    serde::Serialize,
    serde::Deserialize,
)]
#[strum_discriminants(name(NodeCommandKind))]
#[strum_discriminants(derive(Hash, strum::Display, strum::EnumIter, strum::IntoStaticStr))]
#[strum_discriminants(strum(serialize_all = "kebab-case"))]
#[serde(rename_all = "kebab-case", tag = "type")]
pub enum NodeCommand {
    CloseContainer {
        container_id: ContainerId,
        pipeline_id: PipelineId,
        force: bool,
    },
    ReplicateContainer {
        container_id: ContainerId,
        sources: Vec<NodeId>,
    },
    DeleteContainer {
        container_id: ContainerId,
        force: bool,
    },
    CreatePipeline {
        pipeline_id: PipelineId,
        replication: ReplicationFactor,
        members: Vec<NodeDetails>,
    },
    ClosePipeline {
        pipeline_id: PipelineId,
    },
    FinalizeNewLayoutVersion {
        layout_version: LayoutVersion,
    },
    SetNodeOperationalState {
        operational_state: NodeOperationalState,
        expiry: Option<SecondsSinceEpoch>,
    },
    /// Sent to a node the controller does not know, asking it to register again.
    Reregister,
}

impl NodeCommand {
    pub fn kind(&self) -> NodeCommandKind {
        NodeCommandKind::from(self)
    }
}
