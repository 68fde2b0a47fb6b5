// Copyright (c) 2023 - 2026 Silo developers.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::collections::BTreeSet;

use crate::identifiers::{NodeId, PipelineId};

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    serde::Serialize,
    serde::Deserialize,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ReplicationFactor {
    One,
    #[default]
    Three,
}

impl ReplicationFactor {
    pub fn as_usize(&self) -> usize {
        match self {
            ReplicationFactor::One => 1,
            ReplicationFactor::Three => 3,
        }
    }
}

/// A fixed group of nodes replicating a set of containers. The pipeline carries its own member
/// list; the registry only mirrors membership per node.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Pipeline {
    pub id: PipelineId,
    pub replication: ReplicationFactor,
    pub members: Vec<NodeId>,
}

impl Pipeline {
    pub fn new(id: PipelineId, replication: ReplicationFactor, members: Vec<NodeId>) -> Self {
        Self {
            id,
            replication,
            members,
        }
    }

    /// Members without duplicates, in a stable order.
    pub fn member_set(&self) -> BTreeSet<NodeId> {
        self.members.iter().copied().collect()
    }

    pub fn is_member(&self, node_id: &NodeId) -> bool {
        self.members.contains(node_id)
    }
}
