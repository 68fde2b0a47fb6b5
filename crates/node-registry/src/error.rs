// Copyright (c) 2023 - 2026 Silo developers.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use silo_types::layout::LayoutVersion;
use silo_types::NodeId;

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum Error {
    #[error("node {0} is not registered")]
    NodeNotFound(NodeId),
    #[error(
        "node {node_id} reported layout version {reported} which is lower than the recorded version {recorded}"
    )]
    VersionRegression {
        node_id: NodeId,
        recorded: LayoutVersion,
        reported: LayoutVersion,
    },
    #[error("command queue of node {node_id} is full ({limit} commands pending)")]
    CommandQueueFull { node_id: NodeId, limit: usize },
}

impl Error {
    /// The node this error refers to.
    pub fn node_id(&self) -> NodeId {
        match self {
            Error::NodeNotFound(node_id) => *node_id,
            Error::VersionRegression { node_id, .. } => *node_id,
            Error::CommandQueueFull { node_id, .. } => *node_id,
        }
    }

    /// Whether the caller should ask the node to register again before retrying.
    pub fn requires_reregistration(&self) -> bool {
        matches!(self, Error::NodeNotFound(_))
    }
}
