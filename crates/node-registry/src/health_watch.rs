// Copyright (c) 2023 - 2026 Silo developers.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use tokio::sync::watch;

use silo_types::node::NodeHealthState;
use silo_types::NodeId;

/// Follows the health of a single node.
///
/// Once the node is removed from the registry the watch reports it as [`NodeHealthState::Dead`].
#[derive(Debug, Clone)]
pub struct NodeHealthWatch {
    node_id: NodeId,
    rx: watch::Receiver<NodeHealthState>,
}

impl NodeHealthWatch {
    pub(crate) fn new(node_id: NodeId, rx: watch::Receiver<NodeHealthState>) -> Self {
        Self { node_id, rx }
    }

    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    pub fn current(&self) -> NodeHealthState {
        if self.is_closed() {
            return NodeHealthState::Dead;
        }
        *self.rx.borrow()
    }

    /// True once the node has been removed from the registry.
    pub fn is_closed(&self) -> bool {
        self.rx.has_changed().is_err()
    }

    /// Waits for the next transition and returns the new state.
    pub async fn changed(&mut self) -> NodeHealthState {
        match self.rx.changed().await {
            Ok(()) => *self.rx.borrow_and_update(),
            Err(_) => NodeHealthState::Dead,
        }
    }

    /// Waits until the node's health satisfies `predicate`, returning immediately if it already
    /// does.
    pub async fn wait_for(
        &mut self,
        mut predicate: impl FnMut(NodeHealthState) -> bool,
    ) -> NodeHealthState {
        if self.is_closed() {
            return NodeHealthState::Dead;
        }
        let state = match self.rx.wait_for(|state| predicate(*state)).await {
            Ok(state) => *state,
            Err(_) => return NodeHealthState::Dead,
        };
        // the node may have been removed right after its last transition
        if self.is_closed() {
            NodeHealthState::Dead
        } else {
            state
        }
    }
}
