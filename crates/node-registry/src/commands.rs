// Copyright (c) 2023 - 2026 Silo developers.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Per-node FIFO of commands handed out on the node's next heartbeat.

use metrics::counter;
use tracing::{debug, trace};

use silo_types::commands::{NodeCommand, NodeCommandKind};
use silo_types::NodeId;

use crate::metric_definitions::{COMMANDS_DRAINED, COMMANDS_ENQUEUED, COMMANDS_REJECTED};
use crate::{Error, NodeRegistry};

impl NodeRegistry {
    /// Appends `command` to the node's queue.
    ///
    /// Fails with [`Error::CommandQueueFull`] if a `command-queue-limit` is configured and the
    /// queue already holds that many commands.
    pub fn enqueue(&self, node_id: &NodeId, command: NodeCommand) -> Result<(), Error> {
        let entry = self.entry(node_id)?;
        let kind = command.kind();
        {
            let mut queue = entry.commands.lock();
            if let Some(limit) = self.options().command_queue_limit {
                if queue.len() >= limit.get() {
                    drop(queue);
                    debug!(%node_id, %kind, "Rejecting command, queue is full");
                    counter!(COMMANDS_REJECTED).increment(1);
                    return Err(Error::CommandQueueFull {
                        node_id: *node_id,
                        limit: limit.get(),
                    });
                }
            }
            queue.push_back(command);
        }

        trace!(%node_id, %kind, "Queued command");
        counter!(COMMANDS_ENQUEUED, "kind" => <&'static str>::from(kind)).increment(1);
        Ok(())
    }

    /// Takes every pending command of the node in the order they were enqueued. Each command is
    /// returned by exactly one call.
    pub fn drain(&self, node_id: &NodeId) -> Result<Vec<NodeCommand>, Error> {
        let entry = self.entry(node_id)?;
        let commands = Vec::from(std::mem::take(&mut *entry.commands.lock()));
        if !commands.is_empty() {
            trace!(%node_id, count = commands.len(), "Drained commands");
            counter!(COMMANDS_DRAINED).increment(commands.len() as u64);
        }
        Ok(commands)
    }

    pub fn pending_command_count(&self, node_id: &NodeId) -> Result<usize, Error> {
        Ok(self.entry(node_id)?.commands.lock().len())
    }

    pub fn pending_command_count_by_kind(
        &self,
        node_id: &NodeId,
        kind: NodeCommandKind,
    ) -> Result<usize, Error> {
        Ok(self
            .entry(node_id)?
            .commands
            .lock()
            .iter()
            .filter(|command| command.kind() == kind)
            .count())
    }
}
