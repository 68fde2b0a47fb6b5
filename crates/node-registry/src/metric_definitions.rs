// Copyright (c) 2023 - 2026 Silo developers.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use metrics::{describe_counter, describe_gauge, Unit};

/// dimensioned by "health" and "operational_state"
pub const NODES: &str = "silo.node_registry.nodes";
/// dimensioned by "to" (target health state)
pub const HEALTH_TRANSITIONS: &str = "silo.node_registry.health_transitions.total";
pub const HEARTBEATS: &str = "silo.node_registry.heartbeats.total";
/// dimensioned by "kind"
pub const COMMANDS_ENQUEUED: &str = "silo.node_registry.commands_enqueued.total";
pub const COMMANDS_REJECTED: &str = "silo.node_registry.commands_rejected.total";
pub const COMMANDS_DRAINED: &str = "silo.node_registry.commands_drained.total";
pub const LIVENESS_CHECK_DURATION: &str = "silo.node_registry.liveness_check.duration.seconds";

pub const CAPACITY_BYTES: &str = "silo.node_registry.capacity.bytes";
pub const USED_BYTES: &str = "silo.node_registry.used.bytes";
pub const REMAINING_BYTES: &str = "silo.node_registry.remaining.bytes";

pub fn describe_metrics() {
    describe_gauge!(
        NODES,
        Unit::Count,
        "Number of registered nodes, dimensioned by health and operational state"
    );
    describe_counter!(
        HEALTH_TRANSITIONS,
        Unit::Count,
        "Number of node health transitions, dimensioned by target state"
    );
    describe_counter!(HEARTBEATS, Unit::Count, "Number of heartbeats accepted");
    describe_counter!(
        COMMANDS_ENQUEUED,
        Unit::Count,
        "Number of commands queued for nodes, dimensioned by kind"
    );
    describe_counter!(
        COMMANDS_REJECTED,
        Unit::Count,
        "Number of commands rejected because a node's queue was full"
    );
    describe_counter!(
        COMMANDS_DRAINED,
        Unit::Count,
        "Number of commands handed to nodes on heartbeat"
    );
    describe_gauge!(
        LIVENESS_CHECK_DURATION,
        Unit::Seconds,
        "Time spent evaluating the health of all nodes in the last liveness check"
    );
    describe_gauge!(
        CAPACITY_BYTES,
        Unit::Bytes,
        "Capacity of all nodes that are not decommissioned"
    );
    describe_gauge!(
        USED_BYTES,
        Unit::Bytes,
        "Used space on all nodes that are not decommissioned"
    );
    describe_gauge!(
        REMAINING_BYTES,
        Unit::Bytes,
        "Remaining space on all nodes that are not decommissioned"
    );
}
