// Copyright (c) 2023 - 2026 Silo developers.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use metrics::gauge;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use silo_types::node::{NodeHealthState, NodeOperationalState};
use silo_types::storage_report::StorageStats;

use crate::metric_definitions::{
    CAPACITY_BYTES, LIVENESS_CHECK_DURATION, NODES, REMAINING_BYTES, USED_BYTES,
};
use crate::node_entry::{health_for_elapsed, NodeEntry};
use crate::registry::empty_count_matrix;
use crate::NodeRegistry;

const TICK_LAG_WARN_THRESHOLD: Duration = Duration::from_secs(5);

/// Outcome of one liveness evaluation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LivenessCheck {
    pub evaluated: usize,
    pub transitions: usize,
    /// Nodes whose evaluation panicked. They keep their previous health until the next check.
    pub failed: usize,
}

/// Result of evaluating a single node.
struct NodeEvaluation {
    operational_state: NodeOperationalState,
    health: NodeHealthState,
    storage_stats: StorageStats,
    transitioned: bool,
}

impl NodeRegistry {
    /// Re-evaluates the health of every node against the configured thresholds.
    ///
    /// Each node is evaluated under its own lock, so a heartbeat that lands concurrently is
    /// either seen by this evaluation or applied after it; it is never overwritten. A panic while
    /// evaluating one node is logged and the remaining nodes are still evaluated.
    pub fn check_liveness(&self) -> LivenessCheck {
        let stale = self.options().stale_node_interval();
        let dead = self.options().dead_node_interval();
        self.check_liveness_with(|entry| self.evaluate_node(entry, stale, dead))
    }

    fn check_liveness_with(
        &self,
        mut evaluate: impl FnMut(&NodeEntry) -> NodeEvaluation,
    ) -> LivenessCheck {
        let started = std::time::Instant::now();
        let mut check = LivenessCheck::default();
        let mut counts = empty_count_matrix();
        let mut aggregate = StorageStats::ZERO;

        for entry in self.entries() {
            let evaluation =
                match std::panic::catch_unwind(AssertUnwindSafe(|| evaluate(&entry))) {
                    Ok(evaluation) => evaluation,
                    Err(panic) => {
                        check.failed += 1;
                        error!(
                            node_id = %entry.node_id(),
                            "Liveness evaluation of node panicked, skipping it: {}",
                            panic_reason(panic.as_ref())
                        );
                        continue;
                    }
                };

            check.evaluated += 1;
            *counts
                .entry((evaluation.operational_state, evaluation.health))
                .or_default() += 1;
            if evaluation.operational_state != NodeOperationalState::Decommissioned {
                aggregate = aggregate + evaluation.storage_stats;
            }
            if evaluation.transitioned {
                check.transitions += 1;
            }
        }

        if check.transitions > 0 {
            self.notify_health_changed();
        }

        for ((operational_state, health), count) in counts {
            gauge!(
                NODES,
                "health" => <&'static str>::from(health),
                "operational_state" => <&'static str>::from(operational_state),
            )
            .set(count as f64);
        }
        gauge!(CAPACITY_BYTES).set(aggregate.capacity as f64);
        gauge!(USED_BYTES).set(aggregate.used as f64);
        gauge!(REMAINING_BYTES).set(aggregate.remaining as f64);
        gauge!(LIVENESS_CHECK_DURATION).set(started.elapsed().as_secs_f64());

        check
    }

    fn evaluate_node(&self, entry: &NodeEntry, stale: Duration, dead: Duration) -> NodeEvaluation {
        let (previous, evaluation) = {
            let mut state = entry.state.lock();
            let elapsed = Instant::now().saturating_duration_since(state.last_heartbeat);
            let health = health_for_elapsed(elapsed, stale, dead);
            let previous = entry.transition_health(&mut state, health);
            (
                previous,
                NodeEvaluation {
                    operational_state: state.operational_state,
                    health,
                    storage_stats: state.storage_stats,
                    transitioned: previous.is_some(),
                },
            )
        };

        if let Some(previous) = previous {
            self.on_health_transition(&entry.node_id(), previous, evaluation.health);
        }
        evaluation
    }

    /// Spawns the periodic liveness monitor on the current tokio runtime.
    pub fn start_liveness_monitor(&self) -> LivenessMonitorHandle {
        LivenessMonitor::new(self.clone()).start()
    }
}

fn panic_reason(panic: &(dyn Any + Send)) -> &str {
    if let Some(reason) = panic.downcast_ref::<&str>() {
        reason
    } else if let Some(reason) = panic.downcast_ref::<String>() {
        reason
    } else {
        "<unknown>"
    }
}

/// Periodically runs [`NodeRegistry::check_liveness`].
pub struct LivenessMonitor {
    registry: NodeRegistry,
    interval: Duration,
}

impl LivenessMonitor {
    pub fn new(registry: NodeRegistry) -> Self {
        let interval = registry.options().liveness_check_interval();
        Self { registry, interval }
    }

    pub fn start(self) -> LivenessMonitorHandle {
        let cancellation = CancellationToken::new();
        let task = tokio::spawn(self.run(cancellation.clone()));
        LivenessMonitorHandle { cancellation, task }
    }

    async fn run(self, cancellation: CancellationToken) {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(interval = ?self.interval, "Liveness monitor started");

        loop {
            tokio::select! {
                biased;
                _ = cancellation.cancelled() => break,
                tick_instant = interval.tick() => {
                    self.tick(tick_instant);
                }
            }
        }

        info!("Liveness monitor stopped");
    }

    fn tick(&self, tick_instant: Instant) {
        // Used as proxy for overload/stall detection
        let tick_lag = tick_instant.elapsed();
        if tick_lag >= TICK_LAG_WARN_THRESHOLD {
            warn!(
                "Severe lag ({:?}) was detected in the liveness monitor timer, \
                    this indicates an overload or a stall.",
                tick_lag,
            );
        }

        // per-node failures are handled inside the check; this guards metric publishing
        match std::panic::catch_unwind(AssertUnwindSafe(|| self.registry.check_liveness())) {
            Ok(check) if check.transitions > 0 || check.failed > 0 => {
                debug!(
                    evaluated = check.evaluated,
                    transitions = check.transitions,
                    failed = check.failed,
                    "Liveness check finished"
                );
            }
            Ok(_) => {}
            Err(panic) => {
                error!(
                    "Liveness check panicked, continuing with the next tick: {}",
                    panic_reason(panic.as_ref())
                );
            }
        }
    }
}

/// Owns the running liveness monitor task.
pub struct LivenessMonitorHandle {
    cancellation: CancellationToken,
    task: JoinHandle<()>,
}

impl LivenessMonitorHandle {
    /// Signals the monitor to stop and waits for it. A check that is already running completes
    /// first.
    pub async fn stop(self) {
        self.cancellation.cancel();
        if let Err(err) = self.task.await {
            if err.is_panic() {
                error!("Liveness monitor task panicked: {}", err);
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation
    }
}
