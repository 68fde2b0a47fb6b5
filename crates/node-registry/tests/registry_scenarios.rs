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
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use googletest::prelude::*;
use test_log::test;

use silo_node_registry::{Error, NodeRegistry, NodeRegistryExt};
use silo_test_util::let_assert;
use silo_types::commands::{NodeCommand, NodeCommandKind};
use silo_types::config::{NodeRegistryOptions, NodeRegistryOptionsBuilder};
use silo_types::layout::{LayoutVersion, NodeLayout};
use silo_types::node::{NodeFilter, NodeHealthState, NodeOperationalState};
use silo_types::pipeline::{Pipeline, ReplicationFactor};
use silo_types::storage_report::{NodeReport, StorageReport, StorageStats};
use silo_types::time::SecondsSinceEpoch;
use silo_types::{ContainerId, NodeId, PipelineId};

fn options() -> NodeRegistryOptions {
    NodeRegistryOptionsBuilder::default()
        .liveness_check_interval(Duration::from_secs(3).into())
        .stale_node_interval(Duration::from_secs(30).into())
        .dead_node_interval(Duration::from_secs(90).into())
        .build()
        .unwrap()
}

#[test(tokio::test(flavor = "multi_thread", worker_threads = 4))]
async fn concurrent_heartbeats_revive_dead_nodes() {
    let registry = NodeRegistry::new(
        NodeRegistryOptionsBuilder::default()
            .stale_node_interval(Duration::from_millis(20).into())
            .dead_node_interval(Duration::from_millis(40).into())
            .build()
            .unwrap(),
    )
    .unwrap();
    let nodes: Vec<NodeId> = (0..1_000)
        .map(|_| {
            registry
                .register_with_default_layout(silo_test_util::rand::node_details())
                .node_id()
        })
        .collect();

    tokio::time::sleep(Duration::from_millis(100)).await;
    registry.check_liveness();
    assert_eq!(
        1_000,
        registry.node_count(NodeFilter::with_health(NodeHealthState::Dead))
    );

    let workers = nodes.chunks(100).map(|chunk| {
        let registry = registry.clone();
        let chunk = chunk.to_vec();
        tokio::spawn(async move {
            for round in 0..5u64 {
                for node_id in &chunk {
                    registry.heartbeat(node_id).unwrap();
                    let report = NodeReport::new(vec![StorageReport::new(
                        "/data/disk0",
                        1_000,
                        round * 100,
                    )]);
                    registry.process_node_report(node_id, &report).unwrap();
                    // readers interleave with writers
                    let _ = registry.aggregate_stats();
                    let _ = registry.node_count_matrix();
                }
                tokio::task::yield_now().await;
            }
        })
    });
    for result in join_all(workers).await {
        result.unwrap();
    }

    // no liveness check ran since, so every heartbeat must have healed its node
    assert_eq!(
        1_000,
        registry.node_count(NodeFilter::with_health(NodeHealthState::Healthy))
    );
    // every node ends on its last report
    assert_eq!(
        StorageStats::new(1_000_000, 400_000, 600_000),
        registry.aggregate_stats()
    );
}

#[test(tokio::test(flavor = "multi_thread", worker_threads = 4))]
async fn concurrent_enqueue_and_drain_deliver_each_command_once() {
    const PRODUCERS: u64 = 4;
    const COMMANDS_PER_PRODUCER: u64 = 500;

    let registry = NodeRegistry::new(options()).unwrap();
    let node_id = registry
        .register_with_default_layout(silo_test_util::rand::node_details())
        .node_id();
    let producers_done = Arc::new(AtomicBool::new(false));

    let consumer = tokio::spawn({
        let registry = registry.clone();
        let producers_done = Arc::clone(&producers_done);
        async move {
            let mut drained = Vec::new();
            loop {
                // read the flag first so the final drain sees every enqueued command
                let finished = producers_done.load(Ordering::Acquire);
                drained.extend(registry.drain(&node_id).unwrap());
                if finished {
                    break drained;
                }
                tokio::task::yield_now().await;
            }
        }
    });

    let producers = (0..PRODUCERS).map(|producer| {
        let registry = registry.clone();
        tokio::spawn(async move {
            for seq in 0..COMMANDS_PER_PRODUCER {
                registry
                    .enqueue(
                        &node_id,
                        NodeCommand::DeleteContainer {
                            container_id: ContainerId::new(producer * 10_000 + seq),
                            force: false,
                        },
                    )
                    .unwrap();
                if seq % 50 == 0 {
                    tokio::task::yield_now().await;
                }
            }
        })
    });
    for result in join_all(producers).await {
        result.unwrap();
    }
    producers_done.store(true, Ordering::Release);
    let drained = consumer.await.unwrap();

    let ids: Vec<u64> = drained
        .into_iter()
        .map(|command| match command {
            NodeCommand::DeleteContainer { container_id, .. } => container_id.as_u64(),
            other => panic!("unexpected command {other:?}"),
        })
        .collect();
    let expected: BTreeSet<u64> = (0..PRODUCERS)
        .flat_map(|producer| {
            (0..COMMANDS_PER_PRODUCER).map(move |seq| producer * 10_000 + seq)
        })
        .collect();

    // nothing lost, nothing duplicated
    assert_eq!(expected.len(), ids.len());
    assert_eq!(expected, ids.iter().copied().collect::<BTreeSet<_>>());
    // each producer's commands come out in the order they went in
    for producer in 0..PRODUCERS {
        let sequence: Vec<u64> = ids
            .iter()
            .copied()
            .filter(|id| id / 10_000 == producer)
            .collect();
        assert!(sequence.windows(2).all(|pair| pair[0] < pair[1]));
    }
    assert_eq!(0, registry.pending_command_count(&node_id).unwrap());
}

#[test(tokio::test(start_paused = true))]
async fn node_lifecycle_through_the_registry() -> googletest::Result<()> {
    let registry = NodeRegistry::new(options()).unwrap();
    let details = silo_test_util::rand::node_details();
    let node_id = details.node_id;
    let mut watch = {
        registry.register(details.clone(), NodeLayout::uniform(LayoutVersion::INITIAL));
        registry.watch_health(&node_id)?
    };
    let peer = registry
        .register_with_default_layout(silo_test_util::rand::node_details())
        .node_id();

    // containers and pipelines
    let containers: BTreeSet<_> = (1..=3).map(ContainerId::new).collect();
    registry.set_containers(&node_id, containers.clone())?;
    let pipeline = Pipeline::new(
        PipelineId::random(),
        ReplicationFactor::Three,
        vec![node_id, peer],
    );
    registry.add_pipeline(&pipeline);

    let record = registry.get_node(&node_id)?;
    assert_that!(record.container_count, eq(3));
    assert_that!(record.pipeline_count, eq(1));

    // a command is queued while the node is silent
    registry.enqueue(
        &node_id,
        NodeCommand::ClosePipeline {
            pipeline_id: pipeline.id,
        },
    )?;

    // the node goes silent and is declared dead
    tokio::time::advance(Duration::from_secs(91)).await;
    registry.heartbeat(&peer)?;
    registry.check_liveness();
    assert_that!(watch.changed().await, eq(NodeHealthState::Dead));
    assert_that!(
        registry.get_status(&peer)?.health,
        eq(NodeHealthState::Healthy)
    );

    // dead nodes keep their membership and commands
    assert_eq!(containers, registry.get_containers(&node_id)?);
    assert_that!(
        registry.pending_command_count_by_kind(&node_id, NodeCommandKind::ClosePipeline)?,
        eq(1)
    );

    // it comes back and collects its command
    let commands = registry.heartbeat_and_drain(&node_id)?;
    assert_eq!(
        vec![NodeCommand::ClosePipeline {
            pipeline_id: pipeline.id
        }],
        commands
    );
    assert_that!(watch.current(), eq(NodeHealthState::Healthy));

    // decommissioning with an expiry does not affect health
    let expiry = SecondsSinceEpoch::new(10);
    registry.set_operational_state(
        &node_id,
        NodeOperationalState::Decommissioning,
        Some(expiry),
    )?;
    assert_eq!(
        vec![node_id],
        registry
            .expired_operational_states(SecondsSinceEpoch::new(11))
            .into_iter()
            .map(|(node_id, _)| node_id)
            .collect::<Vec<_>>()
    );

    // removal cleans up
    registry.remove_node(&node_id)?;
    let_assert!(Err(Error::NodeNotFound(_)) = registry.get_containers(&node_id));
    assert_that!(registry.pipeline_count(&peer)?, eq(1));
    registry.remove_pipeline(&pipeline);
    assert_that!(registry.pipeline_count(&peer)?, eq(0));
    Ok(())
}

#[test(tokio::test(start_paused = true))]
async fn health_changed_fires_on_transition() {
    let registry = NodeRegistry::new(options()).unwrap();
    let node_id = registry
        .register_with_default_layout(silo_test_util::rand::node_details())
        .node_id();

    let notified = registry.health_changed();
    tokio::pin!(notified);
    notified.as_mut().enable();

    tokio::time::advance(Duration::from_secs(31)).await;
    registry.check_liveness();

    notified.await;
    assert_that!(
        registry.get_status(&node_id).unwrap().health,
        eq(NodeHealthState::Stale)
    );
}

#[test(tokio::test(start_paused = true))]
async fn heartbeat_racing_a_tick_wins() {
    let registry = NodeRegistry::new(options()).unwrap();
    let node_id = registry
        .register_with_default_layout(silo_test_util::rand::node_details())
        .node_id();

    tokio::time::advance(Duration::from_secs(89)).await;
    registry.heartbeat(&node_id).unwrap();
    tokio::time::advance(Duration::from_secs(2)).await;
    registry.check_liveness();

    assert_that!(
        registry.get_status(&node_id).unwrap().health,
        eq(NodeHealthState::Healthy)
    );
}
