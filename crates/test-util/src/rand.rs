// Copyright (c) 2023 - 2026 Silo developers.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Random fixtures for tests.

use std::collections::BTreeSet;
use std::net::{IpAddr, Ipv4Addr};

use rand::Rng;

use silo_types::node::{NodeDetails, PortName};
use silo_types::storage_report::{NodeReport, StorageReport};
use silo_types::{ContainerId, NodeId};

/// Details of a fresh node with a random id, a random 10.x.y.z address and the standard ports.
pub fn node_details() -> NodeDetails {
    let mut rng = rand::thread_rng();
    let ip = Ipv4Addr::new(10, rng.gen(), rng.gen(), rng.gen_range(1..255));
    node_details_at(IpAddr::V4(ip))
}

pub fn node_details_at(ip_address: IpAddr) -> NodeDetails {
    let node_id = NodeId::random();
    NodeDetails::new(node_id, format!("dn-{}.local", node_id), ip_address)
        .with_port(PortName::Data, 9859)
        .with_port(PortName::Admin, 9858)
        .with_port(PortName::Replication, 9857)
}

/// A report with `volumes` healthy metadata volumes of random size.
pub fn node_report(volumes: usize) -> NodeReport {
    let mut rng = rand::thread_rng();
    NodeReport::new(
        (0..volumes)
            .map(|i| {
                let capacity = rng.gen_range(1_000..1_000_000u64);
                let used = rng.gen_range(0..=capacity);
                StorageReport::new(format!("/data/disk{i}"), capacity, used).metadata_volume()
            })
            .collect(),
    )
}

/// `count` distinct container ids.
pub fn container_ids(count: usize) -> BTreeSet<ContainerId> {
    let mut rng = rand::thread_rng();
    let mut ids = BTreeSet::new();
    while ids.len() < count {
        ids.insert(ContainerId::new(rng.gen()));
    }
    ids
}
