// Copyright (c) 2023 - 2026 Silo developers.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Identifiers used by the storage cluster controller.

use std::fmt;
use std::str::FromStr;

use uuid::Uuid;

/// Stable identity of a storage node. The id survives restarts of the node process and is the
/// only key the registry uses for a node.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    derive_more::From,
    derive_more::Into,
    serde::Serialize,
    serde::Deserialize,
)]
#[serde(transparent)]
pub struct NodeId(Uuid);

impl NodeId {
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "N{}", self.0.as_simple())
    }
}

impl FromStr for NodeId {
    type Err = uuid::Error;

    /// Accepts the hyphenated or simple uuid form, optionally prefixed with `N`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.strip_prefix('N').unwrap_or(s);
        Uuid::parse_str(s).map(Self)
    }
}

/// Identifies a storage container. Container ids are allocated sequentially by the container
/// manager, which lives outside this crate.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    derive_more::From,
    derive_more::Into,
    derive_more::Display,
    serde::Serialize,
    serde::Deserialize,
)]
#[display("C{_0}")]
#[serde(transparent)]
pub struct ContainerId(u64);

impl ContainerId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

/// Identifies a replication pipeline.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    derive_more::From,
    derive_more::Into,
    serde::Serialize,
    serde::Deserialize,
)]
#[serde(transparent)]
pub struct PipelineId(Uuid);

impl PipelineId {
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl fmt::Display for PipelineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0.as_simple())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use silo_test_util::assert_eq;

    #[test]
    fn node_id_parses_display_and_plain_forms() {
        let node_id = NodeId::random();

        let from_display: NodeId = node_id.to_string().parse().unwrap();
        assert_eq!(node_id, from_display);

        let from_hyphenated: NodeId = node_id.as_uuid().hyphenated().to_string().parse().unwrap();
        assert_eq!(node_id, from_hyphenated);

        assert!("not-a-node".parse::<NodeId>().is_err());
    }

    #[test]
    fn container_id_display() {
        assert_eq!("C42", ContainerId::new(42).to_string());
    }
}
