// Copyright (c) 2023 - 2026 Silo developers.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Which containers and pipelines each node participates in.

use std::collections::BTreeSet;

use tracing::{debug, trace, warn};

use silo_types::pipeline::Pipeline;
use silo_types::{ContainerId, NodeId, PipelineId};

use crate::{Error, NodeRegistry};

impl NodeRegistry {
    /// Replaces the node's container set, typically from a full container report.
    pub fn set_containers(
        &self,
        node_id: &NodeId,
        containers: BTreeSet<ContainerId>,
    ) -> Result<(), Error> {
        let entry = self.entry(node_id)?;
        let count = containers.len();
        entry.membership.lock().containers = containers;
        trace!(%node_id, count, "Replaced container set");
        Ok(())
    }

    pub fn add_container(&self, node_id: &NodeId, container_id: ContainerId) -> Result<(), Error> {
        self.entry(node_id)?
            .membership
            .lock()
            .containers
            .insert(container_id);
        Ok(())
    }

    /// Returns whether the node held the container.
    pub fn remove_container(
        &self,
        node_id: &NodeId,
        container_id: ContainerId,
    ) -> Result<bool, Error> {
        Ok(self
            .entry(node_id)?
            .membership
            .lock()
            .containers
            .remove(&container_id))
    }

    pub fn get_containers(&self, node_id: &NodeId) -> Result<BTreeSet<ContainerId>, Error> {
        Ok(self.entry(node_id)?.membership.lock().containers.clone())
    }

    /// Records the pipeline on every member. Members the registry does not know are skipped.
    ///
    /// Adding a pipeline again with a different member list moves it off the nodes that are no
    /// longer listed.
    pub fn add_pipeline(&self, pipeline: &Pipeline) {
        let pipeline_id = pipeline.id;
        if let Some(previous) = self
            .known_pipelines()
            .insert(pipeline_id, pipeline.clone())
        {
            for member in previous
                .members
                .iter()
                .filter(|member| !pipeline.is_member(member))
            {
                self.detach_pipeline(member, pipeline_id);
            }
        }

        for member in &pipeline.members {
            match self.try_entry(member) {
                Some(entry) => {
                    entry.membership.lock().pipelines.insert(pipeline_id);
                }
                None => {
                    warn!(
                        %pipeline_id,
                        node_id = %member,
                        "Pipeline member is not registered, skipping it"
                    );
                }
            }
        }
        debug!(%pipeline_id, members = pipeline.members.len(), "Added pipeline");
    }

    /// Drops the pipeline from every member, including members it had when it was added.
    pub fn remove_pipeline(&self, pipeline: &Pipeline) {
        let pipeline_id = pipeline.id;
        let mut members = pipeline.member_set();
        if let Some((_, known)) = self.known_pipelines().remove(&pipeline_id) {
            members.extend(known.members);
        }

        for member in &members {
            self.detach_pipeline(member, pipeline_id);
        }
        debug!(%pipeline_id, "Removed pipeline");
    }

    fn detach_pipeline(&self, node_id: &NodeId, pipeline_id: PipelineId) {
        match self.try_entry(node_id) {
            Some(entry) => {
                entry.membership.lock().pipelines.remove(&pipeline_id);
            }
            None => {
                debug!(%pipeline_id, %node_id, "Pipeline member is no longer registered");
            }
        }
    }

    pub fn get_pipelines(&self, node_id: &NodeId) -> Result<BTreeSet<PipelineId>, Error> {
        Ok(self.entry(node_id)?.membership.lock().pipelines.clone())
    }

    pub fn pipeline_count(&self, node_id: &NodeId) -> Result<usize, Error> {
        Ok(self.entry(node_id)?.membership.lock().pipelines.len())
    }

    /// The pipeline as last passed to [`NodeRegistry::add_pipeline`].
    pub fn pipeline(&self, pipeline_id: &PipelineId) -> Option<Pipeline> {
        self.known_pipelines()
            .get(pipeline_id)
            .map(|pipeline| pipeline.clone())
    }
}

#[cfg(test)]
mod tests {
    use googletest::prelude::*;
    use silo_test_util::let_assert;
    use silo_types::config::NodeRegistryOptions;
    use silo_types::layout::NodeLayout;
    use silo_types::pipeline::ReplicationFactor;
    use test_log::test;

    use super::*;

    fn registry_with_nodes(count: usize) -> (NodeRegistry, Vec<NodeId>) {
        let registry = NodeRegistry::new(NodeRegistryOptions::default()).unwrap();
        let nodes = (0..count)
            .map(|_| {
                registry
                    .register(silo_test_util::rand::node_details(), NodeLayout::default())
                    .node_id()
            })
            .collect();
        (registry, nodes)
    }

    #[test]
    fn containers_are_replaced_and_extended() {
        let (registry, nodes) = registry_with_nodes(1);
        let node_id = nodes[0];
        let containers = silo_test_util::rand::container_ids(10);

        registry.set_containers(&node_id, containers.clone()).unwrap();
        assert_eq!(containers, registry.get_containers(&node_id).unwrap());

        registry.add_container(&node_id, ContainerId::new(0)).unwrap();
        let all = registry.get_containers(&node_id).unwrap();
        assert!(all.contains(&ContainerId::new(0)));
        assert!(all.is_superset(&containers));
        assert_eq!(all.len(), registry.get_node(&node_id).unwrap().container_count);

        assert!(registry.remove_container(&node_id, ContainerId::new(0)).unwrap());
        assert!(!registry.remove_container(&node_id, ContainerId::new(0)).unwrap());

        registry.set_containers(&node_id, BTreeSet::new()).unwrap();
        assert!(registry.get_containers(&node_id).unwrap().is_empty());
    }

    #[test]
    fn container_operations_fail_for_unknown_node() {
        let (registry, _) = registry_with_nodes(1);
        let unknown = NodeId::random();

        let_assert!(
            Err(Error::NodeNotFound(_)) = registry.add_container(&unknown, ContainerId::new(1))
        );
        let_assert!(
            Err(Error::NodeNotFound(_)) = registry.set_containers(&unknown, BTreeSet::new())
        );
        let_assert!(Err(Error::NodeNotFound(_)) = registry.get_containers(&unknown));
        let_assert!(Err(Error::NodeNotFound(_)) = registry.get_pipelines(&unknown));
    }

    #[test]
    fn pipeline_is_visible_on_every_member() -> googletest::Result<()> {
        let (registry, nodes) = registry_with_nodes(4);
        let pipeline = Pipeline::new(
            PipelineId::random(),
            ReplicationFactor::Three,
            nodes[..3].to_vec(),
        );

        registry.add_pipeline(&pipeline);
        // idempotent
        registry.add_pipeline(&pipeline);

        for member in &nodes[..3] {
            assert_that!(registry.pipeline_count(member)?, eq(1));
            assert!(registry.get_pipelines(member)?.contains(&pipeline.id));
        }
        assert_that!(registry.pipeline_count(&nodes[3])?, eq(0));
        assert_eq!(Some(pipeline.clone()), registry.pipeline(&pipeline.id));

        registry.remove_pipeline(&pipeline);
        for member in &nodes {
            assert_that!(registry.pipeline_count(member)?, eq(0));
        }
        assert_eq!(None, registry.pipeline(&pipeline.id));
        Ok(())
    }

    #[test]
    fn readding_pipeline_moves_it_off_old_members() {
        let (registry, nodes) = registry_with_nodes(3);
        let id = PipelineId::random();
        registry.add_pipeline(&Pipeline::new(
            id,
            ReplicationFactor::One,
            vec![nodes[0]],
        ));
        registry.add_pipeline(&Pipeline::new(
            id,
            ReplicationFactor::One,
            vec![nodes[1]],
        ));

        assert!(registry.get_pipelines(&nodes[0]).unwrap().is_empty());
        assert!(registry.get_pipelines(&nodes[1]).unwrap().contains(&id));

        // removing with a stale member list still clears the recorded members
        registry.remove_pipeline(&Pipeline::new(id, ReplicationFactor::One, vec![]));
        assert!(registry.get_pipelines(&nodes[1]).unwrap().is_empty());
    }

    #[test]
    fn unknown_pipeline_members_are_skipped() {
        let (registry, nodes) = registry_with_nodes(2);
        let pipeline = Pipeline::new(
            PipelineId::random(),
            ReplicationFactor::Three,
            vec![nodes[0], NodeId::random(), nodes[1]],
        );

        registry.add_pipeline(&pipeline);
        assert_eq!(1, registry.pipeline_count(&nodes[0]).unwrap());
        assert_eq!(1, registry.pipeline_count(&nodes[1]).unwrap());

        registry.remove_pipeline(&pipeline);
        assert_eq!(0, registry.pipeline_count(&nodes[1]).unwrap());
    }

    #[test]
    fn removed_node_leaves_its_pipelines() {
        let (registry, nodes) = registry_with_nodes(3);
        let pipeline = Pipeline::new(PipelineId::random(), ReplicationFactor::Three, nodes.clone());
        registry.add_pipeline(&pipeline);

        registry.remove_node(&nodes[0]).unwrap();

        let_assert!(Some(known) = registry.pipeline(&pipeline.id));
        assert_eq!(vec![nodes[1], nodes[2]], known.members);
        assert_eq!(1, registry.pipeline_count(&nodes[1]).unwrap());
    }
}
