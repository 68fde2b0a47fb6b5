// Copyright (c) 2023 - 2026 Silo developers.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Layout versions and the table of layout features gated on them.
//!
//! Every on-disk or wire format change that needs a cluster-wide finalization step is declared
//! as a [`LayoutFeature`] at a particular [`LayoutVersion`]. The table is built once at process
//! start with [`LayoutFeatureCatalog::builder`] and is immutable afterwards. Features may carry
//! an action to run on the controller and/or on nodes when the cluster finalizes past them;
//! running those actions is the upgrade coordinator's job, the catalog only hosts them.

use std::fmt;
use std::sync::Arc;

/// Integer revision of a node's on-disk/software format.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
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
#[serde(transparent)]
pub struct LayoutVersion(u32);

impl LayoutVersion {
    pub const INITIAL: LayoutVersion = LayoutVersion(0);

    pub const fn new(version: u32) -> Self {
        Self(version)
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }

    pub fn next(&self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

/// Layout versions a node reports. `current` is the version of the software it runs and must
/// never go backwards. `finalized` is the version its persisted data has been committed to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct NodeLayout {
    pub current: LayoutVersion,
    pub finalized: LayoutVersion,
}

impl NodeLayout {
    pub fn new(current: LayoutVersion, finalized: LayoutVersion) -> Self {
        Self { current, finalized }
    }

    /// A node that was just installed has its data finalized at the version it runs.
    pub fn uniform(version: LayoutVersion) -> Self {
        Self::new(version, version)
    }

    pub fn needs_finalization(&self) -> bool {
        self.finalized < self.current
    }
}

pub type UpgradeAction = Arc<dyn Fn() -> anyhow::Result<()> + Send + Sync>;

#[derive(derive_more::Debug, Clone)]
pub struct LayoutFeature {
    version: LayoutVersion,
    name: &'static str,
    description: &'static str,
    #[debug("{}", controller_action.is_some())]
    controller_action: Option<UpgradeAction>,
    #[debug("{}", node_action.is_some())]
    node_action: Option<UpgradeAction>,
}

impl LayoutFeature {
    pub fn version(&self) -> LayoutVersion {
        self.version
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn description(&self) -> &'static str {
        self.description
    }

    pub fn controller_action(&self) -> Option<&UpgradeAction> {
        self.controller_action.as_ref()
    }

    pub fn node_action(&self) -> Option<&UpgradeAction> {
        self.node_action.as_ref()
    }

    /// Runs the controller side action if there is one.
    pub fn run_controller_action(&self) -> anyhow::Result<()> {
        match &self.controller_action {
            Some(action) => action(),
            None => Ok(()),
        }
    }
}

impl fmt::Display for LayoutFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.version)
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LayoutCatalogError {
    #[error("layout version {0} is declared more than once")]
    DuplicateVersion(LayoutVersion),
    #[error("layout versions must be contiguous from 0; expected {expected} but found {found}")]
    Gap {
        expected: LayoutVersion,
        found: LayoutVersion,
    },
    #[error("no layout feature is declared at version {0}")]
    UnknownVersion(LayoutVersion),
}

/// Immutable, version ordered table of layout features.
#[derive(Debug, Clone)]
pub struct LayoutFeatureCatalog {
    features: Arc<[LayoutFeature]>,
}

impl LayoutFeatureCatalog {
    pub fn builder() -> LayoutFeatureCatalogBuilder {
        LayoutFeatureCatalogBuilder::default()
    }

    /// The features this build of the cluster knows about, without any upgrade actions attached.
    pub fn builtin() -> Self {
        Self::builtin_builder()
            .build()
            .expect("builtin layout features are well-formed")
    }

    /// Builder pre-populated with the builtin features so that actions can be attached before
    /// the catalog is frozen.
    pub fn builtin_builder() -> LayoutFeatureCatalogBuilder {
        Self::builder()
            .feature(0, "INITIAL_VERSION", "Initial layout version")
            .feature(
                1,
                "DATANODE_SCHEMA_V2",
                "Datanode container database schema version 2 (with column families)",
            )
    }

    pub fn get(&self, version: LayoutVersion) -> Option<&LayoutFeature> {
        // versions are contiguous from zero, the index is the version
        self.features
            .get(version.as_u32() as usize)
            .filter(|f| f.version == version)
    }

    pub fn latest_version(&self) -> LayoutVersion {
        self.features
            .last()
            .map(|f| f.version)
            .unwrap_or(LayoutVersion::INITIAL)
    }

    pub fn iter(&self) -> impl Iterator<Item = &LayoutFeature> {
        self.features.iter()
    }

    /// Features with a version in `(from, to]`, in ascending version order. These are the
    /// features whose finalization actions need to run to move from `from` to `to`.
    pub fn features_between(
        &self,
        from: LayoutVersion,
        to: LayoutVersion,
    ) -> impl Iterator<Item = &LayoutFeature> {
        self.features
            .iter()
            .filter(move |f| f.version > from && f.version <= to)
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

impl Default for LayoutFeatureCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

#[derive(Default)]
pub struct LayoutFeatureCatalogBuilder {
    features: Vec<LayoutFeature>,
    controller_actions: Vec<(LayoutVersion, UpgradeAction)>,
    node_actions: Vec<(LayoutVersion, UpgradeAction)>,
}

impl LayoutFeatureCatalogBuilder {
    pub fn feature(mut self, version: u32, name: &'static str, description: &'static str) -> Self {
        self.features.push(LayoutFeature {
            version: LayoutVersion::new(version),
            name,
            description,
            controller_action: None,
            node_action: None,
        });
        self
    }

    pub fn on_finalize_controller(
        mut self,
        version: u32,
        action: impl Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.controller_actions
            .push((LayoutVersion::new(version), Arc::new(action)));
        self
    }

    pub fn on_finalize_node(
        mut self,
        version: u32,
        action: impl Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.node_actions
            .push((LayoutVersion::new(version), Arc::new(action)));
        self
    }

    pub fn build(self) -> Result<LayoutFeatureCatalog, LayoutCatalogError> {
        let mut features = self.features;
        features.sort_by_key(|f| f.version);

        let mut expected = LayoutVersion::INITIAL;
        for feature in &features {
            if feature.version < expected {
                return Err(LayoutCatalogError::DuplicateVersion(feature.version));
            }
            if feature.version != expected {
                return Err(LayoutCatalogError::Gap {
                    expected,
                    found: feature.version,
                });
            }
            expected = expected.next();
        }

        for (version, action) in self.controller_actions {
            let feature = features
                .get_mut(version.as_u32() as usize)
                .ok_or(LayoutCatalogError::UnknownVersion(version))?;
            feature.controller_action = Some(action);
        }
        for (version, action) in self.node_actions {
            let feature = features
                .get_mut(version.as_u32() as usize)
                .ok_or(LayoutCatalogError::UnknownVersion(version))?;
            feature.node_action = Some(action);
        }

        Ok(LayoutFeatureCatalog {
            features: features.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn builtin_catalog() {
        let catalog = LayoutFeatureCatalog::builtin();
        assert_eq!(2, catalog.len());
        assert_eq!(LayoutVersion::new(1), catalog.latest_version());
        assert_eq!(
            "DATANODE_SCHEMA_V2",
            catalog.get(LayoutVersion::new(1)).unwrap().name()
        );
        assert!(catalog.get(LayoutVersion::new(2)).is_none());
    }

    #[test]
    fn node_layout_finalization() {
        let installed = NodeLayout::uniform(LayoutVersion::INITIAL);
        assert!(!installed.needs_finalization());

        let upgraded = NodeLayout::new(installed.current.next(), installed.finalized);
        assert_eq!(LayoutVersion::new(1), upgraded.current);
        assert!(upgraded.needs_finalization());

        assert_eq!(
            LayoutVersion::new(u32::MAX),
            LayoutVersion::new(u32::MAX).next()
        );
    }

    #[test]
    fn features_between_is_half_open() {
        let catalog = LayoutFeatureCatalog::builder()
            .feature(0, "A", "a")
            .feature(1, "B", "b")
            .feature(2, "C", "c")
            .feature(3, "D", "d")
            .build()
            .unwrap();

        let names: Vec<_> = catalog
            .features_between(LayoutVersion::new(1), LayoutVersion::new(3))
            .map(LayoutFeature::name)
            .collect();
        assert_eq!(vec!["C", "D"], names);

        assert_eq!(
            0,
            catalog
                .features_between(LayoutVersion::new(3), LayoutVersion::new(3))
                .count()
        );
    }

    #[test]
    fn malformed_catalogs_are_rejected() {
        let dup = LayoutFeatureCatalog::builder()
            .feature(0, "A", "a")
            .feature(0, "B", "b")
            .build();
        assert_eq!(
            LayoutCatalogError::DuplicateVersion(LayoutVersion::new(0)),
            dup.unwrap_err()
        );

        let gap = LayoutFeatureCatalog::builder()
            .feature(0, "A", "a")
            .feature(2, "C", "c")
            .build();
        assert!(matches!(gap, Err(LayoutCatalogError::Gap { .. })));

        let unknown = LayoutFeatureCatalog::builder()
            .feature(0, "A", "a")
            .on_finalize_controller(5, || Ok(()))
            .build();
        assert_eq!(
            LayoutCatalogError::UnknownVersion(LayoutVersion::new(5)),
            unknown.unwrap_err()
        );
    }

    #[test]
    fn actions_are_attached_to_their_feature() {
        let runs = Arc::new(AtomicUsize::new(0));
        let catalog = LayoutFeatureCatalog::builtin_builder()
            .on_finalize_controller(1, {
                let runs = Arc::clone(&runs);
                move || {
                    runs.fetch_add(1, Ordering::Relaxed);
                    Ok(())
                }
            })
            .build()
            .unwrap();

        let initial = catalog.get(LayoutVersion::INITIAL).unwrap();
        assert!(initial.controller_action().is_none());
        assert!(initial.node_action().is_none());
        initial.run_controller_action().unwrap();

        let v2 = catalog.get(LayoutVersion::new(1)).unwrap();
        assert!(v2.controller_action().is_some());
        v2.run_controller_action().unwrap();
        assert_eq!(1, runs.load(Ordering::Relaxed));
    }
}
