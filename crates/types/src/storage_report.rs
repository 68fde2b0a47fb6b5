// Copyright (c) 2023 - 2026 Silo developers.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::iter::Sum;
use std::ops::Add;

/// Capacity accounting for a node or for the whole cluster. All values are in bytes.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct StorageStats {
    pub capacity: u64,
    pub used: u64,
    pub remaining: u64,
}

impl StorageStats {
    pub const ZERO: StorageStats = StorageStats {
        capacity: 0,
        used: 0,
        remaining: 0,
    };

    pub fn new(capacity: u64, used: u64, remaining: u64) -> Self {
        Self {
            capacity,
            used,
            remaining,
        }
    }
}

impl Add for StorageStats {
    type Output = StorageStats;

    fn add(self, rhs: Self) -> Self::Output {
        StorageStats {
            capacity: self.capacity.saturating_add(rhs.capacity),
            used: self.used.saturating_add(rhs.used),
            remaining: self.remaining.saturating_add(rhs.remaining),
        }
    }
}

impl Sum for StorageStats {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(StorageStats::ZERO, Add::add)
    }
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum StorageMedium {
    #[default]
    Disk,
    Ssd,
    RamDisk,
}

/// A single volume as reported by a node.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct StorageReport {
    pub storage_location: String,
    #[serde(default)]
    pub medium: StorageMedium,
    pub capacity: u64,
    pub used: u64,
    pub remaining: u64,
    #[serde(default)]
    pub failed: bool,
    /// Volumes hosting container metadata; these bound how many pipelines a node can join.
    #[serde(default)]
    pub metadata_volume: bool,
}

impl StorageReport {
    pub fn new(storage_location: impl Into<String>, capacity: u64, used: u64) -> Self {
        Self {
            storage_location: storage_location.into(),
            medium: StorageMedium::default(),
            capacity,
            used,
            remaining: capacity.saturating_sub(used),
            failed: false,
            metadata_volume: false,
        }
    }

    pub fn failed(mut self) -> Self {
        self.failed = true;
        self
    }

    pub fn metadata_volume(mut self) -> Self {
        self.metadata_volume = true;
        self
    }

    fn stats(&self) -> StorageStats {
        StorageStats::new(self.capacity, self.used, self.remaining)
    }
}

/// Periodic report describing the storage a node offers.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct NodeReport {
    pub storage_reports: Vec<StorageReport>,
}

impl NodeReport {
    pub fn new(storage_reports: Vec<StorageReport>) -> Self {
        Self { storage_reports }
    }

    /// Sum over all volumes that have not failed.
    pub fn storage_stats(&self) -> StorageStats {
        self.storage_reports
            .iter()
            .filter(|r| !r.failed)
            .map(StorageReport::stats)
            .sum()
    }

    pub fn healthy_volume_count(&self) -> usize {
        self.storage_reports.iter().filter(|r| !r.failed).count()
    }

    pub fn failed_volume_count(&self) -> usize {
        self.storage_reports.iter().filter(|r| r.failed).count()
    }

    pub fn healthy_metadata_volume_count(&self) -> usize {
        self.storage_reports
            .iter()
            .filter(|r| !r.failed && r.metadata_volume)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_volumes_are_excluded_from_stats() {
        let report = NodeReport::new(vec![
            StorageReport::new("/data/disk1", 100, 40),
            StorageReport::new("/data/disk2", 200, 50).metadata_volume(),
            StorageReport::new("/data/disk3", 1_000, 0).failed(),
        ]);

        assert_eq!(StorageStats::new(300, 90, 210), report.storage_stats());
        assert_eq!(2, report.healthy_volume_count());
        assert_eq!(1, report.failed_volume_count());
        assert_eq!(1, report.healthy_metadata_volume_count());
    }

    #[test]
    fn sum_saturates() {
        let total: StorageStats = [
            StorageStats::new(u64::MAX, 1, 1),
            StorageStats::new(1, 1, 1),
        ]
        .into_iter()
        .sum();
        assert_eq!(u64::MAX, total.capacity);
        assert_eq!(2, total.used);
    }
}
