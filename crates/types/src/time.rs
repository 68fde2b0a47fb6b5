// Copyright (c) 2023 - 2026 Silo developers.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::fmt;
use std::fmt::Display;
use std::ops::Add;
use std::time::{Duration, SystemTime};

/// Seconds since the unix epoch
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct SecondsSinceEpoch(u64);

impl SecondsSinceEpoch {
    pub const UNIX_EPOCH: SecondsSinceEpoch = SecondsSinceEpoch::new(0);

    pub const fn new(seconds_since_epoch: u64) -> Self {
        SecondsSinceEpoch(seconds_since_epoch)
    }

    pub fn now() -> Self {
        SystemTime::now().into()
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// Interprets a raw expiry as reported over the wire, where `0` means "never expires".
    pub fn expiry_from_raw(raw: u64) -> Option<Self> {
        (raw != 0).then_some(Self(raw))
    }

    /// Inverse of [`Self::expiry_from_raw`].
    pub fn expiry_into_raw(expiry: Option<Self>) -> u64 {
        expiry.map(|e| e.0).unwrap_or(0)
    }
}

impl From<u64> for SecondsSinceEpoch {
    fn from(value: u64) -> Self {
        Self::new(value)
    }
}

impl From<SystemTime> for SecondsSinceEpoch {
    fn from(value: SystemTime) -> Self {
        SecondsSinceEpoch::new(
            value
                .duration_since(SystemTime::UNIX_EPOCH)
                .expect("duration since Unix epoch should be well-defined")
                .as_secs(),
        )
    }
}

impl From<SecondsSinceEpoch> for SystemTime {
    fn from(value: SecondsSinceEpoch) -> Self {
        SystemTime::UNIX_EPOCH.add(Duration::from_secs(value.as_u64()))
    }
}

impl Display for SecondsSinceEpoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} s since epoch", self.0)
    }
}
