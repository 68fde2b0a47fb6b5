// Copyright (c) 2023 - 2026 Silo developers.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Build information

/// The version of the silo controller.
pub const SILO_CONTROLLER_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const SILO_CONTROLLER_VERSION_MAJOR: &str = env!("CARGO_PKG_VERSION_MAJOR");
pub const SILO_CONTROLLER_VERSION_MINOR: &str = env!("CARGO_PKG_VERSION_MINOR");
pub const SILO_CONTROLLER_VERSION_PATCH: &str = env!("CARGO_PKG_VERSION_PATCH");
/// Pre-release version of silo.
pub const SILO_CONTROLLER_VERSION_PRE: &str = env!("CARGO_PKG_VERSION_PRE");

pub fn build_info() -> String {
    format!(
        "{SILO_CONTROLLER_VERSION} ({} build)",
        if cfg!(debug_assertions) {
            "debug"
        } else {
            "release"
        }
    )
}
