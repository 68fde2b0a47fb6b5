// Copyright (c) 2023 - 2026 Silo developers.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! This crate contains the core types used by the storage cluster controller.

pub mod commands;
pub mod config;
pub mod config_loader;
pub mod identifiers;
pub mod layout;
pub mod node;
pub mod pipeline;
pub mod storage_report;
pub mod time;

pub use identifiers::{ContainerId, NodeId, PipelineId};
