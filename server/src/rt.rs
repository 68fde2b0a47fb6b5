// Copyright (c) 2023 - 2026 Silo developers.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use silo_types::config::CommonOptions;

/// Builds the multi-threaded runtime the controller runs on.
pub fn build_tokio(common_opts: &CommonOptions) -> Result<tokio::runtime::Runtime, std::io::Error> {
    tokio::runtime::Builder::new_multi_thread()
        .thread_name("silo-worker")
        .worker_threads(common_opts.default_thread_pool_size())
        .enable_all()
        .build()
}
