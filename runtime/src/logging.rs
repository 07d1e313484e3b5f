// Copyright 2026 Pagewright Contributors
// SPDX-License-Identifier: Apache-2.0

//! Tracing subscriber setup for the `pagewright` binary.
//!
//! Logs go to stderr so stdout stays clean for command output. `RUST_LOG`
//! wins over the `--verbose` flag.

use tracing_subscriber::EnvFilter;

/// Default filter for a verbosity level.
pub fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "pagewright=debug,pagewright_runtime=debug,info"
    } else {
        "pagewright=info,pagewright_runtime=info,warn"
    }
}

/// Install the global subscriber. Calling it twice is a no-op.
pub fn init(verbose: bool, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbose);

    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}
