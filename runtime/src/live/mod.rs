// Copyright 2026 Pagewright Contributors
// SPDX-License-Identifier: Apache-2.0

//! Live browser sessions.

pub mod session;

pub use session::Session;
