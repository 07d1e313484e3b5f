// Copyright 2026 Pagewright Contributors
// SPDX-License-Identifier: Apache-2.0

//! Pagewright runtime library: browser sessions, login flows, phone
//! extraction and retrying SMS batches on top of the `pagewright` core.
//!
//! The `pagewright` binary is a thin layer over these modules.

pub mod audit;
pub mod captcha;
pub mod cli;
pub mod config;
pub mod cookies;
pub mod events;
pub mod flows;
pub mod live;
pub mod logging;
pub mod messaging;
pub mod renderer;
pub mod store;
