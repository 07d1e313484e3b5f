// Copyright 2026 Pagewright Contributors
// SPDX-License-Identifier: Apache-2.0

//! Audit trail of run events.

pub mod logger;

pub use logger::{spawn_audit_writer, AuditLogger, AuditRecord};
