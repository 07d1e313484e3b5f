// Copyright 2026 Pagewright Contributors
// SPDX-License-Identifier: Apache-2.0

//! SMS delivery: gateway, retrying delivery and CSV batches.

pub mod batch;
pub mod delivery;
pub mod gateway;

pub use batch::{
    render_template, BatchOptions, BatchReport, BatchRow, BatchSender, BatchSummary, RowOutcome,
    RowStatus,
};
pub use delivery::{deliver, DeliveryReport};
pub use gateway::{GatewayError, MessageGateway, MessageReceipt, OutboundMessage, TwilioGateway};
