//! Affidavit Core - Shared types and the affidavit state engine.
//!
//! This crate provides the types used across all affidavit components:
//! - `server` - HTTP endpoints, Shopify webhooks, review workflow
//! - `cli` - Operator commands for metafield setup and legacy migration
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no HTTP
//! clients. Submission records are handed in as a snapshot and a new snapshot
//! is handed back; persistence belongs to the caller.
//!
//! # Modules
//!
//! - [`types`] - Shopify ids, product codes, the attested form, submission records
//! - [`engine`] - Validity checks and pending/approved/rejected transitions

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod engine;
pub mod types;

pub use engine::{Applied, BatchCheck, Submitted};
pub use types::*;
