//! Affidavit server library.
//!
//! Customers file a signed affidavit before ordering regulated products;
//! reviewers approve or reject it from a signed link; the order gate holds
//! new orders that depend on a pending submission.
//!
//! # Modules
//!
//! - [`store`] - Submission persistence in customer metafields
//! - [`platform`] - Shopify order and catalog operations the workflow needs
//! - [`services`] - Submission, review, order gate, email, and PDF rendering
//! - [`routes`] - HTTP handlers and the router
//!
//! Exposed as a library so the router can be driven end to end in tests.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod error;
pub mod middleware;
pub mod platform;
pub mod routes;
pub mod services;
pub mod shopify;
pub mod state;
pub mod store;
