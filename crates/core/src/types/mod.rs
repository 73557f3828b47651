//! Core types for affidavit tracking.
//!
//! This module provides type-safe wrappers for the domain concepts shared by
//! the server and the CLI.

pub mod email;
pub mod form;
pub mod id;
pub mod legacy;
pub mod order_reference;
pub mod product_code;
pub mod record;

pub use email::{Email, EmailError};
pub use form::{AffidavitForm, FormError};
pub use id::*;
pub use legacy::{LegacyAffidavitStatus, migrate_legacy};
pub use order_reference::OrderAffidavitReference;
pub use product_code::{ProductCode, ProductCodeError, ProductCodes};
pub use record::{RecordError, StatusKind, SubmissionRecord, SubmissionStatus};
