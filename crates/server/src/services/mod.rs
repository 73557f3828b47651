//! Business logic services.
//!
//! # Services
//!
//! - `affidavits` - Submission, check, and review workflow
//! - `order_gate` - Holds new orders that wait on an affidavit
//! - `notifier` - Notice types and the delivery trait
//! - `email` - Notice delivery via SMTP
//! - `documents` - Affidavit PDF rendering
//! - `review_link` - Signed reviewer links

pub mod affidavits;
pub mod documents;
pub mod email;
pub mod notifier;
pub mod order_gate;
pub mod review_link;

pub use affidavits::{AffidavitService, CheckResult, ReviewOutcome, ServiceError};
pub use documents::{DocumentError, render_affidavit_pdf};
pub use email::{EmailError, EmailService};
pub use notifier::{Attachment, DecisionNotice, LogNotifier, Notifier, SubmissionNotice};
pub use order_gate::{GateDecision, OrderGate, OrderPayload};
pub use review_link::ReviewLinkSigner;
