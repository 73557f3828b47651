//! Reviewer page and decision endpoints.
//!
//! Reviewers reach these through the signed link in the submission notice.
//! Every request carries the link's token; nothing else authorizes a decision.

use affidavit_core::{
    CustomerId, OrderId, SubmissionId, SubmissionRecord, SubmissionStatus, engine,
};
use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form, Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::services::ReviewOutcome;
use crate::state::AppState;

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M UTC";

/// Token query on the review page.
#[derive(Debug, Deserialize)]
pub struct TokenQuery {
    pub token: Option<String>,
}

/// One labelled line of the attested form.
#[derive(Debug, Clone)]
pub struct FieldView {
    pub label: &'static str,
    pub value: String,
}

/// Submission summary for templates.
#[derive(Debug, Clone)]
pub struct SubmissionView {
    pub id: String,
    pub product_codes: String,
    pub status: String,
    pub submitted_at: String,
    pub decided_at: Option<String>,
    pub expires_at: Option<String>,
}

impl From<&SubmissionRecord> for SubmissionView {
    fn from(record: &SubmissionRecord) -> Self {
        let (decided_at, expires_at) = match record.status() {
            SubmissionStatus::Approved {
                approved_at,
                expires_at,
            } => (
                Some(approved_at.format(DATE_FORMAT).to_string()),
                expires_at.map(|e| e.format(DATE_FORMAT).to_string()),
            ),
            SubmissionStatus::Pending | SubmissionStatus::Rejected => (None, None),
        };
        Self {
            id: record.id().to_string(),
            product_codes: record.product_codes().join(", "),
            status: record.status().kind().to_string(),
            submitted_at: record.submitted_at().format(DATE_FORMAT).to_string(),
            decided_at,
            expires_at,
        }
    }
}

/// Review page template.
#[derive(Template, WebTemplate)]
#[template(path = "review.html")]
pub struct ReviewTemplate {
    pub customer_id: String,
    pub token: String,
    pub submission: SubmissionView,
    pub pending: bool,
    pub fields: Vec<FieldView>,
    pub has_document: bool,
    pub history: Vec<SubmissionView>,
}

const fn field(label: &'static str, value: String) -> FieldView {
    FieldView { label, value }
}

fn form_fields(record: &SubmissionRecord) -> Vec<FieldView> {
    let Some(form) = record.form_data() else {
        return Vec::new();
    };
    let address = [
        Some(form.address1.as_str()),
        form.address2.as_deref(),
        Some(form.city.as_str()),
        Some(form.state.as_str()),
        Some(form.postal.as_str()),
        Some(form.country.as_str()),
    ]
    .into_iter()
    .flatten()
    .filter(|part| !part.trim().is_empty())
    .collect::<Vec<_>>()
    .join(", ");

    let mut fields = vec![
        field("Name", form.name.clone()),
        field("Company", form.company.clone()),
        field("Address", address),
        field("Telephone", form.telephone.clone()),
        field("Email", form.email.clone()),
        field("Product codes", form.product_codes.clone()),
        field("Tissue contact", form.contact_tissue.clone()),
        field("Product form", form.how_form.clone()),
        field("Implanted", form.implanted.clone()),
    ];
    if let Some(days) = form.implant_days {
        fields.push(field("Implant duration (days)", days.to_string()));
    }
    fields.extend([
        field("Protocol", form.protocol.clone()),
        field("Signed by", form.print_name.clone()),
        field("Title", form.title.clone()),
        field("Date", form.date.clone()),
    ]);
    fields
}

fn authorize(
    state: &AppState,
    customer: CustomerId,
    submission: &SubmissionId,
    token: Option<&str>,
) -> Result<()> {
    let token = token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Unauthorized("Review token required".to_string()))?;
    if state.affidavits().signer().verify(customer, submission, token) {
        Ok(())
    } else {
        tracing::warn!(customer_id = %customer, submission_id = %submission, "Invalid review token");
        Err(AppError::Unauthorized("Invalid review token".to_string()))
    }
}

/// Show a submission with approve and reject controls.
#[instrument(skip(state, query))]
pub async fn review_page(
    State(state): State<AppState>,
    Path((customer_id, submission_id)): Path<(String, String)>,
    Query(query): Query<TokenQuery>,
) -> Result<ReviewTemplate> {
    let customer = CustomerId::parse(&customer_id)
        .map_err(|_| AppError::NotFound("submission".to_string()))?;
    let id = SubmissionId::parse(&submission_id)
        .map_err(|_| AppError::NotFound("submission".to_string()))?;
    authorize(&state, customer, &id, query.token.as_deref())?;

    let records = state.affidavits().submissions(customer).await?;
    let record =
        engine::find(&records, &id).ok_or_else(|| AppError::NotFound("submission".to_string()))?;

    let mut history: Vec<SubmissionView> = records
        .iter()
        .filter(|r| r.id() != &id)
        .map(SubmissionView::from)
        .collect();
    history.reverse();

    Ok(ReviewTemplate {
        customer_id: customer.to_string(),
        token: query.token.unwrap_or_default(),
        submission: SubmissionView::from(record),
        pending: matches!(record.status(), SubmissionStatus::Pending),
        fields: form_fields(record),
        has_document: record.form_data().is_some(),
        history,
    })
}

/// Reviewer decision form.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionForm {
    pub submission_id: String,
    pub customer_id: String,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

struct Decision {
    customer: CustomerId,
    submission: SubmissionId,
    order: Option<OrderId>,
}

fn parse_decision(state: &AppState, form: &DecisionForm) -> Result<Decision> {
    let customer = CustomerId::parse(form.customer_id.trim())
        .map_err(|_| AppError::BadRequest("Customer ID required".to_string()))?;
    let submission = SubmissionId::parse(form.submission_id.trim())
        .map_err(|_| AppError::BadRequest("Submission ID required".to_string()))?;
    let order = match form.order_id.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(
            OrderId::parse(raw)
                .map_err(|e| AppError::BadRequest(format!("Invalid order ID: {e}")))?,
        ),
    };
    authorize(state, customer, &submission, form.token.as_deref())?;
    Ok(Decision {
        customer,
        submission,
        order,
    })
}

fn outcome_response(outcome: &ReviewOutcome) -> Json<Value> {
    match outcome {
        ReviewOutcome::Applied(record) => Json(json!({
            "success": true,
            "submissionId": record.id(),
            "status": record.status().kind(),
            "message": outcome.message(),
        })),
        ReviewOutcome::NotActionable { current } => Json(json!({
            "success": false,
            "outcome": "not_actionable",
            "status": current,
            "message": outcome.message(),
        })),
    }
}

/// Approve a pending submission.
#[instrument(skip(state, form))]
pub async fn approve(
    State(state): State<AppState>,
    Form(form): Form<DecisionForm>,
) -> Result<Json<Value>> {
    let Decision {
        customer,
        submission,
        order,
    } = parse_decision(&state, &form)?;

    let outcome = state
        .affidavits()
        .approve(customer, &submission, order)
        .await?;
    Ok(outcome_response(&outcome))
}

/// Reject a pending submission, cancelling the held order when given.
#[instrument(skip(state, form))]
pub async fn reject(
    State(state): State<AppState>,
    Form(form): Form<DecisionForm>,
) -> Result<Json<Value>> {
    let Decision {
        customer,
        submission,
        order,
    } = parse_decision(&state, &form)?;

    let outcome = state
        .affidavits()
        .reject(customer, &submission, order, form.reason)
        .await?;
    Ok(outcome_response(&outcome))
}
