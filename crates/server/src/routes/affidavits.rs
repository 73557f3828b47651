//! Storefront-facing affidavit endpoints.

use std::collections::{BTreeMap, HashMap};

use affidavit_core::{AffidavitForm, CustomerId, ProductCodes, SubmissionId};
use axum::{
    Form, Json,
    extract::{FromRequest, Multipart, Path, Query, Request, State},
    http::header,
    response::IntoResponse,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::services::Attachment;
use crate::state::AppState;

/// Raw fields and files of a submission request.
#[derive(Debug, Default)]
struct SubmissionBody {
    fields: HashMap<String, String>,
    attachments: Vec<Attachment>,
}

/// Read a submission posted as `multipart/form-data` (with files) or
/// `application/x-www-form-urlencoded` (fields only).
async fn read_submission(request: Request) -> Result<SubmissionBody> {
    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("multipart/form-data"));

    if !is_multipart {
        let Form(fields) = Form::<HashMap<String, String>>::from_request(request, &())
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        return Ok(SubmissionBody {
            fields,
            attachments: Vec::new(),
        });
    }

    let mut multipart = Multipart::from_request(request, &())
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?;

    let mut body = SubmissionBody::default();
    // Uploads are named attachment_0, attachment_1, ...; keep that order.
    let mut files: BTreeMap<usize, Attachment> = BTreeMap::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_owned();
        let filename = field.file_name().map(str::to_owned);
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_owned();

        if let Some(index) = name
            .strip_prefix("attachment_")
            .and_then(|n| n.parse::<usize>().ok())
        {
            let data = field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(e.body_text()))?;
            if data.is_empty() {
                continue;
            }
            let filename = filename
                .map(|f| sanitize_filename(&f))
                .filter(|f| !f.is_empty())
                .unwrap_or_else(|| format!("attachment_{}", index + 1));
            files.insert(
                index,
                Attachment {
                    filename,
                    content_type,
                    data: data.to_vec(),
                },
            );
        } else {
            let text = field
                .text()
                .await
                .map_err(|e| AppError::BadRequest(e.body_text()))?;
            body.fields.insert(name, text);
        }
    }

    let declared = body
        .fields
        .get("attachmentCount")
        .and_then(|n| n.trim().parse::<usize>().ok());
    body.attachments = files
        .into_iter()
        .filter(|(index, _)| declared.is_none_or(|count| *index < count))
        .map(|(_, file)| file)
        .collect();

    Ok(body)
}

/// Keep the final path component and drop characters that upset mail clients.
fn sanitize_filename(name: &str) -> String {
    name.rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | ' '))
        .collect::<String>()
        .trim()
        .to_owned()
}

fn parse_customer(raw: Option<&str>) -> Result<CustomerId> {
    let raw = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::BadRequest("Customer ID required".to_string()))?;
    CustomerId::parse(raw).map_err(|e| AppError::BadRequest(format!("Invalid customer ID: {e}")))
}

/// File a new affidavit.
#[instrument(skip(state, request))]
pub async fn submit(State(state): State<AppState>, request: Request) -> Result<Json<Value>> {
    let SubmissionBody {
        fields,
        attachments,
    } = read_submission(request).await?;

    let customer = parse_customer(fields.get("customerId").map(String::as_str))?;
    let form = AffidavitForm::from_fields(&fields).map_err(|e| AppError::BadRequest(e.to_string()))?;

    let record = state
        .affidavits()
        .submit(customer, form, attachments)
        .await?;

    Ok(Json(json!({
        "success": true,
        "submissionId": record.id(),
        "message": "Affidavit submitted successfully. Your submission is pending review.",
    })))
}

/// Query parameters for the approval check.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckQuery {
    pub customer_id: Option<String>,
    pub product_codes: Option<String>,
}

/// Which product codes the customer may order.
#[instrument(skip(state))]
pub async fn check(
    State(state): State<AppState>,
    Query(query): Query<CheckQuery>,
) -> Result<Json<Value>> {
    let customer = parse_customer(query.customer_id.as_deref())?;
    let raw_codes = query
        .product_codes
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("Product codes required".to_string()))?;
    let codes = ProductCodes::parse_delimited(&raw_codes);

    let result = state.affidavits().check(customer, &codes, Utc::now()).await?;

    let mut body = json!({
        "success": true,
        "customerId": customer.to_string(),
        "productCodes": codes,
    });
    if let (Value::Object(map), Ok(Value::Object(extra))) =
        (&mut body, serde_json::to_value(&result))
    {
        map.extend(extra);
    }
    Ok(Json(body))
}

/// Query parameters for the PDF download.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PdfQuery {
    pub customer_id: Option<String>,
}

/// Download the affidavit PDF. Only the owning customer's id unlocks it.
#[instrument(skip(state))]
pub async fn pdf(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<PdfQuery>,
) -> Result<impl IntoResponse> {
    let customer = parse_customer(query.customer_id.as_deref())?;
    let id = SubmissionId::parse(&id)
        .map_err(|_| AppError::BadRequest("Submission ID required".to_string()))?;

    let bytes = state.affidavits().document(customer, &id).await?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"affidavit-{}.pdf\"", sanitize_filename(id.as_str())),
            ),
        ],
        bytes,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("C:\\Users\\me\\lab report.pdf"), "lab report.pdf");
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("résumé\"<x>.png"), "rsumx.png");
    }

    #[test]
    fn test_parse_customer() {
        assert_eq!(
            parse_customer(Some("gid://shopify/Customer/42")).ok(),
            Some(CustomerId::new(42))
        );
        assert!(matches!(parse_customer(None), Err(AppError::BadRequest(m)) if m == "Customer ID required"));
        assert!(matches!(parse_customer(Some("  ")), Err(AppError::BadRequest(_))));
        assert!(matches!(parse_customer(Some("abc")), Err(AppError::BadRequest(_))));
    }
}
