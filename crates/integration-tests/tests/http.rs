//! The router end to end with `tower::ServiceExt::oneshot`.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use affidavit_core::{CustomerId, OrderId, ProductId, StatusKind, SubmissionId};
use affidavit_integration_tests::{PlatformCall, TestApp, form, form_fields, sign_webhook};
use affidavit_server::middleware::SHOPIFY_HMAC_HEADER;
use axum::{
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
    response::Response,
};
use serde_json::{Value, json};
use tower::ServiceExt;

const CUSTOMER: CustomerId = CustomerId::new(6_201_234_567);

fn urlencoded(fields: &[(String, String)]) -> String {
    url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(fields)
        .finish()
}

fn post_form(uri: &str, fields: &[(String, String)]) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(urlencoded(fields)))
        .unwrap()
}

async fn send(app: &TestApp, request: Request<Body>) -> Response {
    app.router().oneshot(request).await.unwrap()
}

async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn pair(k: &str, v: impl Into<String>) -> (String, String) {
    (k.to_string(), v.into())
}

#[tokio::test]
async fn test_health() {
    let app = TestApp::new();
    let response = send(&app, Request::get("/health").body(Body::empty()).unwrap()).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn test_check_requires_parameters() {
    let app = TestApp::new();

    let response = send(
        &app,
        Request::get("/api/affidavits/check?productCodes=A123")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(response).await,
        json!({ "success": false, "error": "Customer ID required" })
    );

    let response = send(
        &app,
        Request::get(format!("/api/affidavits/check?customerId={CUSTOMER}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "Product codes required");
}

#[tokio::test]
async fn test_submit_then_check() {
    let app = TestApp::new();

    let response = send(
        &app,
        post_form("/api/affidavits/submit", &form_fields(CUSTOMER, "A123, B456")),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(
        body["message"],
        "Affidavit submitted successfully. Your submission is pending review."
    );
    assert!(body["submissionId"].as_str().is_some_and(|id| !id.is_empty()));

    let response = send(
        &app,
        Request::get(format!(
            "/api/affidavits/check?customerId=gid://shopify/Customer/{CUSTOMER}&productCodes=A123,B456"
        ))
        .body(Body::empty())
        .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["customerId"], CUSTOMER.to_string());
    assert_eq!(body["productCodes"], json!(["A123", "B456"]));
    assert_eq!(body["hasValidAffidavit"], false);
    assert_eq!(body["hasPending"], true);
    assert_eq!(body["validFor"], json!([]));
    assert_eq!(body["missing"], json!(["A123", "B456"]));
}

#[tokio::test]
async fn test_submit_rejects_incomplete_form() {
    let app = TestApp::new();
    let fields: Vec<_> = form_fields(CUSTOMER, "A123")
        .into_iter()
        .filter(|(k, _)| k != "printName")
        .collect();

    let response = send(&app, post_form("/api/affidavits/submit", &fields)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(response).await["error"],
        "Missing required field: printName"
    );
}

#[tokio::test]
async fn test_submit_multipart_with_attachments() {
    let app = TestApp::new();
    let boundary = "----affidavit-test-boundary";

    let mut fields = form_fields(CUSTOMER, "A123");
    fields.push(pair("attachmentCount", "1"));
    let mut body = String::new();
    for (name, value) in &fields {
        body.push_str(&format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
        ));
    }
    body.push_str(&format!(
        "--{boundary}\r\nContent-Disposition: form-data; name=\"attachment_0\"; filename=\"irb approval.txt\"\r\nContent-Type: text/plain\r\n\r\nApproved by IRB\r\n--{boundary}--\r\n"
    ));

    let response = send(
        &app,
        Request::post("/api/affidavits/submit")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let received = app.notifier.received();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].attachments.len(), 1);
    assert_eq!(received[0].attachments[0].filename, "irb approval.txt");
    assert_eq!(received[0].attachments[0].data, b"Approved by IRB");
}

#[tokio::test]
async fn test_approve_with_valid_token() {
    let app = TestApp::new();
    let record = app
        .state
        .affidavits()
        .submit(CUSTOMER, form("A123"), Vec::new())
        .await
        .unwrap();
    let token = app.signer.token(CUSTOMER, record.id());
    let order = OrderId::new(5_550_003);

    let fields = vec![
        pair("submissionId", record.id().as_str()),
        pair("customerId", CUSTOMER.to_string()),
        pair("token", token.clone()),
        pair("orderId", order.to_string()),
    ];
    let response = send(&app, post_form("/api/orders/affidavit-approve", &fields)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["status"], "approved");
    assert!(app.platform.calls().contains(&PlatformCall::Release(order)));

    // A second decision is refused without changing anything
    let response = send(&app, post_form("/api/orders/affidavit-reject", &fields)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["outcome"], "not_actionable");
    assert_eq!(body["status"], "approved");

    let stored = app.state.affidavits().submissions(CUSTOMER).await.unwrap();
    assert_eq!(stored[0].status().kind(), StatusKind::Approved);
}

#[tokio::test]
async fn test_decision_requires_matching_token() {
    let app = TestApp::new();
    let record = app
        .state
        .affidavits()
        .submit(CUSTOMER, form("A123"), Vec::new())
        .await
        .unwrap();
    // Token issued for another customer
    let token = app.signer.token(CustomerId::new(1), record.id());

    let fields = vec![
        pair("submissionId", record.id().as_str()),
        pair("customerId", CUSTOMER.to_string()),
        pair("token", token),
    ];
    let response = send(&app, post_form("/api/orders/affidavit-reject", &fields)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let missing = &fields[..2];
    let response = send(&app, post_form("/api/orders/affidavit-reject", missing)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let stored = app.state.affidavits().submissions(CUSTOMER).await.unwrap();
    assert_eq!(stored[0].status().kind(), StatusKind::Pending);
}

#[tokio::test]
async fn test_review_page() {
    let app = TestApp::new();
    let record = app
        .state
        .affidavits()
        .submit(CUSTOMER, form("A123"), Vec::new())
        .await
        .unwrap();
    let token = app.signer.token(CUSTOMER, record.id());

    let response = send(
        &app,
        Request::get(format!("/review/{CUSTOMER}/{}?token={token}", record.id()))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = String::from_utf8(
        to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec(),
    )
    .unwrap();
    assert!(html.contains(record.id().as_str()));
    assert!(html.contains("Reyes Biomedical"));
    assert!(html.contains("/api/orders/affidavit-approve"));

    let response = send(
        &app,
        Request::get(format!("/review/{CUSTOMER}/{}?token=deadbeef", record.id()))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_review_page_unknown_submission() {
    let app = TestApp::new();
    app.state
        .affidavits()
        .submit(CUSTOMER, form("A123"), Vec::new())
        .await
        .unwrap();
    let missing = SubmissionId::generate();
    let token = app.signer.token(CUSTOMER, &missing);

    let response = send(
        &app,
        Request::get(format!("/review/{CUSTOMER}/{missing}?token={token}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_pdf_download() {
    let app = TestApp::new();
    let record = app
        .state
        .affidavits()
        .submit(CUSTOMER, form("A123"), Vec::new())
        .await
        .unwrap();

    let response = send(
        &app,
        Request::get(format!(
            "/api/affidavits/{}/pdf?customerId={CUSTOMER}",
            record.id()
        ))
        .body(Body::empty())
        .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");

    let response = send(
        &app,
        Request::get(format!("/api/affidavits/{}/pdf?customerId=1", record.id()))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

fn webhook(body: &str, signature: Option<&str>) -> Request<Body> {
    let mut builder = Request::post("/api/webhooks/orders/create")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(signature) = signature {
        builder = builder.header(SHOPIFY_HMAC_HEADER, signature);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

#[tokio::test]
async fn test_webhook_signature_is_enforced() {
    let app = TestApp::new();
    let body = json!({ "id": 1, "customer": null, "line_items": [] }).to_string();

    let response = send(&app, webhook(&body, None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let forged = sign_webhook(b"{\"id\":2}");
    let response = send(&app, webhook(&body, Some(&forged))).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let signature = sign_webhook(body.as_bytes());
    let response = send(&app, webhook(&body, Some(&signature))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["decision"], "skipped");
}

#[tokio::test]
async fn test_webhook_holds_pending_order() {
    let app = TestApp::new();
    let product = ProductId::new(7_012_345_678);
    app.platform.gate_product(product, "A123");
    app.state
        .affidavits()
        .submit(CUSTOMER, form("A123"), Vec::new())
        .await
        .unwrap();

    let body = json!({
        "id": 9_001,
        "customer": { "id": CUSTOMER.as_u64() },
        "line_items": [{ "product_id": product.as_u64(), "quantity": 2 }],
    })
    .to_string();
    let signature = sign_webhook(body.as_bytes());

    let response = send(&app, webhook(&body, Some(&signature))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["decision"], "held");
    assert!(
        app.platform
            .calls()
            .iter()
            .any(|c| matches!(c, PlatformCall::Hold { order, .. } if order.as_u64() == 9_001))
    );
}

#[tokio::test]
async fn test_webhook_rejects_malformed_payload() {
    let app = TestApp::new();
    let body = r#"{"not":"an order"}"#;
    let signature = sign_webhook(body.as_bytes());

    let response = send(&app, webhook(body, Some(&signature))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
