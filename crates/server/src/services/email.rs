//! Email delivery of submission notices.
//!
//! Uses SMTP via lettre with Askama HTML and plain-text templates. The
//! reviewer notice carries the rendered affidavit and the customer's uploads
//! as MIME attachments.

use askama::Template;
use futures::future::BoxFuture;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Attachment as MimeAttachment, MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use thiserror::Error;

use super::notifier::{Attachment, DecisionNotice, Notifier, SubmissionNotice};
use crate::config::EmailConfig;

const DATE_FORMAT: &str = "%B %-d, %Y";

/// HTML template for the reviewer notice.
#[derive(Template)]
#[template(path = "email/submission_received.html")]
struct SubmissionReceivedHtml<'a> {
    notice: &'a SubmissionNotice,
    codes: String,
    submitted_on: String,
}

/// Plain text template for the reviewer notice.
#[derive(Template)]
#[template(path = "email/submission_received.txt")]
struct SubmissionReceivedText<'a> {
    notice: &'a SubmissionNotice,
    codes: String,
    submitted_on: String,
}

/// HTML template for the approval notice.
#[derive(Template)]
#[template(path = "email/submission_approved.html")]
struct SubmissionApprovedHtml<'a> {
    name: &'a str,
    codes: String,
    expires_on: Option<String>,
}

/// Plain text template for the approval notice.
#[derive(Template)]
#[template(path = "email/submission_approved.txt")]
struct SubmissionApprovedText<'a> {
    name: &'a str,
    codes: String,
    expires_on: Option<String>,
}

/// HTML template for the rejection notice.
#[derive(Template)]
#[template(path = "email/submission_rejected.html")]
struct SubmissionRejectedHtml<'a> {
    name: &'a str,
    codes: String,
    order_cancelled: bool,
    reason: Option<&'a str>,
}

/// Plain text template for the rejection notice.
#[derive(Template)]
#[template(path = "email/submission_rejected.txt")]
struct SubmissionRejectedText<'a> {
    name: &'a str,
    codes: String,
    order_cancelled: bool,
    reason: Option<&'a str>,
}

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum EmailError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Template rendering error.
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
}

/// Sends submission notices over SMTP.
#[derive(Clone)]
pub struct EmailService {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
    reviewer_address: String,
}

impl EmailService {
    /// Create a new email service from configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the SMTP relay cannot be configured.
    pub fn new(config: &EmailConfig) -> Result<Self, SmtpError> {
        let credentials = Credentials::new(
            config.smtp_username.clone(),
            config.smtp_password.expose_secret().to_string(),
        );

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(credentials)
            .build();

        Ok(Self {
            mailer,
            from_address: config.from_address.clone(),
            reviewer_address: config.reviewer_address.clone(),
        })
    }

    async fn send(&self, email: Message, to: &str, subject: &str) -> Result<(), EmailError> {
        self.mailer.send(email).await?;
        tracing::info!(to = %to, subject = %subject, "Email sent successfully");
        Ok(())
    }
}

impl Notifier for EmailService {
    fn submission_received<'a>(
        &'a self,
        notice: &'a SubmissionNotice,
    ) -> BoxFuture<'a, Result<(), EmailError>> {
        Box::pin(async move {
            let codes = notice.product_codes.join(", ");
            let submitted_on = notice.submitted_at.format(DATE_FORMAT).to_string();
            let html = SubmissionReceivedHtml {
                notice,
                codes: codes.clone(),
                submitted_on: submitted_on.clone(),
            }
            .render()?;
            let text = SubmissionReceivedText {
                notice,
                codes: codes.clone(),
                submitted_on,
            }
            .render()?;

            let mut files = Vec::with_capacity(notice.attachments.len() + 1);
            if let Some(pdf) = &notice.document {
                files.push(Attachment {
                    filename: format!("affidavit-{}.pdf", notice.submission_id),
                    content_type: "application/pdf".to_string(),
                    data: pdf.clone(),
                });
            }
            files.extend(notice.attachments.iter().cloned());

            let subject = format!("Affidavit submitted: {} ({codes})", notice.form.company);
            let email = compose(
                &self.from_address,
                &self.reviewer_address,
                &subject,
                &text,
                &html,
                &files,
            )?;
            self.send(email, &self.reviewer_address, &subject).await
        })
    }

    fn submission_approved<'a>(
        &'a self,
        notice: &'a DecisionNotice,
    ) -> BoxFuture<'a, Result<(), EmailError>> {
        Box::pin(async move {
            let codes = notice.product_codes.join(", ");
            let expires_on = notice
                .expires_at
                .map(|at| at.format(DATE_FORMAT).to_string());
            let html = SubmissionApprovedHtml {
                name: &notice.to.name,
                codes: codes.clone(),
                expires_on: expires_on.clone(),
            }
            .render()?;
            let text = SubmissionApprovedText {
                name: &notice.to.name,
                codes,
                expires_on,
            }
            .render()?;

            let subject = "Your affidavit has been approved";
            let email = compose(&self.from_address, &notice.to.email, subject, &text, &html, &[])?;
            self.send(email, &notice.to.email, subject).await
        })
    }

    fn submission_rejected<'a>(
        &'a self,
        notice: &'a DecisionNotice,
    ) -> BoxFuture<'a, Result<(), EmailError>> {
        Box::pin(async move {
            let codes = notice.product_codes.join(", ");
            let reason = notice.reason.as_deref();
            let order_cancelled = notice.order_id.is_some();
            let html = SubmissionRejectedHtml {
                name: &notice.to.name,
                codes: codes.clone(),
                order_cancelled,
                reason,
            }
            .render()?;
            let text = SubmissionRejectedText {
                name: &notice.to.name,
                codes,
                order_cancelled,
                reason,
            }
            .render()?;

            let subject = "Your affidavit could not be approved";
            let email = compose(&self.from_address, &notice.to.email, subject, &text, &html, &[])?;
            self.send(email, &notice.to.email, subject).await
        })
    }
}

/// Build a text/HTML alternative message, wrapped in `multipart/mixed` when
/// there are attachments.
fn compose(
    from: &str,
    to: &str,
    subject: &str,
    text_body: &str,
    html_body: &str,
    attachments: &[Attachment],
) -> Result<Message, EmailError> {
    let body = MultiPart::alternative()
        .singlepart(
            SinglePart::builder()
                .header(ContentType::TEXT_PLAIN)
                .body(text_body.to_string()),
        )
        .singlepart(
            SinglePart::builder()
                .header(ContentType::TEXT_HTML)
                .body(html_body.to_string()),
        );

    let builder = Message::builder()
        .from(
            from.parse()
                .map_err(|_| EmailError::InvalidAddress(from.to_string()))?,
        )
        .to(to
            .parse()
            .map_err(|_| EmailError::InvalidAddress(to.to_string()))?)
        .subject(subject);

    if attachments.is_empty() {
        return Ok(builder.multipart(body)?);
    }

    let mixed = attachments
        .iter()
        .fold(MultiPart::mixed().multipart(body), |mixed, file| {
            let content_type = ContentType::parse(&file.content_type)
                .or_else(|_| ContentType::parse("application/octet-stream"))
                .unwrap_or(ContentType::TEXT_PLAIN);
            mixed.singlepart(
                MimeAttachment::new(file.filename.clone()).body(file.data.clone(), content_type),
            )
        });
    Ok(builder.multipart(mixed)?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_compose_without_attachments_is_alternative() {
        let message = compose(
            "Affidavits <noreply@example.com>",
            "customer@example.com",
            "Subject",
            "plain",
            "<p>html</p>",
            &[],
        )
        .unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();

        assert!(raw.contains("multipart/alternative"));
        assert!(!raw.contains("multipart/mixed"));
    }

    #[test]
    fn test_compose_with_attachments_is_mixed() {
        let files = [Attachment {
            filename: "affidavit-sub-1.pdf".to_string(),
            content_type: "application/pdf".to_string(),
            data: b"%PDF-1.3".to_vec(),
        }];
        let message = compose(
            "noreply@example.com",
            "reviewer@example.com",
            "Subject",
            "plain",
            "<p>html</p>",
            &files,
        )
        .unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();

        assert!(raw.contains("multipart/mixed"));
        assert!(raw.contains("affidavit-sub-1.pdf"));
        assert!(raw.contains("application/pdf"));
    }

    #[test]
    fn test_compose_rejects_bad_address() {
        let err = compose("nope", "reviewer@example.com", "s", "t", "h", &[]).unwrap_err();
        assert!(matches!(err, EmailError::InvalidAddress(a) if a == "nope"));
    }

    #[test]
    fn test_rejection_text_mentions_cancellation_and_reason() {
        let text = SubmissionRejectedText {
            name: "Dana",
            codes: "A123".to_string(),
            order_cancelled: true,
            reason: Some("Protocol missing"),
        }
        .render()
        .unwrap();

        assert!(text.contains("Dana"));
        assert!(text.contains("cancelled"));
        assert!(text.contains("Protocol missing"));
    }

    #[test]
    fn test_approval_text_states_validity() {
        let text = SubmissionApprovedText {
            name: "Dana",
            codes: "A123, B456".to_string(),
            expires_on: Some("January 1, 2026".to_string()),
        }
        .render()
        .unwrap();

        assert!(text.contains("365 days"));
        assert!(text.contains("January 1, 2026"));
        assert!(text.contains("A123, B456"));
    }
}
