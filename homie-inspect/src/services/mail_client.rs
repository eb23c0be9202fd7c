//! Outbound mail client
//!
//! Reports are delivered through Mailjet's v3.1 send API. Delivery failures
//! are reported to the caller, which decides whether they are fatal.

use async_trait::async_trait;
use base64::Engine;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;

const MAILJET_SEND_URL: &str = "https://api.mailjet.com/v3.1/send";

/// Mail errors
#[derive(Debug, Error)]
pub enum MailError {
    #[error("Mail delivery is not configured")]
    NotConfigured,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Mail API error {0}: {1}")]
    Api(u16, String),

    #[error("Mail API rejected message: {0}")]
    Rejected(String),
}

/// File attached to a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailAttachment {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// A message ready to send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub to_email: String,
    pub to_name: String,
    pub subject: String,
    pub text_body: String,
    pub html_body: String,
    pub attachment: Option<MailAttachment>,
}

/// Sends email
#[async_trait]
pub trait MailSender: Send + Sync {
    async fn send(&self, message: &OutgoingMail) -> Result<(), MailError>;
}

/// Mailjet credentials and sender identity
#[derive(Debug, Clone)]
pub struct MailjetSettings {
    pub api_key: String,
    pub api_secret: String,
    pub sender_email: String,
    pub sender_name: String,
}

/// Mailjet-backed [`MailSender`]
pub struct MailjetClient {
    http_client: reqwest::Client,
    settings: MailjetSettings,
    send_url: String,
}

impl MailjetClient {
    pub fn new(settings: MailjetSettings) -> Result<Self, MailError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| MailError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            settings,
            send_url: MAILJET_SEND_URL.to_string(),
        })
    }

    /// Point the client at a different send endpoint
    pub fn with_send_url(mut self, url: impl Into<String>) -> Self {
        self.send_url = url.into();
        self
    }
}

/// Mailjet request body for one message
pub fn mailjet_payload(settings: &MailjetSettings, message: &OutgoingMail) -> Value {
    let mut entry = json!({
        "From": { "Email": settings.sender_email, "Name": settings.sender_name },
        "To": [{ "Email": message.to_email, "Name": message.to_name }],
        "Subject": message.subject,
        "TextPart": message.text_body,
        "HTMLPart": message.html_body,
    });

    if let Some(attachment) = &message.attachment {
        entry["Attachments"] = json!([{
            "ContentType": attachment.content_type,
            "Filename": attachment.filename,
            "Base64Content": base64::engine::general_purpose::STANDARD.encode(&attachment.bytes),
        }]);
    }

    json!({ "Messages": [entry] })
}

#[async_trait]
impl MailSender for MailjetClient {
    async fn send(&self, message: &OutgoingMail) -> Result<(), MailError> {
        let response = self
            .http_client
            .post(&self.send_url)
            .basic_auth(&self.settings.api_key, Some(&self.settings.api_secret))
            .json(&mailjet_payload(&self.settings, message))
            .send()
            .await
            .map_err(|e| MailError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(MailError::Api(status.as_u16(), error_text));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| MailError::Network(e.to_string()))?;
        let delivery = body
            .pointer("/Messages/0/Status")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        if delivery != "success" {
            return Err(MailError::Rejected(body.to_string()));
        }

        tracing::info!(to = %message.to_email, subject = %message.subject, "Email sent");
        Ok(())
    }
}

/// [`MailSender`] used when no credentials are configured
#[derive(Debug, Default, Clone)]
pub struct DisabledMailer;

#[async_trait]
impl MailSender for DisabledMailer {
    async fn send(&self, message: &OutgoingMail) -> Result<(), MailError> {
        tracing::warn!(to = %message.to_email, "Mail not configured, message not sent");
        Err(MailError::NotConfigured)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> MailjetSettings {
        MailjetSettings {
            api_key: "k".to_string(),
            api_secret: "s".to_string(),
            sender_email: "reports@homie.example".to_string(),
            sender_name: "Homie".to_string(),
        }
    }

    fn message(attachment: Option<MailAttachment>) -> OutgoingMail {
        OutgoingMail {
            to_email: "owner@example.com".to_string(),
            to_name: "Pat".to_string(),
            subject: "Inspection Report".to_string(),
            text_body: "text".to_string(),
            html_body: "<p>html</p>".to_string(),
            attachment,
        }
    }

    #[test]
    fn test_payload_without_attachment() {
        let payload = mailjet_payload(&settings(), &message(None));
        let entry = &payload["Messages"][0];
        assert_eq!(entry["From"]["Email"], "reports@homie.example");
        assert_eq!(entry["To"][0]["Email"], "owner@example.com");
        assert_eq!(entry["Subject"], "Inspection Report");
        assert!(entry.get("Attachments").is_none());
    }

    #[test]
    fn test_payload_encodes_attachment() {
        let attachment = MailAttachment {
            filename: "report.txt".to_string(),
            content_type: "text/plain".to_string(),
            bytes: b"hi".to_vec(),
        };
        let payload = mailjet_payload(&settings(), &message(Some(attachment)));
        let attached = &payload["Messages"][0]["Attachments"][0];
        assert_eq!(attached["Filename"], "report.txt");
        assert_eq!(attached["Base64Content"], "aGk=");
    }

    #[tokio::test]
    async fn test_disabled_mailer_fails() {
        let result = DisabledMailer.send(&message(None)).await;
        assert!(matches!(result, Err(MailError::NotConfigured)));
    }
}
