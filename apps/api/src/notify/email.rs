use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment as MailAttachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::debug;

use super::{EmailTransport, NotifyError, OutgoingEmail};

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// SMTP relay transport with username/password authentication.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    /// Builds a TLS relay transport. Nothing is sent until the first email.
    pub fn new(host: &str, username: String, password: String) -> Result<Self, NotifyError> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(host)?
            .credentials(Credentials::new(username, password))
            .build();

        Ok(Self { transport })
    }
}

#[async_trait]
impl EmailTransport for SmtpMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<String, NotifyError> {
        let message = build_message(email)?;
        let response = self.transport.send(message).await?;

        let text = response
            .message()
            .collect::<Vec<_>>()
            .join(" ");
        Ok(format!("{} {}", response.code(), text))
    }
}

pub fn parse_mailbox(address: &str) -> Result<Mailbox, NotifyError> {
    address.parse::<Mailbox>().map_err(|e| NotifyError::Address {
        address: address.to_string(),
        reason: e.to_string(),
    })
}

/// Converts a transport-agnostic email into a MIME message:
/// a plain-text part followed by one part per attachment.
pub fn build_message(email: OutgoingEmail) -> Result<Message, NotifyError> {
    let OutgoingEmail {
        from,
        to,
        subject,
        body,
        attachments,
    } = email;

    let mut parts = MultiPart::mixed().singlepart(SinglePart::plain(body));
    for attachment in attachments {
        let content_type = attachment_content_type(attachment.content_type.as_deref())?;
        debug!(
            "Attaching {} ({} bytes, {:?})",
            attachment.file_name,
            attachment.content.len(),
            content_type
        );
        parts = parts.singlepart(
            MailAttachment::new(attachment.file_name).body(attachment.content.to_vec(), content_type),
        );
    }

    Message::builder()
        .from(parse_mailbox(&from)?)
        .to(parse_mailbox(&to)?)
        .subject(subject)
        .multipart(parts)
        .map_err(|e| NotifyError::Compose(e.to_string()))
}

/// Uses the uploader's declared type when it parses, octet-stream otherwise.
fn attachment_content_type(declared: Option<&str>) -> Result<ContentType, NotifyError> {
    if let Some(content_type) = declared.and_then(|ct| ContentType::parse(ct).ok()) {
        return Ok(content_type);
    }
    ContentType::parse(FALLBACK_CONTENT_TYPE).map_err(|e| NotifyError::Compose(e.to_string()))
}
