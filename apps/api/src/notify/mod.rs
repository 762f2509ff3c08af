//! Staff notifications for new applications.
//!
//! Both channels are fire-and-forget: `NotificationDispatcher::dispatch` spawns
//! one task per channel and returns immediately. Each task logs its own
//! outcome; failures never reach the HTTP caller and are never retried.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

use crate::models::application::NewApplication;

pub mod email;
pub mod messaging;

pub const APPLICATION_SUBJECT: &str = "New Job Application Submitted";

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Invalid email address '{address}': {reason}")]
    Address { address: String, reason: String },

    #[error("Failed to build email: {0}")]
    Compose(String),

    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Messaging API error (status {status}): {message}")]
    Api { status: u16, message: String },
}

/// A file forwarded with an email, kept in memory only.
#[derive(Debug, Clone)]
pub struct Attachment {
    pub file_name: String,
    pub content_type: Option<String>,
    pub content: Bytes,
}

#[derive(Debug, Clone)]
pub struct OutgoingEmail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone)]
pub struct OutgoingMessage {
    pub from: String,
    pub to: String,
    pub body: String,
}

/// Email delivery. Returns a short description of the server's reply.
#[async_trait]
pub trait EmailTransport: Send + Sync {
    async fn send(&self, email: OutgoingEmail) -> Result<String, NotifyError>;
}

/// Instant-message delivery. Returns the provider's message identifier.
#[async_trait]
pub trait MessagingTransport: Send + Sync {
    async fn send(&self, message: OutgoingMessage) -> Result<String, NotifyError>;
}

/// Sender and recipient identities for both channels.
#[derive(Debug, Clone)]
pub struct Recipients {
    pub email_from: String,
    pub email_to: String,
    pub message_from: String,
    pub message_to: String,
}

/// Plain-text summary shared by the email body and the instant message.
pub fn application_summary(application: &NewApplication) -> String {
    format!(
        "A new job application has been submitted:\n\nName: {}\nEmail: {}\nPhone: {}\nPosition: {}",
        application.name, application.email, application.phone, application.position
    )
}

/// Handles to the two detached notification tasks.
/// Dropping them does not cancel anything.
#[allow(dead_code)] // the request path never joins these
pub struct Dispatched {
    pub email: JoinHandle<()>,
    pub messaging: JoinHandle<()>,
}

#[derive(Clone)]
pub struct NotificationDispatcher {
    email: Arc<dyn EmailTransport>,
    messaging: Arc<dyn MessagingTransport>,
    recipients: Arc<Recipients>,
}

impl NotificationDispatcher {
    pub fn new(
        email: Arc<dyn EmailTransport>,
        messaging: Arc<dyn MessagingTransport>,
        recipients: Recipients,
    ) -> Self {
        Self {
            email,
            messaging,
            recipients: Arc::new(recipients),
        }
    }

    /// Composes both notifications and spawns their delivery.
    /// Must be called from within a tokio runtime.
    pub fn dispatch(
        &self,
        application_id: Uuid,
        application: &NewApplication,
        cv: Attachment,
    ) -> Dispatched {
        let summary = application_summary(application);

        let email = OutgoingEmail {
            from: self.recipients.email_from.clone(),
            to: self.recipients.email_to.clone(),
            subject: APPLICATION_SUBJECT.to_string(),
            body: summary.clone(),
            attachments: vec![cv],
        };
        let message = OutgoingMessage {
            from: self.recipients.message_from.clone(),
            to: self.recipients.message_to.clone(),
            body: summary,
        };

        let email_transport = Arc::clone(&self.email);
        let email_task = tokio::spawn(
            async move {
                match email_transport.send(email).await {
                    Ok(reply) => info!("Email sent: {reply}"),
                    Err(e) => error!("Error sending email: {e}"),
                }
            }
            .instrument(info_span!("notify_email", %application_id)),
        );

        let messaging_transport = Arc::clone(&self.messaging);
        let messaging_task = tokio::spawn(
            async move {
                match messaging_transport.send(message).await {
                    Ok(sid) => info!("Instant message sent: {sid}"),
                    Err(e) => error!("Error sending instant message: {e}"),
                }
            }
            .instrument(info_span!("notify_messaging", %application_id)),
        );

        Dispatched {
            email: email_task,
            messaging: messaging_task,
        }
    }
}
