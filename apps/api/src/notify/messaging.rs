use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{MessagingTransport, NotifyError, OutgoingMessage};

/// Twilio Programmable Messaging, used for WhatsApp delivery.
/// One attempt per message; the outcome is left to the caller to log.
#[derive(Clone)]
pub struct TwilioMessenger {
    client: Client,
    messages_url: String,
    account_sid: String,
    auth_token: String,
}

#[derive(Debug, Deserialize)]
struct MessageResource {
    sid: String,
}

#[derive(Debug, Deserialize)]
struct TwilioError {
    message: String,
}

impl TwilioMessenger {
    pub fn new(
        api_base: &str,
        account_sid: String,
        auth_token: String,
        timeout: Duration,
    ) -> Result<Self, NotifyError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            messages_url: messages_url(api_base, &account_sid),
            account_sid,
            auth_token,
        })
    }
}

fn messages_url(api_base: &str, account_sid: &str) -> String {
    format!(
        "{}/2010-04-01/Accounts/{}/Messages.json",
        api_base.trim_end_matches('/'),
        account_sid
    )
}

/// Prefers the API's own error message, falling back to the raw body.
fn api_error_message(body: String) -> String {
    serde_json::from_str::<TwilioError>(&body)
        .map(|e| e.message)
        .unwrap_or(body)
}

#[async_trait]
impl MessagingTransport for TwilioMessenger {
    async fn send(&self, message: OutgoingMessage) -> Result<String, NotifyError> {
        debug!("Posting message from {} to {}", message.from, message.to);

        let response = self
            .client
            .post(&self.messages_url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&[
                ("From", message.from.as_str()),
                ("To", message.to.as_str()),
                ("Body", message.body.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Messaging API returned {}: {}", status, body);
            return Err(NotifyError::Api {
                status: status.as_u16(),
                message: api_error_message(body),
            });
        }

        let resource: MessageResource = response.json().await?;
        Ok(resource.sid)
    }
}
