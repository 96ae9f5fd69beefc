use async_trait::async_trait;
use serde::Serialize;

use super::{Channel, EmailMessage, GoogleTokenClient, MailTransport, TransportError};

const GMAIL_SEND_URL: &str = "https://gmail.googleapis.com/gmail/v1/users/me/messages/send";

#[derive(Serialize)]
struct SendRequest<'a> {
    raw: &'a str,
}

/// Gmail REST API による送信（SMTP 接続を使わない最終手段）
pub struct GmailApiTransport {
    token_client: GoogleTokenClient,
    http_client: reqwest::Client,
}

impl GmailApiTransport {
    pub fn new(token_client: GoogleTokenClient, http_client: reqwest::Client) -> Self {
        Self {
            token_client,
            http_client,
        }
    }
}

#[async_trait]
impl MailTransport for GmailApiTransport {
    fn channel(&self) -> Channel {
        Channel::GmailApi
    }

    async fn send(&self, message: &EmailMessage) -> Result<(), TransportError> {
        let access_token = self.token_client.access_token().await?;

        let mut message = message.clone();
        if message.from.is_none() {
            message.from = self.token_client.user().map(str::to_string);
        }
        let raw = message.to_raw_base64url();

        let response = self
            .http_client
            .post(GMAIL_SEND_URL)
            .bearer_auth(access_token)
            .json(&SendRequest { raw: &raw })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }

    async fn verify(&self) -> Result<(), TransportError> {
        self.token_client.access_token().await.map(|_| ())
    }
}
