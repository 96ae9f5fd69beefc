use std::sync::Arc;

use async_trait::async_trait;
use lettre::transport::smtp::authentication::{Credentials, Mechanism};
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use secrecy::ExposeSecret;

use super::{Channel, EmailMessage, GoogleTokenClient, MailTransport, TransportError};
use crate::config::{AccountCredentials, SmtpServer};

/// アプリパスワード・OAuth2 で使用する固定エンドポイント
const GMAIL_SMTP_HOST: &str = "smtp.gmail.com";

type Mailer = AsyncSmtpTransport<Tokio1Executor>;

async fn deliver(
    mailer: &Mailer,
    message: &EmailMessage,
    account: &str,
) -> Result<(), TransportError> {
    let email = message.to_lettre(Some(account))?;
    mailer.send(email).await?;
    Ok(())
}

async fn check(mailer: &Mailer) -> Result<(), TransportError> {
    if mailer.test_connection().await? {
        Ok(())
    } else {
        Err(TransportError::Rejected {
            status: 0,
            body: "NOOP rejected".to_string(),
        })
    }
}

/// OAuth2 (XOAUTH2) 認証の Gmail SMTP
pub struct OAuth2SmtpTransport {
    token_client: GoogleTokenClient,
}

impl OAuth2SmtpTransport {
    pub fn new(token_client: GoogleTokenClient) -> Self {
        Self { token_client }
    }

    /// 送信ごとにアクセストークンを取得してトランスポートを構築
    async fn mailer(&self) -> Result<(Mailer, &str), TransportError> {
        let user = self.token_client.user().ok_or_else(|| {
            TransportError::Misconfigured("XOAUTH2 用の送信アカウントが未設定".to_string())
        })?;
        let access_token = self.token_client.access_token().await?;

        let mailer = Mailer::relay(GMAIL_SMTP_HOST)?
            .authentication(vec![Mechanism::Xoauth2])
            .credentials(Credentials::new(user.to_string(), access_token))
            .build();
        Ok((mailer, user))
    }
}

#[async_trait]
impl MailTransport for OAuth2SmtpTransport {
    fn channel(&self) -> Channel {
        Channel::OAuth2Smtp
    }

    async fn send(&self, message: &EmailMessage) -> Result<(), TransportError> {
        let (mailer, user) = self.mailer().await?;
        deliver(&mailer, message, user).await
    }

    async fn verify(&self) -> Result<(), TransportError> {
        let (mailer, _) = self.mailer().await?;
        check(&mailer).await
    }
}

/// ホスト・ポートを明示したSMTP
pub struct ExplicitSmtpTransport {
    server: Arc<SmtpServer>,
}

impl ExplicitSmtpTransport {
    pub fn new(server: Arc<SmtpServer>) -> Self {
        Self { server }
    }

    fn mailer(&self) -> Result<Mailer, TransportError> {
        let builder = if self.server.secure {
            Mailer::relay(&self.server.host)?
        } else {
            Mailer::starttls_relay(&self.server.host)?
        };

        Ok(builder
            .port(self.server.port)
            .credentials(credentials(&self.server.account))
            .build())
    }
}

#[async_trait]
impl MailTransport for ExplicitSmtpTransport {
    fn channel(&self) -> Channel {
        Channel::Smtp
    }

    async fn send(&self, message: &EmailMessage) -> Result<(), TransportError> {
        deliver(&self.mailer()?, message, &self.server.account.user).await
    }

    async fn verify(&self) -> Result<(), TransportError> {
        check(&self.mailer()?).await
    }
}

/// ユーザー名＋アプリパスワードでの Gmail SMTP（旧方式）
pub struct AppPasswordSmtpTransport {
    account: Arc<AccountCredentials>,
}

impl AppPasswordSmtpTransport {
    pub fn new(account: Arc<AccountCredentials>) -> Self {
        Self { account }
    }

    fn mailer(&self) -> Result<Mailer, TransportError> {
        Ok(Mailer::relay(GMAIL_SMTP_HOST)?
            .credentials(credentials(&self.account))
            .build())
    }
}

#[async_trait]
impl MailTransport for AppPasswordSmtpTransport {
    fn channel(&self) -> Channel {
        Channel::AppPasswordSmtp
    }

    async fn send(&self, message: &EmailMessage) -> Result<(), TransportError> {
        deliver(&self.mailer()?, message, &self.account.user).await
    }

    async fn verify(&self) -> Result<(), TransportError> {
        check(&self.mailer()?).await
    }
}

fn credentials(account: &AccountCredentials) -> Credentials {
    Credentials::new(
        account.user.clone(),
        account.password.expose_secret().clone(),
    )
}
