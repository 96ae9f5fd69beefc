mod error;
mod gmail_api;
mod google;
mod message;
mod resolver;
mod smtp;
mod transport;

pub use error::{MailError, Phase};
pub use gmail_api::GmailApiTransport;
pub use google::GoogleTokenClient;
pub use message::{Body, EmailMessage};
pub use resolver::{Delivery, EmailResolver};
pub use smtp::{AppPasswordSmtpTransport, ExplicitSmtpTransport, OAuth2SmtpTransport};
pub use transport::{Channel, MailTransport, TransportError};

#[cfg(test)]
pub(crate) use resolver::tests::FakeTransport;

use crate::config::MailSettings;

const SHOP_NAME: &str = "Áurea Virtual Shop";

/// お問い合わせフォームの内容
#[derive(Debug, Clone)]
pub struct ContactSubmission {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub subject: String,
    pub message: String,
}

/// アプリケーションのメール送信サービス
///
/// メール本文の組み立てを担当し、配信は `EmailResolver` に委譲する。
#[derive(Clone)]
pub struct EmailService {
    resolver: EmailResolver,
    from: Option<String>,
    contact_inbox: Option<String>,
}

impl EmailService {
    pub fn new(resolver: EmailResolver, from: Option<String>, contact_inbox: Option<String>) -> Self {
        Self {
            resolver,
            from,
            contact_inbox,
        }
    }

    /// 設定から EmailService を作成
    pub fn from_settings(settings: &MailSettings) -> Self {
        let resolver = EmailResolver::from_settings(settings, reqwest::Client::new());
        Self::new(
            resolver,
            settings.from.clone(),
            settings.contact_inbox.clone(),
        )
    }

    pub fn resolver(&self) -> &EmailResolver {
        &self.resolver
    }

    /// パスワードリセットメールを送信
    ///
    /// # Security
    /// reset_url にはトークン平文が含まれるためログに出力しない
    pub async fn send_password_reset_email(
        &self,
        to: &str,
        reset_url: &str,
        valid_minutes: i64,
    ) -> Result<Delivery, MailError> {
        let message = EmailMessage::new(to, format!("{} - Restablecer contraseña", SHOP_NAME))
            .sender(self.from.clone())
            .text(format!(
                "Recibimos una solicitud para restablecer tu contraseña.\n\n\
                 Abre el siguiente enlace (válido por {} minutos):\n{}\n\n\
                 Si no solicitaste este cambio, ignora este mensaje.",
                valid_minutes, reset_url
            ))
            .html(format!(
                "<p>Recibimos una solicitud para restablecer tu contraseña.</p>\
                 <p><a href=\"{url}\">Restablecer contraseña</a></p>\
                 <p>El enlace es válido por {minutes} minutos. \
                 Si no solicitaste este cambio, ignora este mensaje.</p>",
                url = reset_url,
                minutes = valid_minutes
            ));

        self.resolver.send(&message).await
    }

    /// 会員登録完了メールを送信
    pub async fn send_welcome_email(&self, to: &str, name: &str) -> Result<Delivery, MailError> {
        let message = EmailMessage::new(to, format!("Bienvenido a {}", SHOP_NAME))
            .sender(self.from.clone())
            .text(format!(
                "¡Hola {}!\n\nTu cuenta en {} fue creada correctamente.",
                name, SHOP_NAME
            ));

        self.resolver.send(&message).await
    }

    /// お問い合わせ内容を店舗宛に送信（返信先は問い合わせ者）
    pub async fn send_contact_message(
        &self,
        submission: &ContactSubmission,
    ) -> Result<Delivery, MailError> {
        let inbox = self.contact_inbox.as_deref().ok_or_else(|| {
            tracing::error!("お問い合わせの宛先が未設定");
            MailError::Configuration
        })?;

        let message = EmailMessage::new(inbox, format!("Nuevo mensaje de contacto: {}", submission.subject))
            .sender(self.from.clone())
            .reply_to(submission.email.as_str())
            .text(contact_body(submission));

        self.resolver.send(&message).await
    }

    /// 送信アカウント宛にテストメールを送信
    pub async fn send_test_email(&self) -> Result<Delivery, MailError> {
        let to = self
            .from
            .as_deref()
            .ok_or(MailError::Configuration)?;

        let message = EmailMessage::new(to, format!("Prueba de configuración de email - {}", SHOP_NAME))
            .sender(self.from.clone())
            .text(format!(
                "Este es un email de prueba.\n\nEnviado: {}",
                time::OffsetDateTime::now_utc()
            ));

        self.resolver.send(&message).await
    }
}

fn contact_body(submission: &ContactSubmission) -> String {
    format!(
        "Nuevo mensaje de contacto desde {shop}\n\n\
         Nombre: {name}\n\
         Email: {email}\n\
         Teléfono: {phone}\n\
         Asunto: {subject}\n\n\
         Mensaje:\n{message}\n",
        shop = SHOP_NAME,
        name = submission.name,
        email = submission.email,
        phone = submission.phone.as_deref().unwrap_or("No proporcionado"),
        subject = submission.subject,
        message = submission.message,
    )
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;

    fn service(transport: &Arc<FakeTransport>, contact_inbox: Option<&str>) -> EmailService {
        let resolver = EmailResolver::new(
            vec![Arc::clone(transport) as Arc<dyn MailTransport>],
            None,
            Duration::from_secs(5),
        );
        EmailService::new(
            resolver,
            Some("shop@example.com".to_string()),
            contact_inbox.map(str::to_string),
        )
    }

    fn submission() -> ContactSubmission {
        ContactSubmission {
            name: "Ana".to_string(),
            email: "ana@example.com".to_string(),
            phone: None,
            subject: "Talla".to_string(),
            message: "¿Tienen la talla M?".to_string(),
        }
    }

    #[test]
    fn test_contact_body_defaults_phone() {
        let body = contact_body(&submission());
        assert!(body.contains("Nombre: Ana"));
        assert!(body.contains("Teléfono: No proporcionado"));
        assert!(body.contains("¿Tienen la talla M?"));
    }

    #[tokio::test]
    async fn test_contact_message_reports_channel() {
        let transport = FakeTransport::ok(Channel::Smtp);
        let delivery = service(&transport, Some("inbox@example.com"))
            .send_contact_message(&submission())
            .await
            .unwrap();
        assert_eq!(delivery.channel, Channel::Smtp);
        assert_eq!(transport.attempts(), 1);
    }

    #[tokio::test]
    async fn test_contact_message_requires_inbox() {
        let transport = FakeTransport::ok(Channel::Smtp);
        let result = service(&transport, None)
            .send_contact_message(&submission())
            .await;
        assert!(matches!(result, Err(MailError::Configuration)));
        assert_eq!(transport.attempts(), 0);
    }

    #[tokio::test]
    async fn test_password_reset_email_propagates_failure() {
        let transport = FakeTransport::failing(Channel::AppPasswordSmtp);
        let result = service(&transport, None)
            .send_password_reset_email("user@example.com", "http://localhost/reset?token=x", 10)
            .await;
        assert!(matches!(result, Err(MailError::Exhausted { .. })));
    }
}
