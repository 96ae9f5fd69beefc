use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use super::{
    AppPasswordSmtpTransport, Channel, EmailMessage, ExplicitSmtpTransport, GmailApiTransport,
    GoogleTokenClient, MailError, MailTransport, OAuth2SmtpTransport, Phase, TransportError,
};
use crate::config::MailSettings;

/// 配信結果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Delivery {
    pub channel: Channel,
}

/// 送信経路を優先順に試行するメール配信リゾルバ
///
/// 1. OAuth2 SMTP → 2. 明示的SMTP → 3. アプリパスワードSMTP を接続フェーズとして
/// 最初の成功で打ち切る。接続フェーズが全て失敗（または対象なし）の場合のみ
/// 4. Gmail API を最後の手段として試す。各経路は1回ずつしか試行しない。
#[derive(Clone)]
pub struct EmailResolver {
    connection_phase: Vec<Arc<dyn MailTransport>>,
    api_fallback: Option<Arc<dyn MailTransport>>,
    attempt_timeout: Duration,
}

impl EmailResolver {
    pub fn new(
        connection_phase: Vec<Arc<dyn MailTransport>>,
        api_fallback: Option<Arc<dyn MailTransport>>,
        attempt_timeout: Duration,
    ) -> Self {
        Self {
            connection_phase,
            api_fallback,
            attempt_timeout,
        }
    }

    /// 設定から利用可能な送信経路を組み立てる
    pub fn from_settings(settings: &MailSettings, http_client: reqwest::Client) -> Self {
        let token_client = settings
            .oauth2
            .as_ref()
            .map(|credentials| GoogleTokenClient::new(Arc::clone(credentials), http_client.clone()));

        let mut connection_phase: Vec<Arc<dyn MailTransport>> = Vec::with_capacity(3);
        if let Some(token_client) = &token_client {
            connection_phase.push(Arc::new(OAuth2SmtpTransport::new(token_client.clone())));
        }
        if let Some(server) = &settings.smtp {
            connection_phase.push(Arc::new(ExplicitSmtpTransport::new(Arc::clone(server))));
        }
        if let Some(account) = &settings.app_password {
            connection_phase.push(Arc::new(AppPasswordSmtpTransport::new(Arc::clone(account))));
        }

        let api_fallback = token_client.map(|token_client| {
            Arc::new(GmailApiTransport::new(token_client, http_client)) as Arc<dyn MailTransport>
        });

        Self::new(
            connection_phase,
            api_fallback,
            Duration::from_secs(settings.timeout_secs),
        )
    }

    /// 設定済みの送信経路（試行順）
    pub fn channels(&self) -> Vec<Channel> {
        self.connection_phase
            .iter()
            .chain(self.api_fallback.iter())
            .map(|t| t.channel())
            .collect()
    }

    /// メールを1通配信する
    ///
    /// # Errors
    /// - 送信経路が一つもない: `MailError::Configuration`（通信なし）
    /// - 全経路失敗: 最後のエラーと失敗フェーズを含む `MailError::Exhausted`
    pub async fn send(&self, message: &EmailMessage) -> Result<Delivery, MailError> {
        if self.connection_phase.is_empty() && self.api_fallback.is_none() {
            tracing::error!("メール送信手段が一つも設定されていません");
            return Err(MailError::Configuration);
        }

        let mut last_failure = None;
        for transport in &self.connection_phase {
            match self.attempt(transport.as_ref(), message).await {
                Ok(()) => {
                    return Ok(Delivery {
                        channel: transport.channel(),
                    });
                }
                Err(e) => last_failure = Some((transport.channel(), e)),
            }
        }

        if let Some(api) = &self.api_fallback {
            if last_failure.is_some() {
                tracing::warn!("接続フェーズが全て失敗、Gmail API にフォールバック");
            }
            return match self.attempt(api.as_ref(), message).await {
                Ok(()) => Ok(Delivery {
                    channel: api.channel(),
                }),
                Err(source) => Err(MailError::Exhausted {
                    phase: Phase::Api,
                    channel: api.channel(),
                    source,
                }),
            };
        }

        match last_failure {
            Some((channel, source)) => Err(MailError::Exhausted {
                phase: Phase::Connection,
                channel,
                source,
            }),
            None => Err(MailError::Configuration),
        }
    }

    /// 送信せずに経路を確認し、最初に応答した経路を返す
    pub async fn verify(&self) -> Result<Channel, MailError> {
        let mut last_failure = None;
        for (phase, transport) in self
            .connection_phase
            .iter()
            .map(|t| (Phase::Connection, t))
            .chain(self.api_fallback.iter().map(|t| (Phase::Api, t)))
        {
            let channel = transport.channel();
            match self.bounded(transport.verify()).await {
                Ok(()) => {
                    tracing::info!(channel = %channel, "メール送信経路の確認に成功");
                    return Ok(channel);
                }
                Err(e) => {
                    tracing::warn!(channel = %channel, error = %e, "メール送信経路の確認に失敗");
                    last_failure = Some((phase, channel, e));
                }
            }
        }

        match last_failure {
            Some((phase, channel, source)) => Err(MailError::Exhausted {
                phase,
                channel,
                source,
            }),
            None => Err(MailError::Configuration),
        }
    }

    async fn attempt(
        &self,
        transport: &dyn MailTransport,
        message: &EmailMessage,
    ) -> Result<(), TransportError> {
        let channel = transport.channel();
        let result = self.bounded(transport.send(message)).await;
        match &result {
            Ok(()) => tracing::info!(channel = %channel, "メール送信成功"),
            Err(e) => tracing::warn!(channel = %channel, error = %e, "送信経路が失敗"),
        }
        result
    }

    /// 1回の試行に上限時間を設ける
    async fn bounded<F>(&self, attempt: F) -> Result<(), TransportError>
    where
        F: Future<Output = Result<(), TransportError>>,
    {
        match tokio::time::timeout(self.attempt_timeout, attempt).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout(self.attempt_timeout.as_secs())),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;

    /// 試行回数を記録するテスト用の送信経路
    pub(crate) struct FakeTransport {
        channel: Channel,
        succeed: bool,
        delay: Option<Duration>,
        attempts: AtomicUsize,
    }

    impl FakeTransport {
        pub(crate) fn ok(channel: Channel) -> Arc<Self> {
            Arc::new(Self {
                channel,
                succeed: true,
                delay: None,
                attempts: AtomicUsize::new(0),
            })
        }

        pub(crate) fn failing(channel: Channel) -> Arc<Self> {
            Arc::new(Self {
                channel,
                succeed: false,
                delay: None,
                attempts: AtomicUsize::new(0),
            })
        }

        fn slow(channel: Channel, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                channel,
                succeed: true,
                delay: Some(delay),
                attempts: AtomicUsize::new(0),
            })
        }

        pub(crate) fn attempts(&self) -> usize {
            self.attempts.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl MailTransport for FakeTransport {
        fn channel(&self) -> Channel {
            self.channel
        }

        async fn send(&self, _message: &EmailMessage) -> Result<(), TransportError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.succeed {
                Ok(())
            } else {
                Err(TransportError::Rejected {
                    status: 535,
                    body: "authentication failed".to_string(),
                })
            }
        }

        async fn verify(&self) -> Result<(), TransportError> {
            self.send(&EmailMessage::default()).await
        }
    }

    fn as_dyn(transport: &Arc<FakeTransport>) -> Arc<dyn MailTransport> {
        Arc::clone(transport) as Arc<dyn MailTransport>
    }

    fn resolver(
        connection_phase: &[&Arc<FakeTransport>],
        api_fallback: Option<&Arc<FakeTransport>>,
    ) -> EmailResolver {
        EmailResolver::new(
            connection_phase.iter().map(|t| as_dyn(t)).collect(),
            api_fallback.map(as_dyn),
            Duration::from_secs(5),
        )
    }

    fn message() -> EmailMessage {
        EmailMessage::new("customer@example.com", "Hello").text("body")
    }

    #[tokio::test]
    async fn test_any_single_transport_reports_its_channel() {
        for channel in [Channel::OAuth2Smtp, Channel::Smtp, Channel::AppPasswordSmtp] {
            let transport = FakeTransport::ok(channel);
            let delivery = resolver(&[&transport], None).send(&message()).await.unwrap();
            assert_eq!(delivery.channel, channel);
            assert_eq!(transport.attempts(), 1);
        }

        let api = FakeTransport::ok(Channel::GmailApi);
        let delivery = resolver(&[], Some(&api)).send(&message()).await.unwrap();
        assert_eq!(delivery.channel, Channel::GmailApi);
    }

    #[tokio::test]
    async fn test_stops_at_first_success() {
        let oauth2 = FakeTransport::ok(Channel::OAuth2Smtp);
        let smtp = FakeTransport::ok(Channel::Smtp);
        let api = FakeTransport::ok(Channel::GmailApi);

        let delivery = resolver(&[&oauth2, &smtp], Some(&api))
            .send(&message())
            .await
            .unwrap();

        assert_eq!(delivery.channel, Channel::OAuth2Smtp);
        assert_eq!(smtp.attempts(), 0);
        assert_eq!(api.attempts(), 0);
    }

    #[tokio::test]
    async fn test_falls_through_in_priority_order() {
        let oauth2 = FakeTransport::failing(Channel::OAuth2Smtp);
        let smtp = FakeTransport::failing(Channel::Smtp);
        let app_password = FakeTransport::ok(Channel::AppPasswordSmtp);
        let api = FakeTransport::ok(Channel::GmailApi);

        let delivery = resolver(&[&oauth2, &smtp, &app_password], Some(&api))
            .send(&message())
            .await
            .unwrap();

        assert_eq!(delivery.channel, Channel::AppPasswordSmtp);
        assert_eq!(oauth2.attempts(), 1);
        assert_eq!(smtp.attempts(), 1);
        assert_eq!(api.attempts(), 0);
    }

    #[tokio::test]
    async fn test_api_fallback_after_connection_phase_fails() {
        let oauth2 = FakeTransport::failing(Channel::OAuth2Smtp);
        let api = FakeTransport::ok(Channel::GmailApi);

        let delivery = resolver(&[&oauth2], Some(&api))
            .send(&message())
            .await
            .unwrap();

        assert_eq!(delivery.channel, Channel::GmailApi);
        assert_eq!(oauth2.attempts(), 1);
        assert_eq!(api.attempts(), 1);
    }

    #[tokio::test]
    async fn test_only_api_never_touches_connection_transports() {
        let api = FakeTransport::ok(Channel::GmailApi);
        let resolver = resolver(&[], Some(&api));

        assert_eq!(resolver.channels(), vec![Channel::GmailApi]);
        let delivery = resolver.send(&message()).await.unwrap();
        assert_eq!(delivery.channel, Channel::GmailApi);
    }

    #[tokio::test]
    async fn test_no_transport_is_configuration_error() {
        let result = resolver(&[], None).send(&message()).await;
        assert!(matches!(result, Err(MailError::Configuration)));
    }

    #[tokio::test]
    async fn test_exhausted_connection_phase_reports_last_error() {
        let oauth2 = FakeTransport::failing(Channel::OAuth2Smtp);
        let smtp = FakeTransport::failing(Channel::Smtp);

        let result = resolver(&[&oauth2, &smtp], None).send(&message()).await;

        match result {
            Err(MailError::Exhausted { phase, channel, .. }) => {
                assert_eq!(phase, Phase::Connection);
                assert_eq!(channel, Channel::Smtp);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_exhausted_api_phase() {
        let smtp = FakeTransport::failing(Channel::Smtp);
        let api = FakeTransport::failing(Channel::GmailApi);

        let result = resolver(&[&smtp], Some(&api)).send(&message()).await;

        assert!(matches!(
            result,
            Err(MailError::Exhausted {
                phase: Phase::Api,
                channel: Channel::GmailApi,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_attempt_timeout_falls_through() {
        let slow = FakeTransport::slow(Channel::OAuth2Smtp, Duration::from_secs(10));
        let smtp = FakeTransport::ok(Channel::Smtp);
        let resolver = EmailResolver::new(
            vec![as_dyn(&slow), as_dyn(&smtp)],
            None,
            Duration::from_millis(50),
        );

        let delivery = resolver.send(&message()).await.unwrap();
        assert_eq!(delivery.channel, Channel::Smtp);
    }

    #[tokio::test]
    async fn test_verify_returns_first_healthy_channel() {
        let oauth2 = FakeTransport::failing(Channel::OAuth2Smtp);
        let smtp = FakeTransport::ok(Channel::Smtp);

        let channel = resolver(&[&oauth2, &smtp], None).verify().await.unwrap();
        assert_eq!(channel, Channel::Smtp);

        let result = resolver(&[], None).verify().await;
        assert!(matches!(result, Err(MailError::Configuration)));
    }

    #[test]
    fn test_from_settings_without_credentials_has_no_channels() {
        let settings = MailSettings {
            oauth2: None,
            smtp: None,
            app_password: None,
            from: None,
            contact_inbox: None,
            timeout_secs: 30,
        };
        let resolver = EmailResolver::from_settings(&settings, reqwest::Client::new());
        assert!(resolver.channels().is_empty());
    }

    #[test]
    fn test_from_settings_orders_channels() {
        use crate::config::{AccountCredentials, OAuth2Credentials, SmtpServer};
        use secrecy::SecretBox;

        let account = Arc::new(AccountCredentials {
            user: "shop@example.com".to_string(),
            password: SecretBox::new(Box::new("password".to_string())),
        });
        let settings = MailSettings {
            oauth2: Some(Arc::new(OAuth2Credentials {
                client_id: "client".to_string(),
                client_secret: SecretBox::new(Box::new("secret".to_string())),
                refresh_token: SecretBox::new(Box::new("refresh".to_string())),
                user: Some("shop@example.com".to_string()),
            })),
            smtp: Some(Arc::new(SmtpServer {
                host: "mail.example.com".to_string(),
                port: 587,
                secure: false,
                account: Arc::clone(&account),
            })),
            app_password: Some(account),
            from: None,
            contact_inbox: None,
            timeout_secs: 30,
        };

        let resolver = EmailResolver::from_settings(&settings, reqwest::Client::new());
        assert_eq!(
            resolver.channels(),
            vec![
                Channel::OAuth2Smtp,
                Channel::Smtp,
                Channel::AppPasswordSmtp,
                Channel::GmailApi,
            ]
        );
    }
}
