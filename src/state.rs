use std::sync::Arc;

use secrecy::ExposeSecret;
use sqlx::PgPool;

use crate::config::Config;
use crate::repositories::{
    NewsletterRepository, OrderRepository, ProductRepository, UserRepository,
};
use crate::services::reset_token::{Clock, CredentialStore};
use crate::services::{
    EmailService, JwtService, PasswordResetService, ResetTokenLifecycle, SystemClock,
};

/// アプリケーション共有状態
///
/// axum の State として全ハンドラーで共有される。
/// Clone は必須（axum が内部で clone するため）。
#[derive(Clone)]
pub struct AppState {
    /// PostgreSQL コネクションプール
    pub db_pool: PgPool,
    /// アプリケーション設定（Arc で共有）
    pub config: Arc<Config>,
    pub user_repo: UserRepository,
    pub product_repo: ProductRepository,
    pub order_repo: OrderRepository,
    pub newsletter_repo: NewsletterRepository,
    /// メールサービス（送信経路は起動時に確定）
    pub email_service: EmailService,
    /// セッショントークン
    pub jwt: JwtService,
    /// パスワードリセットトークンのライフサイクル
    pub reset_lifecycle: ResetTokenLifecycle,
}

impl AppState {
    pub fn new(db_pool: PgPool, config: Config) -> Self {
        let config = Arc::new(config);
        let user_repo = UserRepository::new(db_pool.clone());

        let mail_settings = config.mail_settings();
        if !mail_settings.any_configured() {
            tracing::warn!("メール送信経路が未設定（メール送信は失敗します）");
        }
        let email_service = EmailService::from_settings(&mail_settings);
        tracing::info!(
            channels = ?email_service.resolver().channels(),
            "メール送信経路を初期化"
        );

        let jwt = JwtService::new(
            config.jwt_secret.expose_secret(),
            time::Duration::days(config.jwt_expire_days),
        );

        let reset_lifecycle = ResetTokenLifecycle::new(
            Arc::new(user_repo.clone()) as Arc<dyn CredentialStore>,
            Arc::new(SystemClock) as Arc<dyn Clock>,
            time::Duration::seconds(config.password_reset_token_ttl_secs),
        );

        Self {
            product_repo: ProductRepository::new(db_pool.clone()),
            order_repo: OrderRepository::new(db_pool.clone()),
            newsletter_repo: NewsletterRepository::new(db_pool.clone()),
            db_pool,
            config,
            user_repo,
            email_service,
            jwt,
            reset_lifecycle,
        }
    }

    pub fn password_reset_service(&self) -> PasswordResetService {
        PasswordResetService::new(
            self.user_repo.clone(),
            self.reset_lifecycle.clone(),
            self.email_service.clone(),
            self.config.password_reset_url_base(),
        )
    }
}
