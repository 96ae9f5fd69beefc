use uuid::Uuid;

use crate::error::AppError;
use crate::repositories::UserRepository;
use crate::services::auth::{hash_password, normalize_email};
use crate::services::email::{Delivery, EmailService};
use crate::services::reset_token::ResetTokenLifecycle;

/// パスワードリセットサービス
#[derive(Clone)]
pub struct PasswordResetService {
    user_repo: UserRepository,
    lifecycle: ResetTokenLifecycle,
    email_service: EmailService,
    reset_url_base: String,
}

impl PasswordResetService {
    pub fn new(
        user_repo: UserRepository,
        lifecycle: ResetTokenLifecycle,
        email_service: EmailService,
        reset_url_base: String,
    ) -> Self {
        Self {
            user_repo,
            lifecycle,
            email_service,
            reset_url_base,
        }
    }

    /// パスワードリセットをリクエスト
    ///
    /// # Security
    /// - ユーザーが存在しない場合も常に成功を返す（情報漏洩防止）
    /// - トークン（平文）はログに出力しない
    pub async fn request_reset(&self, email: &str) -> Result<(), AppError> {
        let email = normalize_email(email);
        tracing::info!(email = %email, "パスワードリセットリクエスト");

        let Some(user) = self.user_repo.find_by_email(&email).await? else {
            tracing::info!(email = %email, "パスワードリセット: ユーザー不在（成功レスポンス返却）");
            return Ok(());
        };

        let delivery = deliver_reset_link(
            &self.lifecycle,
            &self.email_service,
            user.id,
            &user.email,
            &self.reset_url_base,
        )
        .await?;

        tracing::info!(
            user_id = %user.id,
            channel = %delivery.channel,
            "パスワードリセットメール送信完了"
        );

        Ok(())
    }

    /// パスワードをリセット
    ///
    /// # Security
    /// - トークン・新パスワードはログに出力しない
    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<(), AppError> {
        let user_repo = &self.user_repo;
        let user_id = consume_and_store(&self.lifecycle, token, new_password, |user_id, hash| async move {
            user_repo.update_password(user_id, &hash).await
        })
        .await?;

        tracing::info!(user_id = %user_id, "パスワードリセット完了");

        Ok(())
    }
}

/// 新パスワードをハッシュ化してからトークンを消費し、保存する
///
/// トークン消費後に失敗し得るのは保存処理のみ。
pub async fn consume_and_store<F, Fut>(
    lifecycle: &ResetTokenLifecycle,
    token: &str,
    new_password: &str,
    store: F,
) -> Result<Uuid, AppError>
where
    F: FnOnce(Uuid, String) -> Fut,
    Fut: Future<Output = Result<(), sqlx::Error>>,
{
    let password_hash = hash_password(new_password)?;
    let user_id = lifecycle.consume(token).await?;
    store(user_id, password_hash).await?;
    Ok(user_id)
}

/// トークンを発行してリセットリンクを送信（送信失敗時は発行を取り消す）
pub async fn deliver_reset_link(
    lifecycle: &ResetTokenLifecycle,
    email_service: &EmailService,
    user_id: Uuid,
    to: &str,
    reset_url_base: &str,
) -> Result<Delivery, AppError> {
    let valid_minutes = lifecycle.ttl().whole_minutes();

    lifecycle
        .issue_and_deliver(user_id, |token| async move {
            let reset_url = build_reset_url(reset_url_base, &token);
            email_service
                .send_password_reset_email(to, &reset_url, valid_minutes)
                .await
        })
        .await
}

/// リセットURLを構築
fn build_reset_url(base: &str, token: &str) -> String {
    let separator = if base.contains('?') { '&' } else { '?' };
    format!("{}{}token={}", base, separator, token)
}
