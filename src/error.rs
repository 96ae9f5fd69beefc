use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::services::email::MailError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("認証エラー: {0}")]
    Authentication(String),

    #[error("認証が必要です")]
    Unauthorized,

    #[error("権限がありません: {0}")]
    Forbidden(String),

    #[error("見つかりません: {0}")]
    NotFound(String),

    #[error("バリデーションエラー: {0}")]
    Validation(String),

    #[error("データベースエラー")]
    Database(#[from] sqlx::Error),

    #[error("内部エラー")]
    Internal(#[from] anyhow::Error),

    #[error("このメールアドレスは既に使用されています")]
    EmailAlreadyExists,

    #[error("このSKUは既に使用されています")]
    SkuAlreadyExists,

    /// 不一致・期限切れ・使用済みを区別しない
    #[error("無効または期限切れのリンクです")]
    TokenInvalid,

    #[error("メール送信エラー")]
    Mail(#[from] MailError),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::Authentication(_) => (
                StatusCode::UNAUTHORIZED,
                "メールアドレスまたはパスワードが正しくありません".to_string(),
            ),
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "認証が必要です".to_string(),
            ),
            Self::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Self::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::Database(e) => {
                tracing::error!(error = ?e, "データベースエラー");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "内部エラーが発生しました".to_string(),
                )
            }
            Self::Internal(e) => {
                tracing::error!(error = ?e, "内部エラー");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "内部エラーが発生しました".to_string(),
                )
            }
            Self::EmailAlreadyExists => (
                StatusCode::CONFLICT,
                "このメールアドレスは既に使用されています".to_string(),
            ),
            Self::SkuAlreadyExists => (
                StatusCode::CONFLICT,
                "このSKUは既に使用されています".to_string(),
            ),
            Self::TokenInvalid => (
                StatusCode::BAD_REQUEST,
                "無効または期限切れのリンクです".to_string(),
            ),
            Self::Mail(e) => {
                // 送信経路の詳細はサーバー側ログのみに残す
                tracing::error!(error = %e, "メール送信エラー");
                match e {
                    MailError::Configuration => (
                        StatusCode::SERVICE_UNAVAILABLE,
                        "メール送信が設定されていません".to_string(),
                    ),
                    MailError::Exhausted { .. } => (
                        StatusCode::BAD_GATEWAY,
                        "メールの送信に失敗しました".to_string(),
                    ),
                }
            }
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}
