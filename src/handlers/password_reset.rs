use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::handlers::auth::{validate_email, validate_password};
use crate::state::AppState;

// === リセットリクエスト ===

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// POST /api/auth/forgot-password
///
/// # Security
/// 登録の有無にかかわらず同じレスポンスを返す。
/// 送信失敗時のみエラー（発行したトークンは取り消し済み）。
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(request): Json<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    validate_email(&request.email)?;

    state
        .password_reset_service()
        .request_reset(&request.email)
        .await?;

    Ok(Json(MessageResponse {
        message: "登録済みの場合、パスワードリセット手順をメールで送信しました".to_string(),
    }))
}

// === パスワードリセット実行 ===

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
}

/// POST /api/auth/reset-password
///
/// # Security
/// - token, new_password はログに出力しない
pub async fn reset_password(
    State(state): State<AppState>,
    Json(request): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    validate_reset_password_request(&request)?;

    state
        .password_reset_service()
        .reset_password(request.token.trim(), &request.new_password)
        .await?;

    Ok(Json(MessageResponse {
        message: "パスワードが更新されました".to_string(),
    }))
}

/// リセットパスワードリクエストのバリデーション
fn validate_reset_password_request(request: &ResetPasswordRequest) -> Result<(), AppError> {
    if request.token.trim().is_empty() {
        return Err(AppError::Validation("トークンは必須です".to_string()));
    }
    validate_password(&request.new_password)
}
