use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::handlers::auth::validate_email;
use crate::handlers::extract::AdminUser;
use crate::models::NewsletterSubscriber;
use crate::services::auth::normalize_email;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct NewsletterRequest {
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct NewsletterResponse {
    pub message: String,
}

/// POST /api/newsletter/subscribe
///
/// - 新規: 201
/// - 購読中: 200（変更なし）
/// - 解除済み: 再購読して 200
pub async fn subscribe(
    State(state): State<AppState>,
    Json(request): Json<NewsletterRequest>,
) -> Result<(StatusCode, Json<NewsletterResponse>), AppError> {
    validate_email(&request.email)?;
    let email = normalize_email(&request.email);

    let (status, message) = match state.newsletter_repo.find_by_email(&email).await? {
        Some(subscriber) if subscriber.active => {
            (StatusCode::OK, "既に購読中です")
        }
        Some(_) => {
            state.newsletter_repo.set_active(&email, true).await?;
            tracing::info!(email = %email, "ニュースレター再購読");
            (StatusCode::OK, "購読を再開しました")
        }
        None => match state.newsletter_repo.create(&email).await {
            Ok(_) => {
                tracing::info!(email = %email, "ニュースレター購読");
                (StatusCode::CREATED, "ご購読ありがとうございます")
            }
            // 同時登録で先を越された場合は購読済みとして扱う
            Err(sqlx::Error::Database(db_err))
                if db_err.constraint() == Some("newsletter_subscribers_email_key") =>
            {
                (StatusCode::OK, "既に購読中です")
            }
            Err(e) => return Err(AppError::Database(e)),
        },
    };

    Ok((
        status,
        Json(NewsletterResponse {
            message: message.to_string(),
        }),
    ))
}

/// POST /api/newsletter/unsubscribe
pub async fn unsubscribe(
    State(state): State<AppState>,
    Json(request): Json<NewsletterRequest>,
) -> Result<Json<NewsletterResponse>, AppError> {
    let email = normalize_email(&request.email);

    state
        .newsletter_repo
        .set_active(&email, false)
        .await?
        .ok_or_else(|| AppError::NotFound("メールアドレスが見つかりません".to_string()))?;

    tracing::info!(email = %email, "ニュースレター購読解除");
    Ok(Json(NewsletterResponse {
        message: "購読を解除しました".to_string(),
    }))
}

/// GET /api/newsletter/subscribers
pub async fn subscribers(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
) -> Result<Json<Vec<NewsletterSubscriber>>, AppError> {
    Ok(Json(state.newsletter_repo.list_active().await?))
}
