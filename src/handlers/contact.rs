use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::handlers::auth::validate_email;
use crate::services::email::{Channel, ContactSubmission, MailError};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ContactRequest {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub subject: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ContactResponse {
    pub message: String,
    pub channel: Channel,
}

/// POST /api/contact/send
///
/// 問い合わせ内容を店舗の受信箱へ送信（返信先は問い合わせ者）
pub async fn send_contact_message(
    State(state): State<AppState>,
    Json(request): Json<ContactRequest>,
) -> Result<Json<ContactResponse>, AppError> {
    let submission = contact_submission(request)?;

    let delivery = state
        .email_service
        .send_contact_message(&submission)
        .await?;

    tracing::info!(channel = %delivery.channel, "お問い合わせ送信完了");

    Ok(Json(ContactResponse {
        message: "メッセージを送信しました".to_string(),
        channel: delivery.channel,
    }))
}

#[derive(Debug, Serialize)]
pub struct ContactHealthResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<Channel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'static str>,
}

/// GET /api/contact/health
///
/// 送信せずに接続確認のみ行い、応答した経路を返す
pub async fn contact_health(
    State(state): State<AppState>,
) -> (StatusCode, Json<ContactHealthResponse>) {
    let (status, response) = health_response(state.email_service.resolver().verify().await);
    (status, Json(response))
}

/// 確認結果をレスポンスに変換（失敗の詳細はログのみに残す）
fn health_response(result: Result<Channel, MailError>) -> (StatusCode, ContactHealthResponse) {
    match result {
        Ok(channel) => (
            StatusCode::OK,
            ContactHealthResponse {
                ok: true,
                method: Some(channel),
                error: None,
            },
        ),
        Err(e) => {
            tracing::warn!(error = %e, "メール送信経路の確認に失敗");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                ContactHealthResponse {
                    ok: false,
                    method: None,
                    error: Some("メール送信経路を利用できません"),
                },
            )
        }
    }
}

/// 入力を検証して問い合わせ内容に変換（電話番号以外は必須）
fn contact_submission(request: ContactRequest) -> Result<ContactSubmission, AppError> {
    let required = [
        &request.name,
        &request.email,
        &request.subject,
        &request.message,
    ];
    if required.iter().any(|field| field.trim().is_empty()) {
        return Err(AppError::Validation(
            "必須項目をすべて入力してください".to_string(),
        ));
    }
    validate_email(&request.email)?;

    Ok(ContactSubmission {
        name: request.name.trim().to_string(),
        email: request.email.trim().to_string(),
        phone: request
            .phone
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty()),
        subject: request.subject.trim().to_string(),
        message: request.message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::email::{Phase, TransportError};

    fn request() -> ContactRequest {
        ContactRequest {
            name: "Ana".to_string(),
            email: " ana@example.com ".to_string(),
            phone: Some("  ".to_string()),
            subject: "Envíos".to_string(),
            message: "¿Hacen envíos a Cusco?".to_string(),
        }
    }

    #[test]
    fn test_contact_submission_trims_and_drops_blank_phone() {
        let submission = contact_submission(request()).unwrap();
        assert_eq!(submission.email, "ana@example.com");
        assert!(submission.phone.is_none());
    }

    #[test]
    fn test_contact_submission_requires_fields() {
        let mut missing_subject = request();
        missing_subject.subject = String::new();
        assert!(contact_submission(missing_subject).is_err());

        let mut missing_message = request();
        missing_message.message = " ".to_string();
        assert!(contact_submission(missing_message).is_err());
    }

    #[test]
    fn test_health_reports_channel() {
        let (status, response) = health_response(Ok(Channel::Smtp));
        assert_eq!(status, StatusCode::OK);
        assert!(response.ok);
        assert_eq!(response.method, Some(Channel::Smtp));
    }

    #[test]
    fn test_health_failure_hides_transport_detail() {
        let failure = MailError::Exhausted {
            phase: Phase::Api,
            channel: Channel::GmailApi,
            source: TransportError::Rejected {
                status: 401,
                body: r#"{"error":"invalid_grant","account":"shop@example.com"}"#.to_string(),
            },
        };

        let (status, response) = health_response(Err(failure));
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(!response.ok);

        let body = serde_json::to_string(&response).unwrap();
        assert!(!body.contains("invalid_grant"));
        assert!(!body.contains("shop@example.com"));
        assert!(!body.contains("401"));
        assert!(!body.contains("gmail-api"));
    }

    #[test]
    fn test_contact_submission_rejects_invalid_email() {
        let mut invalid = request();
        invalid.email = "ana".to_string();
        assert!(matches!(
            contact_submission(invalid),
            Err(AppError::Validation(_))
        ));
    }
}
