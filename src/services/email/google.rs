use std::sync::Arc;

use secrecy::ExposeSecret;
use serde::Deserialize;

use super::TransportError;
use crate::config::OAuth2Credentials;

const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Google トークンエンドポイントからのレスポンス
#[derive(Debug, Deserialize)]
struct GoogleTokenResponse {
    access_token: String,
    #[allow(dead_code)]
    expires_in: Option<i64>,
}

/// リフレッシュトークンから短命のアクセストークンを取得するクライアント
///
/// # Security
/// - client_secret / refresh_token / access_token はログに出力しない
/// - アクセストークンはキャッシュしない（送信ごとに取得）
#[derive(Clone)]
pub struct GoogleTokenClient {
    credentials: Arc<OAuth2Credentials>,
    http_client: reqwest::Client,
}

impl GoogleTokenClient {
    pub fn new(credentials: Arc<OAuth2Credentials>, http_client: reqwest::Client) -> Self {
        Self {
            credentials,
            http_client,
        }
    }

    /// XOAUTH2 で使用するアカウント名
    pub fn user(&self) -> Option<&str> {
        self.credentials.user.as_deref()
    }

    /// アクセストークンを取得
    pub async fn access_token(&self) -> Result<String, TransportError> {
        // application/x-www-form-urlencoded 形式で body を構築
        let body = format!(
            "client_id={}&client_secret={}&refresh_token={}&grant_type=refresh_token",
            urlencoding::encode(&self.credentials.client_id),
            urlencoding::encode(self.credentials.client_secret.expose_secret()),
            urlencoding::encode(self.credentials.refresh_token.expose_secret()),
        );

        let response = self
            .http_client
            .post(GOOGLE_TOKEN_URL)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(error = ?e, "Googleトークンエンドポイント通信エラー");
                TransportError::TokenUnavailable("token endpoint unreachable".to_string())
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, body = %body, "アクセストークン更新エラー");
            return Err(TransportError::TokenUnavailable(format!(
                "token refresh failed: {}",
                status
            )));
        }

        let token_response: GoogleTokenResponse = response.json().await.map_err(|e| {
            tracing::warn!(error = ?e, "Googleトークンレスポンスのパースエラー");
            TransportError::TokenUnavailable("invalid token response".to_string())
        })?;

        Ok(token_response.access_token)
    }
}
