use std::fmt;

use async_trait::async_trait;
use serde::Serialize;

use super::EmailMessage;

/// 配信に使用した経路
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Channel {
    #[serde(rename = "oauth2-smtp")]
    OAuth2Smtp,
    #[serde(rename = "smtp")]
    Smtp,
    #[serde(rename = "app-password-smtp")]
    AppPasswordSmtp,
    #[serde(rename = "gmail-api")]
    GmailApi,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OAuth2Smtp => "oauth2-smtp",
            Self::Smtp => "smtp",
            Self::AppPasswordSmtp => "app-password-smtp",
            Self::GmailApi => "gmail-api",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 個々の送信経路で発生したエラー
///
/// 送信経路の切り替えで回復される。最後の経路でのみ呼び出し側に伝播する。
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// アクセストークン取得失敗（この試行では経路を使用不可として扱う）
    #[error("アクセストークンを取得できません: {0}")]
    TokenUnavailable(String),

    #[error("設定不備: {0}")]
    Misconfigured(String),

    #[error("無効なメールアドレス: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("メッセージ構築エラー: {0}")]
    Build(#[from] lettre::error::Error),

    #[error("SMTPエラー: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    #[error("HTTP通信エラー: {0}")]
    Http(#[from] reqwest::Error),

    #[error("プロバイダーが拒否 ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("{0}秒以内に応答がありません")]
    Timeout(u64),
}

/// 送信経路の共通インターフェース
#[async_trait]
pub trait MailTransport: Send + Sync {
    fn channel(&self) -> Channel;

    /// 1通送信する（1回のみ試行）
    async fn send(&self, message: &EmailMessage) -> Result<(), TransportError>;

    /// 送信せずに接続・認証を確認する
    async fn verify(&self) -> Result<(), TransportError>;
}
