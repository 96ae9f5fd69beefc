use std::fmt;

use super::{Channel, TransportError};

/// 送信フェーズ
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// SMTP 系（OAuth2 → 明示的SMTP → アプリパスワード）
    Connection,
    /// Gmail API フォールバック
    Api,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connection => f.write_str("connection"),
            Self::Api => f.write_str("api"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    /// 送信手段が一つも設定されていない（ネットワーク通信は行わない）
    #[error("メール送信手段が設定されていません")]
    Configuration,

    /// 全ての送信経路が失敗（最後のエラーを保持）
    #[error("{phase} フェーズの送信に失敗 ({channel}): {source}")]
    Exhausted {
        phase: Phase,
        channel: Channel,
        #[source]
        source: TransportError,
    },
}
