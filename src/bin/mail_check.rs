//! メール送信設定の確認ツール
//!
//! 使い方: `mail-check [--send]`
//! 送信経路を表示して接続確認を行い、`--send` 指定時は送信アカウント宛にテストメールを送る。
//! 認証情報そのものは表示しない。

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use aurea::config::Config;
use aurea::services::EmailService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let send = std::env::args().skip(1).any(|arg| arg == "--send");

    let config = Config::load().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
    let settings = config.mail_settings();

    println!(
        "OAuth2 (client_id / client_secret / refresh_token): {}",
        present(settings.oauth2.is_some())
    );
    println!(
        "SMTP host: {}",
        settings
            .smtp
            .as_ref()
            .map(|smtp| format!("{}:{} (secure={})", smtp.host, smtp.port, smtp.secure))
            .unwrap_or_else(|| "未設定".to_string())
    );
    println!(
        "送信アカウント: {}",
        settings
            .app_password
            .as_ref()
            .map(|account| account.user.as_str())
            .unwrap_or("未設定")
    );

    let email_service = EmailService::from_settings(&settings);
    let channels = email_service.resolver().channels();
    if channels.is_empty() {
        anyhow::bail!("メール送信経路が設定されていません");
    }
    println!(
        "送信経路（優先順）: {}",
        channels
            .iter()
            .map(|channel| channel.as_str())
            .collect::<Vec<_>>()
            .join(" -> ")
    );

    let channel = email_service
        .resolver()
        .verify()
        .await
        .map_err(|e| anyhow::anyhow!("接続確認に失敗: {}", e))?;
    println!("接続確認OK: {}", channel);

    if send {
        let delivery = email_service
            .send_test_email()
            .await
            .map_err(|e| anyhow::anyhow!("テストメール送信に失敗: {}", e))?;
        println!("テストメール送信OK: {}", delivery.channel);
    }

    Ok(())
}

fn present(configured: bool) -> &'static str {
    if configured { "設定済み" } else { "未設定" }
}
