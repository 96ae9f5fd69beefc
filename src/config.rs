use std::sync::Arc;

use secrecy::{ExposeSecret, SecretBox};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub database_url: SecretBox<String>,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// CORS 許可オリジン兼リセットリンクの既定ベース
    #[serde(default = "default_frontend_url")]
    pub frontend_url: String,

    // セッション（JWT）設定
    pub jwt_secret: SecretBox<String>,
    #[serde(default = "default_jwt_expire_days")]
    pub jwt_expire_days: i64,

    // パスワードリセット設定
    #[serde(default)]
    pub password_reset_url_base: Option<String>,
    #[serde(default = "default_password_reset_token_ttl_secs")]
    pub password_reset_token_ttl_secs: i64,

    // Gmail OAuth2 設定（3つ揃った場合のみ有効）
    #[serde(default)]
    pub gmail_client_id: Option<String>,
    pub gmail_client_secret: Option<SecretBox<String>>,
    pub gmail_refresh_token: Option<SecretBox<String>>,

    // 送信アカウント（上から順に最初の空でない値を採用）
    #[serde(default)]
    pub email_user: Option<String>,
    #[serde(default)]
    pub smtp_user: Option<String>,
    #[serde(default)]
    pub gmail_user: Option<String>,
    pub email_pass: Option<SecretBox<String>>,
    pub smtp_pass: Option<SecretBox<String>>,
    pub gmail_app_password: Option<SecretBox<String>>,

    // 明示的SMTP設定
    #[serde(default)]
    pub smtp_host: Option<String>,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    #[serde(default)]
    pub smtp_secure: bool,

    #[serde(default)]
    pub email_from: Option<String>,
    /// お問い合わせの宛先（未設定なら送信アカウント）
    #[serde(default)]
    pub contact_inbox: Option<String>,
    #[serde(default = "default_mail_timeout_secs")]
    pub mail_timeout_secs: u64,
}

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3001;
const DEFAULT_FRONTEND_URL: &str = "http://localhost:5173";
const DEFAULT_JWT_EXPIRE_DAYS: i64 = 30;
const DEFAULT_SMTP_PORT: u16 = 587;
const DEFAULT_PASSWORD_RESET_TOKEN_TTL_SECS: i64 = 600;
const DEFAULT_MAIL_TIMEOUT_SECS: u64 = 30;

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_frontend_url() -> String {
    DEFAULT_FRONTEND_URL.to_string()
}

fn default_jwt_expire_days() -> i64 {
    DEFAULT_JWT_EXPIRE_DAYS
}

fn default_smtp_port() -> u16 {
    DEFAULT_SMTP_PORT
}

fn default_password_reset_token_ttl_secs() -> i64 {
    DEFAULT_PASSWORD_RESET_TOKEN_TTL_SECS
}

fn default_mail_timeout_secs() -> u64 {
    DEFAULT_MAIL_TIMEOUT_SECS
}

impl Config {
    pub fn load() -> Result<Self, envy::Error> {
        envy::from_env()
    }

    /// メール送信設定を解決
    ///
    /// 各認証情報グループは必須項目が全て空でない場合のみ設定される。
    pub fn mail_settings(&self) -> MailSettings {
        let username = first_non_empty([
            self.email_user.as_deref(),
            self.smtp_user.as_deref(),
            self.gmail_user.as_deref(),
        ]);
        let password = first_non_empty([
            self.email_pass.as_ref().map(|s| s.expose_secret().as_str()),
            self.smtp_pass.as_ref().map(|s| s.expose_secret().as_str()),
            self.gmail_app_password
                .as_ref()
                .map(|s| s.expose_secret().as_str()),
        ]);

        let oauth2 = match (
            non_empty(self.gmail_client_id.as_deref()),
            non_empty(
                self.gmail_client_secret
                    .as_ref()
                    .map(|s| s.expose_secret().as_str()),
            ),
            non_empty(
                self.gmail_refresh_token
                    .as_ref()
                    .map(|s| s.expose_secret().as_str()),
            ),
        ) {
            (Some(client_id), Some(client_secret), Some(refresh_token)) => {
                Some(Arc::new(OAuth2Credentials {
                    client_id: client_id.to_string(),
                    client_secret: secret(client_secret),
                    refresh_token: secret(refresh_token),
                    user: username.map(str::to_string),
                }))
            }
            _ => None,
        };

        let account = match (username, password) {
            (Some(user), Some(pass)) => Some(Arc::new(AccountCredentials {
                user: user.to_string(),
                // アプリパスワードはコピー時に空白が混入しやすい
                password: secret(&pass.split_whitespace().collect::<String>()),
            })),
            _ => None,
        };

        let smtp = match (non_empty(self.smtp_host.as_deref()), &account) {
            (Some(host), Some(account)) => Some(Arc::new(SmtpServer {
                host: host.to_string(),
                port: self.smtp_port,
                secure: self.smtp_secure,
                account: Arc::clone(account),
            })),
            _ => None,
        };

        MailSettings {
            oauth2,
            smtp,
            app_password: account,
            from: non_empty(self.email_from.as_deref())
                .or(username)
                .map(str::to_string),
            contact_inbox: non_empty(self.contact_inbox.as_deref())
                .or(username)
                .map(str::to_string),
            timeout_secs: self.mail_timeout_secs,
        }
    }

    /// リセットURLのベースを取得
    pub fn password_reset_url_base(&self) -> String {
        match &self.password_reset_url_base {
            Some(base) if !base.trim().is_empty() => base.clone(),
            _ => format!("{}/reset-password", self.frontend_url.trim_end_matches('/')),
        }
    }
}

/// 解決済みのメール送信設定
///
/// 起動時に一度だけ組み立て、`EmailResolver` に注入する。
#[derive(Debug)]
pub struct MailSettings {
    pub oauth2: Option<Arc<OAuth2Credentials>>,
    pub smtp: Option<Arc<SmtpServer>>,
    pub app_password: Option<Arc<AccountCredentials>>,
    pub from: Option<String>,
    pub contact_inbox: Option<String>,
    pub timeout_secs: u64,
}

impl MailSettings {
    /// 何らかの送信手段が設定されているか
    pub fn any_configured(&self) -> bool {
        self.oauth2.is_some() || self.smtp.is_some() || self.app_password.is_some()
    }
}

/// Gmail OAuth2 認証情報（client_secret / refresh_token はログ出力禁止）
#[derive(Debug)]
pub struct OAuth2Credentials {
    pub client_id: String,
    pub client_secret: SecretBox<String>,
    pub refresh_token: SecretBox<String>,
    /// XOAUTH2 で使用するアカウント名
    pub user: Option<String>,
}

/// ユーザー名・パスワードの組
#[derive(Debug)]
pub struct AccountCredentials {
    pub user: String,
    pub password: SecretBox<String>,
}

/// ホスト指定のSMTPサーバー
#[derive(Debug)]
pub struct SmtpServer {
    pub host: String,
    pub port: u16,
    /// true: 暗黙TLS / false: STARTTLS
    pub secure: bool,
    pub account: Arc<AccountCredentials>,
}

fn secret(value: &str) -> SecretBox<String> {
    SecretBox::new(Box::new(value.to_string()))
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// 優先順に並んだ候補から最初の空でない値を返す
pub fn first_non_empty<'a, const N: usize>(candidates: [Option<&'a str>; N]) -> Option<&'a str> {
    candidates.into_iter().find_map(non_empty)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            database_url: secret("postgres://localhost/aurea"),
            host: default_host(),
            port: default_port(),
            frontend_url: default_frontend_url(),
            jwt_secret: secret("test-secret"),
            jwt_expire_days: default_jwt_expire_days(),
            password_reset_url_base: None,
            password_reset_token_ttl_secs: default_password_reset_token_ttl_secs(),
            gmail_client_id: None,
            gmail_client_secret: None,
            gmail_refresh_token: None,
            email_user: None,
            smtp_user: None,
            gmail_user: None,
            email_pass: None,
            smtp_pass: None,
            gmail_app_password: None,
            smtp_host: None,
            smtp_port: default_smtp_port(),
            smtp_secure: false,
            email_from: None,
            contact_inbox: None,
            mail_timeout_secs: default_mail_timeout_secs(),
        }
    }

    #[test]
    fn test_first_non_empty_skips_blank_values() {
        assert_eq!(
            first_non_empty([Some(""), Some("  "), Some("shop@example.com")]),
            Some("shop@example.com")
        );
        assert_eq!(first_non_empty([None, Some("a@b.c"), Some("x@y.z")]), Some("a@b.c"));
        assert_eq!(first_non_empty::<2>([None, None]), None);
    }

    #[test]
    fn test_no_mail_configuration() {
        let settings = base_config().mail_settings();
        assert!(!settings.any_configured());
        assert!(settings.from.is_none());
    }

    #[test]
    fn test_username_falls_back_to_alternate_names() {
        let mut config = base_config();
        config.email_user = Some("".to_string());
        config.gmail_user = Some("alt@example.com".to_string());
        config.smtp_pass = Some(secret("abcd efgh ijkl mnop"));

        let settings = config.mail_settings();
        let account = settings.app_password.expect("app password configured");
        assert_eq!(account.user, "alt@example.com");
        assert_eq!(account.password.expose_secret(), "abcdefghijklmnop");
        assert!(settings.smtp.is_none());
        assert_eq!(settings.from.as_deref(), Some("alt@example.com"));
    }

    #[test]
    fn test_oauth2_requires_all_three_values() {
        let mut config = base_config();
        config.gmail_client_id = Some("client".to_string());
        config.gmail_client_secret = Some(secret("secret"));
        assert!(config.mail_settings().oauth2.is_none());

        config.gmail_refresh_token = Some(secret("refresh"));
        let settings = config.mail_settings();
        assert!(settings.oauth2.is_some());
        assert!(settings.app_password.is_none());
    }

    #[test]
    fn test_explicit_smtp_requires_host_and_account() {
        let mut config = base_config();
        config.smtp_host = Some("mail.example.com".to_string());
        assert!(config.mail_settings().smtp.is_none());

        config.email_user = Some("shop@example.com".to_string());
        config.email_pass = Some(secret("password"));
        config.smtp_port = 465;
        config.smtp_secure = true;
        let smtp = config.mail_settings().smtp.expect("smtp configured");
        assert_eq!(smtp.host, "mail.example.com");
        assert_eq!(smtp.port, 465);
        assert!(smtp.secure);
    }

    #[test]
    fn test_password_reset_url_base_defaults_to_frontend() {
        let mut config = base_config();
        config.frontend_url = "https://shop.example.com/".to_string();
        assert_eq!(
            config.password_reset_url_base(),
            "https://shop.example.com/reset-password"
        );

        config.password_reset_url_base = Some("https://x.example/reset".to_string());
        assert_eq!(config.password_reset_url_base(), "https://x.example/reset");
    }
}
