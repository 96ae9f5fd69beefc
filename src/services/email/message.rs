use base64::{
    Engine as _,
    engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
};
use lettre::Message;
use lettre::message::{Mailbox, header::ContentType};

use super::TransportError;

/// 送信するメール
///
/// 添付ファイルは扱わない。本文はHTMLがあればHTML、なければテキストを使用する。
#[derive(Debug, Clone, Default)]
pub struct EmailMessage {
    /// 未指定時は送信経路のアカウントを使用
    pub from: Option<String>,
    pub to: Vec<String>,
    pub reply_to: Option<String>,
    pub subject: String,
    pub text: Option<String>,
    pub html: Option<String>,
}

/// 実際に送信される本文
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Body<'a> {
    Text(&'a str),
    Html(&'a str),
}

impl Body<'_> {
    fn content_type(&self) -> &'static str {
        match self {
            Self::Text(_) => "text/plain; charset=utf-8",
            Self::Html(_) => "text/html; charset=utf-8",
        }
    }

    fn content(&self) -> &str {
        match self {
            Self::Text(s) | Self::Html(s) => s,
        }
    }
}

impl EmailMessage {
    pub fn new(to: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            to: vec![to.into()],
            subject: subject.into(),
            ..Default::default()
        }
    }

    pub fn sender(mut self, from: Option<String>) -> Self {
        self.from = from;
        self
    }

    pub fn reply_to(mut self, reply_to: impl Into<String>) -> Self {
        self.reply_to = Some(reply_to.into());
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn html(mut self, html: impl Into<String>) -> Self {
        self.html = Some(html.into());
        self
    }

    pub fn body(&self) -> Body<'_> {
        match (&self.html, &self.text) {
            (Some(html), _) => Body::Html(html),
            (None, Some(text)) => Body::Text(text),
            (None, None) => Body::Text(""),
        }
    }

    /// lettre のメッセージを構築
    ///
    /// `from` 未指定時は `fallback_from`（送信アカウント）を使用する。
    pub fn to_lettre(&self, fallback_from: Option<&str>) -> Result<Message, TransportError> {
        let from = self
            .from
            .as_deref()
            .or(fallback_from)
            .ok_or_else(|| TransportError::Misconfigured("送信元アドレスが未設定".to_string()))?;

        let mut builder = Message::builder()
            .from(from.parse::<Mailbox>()?)
            .subject(self.subject.as_str());
        for to in &self.to {
            builder = builder.to(to.parse::<Mailbox>()?);
        }
        if let Some(reply_to) = &self.reply_to {
            builder = builder.reply_to(reply_to.parse::<Mailbox>()?);
        }

        let message = match self.body() {
            Body::Html(html) => builder.header(ContentType::TEXT_HTML).body(html.to_string())?,
            Body::Text(text) => builder.header(ContentType::TEXT_PLAIN).body(text.to_string())?,
        };
        Ok(message)
    }

    /// RFC 2822 形式の生メッセージを構築（Gmail API 用）
    pub fn to_rfc2822(&self) -> String {
        let body = self.body();
        let mut headers = Vec::with_capacity(6);
        if let Some(from) = &self.from {
            headers.push(format!("From: {}", header_value(from)));
        }
        headers.push(format!(
            "To: {}",
            self.to
                .iter()
                .map(|to| header_value(to))
                .collect::<Vec<_>>()
                .join(", ")
        ));
        headers.push(format!("Subject: {}", encode_subject(&self.subject)));
        if let Some(reply_to) = &self.reply_to {
            headers.push(format!("Reply-To: {}", header_value(reply_to)));
        }
        headers.push("MIME-Version: 1.0".to_string());
        headers.push(format!("Content-Type: {}", body.content_type()));

        format!("{}\r\n\r\n{}", headers.join("\r\n"), body.content())
    }

    /// 生メッセージを URL-safe Base64（パディングなし）でエンコード
    pub fn to_raw_base64url(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.to_rfc2822())
    }
}

/// ヘッダーインジェクション対策: 改行を除去
fn header_value(value: &str) -> String {
    value.chars().filter(|c| *c != '\r' && *c != '\n').collect()
}

/// 非ASCIIの件名は RFC 2047 の encoded-word にする
fn encode_subject(subject: &str) -> String {
    let subject = header_value(subject);
    if subject.is_ascii() {
        subject
    } else {
        format!("=?UTF-8?B?{}?=", STANDARD.encode(subject))
    }
}
