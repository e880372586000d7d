//! Telegram Bot API transport.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, NotifyError, Result};
use crate::models::TelegramConfig;
use crate::notify::{Notifier, RetryPolicy};

/// Sends messages to one chat through `sendMessage`.
#[derive(Clone)]
pub struct TelegramNotifier {
    client: Client,
    // Holds the bot token; never log it.
    endpoint: String,
    chat_id: String,
    retry: RetryPolicy,
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
    disable_web_page_preview: bool,
}

#[derive(Debug, Default, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
struct ResponseParameters {
    #[serde(default)]
    retry_after: Option<u64>,
}

impl TelegramNotifier {
    /// Notifier for an explicit chat.
    pub fn new(config: &TelegramConfig, chat_id: impl Into<String>) -> Result<Self> {
        let token = config
            .bot_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::config("telegram bot token missing"))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: format!(
                "{}/bot{}/sendMessage",
                config.api_base.trim_end_matches('/'),
                token
            ),
            chat_id: chat_id.into(),
            retry: RetryPolicy::from_config(config),
        })
    }

    /// Notifier for the listing chat.
    pub fn from_config(config: &TelegramConfig) -> Result<Self> {
        let chat_id = config
            .chat_id
            .clone()
            .ok_or_else(|| AppError::config("telegram chat id missing"))?;
        Self::new(config, chat_id)
    }

    /// Notifier for the operator alert chat, when one is configured.
    pub fn alerts(config: &TelegramConfig) -> Result<Option<Self>> {
        match config.alert_chat_id.as_deref().map(str::trim) {
            Some(chat) if !chat.is_empty() => Self::new(config, chat).map(Some),
            _ => Ok(None),
        }
    }

    pub fn chat_id(&self) -> &str {
        &self.chat_id
    }

    async fn send_once(&self, text: &str) -> std::result::Result<(), NotifyError> {
        let payload = SendMessage {
            chat_id: &self.chat_id,
            text,
            parse_mode: "HTML",
            disable_web_page_preview: true,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(transport_error)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(transport_error)?;
        classify_response(status, &body)
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, text: &str) -> std::result::Result<(), NotifyError> {
        self.retry.run(|_| self.send_once(text)).await
    }
}

// The request URL carries the token, so it is stripped from the message.
fn transport_error(e: reqwest::Error) -> NotifyError {
    NotifyError::Transport(e.without_url().to_string())
}

/// Map a Bot API answer to a delivery outcome.
pub fn classify_response(status: u16, body: &str) -> std::result::Result<(), NotifyError> {
    let parsed: ApiResponse = serde_json::from_str(body).unwrap_or_default();
    let description = || {
        parsed
            .description
            .clone()
            .unwrap_or_else(|| format!("HTTP {status}"))
    };

    match status {
        200..=299 if parsed.ok => Ok(()),
        200..=299 => Err(NotifyError::Rejected(description())),
        401 | 403 | 404 => Err(NotifyError::Auth(description())),
        429 => Err(NotifyError::RateLimited {
            retry_after: parsed
                .parameters
                .as_ref()
                .and_then(|p| p.retry_after)
                .map(Duration::from_secs),
        }),
        500..=599 => Err(NotifyError::Transport(description())),
        _ => Err(NotifyError::Rejected(description())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> TelegramConfig {
        TelegramConfig {
            bot_token: Some("123:abc".to_string()),
            chat_id: Some("42".to_string()),
            ..TelegramConfig::default()
        }
    }

    #[test]
    fn test_classify_success() {
        assert!(classify_response(200, r#"{"ok":true,"result":{}}"#).is_ok());
    }

    #[test]
    fn test_classify_ok_false_is_rejected() {
        let err = classify_response(200, r#"{"ok":false,"description":"odd"}"#).unwrap_err();
        assert!(matches!(err, NotifyError::Rejected(d) if d == "odd"));
    }

    #[test]
    fn test_classify_auth() {
        for status in [401, 403, 404] {
            let err = classify_response(status, r#"{"ok":false,"description":"Unauthorized"}"#)
                .unwrap_err();
            assert!(matches!(err, NotifyError::Auth(_)), "status {status}");
        }
    }

    #[test]
    fn test_classify_rate_limited() {
        let body = r#"{"ok":false,"error_code":429,"parameters":{"retry_after":14}}"#;
        let err = classify_response(429, body).unwrap_err();
        assert!(matches!(
            err,
            NotifyError::RateLimited { retry_after: Some(d) } if d == Duration::from_secs(14)
        ));

        let err = classify_response(429, "Too Many Requests").unwrap_err();
        assert!(matches!(err, NotifyError::RateLimited { retry_after: None }));
    }

    #[test]
    fn test_classify_server_error_is_transport() {
        let err = classify_response(502, "<html>Bad Gateway</html>").unwrap_err();
        assert!(matches!(err, NotifyError::Transport(ref d) if d == "HTTP 502"));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_classify_bad_request_is_rejected() {
        let body = r#"{"ok":false,"description":"Bad Request: chat not found"}"#;
        let err = classify_response(400, body).unwrap_err();
        assert!(matches!(err, NotifyError::Rejected(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_endpoint_and_chat() {
        let notifier = TelegramNotifier::from_config(&config()).unwrap();
        assert_eq!(
            notifier.endpoint,
            "https://api.telegram.org/bot123:abc/sendMessage"
        );
        assert_eq!(notifier.chat_id(), "42");
    }

    #[test]
    fn test_missing_token_is_config_error() {
        let mut cfg = config();
        cfg.bot_token = Some("  ".to_string());
        assert!(matches!(
            TelegramNotifier::from_config(&cfg),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn test_alerts_only_when_configured() {
        assert!(TelegramNotifier::alerts(&config()).unwrap().is_none());

        let mut cfg = config();
        cfg.alert_chat_id = Some("-100".to_string());
        let alerts = TelegramNotifier::alerts(&cfg).unwrap().unwrap();
        assert_eq!(alerts.chat_id(), "-100");
    }

    #[test]
    fn test_payload_shape() {
        let payload = SendMessage {
            chat_id: "42",
            text: "<b>hi</b>",
            parse_mode: "HTML",
            disable_web_page_preview: true,
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["parse_mode"], "HTML");
        assert_eq!(json["disable_web_page_preview"], true);
        assert_eq!(json["chat_id"], "42");
    }
}
