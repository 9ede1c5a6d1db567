//! Telegram Bot API client

use super::error::TelegramError;
use super::types::*;
use crate::runtime::{Transport, TransportError};
use crate::state_machine::effect::{
    Keyboard, OutgoingMessage, TextFormat, CONFIRM_CALLBACK, RESTART_CALLBACK,
};
use crate::state_machine::event::MessageRef;
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "https://api.telegram.org";

/// Seconds the server may hold a `getUpdates` call open
pub const LONG_POLL_TIMEOUT_SECS: u64 = 30;

/// Thin typed wrapper over the Bot API HTTP methods
pub struct TelegramClient {
    client: Client,
    /// `{api_url}/bot{token}`; never logged
    base_url: String,
}

impl TelegramClient {
    pub fn new(api_url: &str, token: &str) -> Result<Self, TelegramError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(LONG_POLL_TIMEOUT_SECS + 15))
            .build()
            .map_err(|e| TelegramError::network(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: format!("{}/bot{token}", api_url.trim_end_matches('/')),
        })
    }

    async fn call<B, R>(&self, method: &str, body: &B) -> Result<R, TelegramError>
    where
        B: Serialize + Sync + ?Sized,
        R: DeserializeOwned,
    {
        let response = self
            .client
            .post(format!("{}/{method}", self.base_url))
            .json(body)
            .send()
            .await
            .map_err(|e| {
                // The URL carries the bot token
                let e = e.without_url();
                if e.is_timeout() {
                    TelegramError::network(format!("{method}: request timeout: {e}"))
                } else if e.is_connect() {
                    TelegramError::network(format!("{method}: connection failed: {e}"))
                } else {
                    TelegramError::network(format!("{method}: request failed: {e}"))
                }
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            TelegramError::network(format!("{method}: failed to read response: {}", e.without_url()))
        })?;

        parse_response(method, status, &body)
    }

    pub async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout_secs: u64,
    ) -> Result<Vec<Update>, TelegramError> {
        let request = GetUpdatesRequest {
            offset,
            timeout: timeout_secs,
            allowed_updates: vec!["message".to_string(), "callback_query".to_string()],
        };
        self.call("getUpdates", &request).await
    }

    pub async fn send_message(&self, request: &SendMessageRequest) -> Result<Message, TelegramError> {
        self.call("sendMessage", request).await
    }

    pub async fn edit_message_text(
        &self,
        request: &EditMessageTextRequest,
    ) -> Result<(), TelegramError> {
        // Returns the edited message or `true`; neither is needed
        self.call::<_, serde_json::Value>("editMessageText", request)
            .await
            .map(|_| ())
    }

    pub async fn answer_callback_query(
        &self,
        request: &AnswerCallbackQueryRequest,
    ) -> Result<(), TelegramError> {
        self.call::<_, bool>("answerCallbackQuery", request)
            .await
            .map(|_| ())
    }

    pub async fn copy_message(&self, request: &CopyMessageRequest) -> Result<MessageId, TelegramError> {
        self.call("copyMessage", request).await
    }

    pub async fn delete_webhook(&self, drop_pending_updates: bool) -> Result<(), TelegramError> {
        self.call::<_, bool>(
            "deleteWebhook",
            &DeleteWebhookRequest {
                drop_pending_updates,
            },
        )
        .await
        .map(|_| ())
    }

    pub async fn set_my_commands(&self, commands: Vec<BotCommand>) -> Result<(), TelegramError> {
        self.call::<_, bool>("setMyCommands", &SetMyCommandsRequest { commands })
            .await
            .map(|_| ())
    }
}

/// Decode a Bot API response body, classifying failures
fn parse_response<R: DeserializeOwned>(
    method: &str,
    status: reqwest::StatusCode,
    body: &str,
) -> Result<R, TelegramError> {
    let parsed: ApiResponse<R> = match serde_json::from_str(body) {
        Ok(parsed) => parsed,
        Err(e) if status.is_server_error() => {
            return Err(TelegramError::network(format!("{method}: HTTP {status}: {e}")));
        }
        Err(e) => {
            return Err(TelegramError::decode(format!("{method}: failed to parse response: {e}")));
        }
    };

    if parsed.ok {
        return parsed
            .result
            .ok_or_else(|| TelegramError::decode(format!("{method}: response has no result")));
    }

    let description = parsed
        .description
        .unwrap_or_else(|| "no description".to_string());
    let code = parsed.error_code.unwrap_or_else(|| i32::from(status.as_u16()));
    match code {
        429 => {
            let mut err = TelegramError::rate_limit(format!("{method}: rate limited: {description}"));
            if let Some(secs) = parsed.parameters.and_then(|p| p.retry_after) {
                err = err.with_retry_after(Duration::from_secs(secs));
            }
            Err(err)
        }
        500..=599 => Err(TelegramError::network(format!(
            "{method}: server error {code}: {description}"
        ))),
        _ => Err(TelegramError::api(format!("{method}: error {code}: {description}"))),
    }
}

pub(crate) fn parse_mode(format: TextFormat) -> Option<&'static str> {
    match format {
        TextFormat::Plain => None,
        TextFormat::Markdown => Some("Markdown"),
        TextFormat::Html => Some("HTML"),
    }
}

pub(crate) fn reply_markup(keyboard: &Keyboard) -> ReplyMarkup {
    match keyboard {
        Keyboard::Remove => ReplyMarkup::Remove(ReplyKeyboardRemove {
            remove_keyboard: true,
        }),
        Keyboard::StartButton { label } => ReplyMarkup::Keyboard(ReplyKeyboardMarkup {
            keyboard: vec![vec![KeyboardButton {
                text: label.clone(),
            }]],
            resize_keyboard: true,
            one_time_keyboard: true,
        }),
        Keyboard::Confirmation {
            offer_label,
            offer_url,
            confirm_label,
            restart_label,
        } => ReplyMarkup::Inline(InlineKeyboardMarkup {
            inline_keyboard: vec![
                vec![InlineKeyboardButton {
                    text: offer_label.clone(),
                    url: Some(offer_url.clone()),
                    callback_data: None,
                }],
                vec![InlineKeyboardButton {
                    text: confirm_label.clone(),
                    url: None,
                    callback_data: Some(CONFIRM_CALLBACK.to_string()),
                }],
                vec![InlineKeyboardButton {
                    text: restart_label.clone(),
                    url: None,
                    callback_data: Some(RESTART_CALLBACK.to_string()),
                }],
            ],
        }),
    }
}

#[async_trait]
impl Transport for TelegramClient {
    async fn send_message(
        &self,
        chat_id: i64,
        message: &OutgoingMessage,
    ) -> Result<MessageRef, TransportError> {
        let request = SendMessageRequest {
            chat_id,
            text: message.text.clone(),
            parse_mode: parse_mode(message.format),
            reply_markup: message.keyboard.as_ref().map(reply_markup),
        };
        let sent = TelegramClient::send_message(self, &request)
            .await
            .map_err(|e| TransportError(e.to_string()))?;
        Ok(MessageRef {
            chat_id: sent.chat.id,
            message_id: sent.message_id,
        })
    }

    async fn edit_message(
        &self,
        message: MessageRef,
        text: &str,
        format: TextFormat,
    ) -> Result<(), TransportError> {
        let request = EditMessageTextRequest {
            chat_id: message.chat_id,
            message_id: message.message_id,
            text: text.to_string(),
            parse_mode: parse_mode(format),
        };
        self.edit_message_text(&request)
            .await
            .map_err(|e| TransportError(e.to_string()))
    }

    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
    ) -> Result<(), TransportError> {
        let request = AnswerCallbackQueryRequest {
            callback_query_id: callback_id.to_string(),
            text: text.map(str::to_string),
        };
        self.answer_callback_query(&request)
            .await
            .map_err(|e| TransportError(e.to_string()))
    }
}
