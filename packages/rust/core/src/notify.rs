//! Telegram delivery: text messages and document uploads, plus the
//! `getUpdates` long poll used by the command listener.
//!
//! Delivery is fire-and-forget. Each call makes one attempt per message part
//! and reports success as a `bool`; failures are logged, never raised.
//! Request URLs embed the bot token, so neither URLs nor raw transport errors
//! carrying them are logged.

use std::path::Path;
use std::time::Duration;

use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use coursewatch_markdown::truncate_chars;
use coursewatch_shared::{CourseWatchError, Result, TelegramConfig};

const USER_AGENT: &str = concat!("CourseWatch/", env!("CARGO_PKG_VERSION"));

/// Telegram's limit on message text length.
pub const MAX_MESSAGE_CHARS: usize = 4096;

/// Telegram's limit on document caption length.
pub const MAX_CAPTION_CHARS: usize = 1024;

const MESSAGE_TIMEOUT: Duration = Duration::from_secs(30);
const DOCUMENT_TIMEOUT: Duration = Duration::from_secs(60);

/// Slack added to the HTTP timeout of a long poll over the server-side wait.
const POLL_GRACE: Duration = Duration::from_secs(10);

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<&'static str>,
    disable_web_page_preview: bool,
}

#[derive(Debug, Serialize)]
struct GetUpdates {
    #[serde(skip_serializing_if = "Option::is_none")]
    offset: Option<i64>,
    timeout: u64,
    allowed_updates: [&'static str; 1],
}

#[derive(Debug, Deserialize)]
struct UpdatesEnvelope {
    ok: bool,
    #[serde(default)]
    result: Vec<Update>,
}

/// One incoming bot update. Only message updates are requested.
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<IncomingMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IncomingMessage {
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

/// Bot API client bound to one chat.
#[derive(Debug, Clone)]
pub struct TelegramNotifier {
    client: Client,
    config: TelegramConfig,
}

impl TelegramNotifier {
    pub fn new(config: TelegramConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| CourseWatchError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    /// Send a Markdown message, split on line boundaries when it exceeds
    /// [`MAX_MESSAGE_CHARS`]. `true` only if every part was accepted.
    #[instrument(skip_all, fields(chars = text.chars().count()))]
    pub async fn send_message(&self, text: &str) -> bool {
        self.deliver(text, Some("Markdown")).await
    }

    /// Send text without any parse mode.
    #[instrument(skip_all, fields(chars = text.chars().count()))]
    pub async fn send_plain(&self, text: &str) -> bool {
        self.deliver(text, None).await
    }

    /// Chat this notifier delivers to; also the only chat the listener answers.
    pub fn chat_id(&self) -> &str {
        &self.config.chat_id
    }

    /// Long-poll for updates after `offset`, waiting up to `wait` server-side.
    pub async fn get_updates(&self, offset: Option<i64>, wait: Duration) -> Result<Vec<Update>> {
        let body = GetUpdates {
            offset,
            timeout: wait.as_secs(),
            allowed_updates: ["message"],
        };

        let response = self
            .client
            .post(self.method_url("getUpdates"))
            .timeout(wait + POLL_GRACE)
            .json(&body)
            .send()
            .await
            .map_err(|e| CourseWatchError::Delivery(format!("getUpdates: {}", e.without_url())))?;

        check_status("getUpdates", response.status())?;
        let envelope: UpdatesEnvelope = response
            .json()
            .await
            .map_err(|e| CourseWatchError::parse(format!("getUpdates: {}", e.without_url())))?;

        if !envelope.ok {
            return Err(CourseWatchError::Delivery("getUpdates: ok=false".into()));
        }
        Ok(envelope.result)
    }

    async fn deliver(&self, text: &str, parse_mode: Option<&'static str>) -> bool {
        let mut delivered = true;
        for part in split_message(text, MAX_MESSAGE_CHARS) {
            if let Err(e) = self.post_message(&part, parse_mode).await {
                warn!(error = %e, "message delivery failed");
                delivered = false;
            }
        }
        delivered
    }

    /// Upload `path` as a document with a Markdown caption.
    #[instrument(skip_all, fields(file = %path.display()))]
    pub async fn send_document(&self, path: &Path, caption: &str) -> bool {
        match self.post_document(path, caption).await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "document delivery failed");
                false
            }
        }
    }

    async fn post_message(&self, text: &str, parse_mode: Option<&'static str>) -> Result<()> {
        let body = SendMessage {
            chat_id: &self.config.chat_id,
            text,
            parse_mode,
            disable_web_page_preview: true,
        };

        let response = self
            .client
            .post(self.method_url("sendMessage"))
            .timeout(MESSAGE_TIMEOUT)
            .json(&body)
            .send()
            .await
            .map_err(|e| CourseWatchError::Delivery(format!("sendMessage: {}", e.without_url())))?;

        check_status("sendMessage", response.status())?;
        debug!("message delivered");
        Ok(())
    }

    async fn post_document(&self, path: &Path, caption: &str) -> Result<()> {
        let data = tokio::fs::read(path)
            .await
            .map_err(|e| CourseWatchError::io(path, e))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());

        let form = Form::new()
            .text("chat_id", self.config.chat_id.clone())
            .text("caption", truncate_chars(caption, MAX_CAPTION_CHARS).to_string())
            .text("parse_mode", "Markdown")
            .part("document", Part::bytes(data).file_name(file_name));

        let response = self
            .client
            .post(self.method_url("sendDocument"))
            .timeout(DOCUMENT_TIMEOUT)
            .multipart(form)
            .send()
            .await
            .map_err(|e| CourseWatchError::Delivery(format!("sendDocument: {}", e.without_url())))?;

        check_status("sendDocument", response.status())?;
        debug!("document delivered");
        Ok(())
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.config.base_url, self.config.bot_token)
    }
}

fn check_status(method: &str, status: reqwest::StatusCode) -> Result<()> {
    if status.is_success() {
        Ok(())
    } else {
        Err(CourseWatchError::Delivery(format!("{method}: HTTP {status}")))
    }
}

/// Split `text` into parts of at most `max_chars`, preferring line breaks.
/// A single line longer than the limit is cut mid-line.
pub fn split_message(text: &str, max_chars: usize) -> Vec<String> {
    if text.chars().count() <= max_chars {
        return vec![text.to_string()];
    }

    let mut parts = Vec::new();
    let mut current = String::new();
    let mut current_chars = 0;

    for line in text.split_inclusive('\n') {
        let mut rest = line;
        loop {
            let rest_chars = rest.chars().count();
            if current_chars + rest_chars <= max_chars {
                current.push_str(rest);
                current_chars += rest_chars;
                break;
            }
            if current_chars > 0 {
                parts.push(std::mem::take(&mut current));
                current_chars = 0;
                continue;
            }
            let head = truncate_chars(rest, max_chars);
            parts.push(head.to_string());
            rest = &rest[head.len()..];
        }
    }

    if !current.is_empty() {
        parts.push(current);
    }
    parts
}
