//! Chat command listener.
//!
//! Long-polls the bot for messages and answers only the configured chat.
//! `TEST` runs the daily pipeline under the wall-clock cap and replies with
//! `[OK]` or `[ERROR]`; `/start`, `/help`, `/status` and their bare-word
//! forms reply with fixed text. Replies are plain text.

use std::time::Duration;

use chrono::Utc;
use tracing::{error, info, instrument, warn};

use coursewatch_markdown::truncate_chars;
use coursewatch_shared::{Result, RunConfig};

use crate::notify::Update;
use crate::pipeline::{RunSummary, Services, SilentProgress, run_daily_capped};

/// Server-side wait of each `getUpdates` call.
pub const POLL_WAIT: Duration = Duration::from_secs(30);

const RETRY_DELAY: Duration = Duration::from_secs(5);
const MAX_ERROR_CHARS: usize = 500;

pub const HELP_TEXT: &str = "Canvas Automation Bot\n\n\
    Commands:\n\
    • TEST - Run the Canvas pipeline\n\
    • /status - Check bot status\n\
    • /help - Show this message";

pub const STATUS_TEXT: &str = "[OK] Bot Status: Online\n\n\
    Available Commands:\n\
    • TEST - Run Canvas pipeline\n\
    • /status - This message\n\
    • /help - Show help\n\n\
    All systems operational.";

/// A recognized chat command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotCommand {
    Help,
    Status,
    RunPipeline,
}

/// Parse message text into a command. Slash commands may carry a `@botname`
/// suffix; bare words ignore case.
pub fn parse_command(text: &str) -> Option<BotCommand> {
    let text = text.trim();

    if let Some(command) = text.strip_prefix('/') {
        let name = command
            .split(|c: char| c.is_whitespace() || c == '@')
            .next()
            .unwrap_or_default();
        return match name.to_ascii_lowercase().as_str() {
            "start" | "help" => Some(BotCommand::Help),
            "status" => Some(BotCommand::Status),
            _ => None,
        };
    }

    match text.to_ascii_uppercase().as_str() {
        "TEST" => Some(BotCommand::RunPipeline),
        "STATUS" => Some(BotCommand::Status),
        "HELP" => Some(BotCommand::Help),
        _ => None,
    }
}

/// Reply sent after a pipeline run triggered from chat.
pub fn run_reply(outcome: &Result<RunSummary>) -> String {
    match outcome {
        Ok(summary) => format!(
            "[OK] Pipeline completed!\n{} due soon, {} study guide(s) generated.",
            summary.classified,
            summary.guides.len()
        ),
        Err(e) => format!(
            "[ERROR] Pipeline failed:\n{}",
            truncate_chars(&e.to_string(), MAX_ERROR_CHARS)
        ),
    }
}

pub struct Listener {
    services: Services,
    config: RunConfig,
    run_timeout: Duration,
    poll_wait: Duration,
}

impl Listener {
    pub fn new(services: Services, config: RunConfig, run_timeout: Duration) -> Self {
        Self {
            services,
            config,
            run_timeout,
            poll_wait: POLL_WAIT,
        }
    }

    /// Override the long-poll wait.
    pub fn with_poll_wait(mut self, wait: Duration) -> Self {
        self.poll_wait = wait;
        self
    }

    /// Poll until the task is dropped. Polling errors are logged and retried
    /// after a short delay.
    pub async fn run(&self) {
        info!(chat_id = %self.services.notifier.chat_id(), "listening for chat commands");
        let mut offset = None;
        loop {
            match self.poll_once(offset).await {
                Ok(next) => offset = next,
                Err(e) => {
                    warn!(error = %e, "polling failed, retrying");
                    tokio::time::sleep(RETRY_DELAY).await;
                }
            }
        }
    }

    /// Fetch one batch of updates and handle each; returns the offset that
    /// acknowledges everything seen.
    #[instrument(skip_all)]
    pub async fn poll_once(&self, offset: Option<i64>) -> Result<Option<i64>> {
        let updates = self.services.notifier.get_updates(offset, self.poll_wait).await?;

        let mut next = offset;
        for update in &updates {
            next = Some(update.update_id + 1);
            self.handle_update(update).await;
        }
        Ok(next)
    }

    /// Answer one update. Returns the command acted on, if any.
    pub async fn handle_update(&self, update: &Update) -> Option<BotCommand> {
        let message = update.message.as_ref()?;
        let notifier = &self.services.notifier;

        if message.chat.id.to_string() != notifier.chat_id() {
            warn!(chat_id = message.chat.id, "ignoring message from unauthorized chat");
            return None;
        }

        let command = parse_command(message.text.as_deref()?)?;
        info!(?command, "received command");

        match command {
            BotCommand::Help => {
                notifier.send_plain(HELP_TEXT).await;
            }
            BotCommand::Status => {
                notifier.send_plain(STATUS_TEXT).await;
            }
            BotCommand::RunPipeline => {
                notifier.send_plain("Running Canvas pipeline...").await;
                let outcome = self.run_pipeline().await;
                if let Err(e) = &outcome {
                    error!(error = %e, "pipeline failed");
                }
                notifier.send_plain(&run_reply(&outcome)).await;
            }
        }
        Some(command)
    }

    async fn run_pipeline(&self) -> Result<RunSummary> {
        let now = Utc::now().with_timezone(&self.config.zone);
        run_daily_capped(&self.services, now, &self.config, &SilentProgress, self.run_timeout).await
    }
}
