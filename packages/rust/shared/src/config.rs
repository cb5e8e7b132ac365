//! Application configuration for CourseWatch.
//!
//! User config lives at `~/.coursewatch/coursewatch.toml`. It names LMS
//! instances and outbound services; secrets are always read from the
//! environment variables the file points at, never stored in the file.
//!
//! Classification behaviour is *not* configured here: see [`RunConfig`].

use std::path::{Path, PathBuf};

use chrono::TimeDelta;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{CourseWatchError, Result};
use crate::types::SourceInstance;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "coursewatch.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".coursewatch";

// ---------------------------------------------------------------------------
// Config structs (matching coursewatch.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Configured LMS instances.
    #[serde(default)]
    pub instances: Vec<InstanceEntry>,

    /// Generative completion service settings.
    #[serde(default)]
    pub completion: CompletionSettings,

    /// Telegram delivery settings.
    #[serde(default)]
    pub telegram: TelegramSettings,

    /// Study guide export settings.
    #[serde(default)]
    pub export: ExportSettings,

    /// Whole-run settings.
    #[serde(default)]
    pub run: RunSettings,
}

/// `[[instances]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceEntry {
    /// Human-readable name.
    pub name: String,
    /// Base URL of the instance.
    pub url: String,
    /// Name of the env var holding the bearer token.
    pub api_token_env: String,
}

/// `[completion]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionSettings {
    /// Name of the env var holding the API key.
    #[serde(default = "default_completion_key_env")]
    pub api_key_env: String,

    /// Chat model id.
    #[serde(default = "default_model")]
    pub model: String,

    /// API base URL (chat completions live at `<base_url>/chat/completions`).
    #[serde(default = "default_completion_base_url")]
    pub base_url: String,

    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for CompletionSettings {
    fn default() -> Self {
        Self {
            api_key_env: default_completion_key_env(),
            model: default_model(),
            base_url: default_completion_base_url(),
            temperature: default_temperature(),
        }
    }
}

fn default_completion_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_completion_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_temperature() -> f32 {
    0.7
}

/// `[telegram]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramSettings {
    /// Name of the env var holding the bot token.
    #[serde(default = "default_bot_token_env")]
    pub bot_token_env: String,

    /// Name of the env var holding the destination chat id.
    #[serde(default = "default_chat_id_env")]
    pub chat_id_env: String,

    /// Bot API base URL.
    #[serde(default = "default_telegram_base_url")]
    pub base_url: String,
}

impl Default for TelegramSettings {
    fn default() -> Self {
        Self {
            bot_token_env: default_bot_token_env(),
            chat_id_env: default_chat_id_env(),
            base_url: default_telegram_base_url(),
        }
    }
}

fn default_bot_token_env() -> String {
    "TELEGRAM_BOT_TOKEN".into()
}
fn default_chat_id_env() -> String {
    "TELEGRAM_CHAT_ID".into()
}
fn default_telegram_base_url() -> String {
    "https://api.telegram.org".into()
}

/// `[export]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportSettings {
    /// Directory study guides are written to (`~` is expanded).
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
        }
    }
}

fn default_output_dir() -> String {
    "~/Documents/Canvas Study Guides".into()
}

/// `[run]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSettings {
    /// Hard wall-clock cap for one full run, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Also send one action-plan card per routine item.
    #[serde(default)]
    pub item_cards: bool,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            item_cards: false,
        }
    }
}

fn default_timeout_secs() -> u64 {
    300
}

// ---------------------------------------------------------------------------
// Run config (immutable, compile-time constants)
// ---------------------------------------------------------------------------

/// Zone every deadline is localized into.
pub const TARGET_ZONE: Tz = chrono_tz::America::Los_Angeles;

/// Module names containing any of these are never curated.
pub const CURATION_DENYLIST: &[&str] = &[
    "course essentials",
    "microsoft teams",
    "library research",
    "library guide",
    "instruction guide",
    "getting started",
    "syllabus",
    "resources",
    "how to",
    "orientation",
];

/// Lexical markers that let an undated module through curation.
pub const FALLBACK_MARKERS: &[&str] = &["week", "chapter", "ch ", "module"];

/// Phrases in an item name that always mark a major assessment.
pub const MAJOR_PHRASES: &[&str] = &["midterm", "final exam", "final test", "midterm exam"];

/// Description indicators of a proctored (major) assessment.
pub const PROCTORING_MARKERS: &[&str] = &["respondus", "lockdown browser"];

/// Immutable configuration passed explicitly into every pipeline stage.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Target zone for localized deadlines.
    pub zone: Tz,
    /// Urgency window measured from `now` (an instant offset, not calendar days).
    pub window: TimeDelta,
    /// Planner view covers `[today, today + planner_lookahead_days]`.
    pub planner_lookahead_days: u64,
    /// Courses whose `end_at` lies further back than this are not enumerated.
    pub stale_course_days: i64,
    /// Minimum points for a generic "exam" to count as major.
    pub major_exam_min_points: f64,
    pub major_phrases: &'static [&'static str],
    pub proctoring_markers: &'static [&'static str],
    pub curation_denylist: &'static [&'static str],
    pub fallback_markers: &'static [&'static str],
    /// Number of leading characters compared when deduplicating content.
    pub content_dedup_prefix: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            zone: TARGET_ZONE,
            window: TimeDelta::days(3) + TimeDelta::hours(12),
            planner_lookahead_days: 7,
            stale_course_days: 60,
            major_exam_min_points: 50.0,
            major_phrases: MAJOR_PHRASES,
            proctoring_markers: PROCTORING_MARKERS,
            curation_denylist: CURATION_DENYLIST,
            fallback_markers: FALLBACK_MARKERS,
            content_dedup_prefix: 100,
        }
    }
}

// ---------------------------------------------------------------------------
// Resolved runtime settings
// ---------------------------------------------------------------------------

/// Completion service settings with the key resolved from the environment.
#[derive(Clone)]
pub struct CompletionConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub temperature: f32,
}

impl std::fmt::Debug for CompletionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionConfig")
            .field("api_key", &"***")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("temperature", &self.temperature)
            .finish()
    }
}

/// Telegram settings with token and chat id resolved from the environment.
#[derive(Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
    pub base_url: String,
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("bot_token", &"***")
            .field("chat_id", &self.chat_id)
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Read a required, non-empty environment variable.
fn require_env(var_name: &str, what: &str) -> Result<String> {
    match std::env::var(var_name) {
        Ok(val) if !val.trim().is_empty() => Ok(val),
        _ => Err(CourseWatchError::config(format!(
            "{what} not found. Set the {var_name} environment variable."
        ))),
    }
}

/// Resolve every `[[instances]]` entry into a [`SourceInstance`].
pub fn resolve_instances(config: &AppConfig) -> Result<Vec<SourceInstance>> {
    if config.instances.is_empty() {
        return Err(CourseWatchError::config(
            "no [[instances]] configured. Run `coursewatch config init` and edit the file.",
        ));
    }

    config
        .instances
        .iter()
        .map(|entry| {
            let base_url = Url::parse(entry.url.trim_end_matches('/')).map_err(|e| {
                CourseWatchError::config(format!(
                    "instance '{}' has an invalid url '{}': {e}",
                    entry.name, entry.url
                ))
            })?;
            let token = require_env(
                &entry.api_token_env,
                &format!("API token for instance '{}'", entry.name),
            )?;
            Ok(SourceInstance {
                name: entry.name.clone(),
                base_url,
                token,
            })
        })
        .collect()
}

/// Resolve the `[completion]` section.
pub fn resolve_completion(config: &AppConfig) -> Result<CompletionConfig> {
    let settings = &config.completion;
    Ok(CompletionConfig {
        api_key: require_env(&settings.api_key_env, "Completion API key")?,
        model: settings.model.clone(),
        base_url: settings.base_url.trim_end_matches('/').to_string(),
        temperature: settings.temperature,
    })
}

/// Resolve the `[telegram]` section.
pub fn resolve_telegram(config: &AppConfig) -> Result<TelegramConfig> {
    let settings = &config.telegram;
    Ok(TelegramConfig {
        bot_token: require_env(&settings.bot_token_env, "Telegram bot token")?,
        chat_id: require_env(&settings.chat_id_env, "Telegram chat id")?,
        base_url: settings.base_url.trim_end_matches('/').to_string(),
    })
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~") {
        Some(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest.trim_start_matches(['/', '\\'])),
            None => PathBuf::from(path),
        },
        None => PathBuf::from(path),
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.coursewatch/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| CourseWatchError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.coursewatch/coursewatch.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| CourseWatchError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        CourseWatchError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| CourseWatchError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig {
        instances: vec![InstanceEntry {
            name: "main".into(),
            url: "https://canvas.example.edu".into(),
            api_token_env: "CANVAS_API_TOKEN".into(),
        }],
        ..AppConfig::default()
    };
    let content =
        toml::to_string_pretty(&config).map_err(|e| CourseWatchError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| CourseWatchError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
