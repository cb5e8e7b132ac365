//! Generative text completion: short action plans and study guides.
//!
//! Talks to an OpenAI-compatible `chat/completions` endpoint. Action plan
//! failures fall back to a fixed plan; study guide failures are returned to
//! the caller, which skips the guide.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use coursewatch_markdown::{GuideSection, clean_html, truncate_chars};
use coursewatch_shared::{CompletionConfig, ContentItem, CourseWatchError, Result, WorkItem};

use crate::sections::{self, ActionPlan};

const USER_AGENT: &str = concat!("CourseWatch/", env!("CARGO_PKG_VERSION"));

const ACTION_PLAN_SYSTEM: &str = "You are a concise academic assistant. Keep responses brief.";
const ACTION_PLAN_MAX_TOKENS: u32 = 300;
const ACTION_PLAN_TIMEOUT: Duration = Duration::from_secs(30);
/// Characters of cleaned description included in an action plan prompt.
const ACTION_PLAN_DESCRIPTION_CHARS: usize = 500;

const STUDY_GUIDE_SYSTEM: &str = "You are an expert tutor creating comprehensive study materials with multiple choice questions.";
const STUDY_GUIDE_MAX_TOKENS: u32 = 8000;
const STUDY_GUIDE_TIMEOUT: Duration = Duration::from_secs(120);
const STUDY_GUIDE_MAX_ITEMS: usize = 25;
const STUDY_GUIDE_ITEM_CHARS: usize = 2000;
const STUDY_GUIDE_CORPUS_CHARS: usize = 12000;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

// ---------------------------------------------------------------------------
// CompletionClient
// ---------------------------------------------------------------------------

/// Chat completion client with per-call token budgets and timeouts.
#[derive(Debug, Clone)]
pub struct CompletionClient {
    client: Client,
    config: CompletionConfig,
}

impl CompletionClient {
    pub fn new(config: CompletionConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| CourseWatchError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    /// Short action plan for one work item. Never fails: any error yields
    /// [`ActionPlan::fallback`].
    #[instrument(skip_all, fields(item = %item.name))]
    pub async fn action_plan(&self, item: &WorkItem) -> ActionPlan {
        let prompt = action_plan_prompt(item);
        let response = self
            .complete(ACTION_PLAN_SYSTEM, &prompt, ACTION_PLAN_MAX_TOKENS, ACTION_PLAN_TIMEOUT)
            .await;

        match response {
            Ok(text) => sections::parse_action_plan(&text).unwrap_or_else(|| {
                warn!("empty action plan response, using fallback");
                ActionPlan::fallback()
            }),
            Err(e) => {
                warn!(error = %e, "action plan generation failed, using fallback");
                ActionPlan::fallback()
            }
        }
    }

    /// Generate and split a study guide for `exam_name` from curated material.
    #[instrument(skip_all, fields(exam = %exam_name, materials = materials.len()))]
    pub async fn study_guide(&self, exam_name: &str, materials: &[ContentItem]) -> Result<Vec<GuideSection>> {
        let prompt = study_guide_prompt(exam_name, materials);
        let text = self
            .complete(STUDY_GUIDE_SYSTEM, &prompt, STUDY_GUIDE_MAX_TOKENS, STUDY_GUIDE_TIMEOUT)
            .await?;

        info!(response_chars = text.chars().count(), "study guide generated");
        Ok(sections::parse_study_guide(&text))
    }

    /// One chat completion; returns the first choice's text.
    async fn complete(&self, system: &str, prompt: &str, max_tokens: u32, timeout: Duration) -> Result<String> {
        let url = format!("{}/chat/completions", self.config.base_url);
        let body = ChatRequest {
            model: &self.config.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: self.config.temperature,
            max_tokens,
        };

        debug!(model = %self.config.model, max_tokens, prompt_chars = prompt.len(), "sending completion request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .timeout(timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| CourseWatchError::Completion(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CourseWatchError::Completion(format!("{url}: HTTP {status}")));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| CourseWatchError::Completion(format!("{url}: unexpected response body: {e}")))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| CourseWatchError::Completion(format!("{url}: response has no content")))
    }
}

// ---------------------------------------------------------------------------
// Prompts
// ---------------------------------------------------------------------------

/// Prompt asking for a 3-4 step plan and 1-2 tips in the marker format.
pub fn action_plan_prompt(item: &WorkItem) -> String {
    let description = clean_html(&item.description);
    let description = truncate_chars(&description, ACTION_PLAN_DESCRIPTION_CHARS);

    format!(
        "You are helping a college student with an assignment. Be brief.\n\n\
         Assignment: {name}\n\
         Course: {course}\n\
         Points: {points}\n\
         Description: {description}\n\n\
         Give a SHORT action plan (3-4 steps at most) and 1-2 quick tips.\n\n\
         Format:\n\
         ACTION_PLAN:\n\
         1. [step]\n\
         2. [step]\n\
         3. [step]\n\n\
         TIPS:\n\
         • [tip]\n\
         • [tip]",
        name = item.name,
        course = item.container_name,
        points = item.points,
    )
}

/// Chapter list named in an exam title (`Exam: Ch 1, 2, 6` → `1, 2, 6`).
pub fn chapter_scope(exam_name: &str) -> Option<String> {
    static CHAPTER_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"ch[apter]*\s*([\d\s,]+)").expect("valid regex"));

    let lower = exam_name.to_lowercase();
    CHAPTER_RE.captures_iter(&lower).find_map(|caps| {
        let scope = caps[1].trim().trim_end_matches(',').trim();
        scope
            .chars()
            .any(|c| c.is_ascii_digit())
            .then(|| scope.to_string())
    })
}

/// Material block sent to the model: first items only, each and the whole
/// block truncated.
pub fn study_guide_corpus(materials: &[ContentItem]) -> String {
    let mut corpus = String::new();
    for item in materials.iter().take(STUDY_GUIDE_MAX_ITEMS) {
        corpus.push_str(&format!("\n\n=== {}: {} ===\n", item.kind, item.title));
        corpus.push_str(truncate_chars(&item.text, STUDY_GUIDE_ITEM_CHARS));
    }
    truncate_chars(&corpus, STUDY_GUIDE_CORPUS_CHARS).to_string()
}

/// Prompt asking for the four-part study guide outline.
pub fn study_guide_prompt(exam_name: &str, materials: &[ContentItem]) -> String {
    let scope = chapter_scope(exam_name)
        .map(|chapters| {
            format!(
                "\n\nIMPORTANT: This exam covers ONLY Chapters {chapters}. \
                 Focus the study guide ONLY on these chapters."
            )
        })
        .unwrap_or_default();

    format!(
        "You are analyzing course materials to build a comprehensive study guide for an upcoming exam.\n\n\
         Exam: {exam_name}{scope}\n\n\
         Below are the course materials (pages, assignments, discussions) released before the exam:\n\
         {corpus}\n\n\
         Write the study guide with exactly these four sections, each introduced by its heading on its own line:\n\n\
         1. KEY CONCEPTS (organized by topic)\n\
         \x20  - every important concept, a brief explanation, and why it matters\n\n\
         2. KEY IDEAS & THEORIES\n\
         \x20  - main theories and frameworks, how they connect, real-world applications\n\n\
         3. MULTIPLE CHOICE PRACTICE QUESTIONS (70-100 questions)\n\
         \x20  - only material covered by THIS exam and the materials above\n\
         \x20  - four options each, formatted as:\n\
         \x20    Q1. [Question]\n\
         \x20    A) [Option]\n\
         \x20    B) [Option]\n\
         \x20    C) [Option]\n\
         \x20    D) [Option]\n\
         \x20  - mix definitions, applications, comparisons, and analysis at varied difficulty\n\
         \x20  - no answers in this section\n\n\
         4. ANSWER KEY\n\
         \x20  - only the correct letter per question, e.g. Q1: B, Q2: A\n\
         \x20  - this section comes last",
        corpus = study_guide_corpus(materials),
    )
}
