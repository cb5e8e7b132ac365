//! Aggregation, classification and curation for CourseWatch.
//!
//! This crate ties the LMS client, the completion service and the notifier
//! into the daily pipeline:
//! collect → dedup → classify → curate majors → study guides → notify.
//! The [`listener`] runs the same pipeline on request from chat.

pub mod collector;
pub mod completion;
pub mod curator;
pub mod dedup;
pub mod digest;
pub mod export;
pub mod importance;
pub mod listener;
pub mod notify;
pub mod pipeline;
pub mod sections;
pub mod temporal;

pub use completion::CompletionClient;
pub use curator::{CanvasCurator, ContentSource, Curator};
pub use importance::{Priority, is_major, priority};
pub use listener::{BotCommand, Listener};
pub use notify::TelegramNotifier;
pub use pipeline::{
    GeneratedGuide, PipelineOutput, ProgressReporter, RunSummary, Services, SilentProgress,
    build_guide, curate_and_classify, run_daily, run_daily_capped,
};
