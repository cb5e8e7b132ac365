//! Shared types, error model, and configuration for CourseWatch.
//!
//! This crate is the foundation depended on by all other CourseWatch crates.
//! It provides:
//! - [`CourseWatchError`]: the unified error type
//! - Domain types ([`WorkItem`], [`ContentContainer`], [`ContentItem`], [`CurationResult`])
//! - Configuration ([`AppConfig`] loaded from TOML, [`RunConfig`] compile-time constants)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CompletionConfig, CompletionSettings, ExportSettings, InstanceEntry, RunConfig,
    RunSettings, TelegramConfig, TelegramSettings, config_dir, config_file_path, expand_home,
    init_config, load_config, load_config_from, resolve_completion, resolve_instances,
    resolve_telegram,
};
pub use error::{CourseWatchError, Result};
pub use types::{
    AssessmentMeta, ContentBody, ContentContainer, ContentItem, ContentKind, ContentRef,
    CurationResult, ItemOrigin, SOURCE_TIMESTAMP_FORMAT, SourceInstance, WorkItem,
    parse_source_instant,
};
