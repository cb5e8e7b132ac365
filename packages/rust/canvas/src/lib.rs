//! LMS (Canvas) REST API access.
//!
//! This crate provides:
//! - [`CanvasClient`]: authenticated, paginated access to one instance
//! - [`records`]: raw response records with source defaults applied on read
//!
//! Orchestration (which endpoints to combine, how failures degrade) lives in
//! `coursewatch-core`.

pub mod client;
pub mod records;

pub use client::{CanvasClient, MAX_PAGES};
pub use records::{
    AssignmentRecord, CourseRecord, DiscussionRecord, ModuleItemRecord, ModuleRecord, NO_URL,
    PageRecord, PlannableRecord, PlannerRecord, UNKNOWN_COURSE, UNNAMED,
};
