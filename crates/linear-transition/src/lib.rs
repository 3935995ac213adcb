//! Bulk Linear issue transitions and label mutations for CI pipelines.
//!
//! This crate provides:
//! - GraphQL client for Linear API behind the [`LinearApi`] trait
//! - Nested label resolution (`version/v1.0.0`) with on-demand creation
//! - Wildcard label removal (`version/v*`)
//! - A runner applying state transitions and label changes to a batch of issues
//! - Input parsing that splits CI step inputs into per-team request groups

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)] // Most operations call the Linear API

pub mod client;
pub mod error;
pub mod filter;
pub mod inputs;
pub mod labeler;
pub mod models;
pub mod runner;

pub use client::{LabelScope, LinearApi, LinearClient};
pub use error::RunError;
pub use filter::{IssueFilter, LabelFilter, LabelPath, StringComparator};
pub use inputs::Inputs;
pub use labeler::Labeler;
pub use models::*;
pub use runner::{GroupReport, Runner, TransitionOutcome};
