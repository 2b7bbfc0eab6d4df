//! Syndica - multi-platform publishing orchestrator
//!
//! This library schedules and publishes media posts to external social
//! platforms, tracking per-account outcomes durably so a post's history
//! survives partial failures and re-runs.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod hydrate;
pub mod logging;
pub mod platforms;
pub mod poll;
pub mod service;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use config::Config;
pub use error::{Result, SyndicaError};
pub use store::PostStore;
pub use types::{PlatformAccount, PlatformResult, Post, PostKind, PostStatus};
