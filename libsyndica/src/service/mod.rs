//! Entry-point services
//!
//! Each service wires the store, adapters, and resolution pieces into one
//! operation a binary can run: the publish cycle, board synchronization,
//! and the token lifecycle.

pub mod boards;
pub mod publish;
pub mod tokens;

pub use boards::{BoardSyncReport, BoardSyncService};
pub use publish::{CycleReport, PostOutcome, PostReport, PublishService};
pub use tokens::{TokenReport, TokenService};
