//! Error types for the dialog core.
//!
//! Two taxonomies, mirroring the split between startup and per-turn failure
//! modes: [`ConfigError`] is fatal and only ever surfaces while loading a
//! [`crate::policy::PolicyTable`]; [`DialogError`] covers the adapter seams
//! (session store I/O) that sit outside `handle_turn`'s no-throw contract.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for policy table loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Fatal configuration errors. `handle_turn` never returns these; they only
/// occur at startup while constructing a `PolicyTable`.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("policy table not found at {path}")]
    NotFound { path: PathBuf },

    #[error("policy table is not valid JSON: {message}")]
    InvalidJson { message: String },

    #[error("category {category} has an empty allowed_outcomes set")]
    EmptyAllowedOutcomes { category: String },

    #[error("category {category} has a discount tier ({percent}%) above its cap ({cap}%)")]
    TierExceedsCap {
        category: String,
        percent: f64,
        cap: f64,
    },

    #[error("io error reading policy table: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for session-store operations.
pub type DialogResult<T> = Result<T, DialogError>;

/// Errors surfaced at the adapter seams (session persistence). Never
/// returned from `DialogManager::handle_turn` itself — every failure inside
/// a turn is swallowed into an unfilled slot or a user-visible reply, per
/// the propagation policy in the distilled spec's error handling design.
#[derive(Error, Debug)]
pub enum DialogError {
    #[error("session store io error: {0}")]
    Store(#[from] std::io::Error),

    #[error("session state is not valid JSON: {message}")]
    Deserialize { message: String },
}
