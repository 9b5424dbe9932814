//! Domain models for easy-exp.
//!
//! Canonical definitions for the core entities:
//! - `RunConfig`: Immutable configuration of one experiment run
//! - `ResultRecord`: Output of scoring one step
//! - `ExpError` / `StepError`: Session-level and per-step failures

pub mod config;
pub mod error;
pub mod record;

pub use config::{RunConfig, CAPTURE_FILE_NAME, DATASET_DIGEST_FIELD, ERROR_LOG_NAME, LOG_DIR_NAME};
pub use error::{ExpError, Result, StepError};
pub use record::{ResultRecord, ITEM_KEY_FIELD, LOG_PATH_KEY};
