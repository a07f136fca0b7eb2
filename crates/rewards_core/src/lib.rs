//! Validation, history loading and the sliding-window reward engine.

pub mod engine;
pub mod loader;
pub mod validate;

pub use engine::assign_rewards;
pub use loader::{group_files_by_identity, load_history, FileGroup};
pub use validate::{validate_record, GroupIdentity, ValidationError};
