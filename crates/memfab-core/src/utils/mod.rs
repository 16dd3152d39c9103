//! Fabric Utilities
//!
//! Common utilities shared by the tiers.

mod fs;
mod time;
mod validation;

pub use fs::write_atomic;
pub use time::{Clock, ManualClock, SystemClock, now_unix};
pub use validation::{validate_importance, validate_significance, validate_text, validate_user_id};
