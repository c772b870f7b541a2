//! Stable exit codes for engine CLI commands.

/// Command succeeded and every queued action committed or passed.
pub const OK: i32 = 0;
/// Schema could not be loaded or built, or the stimulus was refused.
pub const INVALID: i32 = 1;
/// Dispatch ran but at least one action was rejected or skipped.
pub const REJECTED: i32 = 2;
