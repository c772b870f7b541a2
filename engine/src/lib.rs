//! Action dispatch over typed hot variables.
//!
//! Declared actions read hot variables and preferences, run a function and
//! write their results back into hot variables. The engine orders passive
//! actions around the active one, validates every output before it is
//! committed and drives repeating timers cooperatively.
//!
//! - **[`core`]**: Pure, deterministic logic (values, store, registry, timers,
//!   commit validation). No I/O, fully testable in isolation.
//! - **[`io`]**: Schema and preference files on disk.
//!
//! [`dispatch`] composes core logic into the [`dispatch::Engine`] used by the
//! CLI and by embedders.

pub mod core;
pub mod dispatch;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod plugins;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
