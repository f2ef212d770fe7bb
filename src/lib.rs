//! Workspace placeholder crate.
//!
//! Exposes feature flags that map to the engine crates so a host can depend on
//! `sync-engine-workspace` alone and enable what it needs.

#[cfg(feature = "desktop-shims")]
pub use core_service::{CoreError, CoreService, JobHandle, JobId, JobKind};
