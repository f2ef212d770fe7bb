//! # Core Runtime Module
//!
//! Foundational runtime pieces shared by every engine crate:
//! - Logging and tracing infrastructure
//! - Explicit configuration (`CoreConfig`)
//! - Event bus

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
