//! Core types for the retrodbg debugging engine
//!
//! This crate provides the foundational types shared by the CPU cores and
//! the debugger components: architecture tags, error handling,
//! configuration, and logging infrastructure.

pub mod arch;
pub mod config;
pub mod error;
pub mod logging;

pub use arch::{Architecture, Endianness, MemoryReadFn, MemoryWriteFn};
pub use config::Config;
pub use error::{DebugError, Result};
