//! Infrastructure layer for Surveyor.
//!
//! Contains implementations of the ports defined in `surveyor-core`:
//! the crash-safe JSON file store, export artifact management, and a
//! console transport for local runs.

pub mod console;
pub mod fs;
