//! Visura Store - In-memory implementations of the core store traits.
//!
//! The pipeline only depends on the trait contracts (`ResponseStore`,
//! `ApplicationStore`, `JobQueue`); production deployments substitute a
//! database-backed implementation behind the same traits. These in-memory
//! implementations back the CLI's single-process mode and the integration
//! tests.

pub mod memory;

pub use memory::{MemoryJobQueue, MemoryStore};
