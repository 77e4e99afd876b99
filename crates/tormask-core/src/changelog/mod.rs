//! Change log implementations

pub mod memory;
pub mod file;

pub use memory::MemoryChangeLog;
pub use file::{FileChangeLog, LOG_HEADER};
