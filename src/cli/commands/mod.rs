//! CLI command implementations.

pub mod engine;
pub mod init;
pub mod resume;
pub mod run;
pub mod runs;
