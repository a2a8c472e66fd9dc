//! Command implementations.

pub mod completions;
pub mod init;
pub mod run;
pub mod status;
pub mod tables;
pub mod version;
