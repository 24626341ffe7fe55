//! CLI subcommand implementations.

pub mod import;
pub mod task;
pub mod today;
pub mod util;
