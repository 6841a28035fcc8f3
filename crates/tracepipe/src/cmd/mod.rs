//! Subcommand implementations

pub mod consume;
pub mod serve;
