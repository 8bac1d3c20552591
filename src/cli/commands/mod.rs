//! CLI command handlers, one module per subcommand.

pub mod config;
pub mod generate;
pub mod status;
