//! CLI command handlers, one file per command.

mod checksum;
mod config;
mod get;

pub use checksum::run_checksum;
pub use config::run_config;
pub use get::{run_get, GetArgs};
