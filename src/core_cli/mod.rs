pub mod core_cli;

pub use core_cli::{apply_url, Cli, Command};
