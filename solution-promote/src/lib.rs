pub mod ci;
pub mod cli;
pub mod client;
pub mod commands;
pub mod host;
pub mod load_config;

pub use cli::{run, Cli, Commands};
