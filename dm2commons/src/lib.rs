pub mod cli;
pub mod commons;
pub mod load_config;

pub use cli::{run, Cli, Commands};
