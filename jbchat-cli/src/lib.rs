//! The `jbchat` command-line assistant.
//!
//! With `--prompt` it answers once; without it, it runs an interactive loop;
//! `jbchat serve` exposes the same engine over HTTP.

pub mod app;
pub mod cli;
pub mod repl;
pub mod settings;

pub use app::{App, bootstrap};
pub use cli::{Cli, Command};
pub use settings::Settings;
