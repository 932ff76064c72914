//! Command-line interface module.

mod args;
pub mod instrument;
pub mod serve;

pub use args::{Cli, Commands, ServeArgs};
