//! Command-line interface module.

mod args;
pub mod preview;

pub use args::{Cli, Commands, PreviewArgs};
