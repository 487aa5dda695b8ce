//! Subprocess module

pub mod checked;
pub mod command;

pub use checked::{run_checked, run_logged};
pub use command::{CommandOutput, CommandRunner, CommandSpec, ProcessRunner};
