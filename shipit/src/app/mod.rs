//! Application entry points: configuration, prompts and the pipeline

pub mod config;
pub mod prompt;
pub mod run;
