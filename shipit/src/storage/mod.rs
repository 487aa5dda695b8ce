//! Local storage module

pub mod layout;
pub mod settings;
