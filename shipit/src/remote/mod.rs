//! Remote host operations over SSH

pub mod connector;
pub mod provision;
pub mod ssh;
pub mod transfer;
