//! Deployment module

pub mod compose;
pub mod descriptor;
pub mod fsm;
pub mod git;
pub mod proxy;
pub mod teardown;
pub mod validate;
