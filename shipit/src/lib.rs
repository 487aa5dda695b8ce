//! shipit library
//!
//! One-shot deployment of a containerized application to a single remote
//! host: sync the source, provision the host, ship the code, start the
//! workload and put nginx in front of it.

pub mod app;
pub mod deploy;
pub mod errors;
pub mod filesys;
pub mod logs;
pub mod process;
pub mod remote;
pub mod storage;
pub mod utils;
