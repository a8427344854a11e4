//! fotad Library
//!
//! Core modules for the LwM2M firmware and software update daemon.

pub mod app;
pub mod cache;
pub mod errors;
pub mod filesys;
pub mod logs;
pub mod lwm2m;
pub mod observe;
pub mod ota;
pub mod server;
pub mod storage;
pub mod transport;
pub mod utils;
pub mod workers;
