#![allow(clippy::async_fn_in_trait)]
pub mod common;
pub mod handler;
pub mod server;
pub mod storage;
pub mod traits;

pub use server::server::{coordinator_start, run_coordinator};
