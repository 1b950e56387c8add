pub mod config;
pub mod error;
pub mod paths;
pub mod publish;
pub mod server;
pub mod utils;
