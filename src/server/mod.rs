pub mod dispatch;
pub mod loader;
pub mod request_watcher;
pub mod server;
pub mod watch;
