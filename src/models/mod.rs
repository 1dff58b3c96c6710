pub mod auth;
pub mod common;
pub mod notion;
pub mod sheets;
pub mod sync;
pub mod sync_log;
pub mod user;
