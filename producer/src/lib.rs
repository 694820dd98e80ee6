pub mod config;
pub mod error;
pub mod handlers;
pub mod producer;
pub mod publisher;
pub mod record;
pub mod source;
