pub mod api;
pub mod config;
pub mod decode;
pub mod handlers;
pub mod normalize;
pub mod transform;
