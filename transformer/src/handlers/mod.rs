mod app;
mod transform;

pub use app::app;
