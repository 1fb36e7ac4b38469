pub mod app_controller;
pub mod context;
pub mod feed;
pub mod post_controller;

// Re-export key functions
pub use app_controller::start_app;
pub use context::AppContext;
pub use feed::FeedController;
