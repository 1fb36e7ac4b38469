pub mod models;
pub mod views;
pub mod controllers;
pub mod cli;
pub mod error;

// Re-exports for convenience
pub use models::{Config, Post};
pub use controllers::{start_app, AppContext, FeedController};
pub use error::{Brutal24Error, Result};
