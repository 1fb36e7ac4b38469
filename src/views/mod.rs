pub mod banner;
pub mod tui;
pub mod widgets;

// Re-export view components
pub use banner::WelcomeBanner;
pub use tui::{Tab, UiState};
pub use widgets::StatefulList;
