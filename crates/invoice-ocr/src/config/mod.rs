pub mod loader;
pub mod schema;

pub use loader::{load_settings, load_settings_from};
pub use schema::{OcrSettings, QueueSettings, Settings};
