pub mod models;

pub use models::{AppConfig, DatabaseConfig, MessageQueueConfig};
