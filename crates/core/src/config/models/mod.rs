pub mod app_config;
pub mod database;
pub mod message_queue;

pub use app_config::AppConfig;
pub use database::DatabaseConfig;
pub use message_queue::MessageQueueConfig;
