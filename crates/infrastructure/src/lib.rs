pub mod database;
pub mod error_handling;
pub mod in_memory_gateway;
pub mod rabbitmq_gateway;

pub use database::{DatabaseManager, DatabasePool, DatabaseType};
pub use in_memory_gateway::InMemoryBrokerGateway;
pub use rabbitmq_gateway::RabbitMqBrokerGateway;
