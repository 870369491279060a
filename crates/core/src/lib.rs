pub mod config;
pub mod errors;
pub mod logging;

pub use config::*;
pub use errors::*;
pub use logging::init_logging;

/// 统一的Result类型
pub type CoordinatorResult<T> = std::result::Result<T, CoordinatorError>;
