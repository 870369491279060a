pub mod entities;
pub mod messaging;
pub mod query_filter;
pub mod repositories;

pub use entities::*;
pub use messaging::*;
pub use query_filter::*;
pub use repositories::*;
pub use scantask_core::{CoordinatorError, CoordinatorResult};
