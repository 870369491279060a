//! 分布式扫描任务协调系统
//!
//! 负责异步后台任务的提交、跟踪与取消：生产者提交带不透明JSON
//! 配置的命名任务，任务签名经消息代理延迟投递给worker池，每次
//! 执行的生命周期持久化在台账中，未开始的任务可以被取消。

pub mod app;

pub use app::Application;
pub use scantask_application::{
    TaskRevocationService, TaskStatusService, TaskSubmissionService, EXECUTION_DEFER_SECONDS,
    KW_ARGS_MAX_LEN,
};
pub use scantask_core::{config::AppConfig, init_logging, CoordinatorError, CoordinatorResult};
pub use scantask_domain::entities::{KeyWord, TaskMain, TaskRun, TaskRunState};
pub use scantask_domain::messaging::{BrokerGateway, TaskSignature};
