//! 领域仓储抽象
//!
//! 定义数据访问的抽象接口，遵循依赖倒置原则

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::entities::{KeyWord, TaskMain, TaskRun, TaskRunState};
use crate::query_filter::FilterSet;
use scantask_core::CoordinatorResult;

/// 状态转换的部分更新
///
/// 台账本身不校验状态机，转换合法性由编排方在调用前检查。
#[derive(Debug, Clone)]
pub struct TaskStateUpdate {
    pub state: TaskRunState,
    pub at: DateTime<Utc>,
    pub progress_message: Option<String>,
}

impl TaskStateUpdate {
    pub fn new(state: TaskRunState, at: DateTime<Utc>) -> Self {
        Self {
            state,
            at,
            progress_message: None,
        }
    }

    pub fn with_progress_message<S: Into<String>>(mut self, message: S) -> Self {
        self.progress_message = Some(message.into());
        self
    }
}

/// 任务执行台账仓储抽象
#[async_trait]
pub trait TaskRunRepository: Send + Sync {
    /// 插入一条新的执行记录，返回带数据库主键的行
    async fn create(&self, task_run: &TaskRun) -> CoordinatorResult<TaskRun>;

    /// 按对外task_id查询最近提交的执行记录
    async fn get_by_task_id(&self, task_id: &str) -> CoordinatorResult<Option<TaskRun>>;

    /// 应用状态及对应时间戳的部分更新，始终盖写update_datetime
    async fn update_state(&self, task_id: &str, update: &TaskStateUpdate)
        -> CoordinatorResult<()>;

    /// 原子条件取消：仅当行仍处于CREATED状态时写入REVOKED
    ///
    /// 返回是否有行被更新，用于区分取消生效与竞争失败。
    async fn mark_revoked_if_created(
        &self,
        task_id: &str,
        revoked_at: DateTime<Utc>,
    ) -> CoordinatorResult<bool>;

    /// 按过滤条件分页列出执行记录及满足条件的总数
    async fn list(
        &self,
        filters: &FilterSet,
        page: i64,
        rows_per_page: i64,
    ) -> CoordinatorResult<(Vec<TaskRun>, i64)>;
}

/// 主任务仓储抽象，本核心只读
#[async_trait]
pub trait TaskMainRepository: Send + Sync {
    async fn get_by_task_id(&self, task_id: &str) -> CoordinatorResult<Option<TaskMain>>;
}

/// 关键字记录仓储抽象
#[async_trait]
pub trait KeyWordRepository: Send + Sync {
    async fn create(&self, key_word: &KeyWord) -> CoordinatorResult<KeyWord>;
    async fn get_by_id(&self, id: i64) -> CoordinatorResult<Option<KeyWord>>;
    async fn update(&self, key_word: &KeyWord) -> CoordinatorResult<()>;
    /// 软删除，行保留在表中，返回是否有行被标记
    async fn soft_delete(&self, id: i64) -> CoordinatorResult<bool>;
    async fn list(
        &self,
        filters: &FilterSet,
        page: i64,
        rows_per_page: i64,
    ) -> CoordinatorResult<(Vec<KeyWord>, i64)>;
}
