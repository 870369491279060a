//! Mock implementations for repository and gateway traits
//!
//! This module provides in-memory mock implementations that can be used
//! for unit testing without requiring actual database connections or
//! a running message broker.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use scantask_core::{CoordinatorError, CoordinatorResult};
use scantask_domain::entities::{TaskMain, TaskRun, TaskRunState};
use scantask_domain::messaging::{BrokerGateway, TaskSignature};
use scantask_domain::query_filter::{FilterSet, RecordFilter};
use scantask_domain::repositories::{
    TaskMainRepository, TaskRunRepository, TaskStateUpdate,
};

/// Mock implementation of TaskRunRepository for testing
#[derive(Debug, Clone)]
pub struct MockTaskRunRepository {
    task_runs: Arc<Mutex<HashMap<String, TaskRun>>>,
    next_id: Arc<Mutex<i64>>,
    fail_create: Arc<Mutex<bool>>,
}

impl MockTaskRunRepository {
    pub fn new() -> Self {
        Self {
            task_runs: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(Mutex::new(1)),
            fail_create: Arc::new(Mutex::new(false)),
        }
    }

    pub fn with_task_runs(task_runs: Vec<TaskRun>) -> Self {
        let repo = Self::new();
        {
            let mut map = repo.task_runs.lock().unwrap();
            let mut next_id = repo.next_id.lock().unwrap();
            for mut run in task_runs {
                if run.id == 0 {
                    run.id = *next_id;
                }
                *next_id = (*next_id).max(run.id) + 1;
                map.insert(run.task_id.clone(), run);
            }
        }
        repo
    }

    /// 注入台账写入失败，模拟存储拒绝写入
    pub fn set_fail_create(&self, fail: bool) {
        *self.fail_create.lock().unwrap() = fail;
    }

    pub fn count(&self) -> usize {
        self.task_runs.lock().unwrap().len()
    }

    pub fn get(&self, task_id: &str) -> Option<TaskRun> {
        self.task_runs.lock().unwrap().get(task_id).cloned()
    }

    pub fn clear(&self) {
        self.task_runs.lock().unwrap().clear();
        *self.next_id.lock().unwrap() = 1;
    }

    fn matches(run: &TaskRun, filters: &FilterSet) -> bool {
        if !filters.deleted_included() && run.is_delete {
            return false;
        }
        filters.filters().iter().all(|filter| match filter {
            RecordFilter::TaskIdEquals(task_id) => run.task_id == *task_id,
            RecordFilter::WorkspaceIdEquals(workspace_id) => run.workspace_id == *workspace_id,
            RecordFilter::UpdatedWithinDays(days) => {
                run.update_datetime >= Utc::now() - chrono::Duration::days(*days)
            }
            // 其余谓词属于关键字表，对任务表无约束
            _ => true,
        })
    }
}

impl Default for MockTaskRunRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskRunRepository for MockTaskRunRepository {
    async fn create(&self, task_run: &TaskRun) -> CoordinatorResult<TaskRun> {
        if *self.fail_create.lock().unwrap() {
            return Err(CoordinatorError::database_error("模拟的台账写入失败"));
        }

        let mut task_runs = self.task_runs.lock().unwrap();
        let mut next_id = self.next_id.lock().unwrap();

        let mut new_run = task_run.clone();
        new_run.id = *next_id;
        *next_id += 1;

        task_runs.insert(new_run.task_id.clone(), new_run.clone());
        Ok(new_run)
    }

    async fn get_by_task_id(&self, task_id: &str) -> CoordinatorResult<Option<TaskRun>> {
        let task_runs = self.task_runs.lock().unwrap();
        Ok(task_runs.get(task_id).cloned())
    }

    async fn update_state(
        &self,
        task_id: &str,
        update: &TaskStateUpdate,
    ) -> CoordinatorResult<()> {
        let mut task_runs = self.task_runs.lock().unwrap();
        let run = task_runs
            .get_mut(task_id)
            .ok_or_else(|| CoordinatorError::task_not_found(task_id))?;

        run.state = update.state;
        run.update_datetime = update.at;
        if let Some(message) = &update.progress_message {
            run.progress_message = Some(message.clone());
        }
        match update.state {
            TaskRunState::Started => run.started_time = Some(update.at),
            TaskRunState::Succeeded => run.succeeded_time = Some(update.at),
            TaskRunState::Failed => run.failed_time = Some(update.at),
            TaskRunState::Revoked => run.revoked_time = Some(update.at),
            TaskRunState::Retried => run.retried_time = Some(update.at),
            TaskRunState::Created | TaskRunState::Received => {}
        }
        Ok(())
    }

    async fn mark_revoked_if_created(
        &self,
        task_id: &str,
        revoked_at: DateTime<Utc>,
    ) -> CoordinatorResult<bool> {
        let mut task_runs = self.task_runs.lock().unwrap();
        match task_runs.get_mut(task_id) {
            Some(run) if run.state == TaskRunState::Created => {
                run.state = TaskRunState::Revoked;
                run.revoked_time = Some(revoked_at);
                run.update_datetime = revoked_at;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list(
        &self,
        filters: &FilterSet,
        page: i64,
        rows_per_page: i64,
    ) -> CoordinatorResult<(Vec<TaskRun>, i64)> {
        let task_runs = self.task_runs.lock().unwrap();
        let mut matched: Vec<TaskRun> = task_runs
            .values()
            .filter(|run| Self::matches(run, filters))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.update_datetime.cmp(&a.update_datetime));

        let total = matched.len() as i64;
        let offset = ((page - 1).max(0) * rows_per_page) as usize;
        let rows: Vec<TaskRun> = matched
            .into_iter()
            .skip(offset)
            .take(rows_per_page as usize)
            .collect();
        Ok((rows, total))
    }
}

/// Mock implementation of TaskMainRepository for testing
#[derive(Debug, Clone)]
pub struct MockTaskMainRepository {
    task_mains: Arc<Mutex<HashMap<String, TaskMain>>>,
}

impl MockTaskMainRepository {
    pub fn new() -> Self {
        Self {
            task_mains: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn with_task_mains(task_mains: Vec<TaskMain>) -> Self {
        let repo = Self::new();
        {
            let mut map = repo.task_mains.lock().unwrap();
            for task_main in task_mains {
                map.insert(task_main.task_id.clone(), task_main);
            }
        }
        repo
    }

    pub fn insert(&self, task_main: TaskMain) {
        self.task_mains
            .lock()
            .unwrap()
            .insert(task_main.task_id.clone(), task_main);
    }

    pub fn count(&self) -> usize {
        self.task_mains.lock().unwrap().len()
    }
}

impl Default for MockTaskMainRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskMainRepository for MockTaskMainRepository {
    async fn get_by_task_id(&self, task_id: &str) -> CoordinatorResult<Option<TaskMain>> {
        let task_mains = self.task_mains.lock().unwrap();
        Ok(task_mains.get(task_id).cloned())
    }
}

/// Mock implementation of BrokerGateway for testing
///
/// 记录全部已发布的签名，并支持注入发布失败。
#[derive(Debug, Clone)]
pub struct MockBrokerGateway {
    published: Arc<Mutex<Vec<TaskSignature>>>,
    fail_publish: Arc<Mutex<bool>>,
}

impl MockBrokerGateway {
    pub fn new() -> Self {
        Self {
            published: Arc::new(Mutex::new(Vec::new())),
            fail_publish: Arc::new(Mutex::new(false)),
        }
    }

    /// 注入发布失败，模拟broker不可达
    pub fn set_fail_publish(&self, fail: bool) {
        *self.fail_publish.lock().unwrap() = fail;
    }

    pub fn published_signatures(&self) -> Vec<TaskSignature> {
        self.published.lock().unwrap().clone()
    }

    pub fn published_count(&self) -> usize {
        self.published.lock().unwrap().len()
    }

    pub fn clear(&self) {
        self.published.lock().unwrap().clear();
    }
}

impl Default for MockBrokerGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BrokerGateway for MockBrokerGateway {
    async fn publish(&self, signature: &TaskSignature) -> CoordinatorResult<()> {
        if *self.fail_publish.lock().unwrap() {
            return Err(CoordinatorError::message_queue("模拟的broker发布失败"));
        }
        self.published.lock().unwrap().push(signature.clone());
        Ok(())
    }
}
