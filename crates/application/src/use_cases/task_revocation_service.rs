use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info};

use scantask_core::{CoordinatorError, CoordinatorResult};
use scantask_domain::repositories::TaskRunRepository;

/// 任务取消服务 - 负责阻止尚未开始执行的任务
///
/// 取消只对CREATED状态生效；worker可能已经开始的任务原样
/// 保留，返回false而不是错误，这是预期结果而非故障。
pub struct TaskRevocationService {
    task_run_repo: Arc<dyn TaskRunRepository>,
}

impl TaskRevocationService {
    pub fn new(task_run_repo: Arc<dyn TaskRunRepository>) -> Self {
        Self { task_run_repo }
    }

    /// 取消一个未开始执行的任务，返回取消是否生效
    pub async fn revoke(&self, task_id: &str) -> CoordinatorResult<bool> {
        let task_run = self.task_run_repo.get_by_task_id(task_id).await?;
        let Some(task_run) = task_run else {
            error!("取消时任务不存在: {}", task_id);
            return Err(CoordinatorError::task_not_found(task_id));
        };

        // 只有CREATED状态的任务才能取消
        if !task_run.is_revocable() {
            return Ok(false);
        }

        // 条件更新在存储层原子完成，读到CREATED之后被worker抢先
        // 启动的竞争在这里表现为rows_affected=0
        let revoked = self
            .task_run_repo
            .mark_revoked_if_created(task_id, Utc::now())
            .await?;

        if revoked {
            info!("任务已取消: {}", task_id);
        }
        Ok(revoked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scantask_domain::entities::TaskRunState;
    use scantask_testing_utils::{MockTaskRunRepository, TaskRunBuilder};

    fn service_with_runs(
        runs: Vec<scantask_domain::entities::TaskRun>,
    ) -> (Arc<MockTaskRunRepository>, TaskRevocationService) {
        let repo = Arc::new(MockTaskRunRepository::with_task_runs(runs));
        let service = TaskRevocationService::new(repo.clone());
        (repo, service)
    }

    #[tokio::test]
    async fn test_revoke_created_task() {
        let (repo, service) =
            service_with_runs(vec![TaskRunBuilder::new().with_task_id("run-1").build()]);

        let revoked = service.revoke("run-1").await.unwrap();
        assert!(revoked);

        let run = repo.get("run-1").unwrap();
        assert_eq!(run.state, TaskRunState::Revoked);
        assert!(run.revoked_time.is_some());
    }

    #[tokio::test]
    async fn test_second_revoke_is_noop() {
        let (repo, service) =
            service_with_runs(vec![TaskRunBuilder::new().with_task_id("run-1").build()]);

        assert!(service.revoke("run-1").await.unwrap());
        let first_revoked_time = repo.get("run-1").unwrap().revoked_time;

        // 第二次取消返回false，revoked_time不变
        assert!(!service.revoke("run-1").await.unwrap());
        assert_eq!(repo.get("run-1").unwrap().revoked_time, first_revoked_time);
    }

    #[tokio::test]
    async fn test_revoke_missing_task() {
        let (_, service) = service_with_runs(vec![]);

        let result = service.revoke("missing").await;
        assert!(matches!(result, Err(CoordinatorError::TaskNotFound { .. })));
    }

    #[tokio::test]
    async fn test_revoke_leaves_progressed_tasks_untouched() {
        for state in [
            TaskRunState::Received,
            TaskRunState::Started,
            TaskRunState::Succeeded,
            TaskRunState::Failed,
        ] {
            let (repo, service) = service_with_runs(vec![TaskRunBuilder::new()
                .with_task_id("run-1")
                .with_state(state)
                .build()]);

            let revoked = service.revoke("run-1").await.unwrap();
            assert!(!revoked, "状态 {state} 不应被取消");

            let run = repo.get("run-1").unwrap();
            assert_eq!(run.state, state);
            assert!(run.revoked_time.is_none());
        }
    }
}
