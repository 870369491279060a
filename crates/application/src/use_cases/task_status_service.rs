use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, warn};

use scantask_core::{CoordinatorError, CoordinatorResult};
use scantask_domain::entities::TaskRunState;
use scantask_domain::repositories::{TaskRunRepository, TaskStateUpdate};

/// 任务状态上报服务 - worker回报的状态转换经由这里落账
///
/// 转换在写入前按生命周期图校验，台账本身不做状态机检查。
pub struct TaskStatusService {
    task_run_repo: Arc<dyn TaskRunRepository>,
}

impl TaskStatusService {
    pub fn new(task_run_repo: Arc<dyn TaskRunRepository>) -> Self {
        Self { task_run_repo }
    }

    /// worker已接收任务
    pub async fn mark_received(&self, task_id: &str) -> CoordinatorResult<()> {
        self.transition(task_id, TaskRunState::Received, None).await
    }

    /// worker已开始执行
    pub async fn mark_started(&self, task_id: &str) -> CoordinatorResult<()> {
        self.transition(task_id, TaskRunState::Started, None).await
    }

    /// 执行成功
    pub async fn mark_succeeded(
        &self,
        task_id: &str,
        progress_message: Option<&str>,
    ) -> CoordinatorResult<()> {
        self.transition(
            task_id,
            TaskRunState::Succeeded,
            progress_message.map(str::to_string),
        )
        .await
    }

    /// 执行失败
    pub async fn mark_failed(
        &self,
        task_id: &str,
        progress_message: Option<&str>,
    ) -> CoordinatorResult<()> {
        self.transition(
            task_id,
            TaskRunState::Failed,
            progress_message.map(str::to_string),
        )
        .await
    }

    async fn transition(
        &self,
        task_id: &str,
        next: TaskRunState,
        progress_message: Option<String>,
    ) -> CoordinatorResult<()> {
        let task_run = self
            .task_run_repo
            .get_by_task_id(task_id)
            .await?
            .ok_or_else(|| CoordinatorError::task_not_found(task_id))?;

        if !task_run.state.can_transition_to(next) {
            warn!(
                "拒绝乱序状态上报: 任务 {} 当前 {}, 上报 {}",
                task_id, task_run.state, next
            );
            return Err(CoordinatorError::InvalidTransition {
                task_id: task_id.to_string(),
                from: task_run.state.to_string(),
                to: next.to_string(),
            });
        }

        let mut update = TaskStateUpdate::new(next, Utc::now());
        if let Some(message) = progress_message {
            update = update.with_progress_message(message);
        }
        self.task_run_repo.update_state(task_id, &update).await?;

        debug!("任务状态已更新: {} -> {}", task_id, next);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scantask_domain::entities::TaskRunState;
    use scantask_testing_utils::{MockTaskRunRepository, TaskRunBuilder};

    fn service_with_created_run() -> (Arc<MockTaskRunRepository>, TaskStatusService) {
        let repo = Arc::new(MockTaskRunRepository::with_task_runs(vec![
            TaskRunBuilder::new().with_task_id("run-1").build(),
        ]));
        let service = TaskStatusService::new(repo.clone());
        (repo, service)
    }

    #[tokio::test]
    async fn test_full_lifecycle_reports() {
        let (repo, service) = service_with_created_run();

        service.mark_received("run-1").await.unwrap();
        service.mark_started("run-1").await.unwrap();
        service
            .mark_succeeded("run-1", Some("扫描完成: 12个开放端口"))
            .await
            .unwrap();

        let run = repo.get("run-1").unwrap();
        assert_eq!(run.state, TaskRunState::Succeeded);
        assert!(run.started_time.is_some());
        assert!(run.succeeded_time.is_some());
        assert_eq!(
            run.progress_message.as_deref(),
            Some("扫描完成: 12个开放端口")
        );
    }

    #[tokio::test]
    async fn test_failure_report() {
        let (repo, service) = service_with_created_run();

        service.mark_received("run-1").await.unwrap();
        service.mark_started("run-1").await.unwrap();
        service.mark_failed("run-1", Some("目标不可达")).await.unwrap();

        let run = repo.get("run-1").unwrap();
        assert_eq!(run.state, TaskRunState::Failed);
        assert!(run.failed_time.is_some());
        assert!(run.succeeded_time.is_none());
    }

    #[tokio::test]
    async fn test_out_of_order_report_rejected() {
        let (repo, service) = service_with_created_run();

        // CREATED不能直接STARTED
        let result = service.mark_started("run-1").await;
        assert!(matches!(
            result,
            Err(CoordinatorError::InvalidTransition { .. })
        ));
        assert_eq!(repo.get("run-1").unwrap().state, TaskRunState::Created);
    }

    #[tokio::test]
    async fn test_report_on_revoked_task_rejected() {
        let repo = Arc::new(MockTaskRunRepository::with_task_runs(vec![
            TaskRunBuilder::new()
                .with_task_id("run-1")
                .with_state(TaskRunState::Revoked)
                .build(),
        ]));
        let service = TaskStatusService::new(repo.clone());

        // REVOKED是终止状态，worker的任何上报都被拒绝
        for result in [
            service.mark_received("run-1").await,
            service.mark_started("run-1").await,
            service.mark_succeeded("run-1", None).await,
        ] {
            assert!(matches!(
                result,
                Err(CoordinatorError::InvalidTransition { .. })
            ));
        }
        assert_eq!(repo.get("run-1").unwrap().state, TaskRunState::Revoked);
    }

    #[tokio::test]
    async fn test_report_missing_task() {
        let (_, service) = service_with_created_run();
        let result = service.mark_received("missing").await;
        assert!(matches!(result, Err(CoordinatorError::TaskNotFound { .. })));
    }
}
