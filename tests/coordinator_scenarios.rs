//! 协调器端到端场景测试
//!
//! 使用内存SQLite台账与内存消息网关，覆盖提交、取消、worker
//! 状态上报与重试链路的完整交互。

use std::sync::Arc;

use chrono::{Duration, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use scantask::{
    Application, TaskRevocationService, TaskStatusService, TaskSubmissionService,
    TaskRunState, EXECUTION_DEFER_SECONDS,
};
use scantask_domain::repositories::TaskRunRepository;
use scantask_infrastructure::database::sqlite::{
    init_schema, SqliteTaskMainRepository, SqliteTaskRunRepository,
};
use scantask_infrastructure::InMemoryBrokerGateway;
use scantask_testing_utils::TaskMainBuilder;

struct Harness {
    task_run_repo: Arc<SqliteTaskRunRepository>,
    gateway: Arc<InMemoryBrokerGateway>,
    submission: TaskSubmissionService,
    revocation: TaskRevocationService,
    status: TaskStatusService,
}

async fn harness() -> Harness {
    // 内存库按连接隔离，测试固定单连接
    let pool: SqlitePool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    init_schema(&pool).await.unwrap();

    let task_main_repo = Arc::new(SqliteTaskMainRepository::new(pool.clone()));
    task_main_repo
        .insert(
            &TaskMainBuilder::new()
                .with_task_id("main-1")
                .with_workspace_id(3)
                .build(),
        )
        .await
        .unwrap();

    let task_run_repo = Arc::new(SqliteTaskRunRepository::new(pool));
    let gateway = Arc::new(InMemoryBrokerGateway::new());

    let submission = TaskSubmissionService::new(
        task_run_repo.clone(),
        task_main_repo.clone(),
        gateway.clone(),
    );
    let revocation = TaskRevocationService::new(task_run_repo.clone());
    let status = TaskStatusService::new(task_run_repo.clone());

    Harness {
        task_run_repo,
        gateway,
        submission,
        revocation,
        status,
    }
}

#[tokio::test]
async fn test_submit_then_revoke_scenario() {
    let h = harness().await;

    let task_id = h
        .submission
        .submit("scan-x", "{\"target\":\"10.0.0.0/24\"}", "main-1", None)
        .await
        .unwrap();
    assert!(Uuid::parse_str(&task_id).is_ok());

    let run = h
        .task_run_repo
        .get_by_task_id(&task_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(run.state, TaskRunState::Created);
    assert_eq!(run.workspace_id, 3);

    // 取消生效
    assert!(h.revocation.revoke(&task_id).await.unwrap());
    let run = h
        .task_run_repo
        .get_by_task_id(&task_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(run.state, TaskRunState::Revoked);
    assert!(run.revoked_time.is_some());

    // 再次取消只是无效操作
    assert!(!h.revocation.revoke(&task_id).await.unwrap());
}

#[tokio::test]
async fn test_submit_missing_parent_keeps_broker_message_only() {
    let h = harness().await;

    let task_id = h
        .submission
        .submit("scan-x", "{}", "missing", None)
        .await
        .unwrap();

    // 发布成功且返回了task_id，但本地没有台账行
    assert!(!task_id.is_empty());
    assert_eq!(h.gateway.len(), 1);
    assert!(h
        .task_run_repo
        .get_by_task_id(&task_id)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_published_eta_honors_defer_policy() {
    let h = harness().await;
    let before = Utc::now();

    h.submission
        .submit("scan-x", "{}", "main-1", None)
        .await
        .unwrap();

    let published = h.gateway.published_signatures();
    assert_eq!(published.len(), 1);
    assert!(published[0].eta >= before + Duration::seconds(EXECUTION_DEFER_SECONDS));

    // eta未到期，消费方现在取不到消息
    assert!(h.gateway.take_due().is_empty());
    assert_eq!(h.gateway.len(), 1);
}

#[tokio::test]
async fn test_worker_lifecycle_and_late_revoke() {
    let h = harness().await;

    let task_id = h
        .submission
        .submit("scan-x", "{}", "main-1", None)
        .await
        .unwrap();

    h.status.mark_received(&task_id).await.unwrap();
    h.status.mark_started(&task_id).await.unwrap();

    // worker已经开始，取消不生效
    assert!(!h.revocation.revoke(&task_id).await.unwrap());

    h.status
        .mark_succeeded(&task_id, Some("完成"))
        .await
        .unwrap();

    let run = h
        .task_run_repo
        .get_by_task_id(&task_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(run.state, TaskRunState::Succeeded);
    assert!(run.started_time.is_some());
    assert!(run.succeeded_time.is_some());
    assert!(run.revoked_time.is_none());
}

#[tokio::test]
async fn test_retry_chain() {
    let h = harness().await;

    let task_id = h
        .submission
        .submit("scan-x", "{\"t\":1}", "main-1", None)
        .await
        .unwrap();
    h.status.mark_received(&task_id).await.unwrap();
    h.status.mark_started(&task_id).await.unwrap();
    h.status
        .mark_failed(&task_id, Some("超时"))
        .await
        .unwrap();

    let new_task_id = h.submission.resubmit(&task_id).await.unwrap();
    assert_ne!(new_task_id, task_id);

    let previous = h
        .task_run_repo
        .get_by_task_id(&task_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(previous.state, TaskRunState::Retried);
    assert!(previous.retried_time.is_some());

    let retry = h
        .task_run_repo
        .get_by_task_id(&new_task_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(retry.state, TaskRunState::Created);
    assert_eq!(retry.last_run_task_id.as_deref(), Some(task_id.as_str()));
    // 两次发布：原始提交与重试提交
    assert_eq!(h.gateway.len(), 2);
}

#[tokio::test]
async fn test_embedded_application_wiring() {
    let app = Application::new_embedded().await.unwrap();

    // 嵌入式库没有主任务，提交走"已发布未入账"分支
    let task_id = app
        .submission()
        .submit("scan-x", "{}", "main-absent", None)
        .await
        .unwrap();
    assert!(!task_id.is_empty());

    // 没有台账行，取消报任务不存在
    assert!(app.revocation().revoke(&task_id).await.is_err());

    app.shutdown().await;
}
