use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use scantask_core::{CoordinatorError, CoordinatorResult};
use scantask_domain::entities::{TaskRun, TaskRunState};
use scantask_domain::messaging::{BrokerGateway, TaskSignature};
use scantask_domain::repositories::{TaskMainRepository, TaskRunRepository, TaskStateUpdate};

/// 发布后延迟执行的固定策略（秒），给台账写入留出提前量
pub const EXECUTION_DEFER_SECONDS: i64 = 5;
/// kw_args入库的最大长度，超出部分截断入库
pub const KW_ARGS_MAX_LEN: usize = 6000;
const TRUNCATION_MARKER: &str = "...";

/// 任务提交服务 - 负责发布任务签名到消息代理并登记台账
///
/// 先发布后入账：broker接受消息即视为提交成功，之后的台账
/// 问题（主任务缺失、写入失败）只记录日志，不向调用方上抛。
pub struct TaskSubmissionService {
    task_run_repo: Arc<dyn TaskRunRepository>,
    task_main_repo: Arc<dyn TaskMainRepository>,
    broker: Arc<dyn BrokerGateway>,
}

impl TaskSubmissionService {
    pub fn new(
        task_run_repo: Arc<dyn TaskRunRepository>,
        task_main_repo: Arc<dyn TaskMainRepository>,
        broker: Arc<dyn BrokerGateway>,
    ) -> Self {
        Self {
            task_run_repo,
            task_main_repo,
            broker,
        }
    }

    /// 提交一个新的执行任务，返回生成的task_id
    pub async fn submit(
        &self,
        task_name: &str,
        config_json: &str,
        main_task_id: &str,
        last_run_task_id: Option<&str>,
    ) -> CoordinatorResult<String> {
        let span = tracing::debug_span!("submit_task", task_name = %task_name, main_task_id = %main_task_id);
        let _guard = span.enter();

        let task_id = Uuid::new_v4().to_string();
        // 延迟5秒后执行
        let eta = Utc::now() + Duration::seconds(EXECUTION_DEFER_SECONDS);
        let signature = TaskSignature::new(task_name, &task_id, eta, main_task_id, config_json);

        if let Err(e) = self.broker.publish(&signature).await {
            error!("发布任务 {} 到消息代理失败: {}", task_name, e);
            return Err(e);
        }

        // broker已接受消息，调用方从这里开始总能拿到task_id
        self.record_task(&task_id, task_name, config_json, main_task_id, last_run_task_id)
            .await;

        info!("任务已提交: {} ({})", task_name, task_id);
        Ok(task_id)
    }

    /// 将任务写入台账
    async fn record_task(
        &self,
        task_id: &str,
        task_name: &str,
        config_json: &str,
        main_task_id: &str,
        last_run_task_id: Option<&str>,
    ) {
        let task_main = match self.task_main_repo.get_by_task_id(main_task_id).await {
            Ok(Some(task_main)) => task_main,
            Ok(None) => {
                error!("新任务入账失败: 主任务 {} 不存在", main_task_id);
                return;
            }
            Err(e) => {
                error!("新任务入账失败: 查询主任务 {} 出错: {}", main_task_id, e);
                return;
            }
        };

        // kw_args可能因为目标很多超过字段设计长度，入库前做截断
        let kw_args = truncate_kw_args(config_json);
        let task_run = TaskRun::new(
            task_id.to_string(),
            task_name.to_string(),
            kw_args,
            main_task_id.to_string(),
            last_run_task_id.map(str::to_string),
            task_main.workspace_id,
        );

        if let Err(e) = self.task_run_repo.create(&task_run).await {
            error!("新任务入账失败: {},{},{}", task_id, task_name, e);
        }
    }

    /// 重试一个失败的任务
    ///
    /// 旧记录先标记为RETRIED，新任务以last_run_task_id回链提交。
    pub async fn resubmit(&self, task_id: &str) -> CoordinatorResult<String> {
        let previous = self
            .task_run_repo
            .get_by_task_id(task_id)
            .await?
            .ok_or_else(|| CoordinatorError::task_not_found(task_id))?;

        if !previous.state.can_transition_to(TaskRunState::Retried) {
            return Err(CoordinatorError::InvalidTransition {
                task_id: task_id.to_string(),
                from: previous.state.to_string(),
                to: TaskRunState::Retried.to_string(),
            });
        }

        self.task_run_repo
            .update_state(
                task_id,
                &TaskStateUpdate::new(TaskRunState::Retried, Utc::now()),
            )
            .await?;

        match self
            .submit(
                &previous.task_name,
                &previous.kw_args,
                &previous.main_task_id,
                Some(task_id),
            )
            .await
        {
            Ok(new_task_id) => {
                info!("任务已重试: {} -> {}", task_id, new_task_id);
                Ok(new_task_id)
            }
            Err(e) => {
                warn!("任务 {} 已标记RETRIED但重新提交失败: {}", task_id, e);
                Err(e)
            }
        }
    }
}

/// UTF-8字符边界安全的截断，超长时附加截断标记
fn truncate_kw_args(kw_args: &str) -> String {
    if kw_args.len() <= KW_ARGS_MAX_LEN {
        return kw_args.to_string();
    }
    let mut end = KW_ARGS_MAX_LEN;
    while !kw_args.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}{}", &kw_args[..end], TRUNCATION_MARKER)
}

#[cfg(test)]
mod tests {
    use super::*;
    use scantask_testing_utils::{
        MockBrokerGateway, MockTaskMainRepository, MockTaskRunRepository, TaskMainBuilder,
    };

    struct Fixture {
        task_run_repo: Arc<MockTaskRunRepository>,
        broker: Arc<MockBrokerGateway>,
        service: TaskSubmissionService,
    }

    fn fixture_with_main(main_task_id: &str, workspace_id: i64) -> Fixture {
        let task_run_repo = Arc::new(MockTaskRunRepository::new());
        let task_main_repo = Arc::new(MockTaskMainRepository::with_task_mains(vec![
            TaskMainBuilder::new()
                .with_task_id(main_task_id)
                .with_workspace_id(workspace_id)
                .build(),
        ]));
        let broker = Arc::new(MockBrokerGateway::new());
        let service = TaskSubmissionService::new(
            task_run_repo.clone(),
            task_main_repo,
            broker.clone(),
        );
        Fixture {
            task_run_repo,
            broker,
            service,
        }
    }

    #[tokio::test]
    async fn test_submit_publishes_and_records() {
        let fx = fixture_with_main("main-1", 7);
        let before = Utc::now();

        let task_id = fx
            .service
            .submit("portscan", "{\"target\":\"a\"}", "main-1", None)
            .await
            .unwrap();

        // 返回的task_id是合法UUID
        assert!(Uuid::parse_str(&task_id).is_ok());

        // 消息eta不早于调用时刻+5秒
        let published = fx.broker.published_signatures();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].uuid, task_id);
        assert!(published[0].eta >= before + Duration::seconds(EXECUTION_DEFER_SECONDS));

        // 台账行以CREATED状态登记，workspace_id从主任务复制
        let run = fx.task_run_repo.get(&task_id).unwrap();
        assert_eq!(run.state, TaskRunState::Created);
        assert_eq!(run.workspace_id, 7);
        assert_eq!(run.kw_args, "{\"target\":\"a\"}");
        assert!(run.received_time.is_some());
    }

    #[tokio::test]
    async fn test_submit_generates_unique_task_ids() {
        let fx = fixture_with_main("main-1", 1);

        let first = fx.service.submit("scan", "{}", "main-1", None).await.unwrap();
        let second = fx.service.submit("scan", "{}", "main-1", None).await.unwrap();
        assert_ne!(first, second);
        assert_eq!(fx.task_run_repo.count(), 2);
    }

    #[tokio::test]
    async fn test_submit_publish_failure_leaves_no_ledger_row() {
        let fx = fixture_with_main("main-1", 1);
        fx.broker.set_fail_publish(true);

        let result = fx.service.submit("portscan", "{}", "main-1", None).await;
        assert!(matches!(result, Err(CoordinatorError::MessageQueue(_))));
        assert_eq!(fx.task_run_repo.count(), 0);
        assert_eq!(fx.broker.published_count(), 0);
    }

    #[tokio::test]
    async fn test_submit_missing_main_task_still_returns_task_id() {
        let fx = fixture_with_main("main-1", 1);

        // 主任务不存在：发布成功，拿到task_id，但没有台账行
        let task_id = fx
            .service
            .submit("portscan", "{}", "missing", None)
            .await
            .unwrap();
        assert!(!task_id.is_empty());
        assert_eq!(fx.broker.published_count(), 1);
        assert_eq!(fx.task_run_repo.count(), 0);
    }

    #[tokio::test]
    async fn test_submit_ledger_failure_not_surfaced() {
        let fx = fixture_with_main("main-1", 1);
        fx.task_run_repo.set_fail_create(true);

        let result = fx.service.submit("portscan", "{}", "main-1", None).await;
        assert!(result.is_ok());
        assert_eq!(fx.broker.published_count(), 1);
        assert_eq!(fx.task_run_repo.count(), 0);
    }

    #[tokio::test]
    async fn test_submit_truncates_oversized_kw_args() {
        let fx = fixture_with_main("main-1", 1);
        let config: String = "x".repeat(KW_ARGS_MAX_LEN + 500);

        let task_id = fx
            .service
            .submit("portscan", &config, "main-1", None)
            .await
            .unwrap();

        let run = fx.task_run_repo.get(&task_id).unwrap();
        assert_eq!(run.kw_args.len(), KW_ARGS_MAX_LEN + TRUNCATION_MARKER.len());
        assert!(run.kw_args.ends_with(TRUNCATION_MARKER));

        // 发布给broker的签名仍携带完整配置
        let published = fx.broker.published_signatures();
        assert_eq!(published[0].args[2].value, config);
    }

    #[tokio::test]
    async fn test_submit_keeps_kw_args_at_limit_verbatim() {
        let fx = fixture_with_main("main-1", 1);
        let config: String = "y".repeat(KW_ARGS_MAX_LEN);

        let task_id = fx
            .service
            .submit("portscan", &config, "main-1", None)
            .await
            .unwrap();

        let run = fx.task_run_repo.get(&task_id).unwrap();
        assert_eq!(run.kw_args, config);
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        // 多字节字符跨越截断点时回退到字符边界
        let config = "汉".repeat(KW_ARGS_MAX_LEN / 3 + 10);
        let truncated = truncate_kw_args(&config);
        assert!(truncated.len() <= KW_ARGS_MAX_LEN + TRUNCATION_MARKER.len());
        assert!(truncated.ends_with(TRUNCATION_MARKER));
        // 不能panic，且内容仍是合法UTF-8前缀
        assert!(config.starts_with(truncated.trim_end_matches(TRUNCATION_MARKER)));
    }

    #[tokio::test]
    async fn test_resubmit_chains_failed_run() {
        let fx = fixture_with_main("main-1", 1);
        let task_id = fx
            .service
            .submit("portscan", "{\"t\":1}", "main-1", None)
            .await
            .unwrap();

        // 走到FAILED后重试
        for state in [
            TaskRunState::Received,
            TaskRunState::Started,
            TaskRunState::Failed,
        ] {
            fx.task_run_repo
                .update_state(&task_id, &TaskStateUpdate::new(state, Utc::now()))
                .await
                .unwrap();
        }

        let new_task_id = fx.service.resubmit(&task_id).await.unwrap();
        assert_ne!(new_task_id, task_id);

        let previous = fx.task_run_repo.get(&task_id).unwrap();
        assert_eq!(previous.state, TaskRunState::Retried);
        assert!(previous.retried_time.is_some());

        let retry = fx.task_run_repo.get(&new_task_id).unwrap();
        assert_eq!(retry.state, TaskRunState::Created);
        assert_eq!(retry.last_run_task_id.as_deref(), Some(task_id.as_str()));
        assert_eq!(retry.kw_args, "{\"t\":1}");
    }

    #[tokio::test]
    async fn test_resubmit_rejects_unfailed_run() {
        let fx = fixture_with_main("main-1", 1);
        let task_id = fx
            .service
            .submit("portscan", "{}", "main-1", None)
            .await
            .unwrap();

        let result = fx.service.resubmit(&task_id).await;
        assert!(matches!(
            result,
            Err(CoordinatorError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn test_resubmit_missing_task() {
        let fx = fixture_with_main("main-1", 1);
        let result = fx.service.resubmit("missing").await;
        assert!(matches!(result, Err(CoordinatorError::TaskNotFound { .. })));
    }
}
