use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use scantask_application::{TaskRevocationService, TaskStatusService, TaskSubmissionService};
use scantask_core::config::{AppConfig, DatabaseConfig};
use scantask_domain::messaging::BrokerGateway;
use scantask_infrastructure::{DatabaseManager, InMemoryBrokerGateway, RabbitMqBrokerGateway};

/// 主应用程序
///
/// 从配置装配连接池、消息代理网关与协调服务。
pub struct Application {
    db: DatabaseManager,
    submission: TaskSubmissionService,
    revocation: TaskRevocationService,
    status: TaskStatusService,
}

impl Application {
    /// 创建新的应用实例，连接配置指定的数据库与RabbitMQ
    pub async fn new(config: AppConfig) -> Result<Self> {
        info!("初始化应用程序");

        let db = DatabaseManager::new(&config.database)
            .await
            .context("创建数据库连接池失败")?;
        db.health_check().await.context("数据库健康检查失败")?;

        let broker: Arc<dyn BrokerGateway> = Arc::new(
            RabbitMqBrokerGateway::new(config.message_queue.clone())
                .await
                .context("连接消息代理失败")?,
        );

        Ok(Self::assemble(db, broker))
    }

    /// 创建嵌入式应用实例
    ///
    /// 使用内存SQLite与内存消息网关，无需任何外部服务。
    pub async fn new_embedded() -> Result<Self> {
        info!("初始化嵌入式应用程序");

        let database = DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            ..Default::default()
        };
        let db = DatabaseManager::new(&database)
            .await
            .context("创建嵌入式数据库失败")?;

        let broker: Arc<dyn BrokerGateway> = Arc::new(InMemoryBrokerGateway::new());

        Ok(Self::assemble(db, broker))
    }

    fn assemble(db: DatabaseManager, broker: Arc<dyn BrokerGateway>) -> Self {
        let task_run_repo = db.task_run_repository();
        let task_main_repo = db.task_main_repository();

        let submission =
            TaskSubmissionService::new(task_run_repo.clone(), task_main_repo, broker);
        let revocation = TaskRevocationService::new(task_run_repo.clone());
        let status = TaskStatusService::new(task_run_repo);

        Self {
            db,
            submission,
            revocation,
            status,
        }
    }

    pub fn submission(&self) -> &TaskSubmissionService {
        &self.submission
    }

    pub fn revocation(&self) -> &TaskRevocationService {
        &self.revocation
    }

    pub fn status(&self) -> &TaskStatusService {
        &self.status
    }

    pub async fn shutdown(&self) {
        info!("关闭应用程序");
        self.db.close().await;
    }
}
