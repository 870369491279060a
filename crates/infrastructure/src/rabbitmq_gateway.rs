use async_trait::async_trait;
use chrono::Utc;
use lapin::{
    options::*,
    types::{AMQPValue, FieldTable},
    BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use scantask_core::{config::MessageQueueConfig, CoordinatorError, CoordinatorResult};
use scantask_domain::messaging::{BrokerGateway, TaskSignature};

/// RabbitMQ消息代理网关实现
///
/// 通过延迟消息交换机投递任务签名，eta之前worker不可见。
pub struct RabbitMqBrokerGateway {
    connection: Connection,
    channel: Arc<Mutex<Channel>>,
    config: MessageQueueConfig,
}

impl RabbitMqBrokerGateway {
    /// 创建新的RabbitMQ网关实例
    pub async fn new(config: MessageQueueConfig) -> CoordinatorResult<Self> {
        let connection = Connection::connect(&config.url, ConnectionProperties::default())
            .await
            .map_err(|e| CoordinatorError::MessageQueue(format!("连接RabbitMQ失败: {e}")))?;

        let channel = connection
            .create_channel()
            .await
            .map_err(|e| CoordinatorError::MessageQueue(format!("创建通道失败: {e}")))?;

        info!("成功连接到RabbitMQ: {}", config.url);

        let gateway = Self {
            connection,
            channel: Arc::new(Mutex::new(channel)),
            config,
        };

        gateway.initialize_topology().await?;

        Ok(gateway)
    }

    /// 声明延迟交换机、任务队列并建立绑定
    async fn initialize_topology(&self) -> CoordinatorResult<()> {
        let channel = self.channel.lock().await;

        let mut exchange_args = FieldTable::default();
        exchange_args.insert(
            "x-delayed-type".into(),
            AMQPValue::LongString("direct".into()),
        );
        channel
            .exchange_declare(
                &self.config.delayed_exchange,
                ExchangeKind::Custom("x-delayed-message".to_string()),
                ExchangeDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                exchange_args,
            )
            .await
            .map_err(|e| {
                CoordinatorError::MessageQueue(format!(
                    "声明延迟交换机 {} 失败: {e}",
                    self.config.delayed_exchange
                ))
            })?;

        channel
            .queue_declare(
                &self.config.task_queue,
                QueueDeclareOptions {
                    durable: true,
                    exclusive: false,
                    auto_delete: false,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| {
                CoordinatorError::MessageQueue(format!(
                    "声明队列 {} 失败: {e}",
                    self.config.task_queue
                ))
            })?;

        channel
            .queue_bind(
                &self.config.task_queue,
                &self.config.delayed_exchange,
                &self.config.task_queue,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| {
                CoordinatorError::MessageQueue(format!(
                    "绑定队列 {} 到交换机 {} 失败: {e}",
                    self.config.task_queue, self.config.delayed_exchange
                ))
            })?;

        info!("消息拓扑初始化完成");
        Ok(())
    }

    fn serialize_signature(&self, signature: &TaskSignature) -> CoordinatorResult<Vec<u8>> {
        signature
            .serialize_bytes()
            .map_err(|e| CoordinatorError::Serialization(format!("序列化任务签名失败: {e}")))
    }

    /// 获取连接状态
    pub fn is_connected(&self) -> bool {
        self.connection.status().connected()
    }

    /// 关闭连接
    pub async fn close(&self) -> CoordinatorResult<()> {
        self.connection
            .close(200, "正常关闭")
            .await
            .map_err(|e| CoordinatorError::MessageQueue(format!("关闭连接失败: {e}")))?;

        info!("RabbitMQ连接已关闭");
        Ok(())
    }
}

#[async_trait]
impl BrokerGateway for RabbitMqBrokerGateway {
    /// 发布任务签名到延迟交换机
    async fn publish(&self, signature: &TaskSignature) -> CoordinatorResult<()> {
        let channel = self.channel.lock().await;
        let payload = self.serialize_signature(signature)?;

        let delay_ms = signature.delay_from(Utc::now()).num_milliseconds();
        let mut headers = FieldTable::default();
        headers.insert("x-delay".into(), AMQPValue::LongLongInt(delay_ms));

        let confirm = channel
            .basic_publish(
                &self.config.delayed_exchange,
                &self.config.task_queue,
                BasicPublishOptions::default(),
                &payload,
                BasicProperties::default()
                    .with_delivery_mode(2) // 2 = persistent
                    .with_message_id(signature.uuid.as_str().into())
                    .with_headers(headers),
            )
            .await
            .map_err(|e| {
                CoordinatorError::MessageQueue(format!(
                    "发布任务 {} 到队列 {} 失败: {e}",
                    signature.uuid, self.config.task_queue
                ))
            })?;

        // 等待确认
        confirm
            .await
            .map_err(|e| CoordinatorError::MessageQueue(format!("消息发布确认失败: {e}")))?;

        debug!(
            "任务签名已发布: {} (延迟 {}ms)",
            signature.uuid, delay_ms
        );
        Ok(())
    }
}
