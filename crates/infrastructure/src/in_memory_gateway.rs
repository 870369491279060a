use async_trait::async_trait;
use chrono::Utc;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tracing::debug;

use scantask_core::CoordinatorResult;
use scantask_domain::messaging::{BrokerGateway, TaskSignature};

/// 内存消息代理网关
///
/// 适用于嵌入式部署与集成测试，签名在eta到期前不会被取出。
#[derive(Debug, Clone, Default)]
pub struct InMemoryBrokerGateway {
    published: Arc<Mutex<VecDeque<TaskSignature>>>,
}

impl InMemoryBrokerGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// 取出所有已到期（eta <= now）的签名，消费方视角
    pub fn take_due(&self) -> Vec<TaskSignature> {
        let now = Utc::now();
        let mut queue = self.published.lock().unwrap();
        let mut due = Vec::new();
        let mut remaining = VecDeque::new();
        while let Some(signature) = queue.pop_front() {
            if signature.eta <= now {
                due.push(signature);
            } else {
                remaining.push_back(signature);
            }
        }
        *queue = remaining;
        due
    }

    /// 当前缓冲的全部签名快照（含未到期），测试断言用
    pub fn published_signatures(&self) -> Vec<TaskSignature> {
        self.published.lock().unwrap().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.published.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.published.lock().unwrap().is_empty()
    }

    pub fn clear(&self) {
        self.published.lock().unwrap().clear();
    }
}

#[async_trait]
impl BrokerGateway for InMemoryBrokerGateway {
    async fn publish(&self, signature: &TaskSignature) -> CoordinatorResult<()> {
        self.published
            .lock()
            .unwrap()
            .push_back(signature.clone());
        debug!("任务签名已入内存队列: {}", signature.uuid);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn test_publish_and_take_due() {
        let gateway = InMemoryBrokerGateway::new();
        let now = Utc::now();

        let due = TaskSignature::new("scan-a", "uuid-due", now - Duration::seconds(1), "m", "{}");
        let pending =
            TaskSignature::new("scan-b", "uuid-later", now + Duration::seconds(60), "m", "{}");
        gateway.publish(&due).await.unwrap();
        gateway.publish(&pending).await.unwrap();
        assert_eq!(gateway.len(), 2);

        let ready = gateway.take_due();
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].uuid, "uuid-due");

        // 未到期的签名保留在队列中
        assert_eq!(gateway.len(), 1);
        assert_eq!(gateway.published_signatures()[0].uuid, "uuid-later");
    }
}
