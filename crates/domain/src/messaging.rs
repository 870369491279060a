use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use scantask_core::CoordinatorResult;

/// 任务签名中的命名参数，worker端按名字取值
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SignatureArg {
    pub name: String,
    #[serde(rename = "type")]
    pub arg_type: String,
    pub value: String,
}

impl SignatureArg {
    pub fn string<N: Into<String>, V: Into<String>>(name: N, value: V) -> Self {
        Self {
            name: name.into(),
            arg_type: "string".to_string(),
            value: value.into(),
        }
    }
}

/// 发布到分布式队列的任务签名
///
/// eta之前消息对worker不可见，给台账写入留出提前量。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSignature {
    pub name: String,
    pub uuid: String,
    pub eta: DateTime<Utc>,
    pub args: Vec<SignatureArg>,
}

impl TaskSignature {
    pub fn new(
        task_name: &str,
        task_id: &str,
        eta: DateTime<Utc>,
        main_task_id: &str,
        config_json: &str,
    ) -> Self {
        Self {
            name: task_name.to_string(),
            uuid: task_id.to_string(),
            eta,
            args: vec![
                SignatureArg::string("taskId", task_id),
                SignatureArg::string("mainTaskId", main_task_id),
                SignatureArg::string("configJSON", config_json),
            ],
        }
    }

    /// 距消息可被消费还剩余的时间，已到期时为零
    pub fn delay_from(&self, now: DateTime<Utc>) -> chrono::Duration {
        (self.eta - now).max(chrono::Duration::zero())
    }

    pub fn serialize_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn deserialize_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

/// 消息代理网关抽象接口
#[async_trait]
pub trait BrokerGateway: Send + Sync {
    /// 发布任务签名，消息在签名eta之前不会投递给worker
    async fn publish(&self, signature: &TaskSignature) -> CoordinatorResult<()>;
}
