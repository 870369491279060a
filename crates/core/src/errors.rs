use thiserror::Error;

/// 协调器错误类型定义
#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("数据库操作错误: {0}")]
    DatabaseOperation(String),

    #[error("任务未找到: {task_id}")]
    TaskNotFound { task_id: String },

    #[error("主任务未找到: {task_id}")]
    MainTaskNotFound { task_id: String },

    #[error("关键字记录未找到: {id}")]
    KeyWordNotFound { id: i64 },

    #[error("非法状态转换: 任务 {task_id} 不能从 {from} 转换到 {to}")]
    InvalidTransition {
        task_id: String,
        from: String,
        to: String,
    },

    #[error("消息队列错误: {0}")]
    MessageQueue(String),

    #[error("序列化错误: {0}")]
    Serialization(String),

    #[error("配置错误: {0}")]
    Configuration(String),

    #[error("数据验证失败: {0}")]
    ValidationError(String),

    #[error("内部错误: {0}")]
    Internal(String),
}

impl CoordinatorError {
    pub fn database_error<S: Into<String>>(msg: S) -> Self {
        Self::DatabaseOperation(msg.into())
    }
    pub fn task_not_found<S: Into<String>>(task_id: S) -> Self {
        Self::TaskNotFound {
            task_id: task_id.into(),
        }
    }
    pub fn main_task_not_found<S: Into<String>>(task_id: S) -> Self {
        Self::MainTaskNotFound {
            task_id: task_id.into(),
        }
    }
    pub fn message_queue<S: Into<String>>(msg: S) -> Self {
        Self::MessageQueue(msg.into())
    }
    pub fn config_error<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }
    pub fn validation_error<S: Into<String>>(msg: S) -> Self {
        Self::ValidationError(msg.into())
    }
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CoordinatorError::Database(_)
                | CoordinatorError::DatabaseOperation(_)
                | CoordinatorError::MessageQueue(_)
        )
    }
    pub fn user_message(&self) -> &str {
        match self {
            CoordinatorError::TaskNotFound { .. } => "请求的任务不存在",
            CoordinatorError::MainTaskNotFound { .. } => "请求的主任务不存在",
            CoordinatorError::KeyWordNotFound { .. } => "请求的关键字记录不存在",
            CoordinatorError::InvalidTransition { .. } => "任务状态不允许此操作",
            CoordinatorError::ValidationError(_) => "输入数据验证失败",
            _ => "系统繁忙，请稍后重试",
        }
    }
}

impl From<serde_json::Error> for CoordinatorError {
    fn from(err: serde_json::Error) -> Self {
        CoordinatorError::Serialization(err.to_string())
    }
}

impl From<anyhow::Error> for CoordinatorError {
    fn from(err: anyhow::Error) -> Self {
        CoordinatorError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoordinatorError::task_not_found("abc-123");
        assert_eq!(err.to_string(), "任务未找到: abc-123");

        let err = CoordinatorError::InvalidTransition {
            task_id: "abc-123".to_string(),
            from: "SUCCEEDED".to_string(),
            to: "STARTED".to_string(),
        };
        assert!(err.to_string().contains("SUCCEEDED"));
        assert!(err.to_string().contains("STARTED"));
    }

    #[test]
    fn test_is_retryable() {
        assert!(CoordinatorError::MessageQueue("连接失败".to_string()).is_retryable());
        assert!(CoordinatorError::database_error("超时").is_retryable());
        assert!(!CoordinatorError::task_not_found("x").is_retryable());
        assert!(!CoordinatorError::config_error("bad").is_retryable());
    }
}
