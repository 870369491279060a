//! Enhanced error handling for repository operations with rich context
//!
//! This module provides context-rich error helpers for all repository
//! operations, including entity information, operation context, and
//! structured logging.

use chrono::{DateTime, Utc};
use scantask_core::CoordinatorError;
use scantask_domain::entities::TaskRunState;
use sqlx::Error as SqlxError;
use std::fmt;
use tracing::{error, info, instrument, warn};

/// Operation context for repository operations
#[derive(Debug, Clone)]
pub enum RepositoryOperation {
    Create,
    Read,
    Update,
    Delete,
    Query,
    Revoke,
}

impl fmt::Display for RepositoryOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepositoryOperation::Create => write!(f, "创建"),
            RepositoryOperation::Read => write!(f, "查询"),
            RepositoryOperation::Update => write!(f, "更新"),
            RepositoryOperation::Delete => write!(f, "删除"),
            RepositoryOperation::Query => write!(f, "查询"),
            RepositoryOperation::Revoke => write!(f, "取消"),
        }
    }
}

/// Context information for task run repository operations
#[derive(Debug, Clone)]
pub struct TaskRunOperationContext {
    pub operation: RepositoryOperation,
    pub task_id: Option<String>,
    pub task_name: Option<String>,
    pub state: Option<TaskRunState>,
    pub timestamp: DateTime<Utc>,
    pub additional_info: Option<String>,
}

impl TaskRunOperationContext {
    pub fn new(operation: RepositoryOperation) -> Self {
        Self {
            operation,
            task_id: None,
            task_name: None,
            state: None,
            timestamp: Utc::now(),
            additional_info: None,
        }
    }

    pub fn with_task_id(mut self, task_id: String) -> Self {
        self.task_id = Some(task_id);
        self
    }

    pub fn with_task_name(mut self, task_name: String) -> Self {
        self.task_name = Some(task_name);
        self
    }

    pub fn with_state(mut self, state: TaskRunState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn with_additional_info(mut self, info: String) -> Self {
        self.additional_info = Some(info);
        self
    }

    pub fn entity_description(&self) -> String {
        match (&self.task_id, &self.task_name) {
            (Some(id), Some(name)) => format!("任务执行实例 '{}' (任务ID: {})", name, id),
            (Some(id), None) => format!("任务执行实例 (任务ID: {})", id),
            (None, Some(name)) => format!("任务执行实例 '{}'", name),
            (None, None) => "任务执行实例".to_string(),
        }
    }
}

/// Context information for key word repository operations
#[derive(Debug, Clone)]
pub struct KeyWordOperationContext {
    pub operation: RepositoryOperation,
    pub id: Option<i64>,
    pub key_word: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub additional_info: Option<String>,
}

impl KeyWordOperationContext {
    pub fn new(operation: RepositoryOperation) -> Self {
        Self {
            operation,
            id: None,
            key_word: None,
            timestamp: Utc::now(),
            additional_info: None,
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_key_word(mut self, key_word: String) -> Self {
        self.key_word = Some(key_word);
        self
    }

    pub fn with_additional_info(mut self, info: String) -> Self {
        self.additional_info = Some(info);
        self
    }

    pub fn entity_description(&self) -> String {
        match (&self.id, &self.key_word) {
            (Some(id), Some(word)) => format!("关键字 '{}' (ID: {})", word, id),
            (Some(id), None) => format!("关键字 (ID: {})", id),
            (None, Some(word)) => format!("关键字 '{}'", word),
            (None, None) => "关键字".to_string(),
        }
    }
}

/// Context information for message queue operations
#[derive(Debug, Clone)]
pub struct MessageQueueOperationContext {
    pub operation: RepositoryOperation,
    pub queue_name: Option<String>,
    pub message_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub additional_info: Option<String>,
}

impl MessageQueueOperationContext {
    pub fn new(operation: RepositoryOperation) -> Self {
        Self {
            operation,
            queue_name: None,
            message_id: None,
            timestamp: Utc::now(),
            additional_info: None,
        }
    }

    pub fn with_queue_name(mut self, queue_name: String) -> Self {
        self.queue_name = Some(queue_name);
        self
    }

    pub fn with_message_id(mut self, message_id: String) -> Self {
        self.message_id = Some(message_id);
        self
    }

    pub fn with_additional_info(mut self, info: String) -> Self {
        self.additional_info = Some(info);
        self
    }

    pub fn entity_description(&self) -> String {
        match (&self.queue_name, &self.message_id) {
            (Some(queue), Some(msg_id)) => format!("消息队列 '{}' 中的消息 '{}'", queue, msg_id),
            (Some(queue), None) => format!("消息队列 '{}'", queue),
            (None, Some(msg_id)) => format!("消息 '{}'", msg_id),
            (None, None) => "消息队列".to_string(),
        }
    }
}

/// Enhanced error helpers for repository operations
pub struct RepositoryErrorHelpers;

impl RepositoryErrorHelpers {
    /// Create a database error with task run context
    #[instrument(skip_all, fields(
        operation = %context.operation,
        task_id = ?context.task_id,
        task_name = ?context.task_name,
        state = ?context.state,
        timestamp = %context.timestamp,
    ))]
    pub fn task_run_database_error(
        context: TaskRunOperationContext,
        error: SqlxError,
    ) -> CoordinatorError {
        let entity_desc = context.entity_description();
        let operation_desc = context.operation.to_string();

        let error_msg = match &error {
            SqlxError::Database(ref db_error) => {
                if let Some(constraint) = db_error.constraint() {
                    match constraint {
                        "task_run_task_id_key" => {
                            let msg = format!(
                                "{}{}时发生唯一约束冲突: 任务ID '{}' 已存在",
                                operation_desc,
                                entity_desc,
                                context.task_id.as_deref().unwrap_or("未知")
                            );
                            error!(error = %error, constraint = constraint, "{}", msg);
                            return CoordinatorError::database_error(msg);
                        }
                        "task_run_main_task_id_fkey" => {
                            let msg = format!(
                                "{}{}时发生外键约束冲突: 关联的主任务不存在",
                                operation_desc, entity_desc
                            );
                            error!(error = %error, constraint = constraint, "{}", msg);
                            return CoordinatorError::database_error(msg);
                        }
                        _ => {
                            format!(
                                "{}{}时发生数据库约束冲突: {}",
                                operation_desc, entity_desc, constraint
                            )
                        }
                    }
                } else {
                    format!(
                        "{}{}时发生数据库错误: {}",
                        operation_desc, entity_desc, db_error
                    )
                }
            }
            SqlxError::PoolClosed => {
                format!("{}{}时数据库连接池已关闭", operation_desc, entity_desc)
            }
            SqlxError::PoolTimedOut => {
                format!("{}{}时数据库连接池超时", operation_desc, entity_desc)
            }
            SqlxError::Io(ref io_error) => {
                format!(
                    "{}{}时发生I/O错误: {}",
                    operation_desc, entity_desc, io_error
                )
            }
            _ => {
                format!(
                    "{}{}时发生未知数据库错误: {}",
                    operation_desc, entity_desc, error
                )
            }
        };

        error!(error = %error, "{}", error_msg);
        CoordinatorError::database_error(error_msg)
    }

    /// Create a database error with key word context
    #[instrument(skip_all, fields(
        operation = %context.operation,
        id = ?context.id,
        key_word = ?context.key_word,
        timestamp = %context.timestamp,
    ))]
    pub fn key_word_database_error(
        context: KeyWordOperationContext,
        error: SqlxError,
    ) -> CoordinatorError {
        let entity_desc = context.entity_description();
        let operation_desc = context.operation.to_string();

        let error_msg = format!(
            "{}{}时发生数据库错误: {}",
            operation_desc, entity_desc, error
        );
        error!(error = %error, "{}", error_msg);
        CoordinatorError::database_error(error_msg)
    }

    /// Create a message queue error with context
    #[instrument(skip_all, fields(
        operation = %context.operation,
        queue_name = ?context.queue_name,
        message_id = ?context.message_id,
        timestamp = %context.timestamp,
    ))]
    pub fn message_queue_error(
        context: MessageQueueOperationContext,
        error: impl fmt::Display,
    ) -> CoordinatorError {
        let entity_desc = context.entity_description();
        let operation_desc = context.operation.to_string();

        let error_msg = format!(
            "{}{}时发生消息队列错误: {}",
            operation_desc, entity_desc, error
        );

        error!(error = %error, "{}", error_msg);
        CoordinatorError::MessageQueue(error_msg)
    }

    /// Log successful repository operation for task run operations
    #[instrument(skip_all, fields(
        operation = %context.operation,
        entity_desc = %entity_desc,
        timestamp = %context.timestamp,
    ))]
    pub fn log_operation_success_task_run(
        context: TaskRunOperationContext,
        entity_desc: &str,
        additional_info: Option<&str>,
    ) {
        let operation_desc = context.operation.to_string();
        let base_msg = format!("{}{}成功", operation_desc, entity_desc);

        if let Some(info) = additional_info {
            info!("{}: {}", base_msg, info);
        } else {
            info!("{}", base_msg);
        }
    }

    /// Log successful repository operation for key word operations
    #[instrument(skip_all, fields(
        operation = %context.operation,
        entity_desc = %entity_desc,
        timestamp = %context.timestamp,
    ))]
    pub fn log_operation_success_key_word(
        context: KeyWordOperationContext,
        entity_desc: &str,
        additional_info: Option<&str>,
    ) {
        let operation_desc = context.operation.to_string();
        let base_msg = format!("{}{}成功", operation_desc, entity_desc);

        if let Some(info) = additional_info {
            info!("{}: {}", base_msg, info);
        } else {
            info!("{}", base_msg);
        }
    }

    /// Log warning for task run operations
    #[instrument(skip_all, fields(
        operation = %context.operation,
        entity_desc = %entity_desc,
        timestamp = %context.timestamp,
    ))]
    pub fn log_operation_warning_task_run(
        context: TaskRunOperationContext,
        entity_desc: &str,
        warning: &str,
    ) {
        let operation_desc = context.operation.to_string();

        warn!("{}{}时警告: {}", operation_desc, entity_desc, warning);
    }

    /// Create a task run not found error with context
    pub fn task_run_not_found(context: TaskRunOperationContext) -> CoordinatorError {
        let entity_desc = context.entity_description();
        let operation_desc = context.operation.to_string();

        let error_msg = format!("{}{}时未找到: 记录不存在", operation_desc, entity_desc);

        error!("{}", error_msg);
        CoordinatorError::TaskNotFound {
            task_id: context.task_id.unwrap_or_default(),
        }
    }

    /// Create a key word not found error with context
    pub fn key_word_not_found(context: KeyWordOperationContext) -> CoordinatorError {
        let entity_desc = context.entity_description();
        let operation_desc = context.operation.to_string();

        let error_msg = format!("{}{}时未找到: 记录不存在", operation_desc, entity_desc);

        error!("{}", error_msg);
        CoordinatorError::KeyWordNotFound {
            id: context.id.unwrap_or(0),
        }
    }
}

/// Macro for creating task run operation context easily
#[macro_export]
macro_rules! task_run_context {
    ($operation:expr) => {
        $crate::error_handling::TaskRunOperationContext::new($operation)
    };
    ($operation:expr, task_id = $task_id:expr) => {
        $crate::error_handling::TaskRunOperationContext::new($operation)
            .with_task_id($task_id.to_string())
    };
    ($operation:expr, task_id = $task_id:expr, task_name = $task_name:expr) => {
        $crate::error_handling::TaskRunOperationContext::new($operation)
            .with_task_id($task_id.to_string())
            .with_task_name($task_name.to_string())
    };
}

/// Macro for creating key word operation context easily
#[macro_export]
macro_rules! key_word_context {
    ($operation:expr) => {
        $crate::error_handling::KeyWordOperationContext::new($operation)
    };
    ($operation:expr, id = $id:expr) => {
        $crate::error_handling::KeyWordOperationContext::new($operation).with_id($id)
    };
}

/// Macro for creating message queue operation context easily
#[macro_export]
macro_rules! message_queue_context {
    ($operation:expr) => {
        $crate::error_handling::MessageQueueOperationContext::new($operation)
    };
    ($operation:expr, queue = $queue:expr) => {
        $crate::error_handling::MessageQueueOperationContext::new($operation)
            .with_queue_name($queue.to_string())
    };
    ($operation:expr, queue = $queue:expr, message_id = $message_id:expr) => {
        $crate::error_handling::MessageQueueOperationContext::new($operation)
            .with_queue_name($queue.to_string())
            .with_message_id($message_id.to_string())
    };
}
