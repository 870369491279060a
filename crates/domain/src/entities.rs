use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 任务执行状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TaskRunState {
    #[serde(rename = "CREATED")]
    Created,
    #[serde(rename = "RECEIVED")]
    Received,
    #[serde(rename = "STARTED")]
    Started,
    #[serde(rename = "SUCCEEDED")]
    Succeeded,
    #[serde(rename = "FAILED")]
    Failed,
    #[serde(rename = "REVOKED")]
    Revoked,
    #[serde(rename = "RETRIED")]
    Retried,
}

impl TaskRunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskRunState::Created => "CREATED",
            TaskRunState::Received => "RECEIVED",
            TaskRunState::Started => "STARTED",
            TaskRunState::Succeeded => "SUCCEEDED",
            TaskRunState::Failed => "FAILED",
            TaskRunState::Revoked => "REVOKED",
            TaskRunState::Retried => "RETRIED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "CREATED" => Some(TaskRunState::Created),
            "RECEIVED" => Some(TaskRunState::Received),
            "STARTED" => Some(TaskRunState::Started),
            "SUCCEEDED" => Some(TaskRunState::Succeeded),
            "FAILED" => Some(TaskRunState::Failed),
            "REVOKED" => Some(TaskRunState::Revoked),
            "RETRIED" => Some(TaskRunState::Retried),
            _ => None,
        }
    }

    /// 生命周期图中允许的状态转换
    ///
    /// CREATED -> RECEIVED -> STARTED -> SUCCEEDED | FAILED
    /// FAILED -> RETRIED（新的TaskRun通过last_run_task_id回链）
    /// CREATED -> REVOKED
    pub fn can_transition_to(&self, next: TaskRunState) -> bool {
        matches!(
            (self, next),
            (TaskRunState::Created, TaskRunState::Received)
                | (TaskRunState::Created, TaskRunState::Revoked)
                | (TaskRunState::Received, TaskRunState::Started)
                | (TaskRunState::Started, TaskRunState::Succeeded)
                | (TaskRunState::Started, TaskRunState::Failed)
                | (TaskRunState::Failed, TaskRunState::Retried)
        )
    }

    /// 终止状态：不允许再发生任何转换
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskRunState::Succeeded | TaskRunState::Revoked | TaskRunState::Retried
        )
    }

    /// 该状态对应的时间戳列名，每个时间戳至多被写入一次
    ///
    /// received_time在台账行插入时已经写入，RECEIVED转换不再重复盖写。
    pub fn timestamp_column(&self) -> Option<&'static str> {
        match self {
            TaskRunState::Created | TaskRunState::Received => None,
            TaskRunState::Started => Some("started_time"),
            TaskRunState::Succeeded => Some("succeeded_time"),
            TaskRunState::Failed => Some("failed_time"),
            TaskRunState::Revoked => Some("revoked_time"),
            TaskRunState::Retried => Some("retried_time"),
        }
    }
}

impl std::fmt::Display for TaskRunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl sqlx::Type<sqlx::Postgres> for TaskRunState {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        sqlx::postgres::PgTypeInfo::with_name("VARCHAR")
    }
}

impl sqlx::Type<sqlx::Sqlite> for TaskRunState {
    fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
        <str as sqlx::Type<sqlx::Sqlite>>::type_info()
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Postgres> for TaskRunState {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        TaskRunState::parse(s).ok_or_else(|| format!("Invalid task run state: {s}").into())
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for TaskRunState {
    fn decode(value: sqlx::sqlite::SqliteValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as sqlx::Decode<sqlx::Sqlite>>::decode(value)?;
        TaskRunState::parse(s).ok_or_else(|| format!("Invalid task run state: {s}").into())
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Postgres> for TaskRunState {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        <&str as sqlx::Encode<sqlx::Postgres>>::encode(self.as_str(), buf)
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for TaskRunState {
    fn encode_by_ref(
        &self,
        buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        <&str as sqlx::Encode<sqlx::Sqlite>>::encode(self.as_str(), buf)
    }
}

/// 一次任务执行尝试的台账记录
///
/// 行由代理整数主键和对外可见的task_id字符串键共同标识；
/// 记录只做软删除，作为永久的审计痕迹保留。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRun {
    pub id: i64,
    pub task_id: String,
    pub task_name: String,
    pub kw_args: String,
    pub state: TaskRunState,
    pub main_task_id: String,
    pub last_run_task_id: Option<String>,
    pub workspace_id: i64,
    pub progress_message: Option<String>,
    pub received_time: Option<DateTime<Utc>>,
    pub started_time: Option<DateTime<Utc>>,
    pub succeeded_time: Option<DateTime<Utc>>,
    pub failed_time: Option<DateTime<Utc>>,
    pub revoked_time: Option<DateTime<Utc>>,
    pub retried_time: Option<DateTime<Utc>>,
    pub is_delete: bool,
    pub create_datetime: DateTime<Utc>,
    pub update_datetime: DateTime<Utc>,
}

impl TaskRun {
    pub fn new(
        task_id: String,
        task_name: String,
        kw_args: String,
        main_task_id: String,
        last_run_task_id: Option<String>,
        workspace_id: i64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: 0, // 将由数据库生成
            task_id,
            task_name,
            kw_args,
            state: TaskRunState::Created,
            main_task_id,
            last_run_task_id,
            workspace_id,
            progress_message: None,
            received_time: Some(now),
            started_time: None,
            succeeded_time: None,
            failed_time: None,
            revoked_time: None,
            retried_time: None,
            is_delete: false,
            create_datetime: now,
            update_datetime: now,
        }
    }

    /// 仅CREATED状态的任务允许被取消
    pub fn is_revocable(&self) -> bool {
        matches!(self.state, TaskRunState::Created)
    }

    pub fn is_finished(&self) -> bool {
        matches!(
            self.state,
            TaskRunState::Succeeded | TaskRunState::Failed | TaskRunState::Revoked
        )
    }

    pub fn entity_description(&self) -> String {
        format!(
            "任务执行实例 '{}' (任务ID: {}, 状态: {})",
            self.task_name, self.task_id, self.state
        )
    }
}

/// 顶层工作单元，可派生一个或多个TaskRun子任务
///
/// 本核心只按task_id做只读查询，不修改主任务记录。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskMain {
    pub id: i64,
    pub task_id: String,
    pub task_name: String,
    pub kw_args: String,
    pub state: String,
    pub workspace_id: i64,
    pub is_delete: bool,
    pub create_datetime: DateTime<Utc>,
    pub update_datetime: DateTime<Utc>,
}

/// 监测关键字记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyWord {
    pub id: i64,
    pub org_id: i64,
    pub key_word: String,
    pub search_time: String,
    pub exclude_words: String,
    pub check_mod: String,
    pub count: i64,
    pub workspace_id: i64,
    pub is_delete: bool,
    pub create_datetime: DateTime<Utc>,
    pub update_datetime: DateTime<Utc>,
}

impl KeyWord {
    pub fn new(org_id: i64, key_word: String, workspace_id: i64) -> Self {
        let now = Utc::now();
        Self {
            id: 0, // 将由数据库生成
            org_id,
            key_word,
            search_time: String::new(),
            exclude_words: String::new(),
            check_mod: String::new(),
            count: 0,
            workspace_id,
            is_delete: false,
            create_datetime: now,
            update_datetime: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_transitions_follow_lifecycle_graph() {
        use TaskRunState::*;

        assert!(Created.can_transition_to(Received));
        assert!(Created.can_transition_to(Revoked));
        assert!(Received.can_transition_to(Started));
        assert!(Started.can_transition_to(Succeeded));
        assert!(Started.can_transition_to(Failed));
        assert!(Failed.can_transition_to(Retried));

        // 乱序与回退全部拒绝
        assert!(!Created.can_transition_to(Started));
        assert!(!Created.can_transition_to(Succeeded));
        assert!(!Received.can_transition_to(Revoked));
        assert!(!Started.can_transition_to(Revoked));
        assert!(!Succeeded.can_transition_to(Started));
        assert!(!Revoked.can_transition_to(Received));
        assert!(!Revoked.can_transition_to(Started));
        assert!(!Retried.can_transition_to(Started));
    }

    #[test]
    fn test_terminal_states() {
        assert!(TaskRunState::Succeeded.is_terminal());
        assert!(TaskRunState::Revoked.is_terminal());
        assert!(TaskRunState::Retried.is_terminal());
        assert!(!TaskRunState::Created.is_terminal());
        assert!(!TaskRunState::Failed.is_terminal());
    }

    #[test]
    fn test_state_string_roundtrip() {
        for state in [
            TaskRunState::Created,
            TaskRunState::Received,
            TaskRunState::Started,
            TaskRunState::Succeeded,
            TaskRunState::Failed,
            TaskRunState::Revoked,
            TaskRunState::Retried,
        ] {
            assert_eq!(TaskRunState::parse(state.as_str()), Some(state));
        }
        assert_eq!(TaskRunState::parse("PENDING"), None);
    }

    #[test]
    fn test_new_task_run_defaults() {
        let run = TaskRun::new(
            "uuid-1".to_string(),
            "portscan".to_string(),
            "{}".to_string(),
            "main-1".to_string(),
            None,
            2,
        );
        assert_eq!(run.state, TaskRunState::Created);
        assert!(run.is_revocable());
        assert!(run.received_time.is_some());
        assert!(run.started_time.is_none());
        assert!(run.revoked_time.is_none());
        assert!(!run.is_delete);
        assert_eq!(run.workspace_id, 2);
    }
}
