use async_trait::async_trait;
use scantask_domain::{entities::TaskMain, repositories::TaskMainRepository};
use sqlx::{Row, SqlitePool};
use tracing::{debug, instrument};

use scantask_core::CoordinatorResult;

use crate::{
    error_handling::{RepositoryErrorHelpers, RepositoryOperation},
    task_run_context,
};

pub struct SqliteTaskMainRepository {
    pool: SqlitePool,
}

impl SqliteTaskMainRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_task_main(row: &sqlx::sqlite::SqliteRow) -> CoordinatorResult<TaskMain> {
        Ok(TaskMain {
            id: row.try_get("id")?,
            task_id: row.try_get("task_id")?,
            task_name: row.try_get("task_name")?,
            kw_args: row.try_get("kw_args")?,
            state: row.try_get("state")?,
            workspace_id: row.try_get("workspace_id")?,
            is_delete: row.try_get("is_delete")?,
            create_datetime: row.try_get("create_datetime")?,
            update_datetime: row.try_get("update_datetime")?,
        })
    }

    /// 测试与嵌入式场景使用的插入入口，主任务在生产中由外部系统写入
    pub async fn insert(&self, task_main: &TaskMain) -> CoordinatorResult<TaskMain> {
        let context = task_run_context!(
            RepositoryOperation::Create,
            task_id = task_main.task_id,
            task_name = task_main.task_name
        );

        let row = sqlx::query(
            r#"
            INSERT INTO task_main (task_id, task_name, kw_args, state, workspace_id, is_delete,
                                   create_datetime, update_datetime)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id, task_id, task_name, kw_args, state, workspace_id, is_delete,
                      create_datetime, update_datetime
            "#,
        )
        .bind(&task_main.task_id)
        .bind(&task_main.task_name)
        .bind(&task_main.kw_args)
        .bind(&task_main.state)
        .bind(task_main.workspace_id)
        .bind(task_main.is_delete)
        .bind(task_main.create_datetime)
        .bind(task_main.update_datetime)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| RepositoryErrorHelpers::task_run_database_error(context, e))?;

        Self::row_to_task_main(&row)
    }
}

#[async_trait]
impl TaskMainRepository for SqliteTaskMainRepository {
    #[instrument(skip(self), fields(task_id = %task_id))]
    async fn get_by_task_id(&self, task_id: &str) -> CoordinatorResult<Option<TaskMain>> {
        let context = task_run_context!(RepositoryOperation::Read, task_id = task_id);

        let row = sqlx::query(
            "SELECT id, task_id, task_name, kw_args, state, workspace_id, is_delete, \
             create_datetime, update_datetime FROM task_main WHERE task_id = ?",
        )
        .bind(task_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepositoryErrorHelpers::task_run_database_error(context, e))?;

        match row {
            Some(row) => Ok(Some(Self::row_to_task_main(&row)?)),
            None => {
                debug!("查询主任务不存在: 任务ID {}", task_id);
                Ok(None)
            }
        }
    }
}
