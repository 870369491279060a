use async_trait::async_trait;
use scantask_domain::{entities::TaskMain, repositories::TaskMainRepository};
use sqlx::{PgPool, Row};
use tracing::{debug, instrument};

use scantask_core::CoordinatorResult;

use crate::{
    error_handling::{RepositoryErrorHelpers, RepositoryOperation},
    task_run_context,
};

pub struct PostgresTaskMainRepository {
    pool: PgPool,
}

impl PostgresTaskMainRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_task_main(row: &sqlx::postgres::PgRow) -> CoordinatorResult<TaskMain> {
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
}

#[async_trait]
impl TaskMainRepository for PostgresTaskMainRepository {
    #[instrument(skip(self), fields(task_id = %task_id))]
    async fn get_by_task_id(&self, task_id: &str) -> CoordinatorResult<Option<TaskMain>> {
        let context = task_run_context!(RepositoryOperation::Read, task_id = task_id);

        let row = sqlx::query(
            "SELECT id, task_id, task_name, kw_args, state, workspace_id, is_delete, \
             create_datetime, update_datetime FROM task_main WHERE task_id = $1",
        )
        .bind(task_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepositoryErrorHelpers::task_run_database_error(context, e))?;

        match row {
            Some(row) => {
                let task_main = Self::row_to_task_main(&row)?;
                debug!("查询主任务成功: 任务ID {}", task_main.task_id);
                Ok(Some(task_main))
            }
            None => {
                debug!("查询主任务不存在: 任务ID {}", task_id);
                Ok(None)
            }
        }
    }
}
