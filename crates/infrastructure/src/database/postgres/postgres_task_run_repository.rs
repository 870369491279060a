use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scantask_domain::{
    entities::{TaskRun, TaskRunState},
    query_filter::{FilterSet, SqlDialect},
    repositories::{TaskRunRepository, TaskStateUpdate},
};
use sqlx::{PgPool, Row};
use tracing::{debug, instrument};

use scantask_core::CoordinatorResult;

use crate::{
    database::bind_pg_filter_params,
    error_handling::{RepositoryErrorHelpers, RepositoryOperation},
    task_run_context,
};

const TASK_RUN_COLUMNS: &str = "id, task_id, task_name, kw_args, state, main_task_id, \
     last_run_task_id, workspace_id, progress_message, received_time, started_time, \
     succeeded_time, failed_time, revoked_time, retried_time, is_delete, create_datetime, \
     update_datetime";

pub struct PostgresTaskRunRepository {
    pool: PgPool,
}

impl PostgresTaskRunRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_task_run(row: &sqlx::postgres::PgRow) -> CoordinatorResult<TaskRun> {
        Ok(TaskRun {
            id: row.try_get("id")?,
            task_id: row.try_get("task_id")?,
            task_name: row.try_get("task_name")?,
            kw_args: row.try_get("kw_args")?,
            state: row.try_get("state")?,
            main_task_id: row.try_get("main_task_id")?,
            last_run_task_id: row.try_get("last_run_task_id")?,
            workspace_id: row.try_get("workspace_id")?,
            progress_message: row.try_get("progress_message")?,
            received_time: row.try_get("received_time")?,
            started_time: row.try_get("started_time")?,
            succeeded_time: row.try_get("succeeded_time")?,
            failed_time: row.try_get("failed_time")?,
            revoked_time: row.try_get("revoked_time")?,
            retried_time: row.try_get("retried_time")?,
            is_delete: row.try_get("is_delete")?,
            create_datetime: row.try_get("create_datetime")?,
            update_datetime: row.try_get("update_datetime")?,
        })
    }
}

#[async_trait]
impl TaskRunRepository for PostgresTaskRunRepository {
    #[instrument(skip(self, task_run), fields(
        task_id = %task_run.task_id,
        task_name = %task_run.task_name,
        state = ?task_run.state,
    ))]
    async fn create(&self, task_run: &TaskRun) -> CoordinatorResult<TaskRun> {
        let context = task_run_context!(
            RepositoryOperation::Create,
            task_id = task_run.task_id,
            task_name = task_run.task_name
        )
        .with_state(task_run.state);

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO task_run (task_id, task_name, kw_args, state, main_task_id, last_run_task_id,
                                  workspace_id, progress_message, received_time, started_time,
                                  succeeded_time, failed_time, revoked_time, retried_time,
                                  is_delete, create_datetime, update_datetime)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            RETURNING {TASK_RUN_COLUMNS}
            "#
        ))
        .bind(&task_run.task_id)
        .bind(&task_run.task_name)
        .bind(&task_run.kw_args)
        .bind(task_run.state)
        .bind(&task_run.main_task_id)
        .bind(&task_run.last_run_task_id)
        .bind(task_run.workspace_id)
        .bind(&task_run.progress_message)
        .bind(task_run.received_time)
        .bind(task_run.started_time)
        .bind(task_run.succeeded_time)
        .bind(task_run.failed_time)
        .bind(task_run.revoked_time)
        .bind(task_run.retried_time)
        .bind(task_run.is_delete)
        .bind(task_run.create_datetime)
        .bind(task_run.update_datetime)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| RepositoryErrorHelpers::task_run_database_error(context.clone(), e))?;

        let created_run = Self::row_to_task_run(&row)?;
        RepositoryErrorHelpers::log_operation_success_task_run(
            context,
            &created_run.entity_description(),
            Some(&format!("主任务: {}", created_run.main_task_id)),
        );
        Ok(created_run)
    }

    #[instrument(skip(self), fields(task_id = %task_id))]
    async fn get_by_task_id(&self, task_id: &str) -> CoordinatorResult<Option<TaskRun>> {
        let context = task_run_context!(RepositoryOperation::Read, task_id = task_id);

        let row = sqlx::query(&format!(
            "SELECT {TASK_RUN_COLUMNS} FROM task_run WHERE task_id = $1"
        ))
        .bind(task_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepositoryErrorHelpers::task_run_database_error(context.clone(), e))?;

        match row {
            Some(row) => {
                let task_run = Self::row_to_task_run(&row)?;
                debug!(
                    "查询任务执行实例成功: 任务ID {}, 状态: {}",
                    task_run.task_id, task_run.state
                );
                Ok(Some(task_run))
            }
            None => {
                debug!("查询任务执行实例不存在: 任务ID {}", task_id);
                Ok(None)
            }
        }
    }

    #[instrument(skip(self, update), fields(task_id = %task_id, state = ?update.state))]
    async fn update_state(
        &self,
        task_id: &str,
        update: &TaskStateUpdate,
    ) -> CoordinatorResult<()> {
        let context = task_run_context!(RepositoryOperation::Update, task_id = task_id)
            .with_state(update.state)
            .with_additional_info(format!("状态变更为 {}", update.state));

        // 列名来自状态机的封闭映射，参数全部绑定
        let mut sql = String::from("UPDATE task_run SET state = $1, update_datetime = $2");
        let mut next_index = 3;
        if let Some(column) = update.state.timestamp_column() {
            sql.push_str(&format!(", {column} = ${next_index}"));
            next_index += 1;
        }
        if update.progress_message.is_some() {
            sql.push_str(&format!(", progress_message = ${next_index}"));
            next_index += 1;
        }
        sql.push_str(&format!(" WHERE task_id = ${next_index}"));

        let mut query = sqlx::query(&sql).bind(update.state).bind(update.at);
        if update.state.timestamp_column().is_some() {
            query = query.bind(update.at);
        }
        if let Some(message) = &update.progress_message {
            query = query.bind(message);
        }
        let result = query
            .bind(task_id)
            .execute(&self.pool)
            .await
            .map_err(|e| RepositoryErrorHelpers::task_run_database_error(context.clone(), e))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryErrorHelpers::task_run_not_found(context));
        }

        RepositoryErrorHelpers::log_operation_success_task_run(
            context,
            &format!("任务执行状态更新 (任务ID: {task_id})"),
            Some(&format!("状态: {}", update.state)),
        );
        Ok(())
    }

    #[instrument(skip(self), fields(task_id = %task_id))]
    async fn mark_revoked_if_created(
        &self,
        task_id: &str,
        revoked_at: DateTime<Utc>,
    ) -> CoordinatorResult<bool> {
        let context = task_run_context!(RepositoryOperation::Revoke, task_id = task_id)
            .with_state(TaskRunState::Revoked);

        // 单条条件更新，关闭与并发启动worker之间的竞争窗口
        let result = sqlx::query(
            "UPDATE task_run SET state = $1, revoked_time = $2, update_datetime = $2 \
             WHERE task_id = $3 AND state = $4",
        )
        .bind(TaskRunState::Revoked)
        .bind(revoked_at)
        .bind(task_id)
        .bind(TaskRunState::Created)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryErrorHelpers::task_run_database_error(context.clone(), e))?;

        let revoked = result.rows_affected() > 0;
        if revoked {
            RepositoryErrorHelpers::log_operation_success_task_run(
                context,
                &format!("任务取消 (任务ID: {task_id})"),
                None,
            );
        } else {
            debug!("任务取消未生效: 任务ID {} 已不处于CREATED状态", task_id);
        }
        Ok(revoked)
    }

    #[instrument(skip(self, filters), fields(page = %page, rows_per_page = %rows_per_page))]
    async fn list(
        &self,
        filters: &FilterSet,
        page: i64,
        rows_per_page: i64,
    ) -> CoordinatorResult<(Vec<TaskRun>, i64)> {
        let context = task_run_context!(RepositoryOperation::Query)
            .with_additional_info(format!("分页: 第{page}页, 每页{rows_per_page}行"));

        let (where_clause, params) = filters.build_where(SqlDialect::Postgres, 1);

        let count_sql = format!("SELECT COUNT(*) AS total FROM task_run {where_clause}");
        let count_row = bind_pg_filter_params(sqlx::query(&count_sql), &params)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| RepositoryErrorHelpers::task_run_database_error(context.clone(), e))?;
        let total: i64 = count_row.try_get("total")?;

        let limit_index = filters.next_placeholder(1);
        let select_sql = format!(
            "SELECT {TASK_RUN_COLUMNS} FROM task_run {where_clause} \
             ORDER BY update_datetime DESC LIMIT ${limit_index} OFFSET ${}",
            limit_index + 1
        );
        let rows = bind_pg_filter_params(sqlx::query(&select_sql), &params)
            .bind(rows_per_page)
            .bind((page - 1).max(0) * rows_per_page)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RepositoryErrorHelpers::task_run_database_error(context.clone(), e))?;

        let task_runs: CoordinatorResult<Vec<TaskRun>> =
            rows.iter().map(Self::row_to_task_run).collect();

        let result = task_runs?;
        debug!("查询任务执行记录成功: 返回 {} / {} 条", result.len(), total);
        Ok((result, total))
    }
}
