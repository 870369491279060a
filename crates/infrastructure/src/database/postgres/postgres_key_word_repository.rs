use async_trait::async_trait;
use chrono::Utc;
use scantask_domain::{
    entities::KeyWord,
    query_filter::{FilterSet, SqlDialect},
    repositories::KeyWordRepository,
};
use sqlx::{PgPool, Row};
use tracing::{debug, instrument};

use scantask_core::CoordinatorResult;

use crate::{
    database::bind_pg_filter_params,
    error_handling::{RepositoryErrorHelpers, RepositoryOperation},
    key_word_context,
};

const KEY_WORD_COLUMNS: &str = "id, org_id, key_word, search_time, exclude_words, check_mod, \
     count, workspace_id, is_delete, create_datetime, update_datetime";

pub struct PostgresKeyWordRepository {
    pool: PgPool,
}

impl PostgresKeyWordRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_key_word(row: &sqlx::postgres::PgRow) -> CoordinatorResult<KeyWord> {
        Ok(KeyWord {
            id: row.try_get("id")?,
            org_id: row.try_get("org_id")?,
            key_word: row.try_get("key_word")?,
            search_time: row.try_get("search_time")?,
            exclude_words: row.try_get("exclude_words")?,
            check_mod: row.try_get("check_mod")?,
            count: row.try_get("count")?,
            workspace_id: row.try_get("workspace_id")?,
            is_delete: row.try_get("is_delete")?,
            create_datetime: row.try_get("create_datetime")?,
            update_datetime: row.try_get("update_datetime")?,
        })
    }
}

#[async_trait]
impl KeyWordRepository for PostgresKeyWordRepository {
    #[instrument(skip(self, key_word), fields(key_word = %key_word.key_word))]
    async fn create(&self, key_word: &KeyWord) -> CoordinatorResult<KeyWord> {
        let context = key_word_context!(RepositoryOperation::Create)
            .with_key_word(key_word.key_word.clone());

        let now = Utc::now();
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO key_word (org_id, key_word, search_time, exclude_words, check_mod,
                                  count, workspace_id, is_delete, create_datetime, update_datetime)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {KEY_WORD_COLUMNS}
            "#
        ))
        .bind(key_word.org_id)
        .bind(&key_word.key_word)
        .bind(&key_word.search_time)
        .bind(&key_word.exclude_words)
        .bind(&key_word.check_mod)
        .bind(key_word.count)
        .bind(key_word.workspace_id)
        .bind(false)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| RepositoryErrorHelpers::key_word_database_error(context.clone(), e))?;

        let created = Self::row_to_key_word(&row)?;
        RepositoryErrorHelpers::log_operation_success_key_word(
            context,
            &format!("关键字 '{}' (ID: {})", created.key_word, created.id),
            None,
        );
        Ok(created)
    }

    #[instrument(skip(self), fields(id = %id))]
    async fn get_by_id(&self, id: i64) -> CoordinatorResult<Option<KeyWord>> {
        let context = key_word_context!(RepositoryOperation::Read, id = id);

        let row = sqlx::query(&format!(
            "SELECT {KEY_WORD_COLUMNS} FROM key_word WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepositoryErrorHelpers::key_word_database_error(context, e))?;

        match row {
            Some(row) => Ok(Some(Self::row_to_key_word(&row)?)),
            None => {
                debug!("查询关键字不存在: ID {}", id);
                Ok(None)
            }
        }
    }

    #[instrument(skip(self, key_word), fields(id = %key_word.id))]
    async fn update(&self, key_word: &KeyWord) -> CoordinatorResult<()> {
        let context = key_word_context!(RepositoryOperation::Update, id = key_word.id)
            .with_key_word(key_word.key_word.clone());

        let result = sqlx::query(
            r#"
            UPDATE key_word
            SET org_id = $2, key_word = $3, search_time = $4, exclude_words = $5,
                check_mod = $6, count = $7, workspace_id = $8, update_datetime = $9
            WHERE id = $1
            "#,
        )
        .bind(key_word.id)
        .bind(key_word.org_id)
        .bind(&key_word.key_word)
        .bind(&key_word.search_time)
        .bind(&key_word.exclude_words)
        .bind(&key_word.check_mod)
        .bind(key_word.count)
        .bind(key_word.workspace_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryErrorHelpers::key_word_database_error(context.clone(), e))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryErrorHelpers::key_word_not_found(context));
        }

        RepositoryErrorHelpers::log_operation_success_key_word(
            context,
            &format!("关键字 (ID: {})", key_word.id),
            None,
        );
        Ok(())
    }

    #[instrument(skip(self), fields(id = %id))]
    async fn soft_delete(&self, id: i64) -> CoordinatorResult<bool> {
        let context = key_word_context!(RepositoryOperation::Delete, id = id);

        let result =
            sqlx::query("UPDATE key_word SET is_delete = TRUE, update_datetime = $2 WHERE id = $1")
                .bind(id)
                .bind(Utc::now())
                .execute(&self.pool)
                .await
                .map_err(|e| RepositoryErrorHelpers::key_word_database_error(context.clone(), e))?;

        let deleted = result.rows_affected() > 0;
        if deleted {
            RepositoryErrorHelpers::log_operation_success_key_word(
                context,
                &format!("关键字软删除 (ID: {id})"),
                None,
            );
        }
        Ok(deleted)
    }

    #[instrument(skip(self, filters), fields(page = %page, rows_per_page = %rows_per_page))]
    async fn list(
        &self,
        filters: &FilterSet,
        page: i64,
        rows_per_page: i64,
    ) -> CoordinatorResult<(Vec<KeyWord>, i64)> {
        let context = key_word_context!(RepositoryOperation::Query)
            .with_additional_info(format!("分页: 第{page}页, 每页{rows_per_page}行"));

        let (where_clause, params) = filters.build_where(SqlDialect::Postgres, 1);

        let count_sql = format!("SELECT COUNT(*) AS total FROM key_word {where_clause}");
        let count_row = bind_pg_filter_params(sqlx::query(&count_sql), &params)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| RepositoryErrorHelpers::key_word_database_error(context.clone(), e))?;
        let total: i64 = count_row.try_get("total")?;

        let limit_index = filters.next_placeholder(1);
        let select_sql = format!(
            "SELECT {KEY_WORD_COLUMNS} FROM key_word {where_clause} \
             ORDER BY update_datetime DESC LIMIT ${limit_index} OFFSET ${}",
            limit_index + 1
        );
        let rows = bind_pg_filter_params(sqlx::query(&select_sql), &params)
            .bind(rows_per_page)
            .bind((page - 1).max(0) * rows_per_page)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RepositoryErrorHelpers::key_word_database_error(context.clone(), e))?;

        let key_words: CoordinatorResult<Vec<KeyWord>> =
            rows.iter().map(Self::row_to_key_word).collect();

        let result = key_words?;
        debug!("查询关键字记录成功: 返回 {} / {} 条", result.len(), total);
        Ok((result, total))
    }
}
