use async_trait::async_trait;
use chrono::Utc;
use scantask_domain::{
    entities::KeyWord,
    query_filter::{FilterSet, SqlDialect},
    repositories::KeyWordRepository,
};
use sqlx::{Row, SqlitePool};
use tracing::{debug, instrument};

use scantask_core::CoordinatorResult;

use crate::{
    database::bind_sqlite_filter_params,
    error_handling::{RepositoryErrorHelpers, RepositoryOperation},
    key_word_context,
};

const KEY_WORD_COLUMNS: &str = "id, org_id, key_word, search_time, exclude_words, check_mod, \
     count, workspace_id, is_delete, create_datetime, update_datetime";

pub struct SqliteKeyWordRepository {
    pool: SqlitePool,
}

impl SqliteKeyWordRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_key_word(row: &sqlx::sqlite::SqliteRow) -> CoordinatorResult<KeyWord> {
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
impl KeyWordRepository for SqliteKeyWordRepository {
    #[instrument(skip(self, key_word), fields(key_word = %key_word.key_word))]
    async fn create(&self, key_word: &KeyWord) -> CoordinatorResult<KeyWord> {
        let context = key_word_context!(RepositoryOperation::Create)
            .with_key_word(key_word.key_word.clone());

        let now = Utc::now();
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO key_word (org_id, key_word, search_time, exclude_words, check_mod,
                                  count, workspace_id, is_delete, create_datetime, update_datetime)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
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
            "SELECT {KEY_WORD_COLUMNS} FROM key_word WHERE id = ?"
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
            SET org_id = ?, key_word = ?, search_time = ?, exclude_words = ?,
                check_mod = ?, count = ?, workspace_id = ?, update_datetime = ?
            WHERE id = ?
            "#,
        )
        .bind(key_word.org_id)
        .bind(&key_word.key_word)
        .bind(&key_word.search_time)
        .bind(&key_word.exclude_words)
        .bind(&key_word.check_mod)
        .bind(key_word.count)
        .bind(key_word.workspace_id)
        .bind(Utc::now())
        .bind(key_word.id)
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
            sqlx::query("UPDATE key_word SET is_delete = TRUE, update_datetime = ? WHERE id = ?")
                .bind(Utc::now())
                .bind(id)
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

        let (where_clause, params) = filters.build_where(SqlDialect::Sqlite, 1);

        let count_sql = format!("SELECT COUNT(*) AS total FROM key_word {where_clause}");
        let count_row = bind_sqlite_filter_params(sqlx::query(&count_sql), &params)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| RepositoryErrorHelpers::key_word_database_error(context.clone(), e))?;
        let total: i64 = count_row.try_get("total")?;

        let select_sql = format!(
            "SELECT {KEY_WORD_COLUMNS} FROM key_word {where_clause} \
             ORDER BY update_datetime DESC LIMIT ? OFFSET ?"
        );
        let rows = bind_sqlite_filter_params(sqlx::query(&select_sql), &params)
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::sqlite::init_schema;
    use scantask_domain::query_filter::RecordFilter;

    async fn test_pool() -> SqlitePool {
        // 内存库按连接隔离，测试固定单连接
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        init_schema(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn test_create_get_update() {
        let pool = test_pool().await;
        let repo = SqliteKeyWordRepository::new(pool);

        let mut created = repo
            .create(&KeyWord::new(1, "example.com".to_string(), 2))
            .await
            .unwrap();
        assert!(created.id > 0);
        assert!(!created.is_delete);

        created.check_mod = "fofa".to_string();
        created.count = 5;
        repo.update(&created).await.unwrap();

        let fetched = repo.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(fetched.check_mod, "fofa");
        assert_eq!(fetched.count, 5);
    }

    #[tokio::test]
    async fn test_update_missing_row() {
        let pool = test_pool().await;
        let repo = SqliteKeyWordRepository::new(pool);

        let mut ghost = KeyWord::new(1, "ghost".to_string(), 1);
        ghost.id = 999;
        assert!(repo.update(&ghost).await.is_err());
    }

    #[tokio::test]
    async fn test_soft_delete_hides_from_listing() {
        let pool = test_pool().await;
        let repo = SqliteKeyWordRepository::new(pool);

        let created = repo
            .create(&KeyWord::new(1, "example.com".to_string(), 1))
            .await
            .unwrap();
        repo.create(&KeyWord::new(1, "example.org".to_string(), 1))
            .await
            .unwrap();

        assert!(repo.soft_delete(created.id).await.unwrap());
        assert!(!repo.soft_delete(9999).await.unwrap());

        // 默认列表不含软删除行
        let (rows, total) = repo.list(&FilterSet::new(), 1, 10).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(rows[0].key_word, "example.org");

        // 行本身仍然保留
        let (_, total_with_deleted) = repo
            .list(&FilterSet::new().include_deleted(), 1, 10)
            .await
            .unwrap();
        assert_eq!(total_with_deleted, 2);
    }

    #[tokio::test]
    async fn test_list_substring_filters() {
        let pool = test_pool().await;
        let repo = SqliteKeyWordRepository::new(pool);

        let mut kw = KeyWord::new(1, "corp-a".to_string(), 1);
        kw.check_mod = "github".to_string();
        repo.create(&kw).await.unwrap();

        let mut kw = KeyWord::new(2, "corp-b".to_string(), 1);
        kw.check_mod = "fofa".to_string();
        repo.create(&kw).await.unwrap();

        let filters = FilterSet::new().with(RecordFilter::KeyWordContains("corp".to_string()));
        let (_, total) = repo.list(&filters, 1, 10).await.unwrap();
        assert_eq!(total, 2);

        let filters = FilterSet::new()
            .with(RecordFilter::KeyWordContains("corp".to_string()))
            .with(RecordFilter::CheckModContains("git".to_string()));
        let (rows, total) = repo.list(&filters, 1, 10).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(rows[0].key_word, "corp-a");

        let filters = FilterSet::new().with(RecordFilter::OrgIdEquals(2));
        let (rows, _) = repo.list(&filters, 1, 10).await.unwrap();
        assert_eq!(rows[0].key_word, "corp-b");

        // 最近更新过的记录都落在7天窗口内
        let filters = FilterSet::new().with(RecordFilter::UpdatedWithinDays(7));
        let (_, total) = repo.list(&filters, 1, 10).await.unwrap();
        assert_eq!(total, 2);
    }
}
