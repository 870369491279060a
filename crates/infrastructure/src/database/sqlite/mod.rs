pub mod sqlite_key_word_repository;
pub mod sqlite_task_main_repository;
pub mod sqlite_task_run_repository;

pub use sqlite_key_word_repository::SqliteKeyWordRepository;
pub use sqlite_task_main_repository::SqliteTaskMainRepository;
pub use sqlite_task_run_repository::SqliteTaskRunRepository;

use scantask_core::CoordinatorResult;
use sqlx::SqlitePool;

/// 初始化嵌入式SQLite表结构，供嵌入式部署与集成测试使用
pub async fn init_schema(pool: &SqlitePool) -> CoordinatorResult<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS task_main (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            task_id TEXT NOT NULL UNIQUE,
            task_name TEXT NOT NULL,
            kw_args TEXT NOT NULL DEFAULT '',
            state TEXT NOT NULL,
            workspace_id INTEGER NOT NULL,
            is_delete INTEGER NOT NULL DEFAULT 0,
            create_datetime TEXT NOT NULL,
            update_datetime TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS task_run (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            task_id TEXT NOT NULL UNIQUE,
            task_name TEXT NOT NULL,
            kw_args TEXT NOT NULL DEFAULT '',
            state TEXT NOT NULL,
            main_task_id TEXT NOT NULL,
            last_run_task_id TEXT,
            workspace_id INTEGER NOT NULL,
            progress_message TEXT,
            received_time TEXT,
            started_time TEXT,
            succeeded_time TEXT,
            failed_time TEXT,
            revoked_time TEXT,
            retried_time TEXT,
            is_delete INTEGER NOT NULL DEFAULT 0,
            create_datetime TEXT NOT NULL,
            update_datetime TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS key_word (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            org_id INTEGER NOT NULL,
            key_word TEXT NOT NULL,
            search_time TEXT NOT NULL DEFAULT '',
            exclude_words TEXT NOT NULL DEFAULT '',
            check_mod TEXT NOT NULL DEFAULT '',
            count INTEGER NOT NULL DEFAULT 0,
            workspace_id INTEGER NOT NULL,
            is_delete INTEGER NOT NULL DEFAULT 0,
            create_datetime TEXT NOT NULL,
            update_datetime TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
