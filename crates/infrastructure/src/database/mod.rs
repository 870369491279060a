pub mod manager;
pub mod postgres;
pub mod sqlite;

pub use manager::{DatabaseManager, DatabasePool, DatabaseType};

use scantask_domain::query_filter::FilterParam;

/// 将过滤参数按声明顺序绑定到Postgres查询
pub(crate) fn bind_pg_filter_params<'q>(
    mut query: sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>,
    params: &'q [FilterParam],
) -> sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments> {
    for param in params {
        query = match param {
            FilterParam::Text(value) => query.bind(value),
            FilterParam::Int(value) => query.bind(value),
            FilterParam::Bool(value) => query.bind(value),
            FilterParam::Timestamp(value) => query.bind(value),
        };
    }
    query
}

/// 将过滤参数按声明顺序绑定到SQLite查询
pub(crate) fn bind_sqlite_filter_params<'q>(
    mut query: sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    params: &'q [FilterParam],
) -> sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
    for param in params {
        query = match param {
            FilterParam::Text(value) => query.bind(value),
            FilterParam::Int(value) => query.bind(value),
            FilterParam::Bool(value) => query.bind(value),
            FilterParam::Timestamp(value) => query.bind(value),
        };
    }
    query
}
