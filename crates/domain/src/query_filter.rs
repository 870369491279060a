use chrono::{DateTime, Duration, Utc};

/// SQL占位符方言
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlDialect {
    Postgres,
    Sqlite,
}

impl SqlDialect {
    fn placeholder(&self, index: usize) -> String {
        match self {
            SqlDialect::Postgres => format!("${index}"),
            SqlDialect::Sqlite => "?".to_string(),
        }
    }
}

/// 查询参数类型，用于类型安全的参数绑定
#[derive(Debug, Clone)]
pub enum FilterParam {
    Text(String),
    Int(i64),
    Bool(bool),
    Timestamp(DateTime<Utc>),
}

/// 记录过滤谓词的封闭集合
///
/// 过滤条件由调用方显式构造，列名不在SQL拼装入口出现，
/// 未知列因此无法被表达，也就不存在原始列名透传。
/// 各仓储只使用对自身表有效的变体。
#[derive(Debug, Clone)]
pub enum RecordFilter {
    /// task_id精确匹配
    TaskIdEquals(String),
    /// org_id精确匹配
    OrgIdEquals(i64),
    /// workspace_id精确匹配
    WorkspaceIdEquals(i64),
    /// key_word子串匹配
    KeyWordContains(String),
    /// search_time子串匹配
    SearchTimeContains(String),
    /// exclude_words子串匹配
    ExcludeWordsContains(String),
    /// check_mod子串匹配
    CheckModContains(String),
    /// 最近N天内更新过的记录
    UpdatedWithinDays(i64),
}

impl RecordFilter {
    fn append_to(
        &self,
        dialect: SqlDialect,
        sql: &mut String,
        params: &mut Vec<FilterParam>,
        start: usize,
    ) {
        match self {
            RecordFilter::TaskIdEquals(value) => {
                sql.push_str(&format!(
                    " AND task_id = {}",
                    dialect.placeholder(start + params.len())
                ));
                params.push(FilterParam::Text(value.clone()));
            }
            RecordFilter::OrgIdEquals(value) => {
                sql.push_str(&format!(
                    " AND org_id = {}",
                    dialect.placeholder(start + params.len())
                ));
                params.push(FilterParam::Int(*value));
            }
            RecordFilter::WorkspaceIdEquals(value) => {
                sql.push_str(&format!(
                    " AND workspace_id = {}",
                    dialect.placeholder(start + params.len())
                ));
                params.push(FilterParam::Int(*value));
            }
            RecordFilter::KeyWordContains(value) => {
                sql.push_str(&format!(
                    " AND key_word LIKE {}",
                    dialect.placeholder(start + params.len())
                ));
                params.push(FilterParam::Text(format!("%{value}%")));
            }
            RecordFilter::SearchTimeContains(value) => {
                sql.push_str(&format!(
                    " AND search_time LIKE {}",
                    dialect.placeholder(start + params.len())
                ));
                params.push(FilterParam::Text(format!("%{value}%")));
            }
            RecordFilter::ExcludeWordsContains(value) => {
                sql.push_str(&format!(
                    " AND exclude_words LIKE {}",
                    dialect.placeholder(start + params.len())
                ));
                params.push(FilterParam::Text(format!("%{value}%")));
            }
            RecordFilter::CheckModContains(value) => {
                sql.push_str(&format!(
                    " AND check_mod LIKE {}",
                    dialect.placeholder(start + params.len())
                ));
                params.push(FilterParam::Text(format!("%{value}%")));
            }
            RecordFilter::UpdatedWithinDays(days) => {
                let now = Utc::now();
                sql.push_str(&format!(
                    " AND update_datetime BETWEEN {} AND {}",
                    dialect.placeholder(start + params.len()),
                    dialect.placeholder(start + params.len() + 1)
                ));
                params.push(FilterParam::Timestamp(now - Duration::days(*days)));
                params.push(FilterParam::Timestamp(now));
            }
        }
    }
}

/// 一组过滤谓词，默认排除软删除记录
#[derive(Debug, Clone, Default)]
pub struct FilterSet {
    filters: Vec<RecordFilter>,
    include_deleted: bool,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, filter: RecordFilter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn add(&mut self, filter: RecordFilter) {
        self.filters.push(filter);
    }

    /// 列表查询默认不含软删除行，显式调用后才包含
    pub fn include_deleted(mut self) -> Self {
        self.include_deleted = true;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn filters(&self) -> &[RecordFilter] {
        &self.filters
    }

    pub fn deleted_included(&self) -> bool {
        self.include_deleted
    }

    /// 组装WHERE子句和绑定参数
    ///
    /// `start`是首个占位符的编号（Postgres方言下生效）。
    pub fn build_where(&self, dialect: SqlDialect, start: usize) -> (String, Vec<FilterParam>) {
        let mut sql = "WHERE 1=1".to_string();
        let mut params = Vec::new();

        if !self.include_deleted {
            sql.push_str(&format!(
                " AND is_delete = {}",
                dialect.placeholder(start + params.len())
            ));
            params.push(FilterParam::Bool(false));
        }

        for filter in &self.filters {
            filter.append_to(dialect, &mut sql, &mut params, start);
        }

        (sql, params)
    }

    /// 下一个可用的占位符编号，供调用方继续追加LIMIT/OFFSET等参数
    pub fn next_placeholder(&self, start: usize) -> usize {
        let deleted = usize::from(!self.include_deleted);
        let extra: usize = self
            .filters
            .iter()
            .map(|f| match f {
                RecordFilter::UpdatedWithinDays(_) => 2,
                _ => 1,
            })
            .sum();
        start + deleted + extra
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_where_no_filter_excludes_deleted() {
        let (sql, params) = FilterSet::new().build_where(SqlDialect::Postgres, 1);
        assert_eq!(sql, "WHERE 1=1 AND is_delete = $1");
        assert_eq!(params.len(), 1);
        assert!(matches!(params[0], FilterParam::Bool(false)));
    }

    #[test]
    fn test_build_where_include_deleted() {
        let (sql, params) = FilterSet::new()
            .include_deleted()
            .build_where(SqlDialect::Postgres, 1);
        assert_eq!(sql, "WHERE 1=1");
        assert!(params.is_empty());
    }

    #[test]
    fn test_build_where_exact_and_like() {
        let (sql, params) = FilterSet::new()
            .with(RecordFilter::WorkspaceIdEquals(3))
            .with(RecordFilter::KeyWordContains("corp".to_string()))
            .build_where(SqlDialect::Postgres, 1);

        assert_eq!(
            sql,
            "WHERE 1=1 AND is_delete = $1 AND workspace_id = $2 AND key_word LIKE $3"
        );
        assert_eq!(params.len(), 3);
        match &params[2] {
            FilterParam::Text(p) => assert_eq!(p, "%corp%"),
            other => panic!("意外的参数类型: {other:?}"),
        }
    }

    #[test]
    fn test_build_where_date_delta_uses_two_params() {
        let set = FilterSet::new().with(RecordFilter::UpdatedWithinDays(7));
        let (sql, params) = set.build_where(SqlDialect::Postgres, 1);

        assert!(sql.contains("update_datetime BETWEEN $2 AND $3"));
        assert_eq!(params.len(), 3);
        assert_eq!(set.next_placeholder(1), 4);

        match (&params[1], &params[2]) {
            (FilterParam::Timestamp(from), FilterParam::Timestamp(to)) => {
                assert!(*from < *to);
                assert_eq!((*to - *from).num_days(), 7);
            }
            other => panic!("意外的参数类型: {other:?}"),
        }
    }

    #[test]
    fn test_build_where_sqlite_placeholders() {
        let (sql, params) = FilterSet::new()
            .with(RecordFilter::TaskIdEquals("uuid-1".to_string()))
            .build_where(SqlDialect::Sqlite, 1);

        assert_eq!(sql, "WHERE 1=1 AND is_delete = ? AND task_id = ?");
        assert_eq!(params.len(), 2);
    }
}
