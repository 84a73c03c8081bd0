//! 数据库表结构检查与 SQL 语句
//!
//! 表名和字段名来自配置，拼接前都经过 [`TableSpec::validate`] 校验。

use rusqlite::Connection;
use serde::Serialize;

use crate::config::TableSpec;
use crate::services::db::error::{StoreError, StoreResult};

/// 标记字段检查结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ColumnStatus {
    Added,
    AlreadyPresent,
}

impl ColumnStatus {
    pub fn message(&self) -> &'static str {
        match self {
            ColumnStatus::Added => "翻译字段添加成功",
            ColumnStatus::AlreadyPresent => "翻译字段已存在",
        }
    }
}

/// 读取表的所有字段名，表不存在时返回空列表
pub fn table_columns(conn: &Connection, table: &str) -> StoreResult<Vec<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(names)
}

/// 确保标记字段存在，不存在则添加（默认值 0）并建立索引
///
/// 可以重复调用。表、主键或任一源字段/译文字段不存在时返回错误。
pub fn ensure_flag_column(conn: &Connection, spec: &TableSpec) -> StoreResult<ColumnStatus> {
    spec.validate()?;

    let columns = table_columns(conn, &spec.table)?;
    if columns.is_empty() {
        return Err(StoreError::TableNotFound(spec.table.clone()));
    }

    let has = |name: &str| columns.iter().any(|c| c.eq_ignore_ascii_case(name));

    let mut required = vec![&spec.primary_key];
    for field in &spec.fields {
        required.push(&field.source);
        if let Some(target) = &field.target {
            required.push(target);
        }
    }
    for column in required {
        if !has(column.as_str()) {
            return Err(StoreError::ColumnNotFound {
                table: spec.table.clone(),
                column: column.clone(),
            });
        }
    }

    if has(spec.flag_column.as_str()) {
        return Ok(ColumnStatus::AlreadyPresent);
    }

    conn.execute(&queries::add_flag_column(spec), [])?;
    conn.execute(&queries::create_flag_index(spec), [])?;
    log::info!("已为数据表 {} 添加字段 {}", spec.table, spec.flag_column);

    Ok(ColumnStatus::Added)
}

/// SQL 查询语句
pub mod queries {
    use crate::config::TableSpec;

    pub fn add_flag_column(spec: &TableSpec) -> String {
        format!(
            "ALTER TABLE {} ADD COLUMN {} INTEGER NOT NULL DEFAULT 0",
            spec.table, spec.flag_column
        )
    }

    pub fn create_flag_index(spec: &TableSpec) -> String {
        format!(
            "CREATE INDEX IF NOT EXISTS idx_{table}_{flag} ON {table}({flag})",
            table = spec.table,
            flag = spec.flag_column
        )
    }

    /// 键集分页读取未翻译的行
    ///
    /// `?1` 为批大小。`after_cursor` 为真时追加 `pk > ?2`，第一页不带游标，
    /// 主键为 0 或负数的行也会被读到。
    pub fn select_untranslated(spec: &TableSpec, after_cursor: bool) -> String {
        let sources = spec
            .fields
            .iter()
            .map(|f| f.source.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let cursor = if after_cursor {
            format!(" AND {} > ?2", spec.primary_key)
        } else {
            String::new()
        };
        format!(
            "SELECT {pk}, {sources} FROM {table}
             WHERE {flag} = 0{cursor}
             ORDER BY {pk} ASC
             LIMIT ?1",
            pk = spec.primary_key,
            table = spec.table,
            flag = spec.flag_column
        )
    }

    /// 写入译文并置位标记，只更新仍未翻译的行
    ///
    /// `columns` 依次绑定 `?1..?n`，主键绑定 `?n+1`。
    pub fn update_translated(spec: &TableSpec, columns: &[&str]) -> String {
        let sets = columns
            .iter()
            .enumerate()
            .map(|(i, column)| format!("{} = ?{}", column, i + 1))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "UPDATE {table} SET {sets}, {flag} = 1
             WHERE {pk} = ?{id} AND {flag} = 0",
            table = spec.table,
            flag = spec.flag_column,
            pk = spec.primary_key,
            id = columns.len() + 1
        )
    }

    pub fn select_type_by_id(prefix: &str) -> String {
        format!(
            "SELECT type_id, type_name FROM {}type WHERE type_id = ?1 AND type_pid = 0",
            prefix
        )
    }

    pub fn select_child_types(prefix: &str) -> String {
        format!(
            "SELECT type_id, type_name FROM {}type WHERE type_pid = ?1 ORDER BY type_id ASC",
            prefix
        )
    }

    pub fn select_latest_vods(prefix: &str) -> String {
        format!(
            "SELECT vod_id, type_id, vod_name, vod_time_add FROM {}vod
             WHERE type_id = ?1
             ORDER BY vod_time_add DESC
             LIMIT ?2",
            prefix
        )
    }

    pub fn count_vods_between(prefix: &str) -> String {
        format!(
            "SELECT COUNT(*) FROM {}vod WHERE type_id = ?1 AND vod_time_add BETWEEN ?2 AND ?3",
            prefix
        )
    }

    pub fn select_enabled_type_ids(prefix: &str) -> String {
        format!(
            "SELECT type_id FROM {}type WHERE type_mid = ?1 AND type_status = 1 ORDER BY type_id ASC",
            prefix
        )
    }

    pub fn count_articles(prefix: &str) -> String {
        format!("SELECT COUNT(*) FROM {}art", prefix)
    }

    /// 启用的文章分类下最新的文章：`?1` 为文章模型 id，`?2` 为条数
    pub fn select_latest_articles(prefix: &str) -> String {
        format!(
            "SELECT a.art_id, a.type_id, a.art_name, a.art_time FROM {p}art a
             JOIN {p}type t ON t.type_id = a.type_id
             WHERE t.type_mid = ?1 AND t.type_status = 1
             ORDER BY a.art_time DESC
             LIMIT ?2",
            p = prefix
        )
    }

    pub fn select_types_by_mid(prefix: &str) -> String {
        format!(
            "SELECT type_id, type_name, type_pid, type_mid, type_sort, type_status FROM {}type
             WHERE type_mid = ?1 AND type_pid = 0 AND type_status = 1
             ORDER BY type_sort DESC",
            prefix
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FieldSpec;

    fn movie_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE mac_movie (id INTEGER PRIMARY KEY, name TEXT, name_en TEXT);",
        )
        .unwrap();
        conn
    }

    #[test]
    fn ensure_is_idempotent() {
        let conn = movie_conn();
        let spec = TableSpec::new("mac_movie");

        assert_eq!(ensure_flag_column(&conn, &spec).unwrap(), ColumnStatus::Added);
        assert_eq!(
            ensure_flag_column(&conn, &spec).unwrap(),
            ColumnStatus::AlreadyPresent
        );

        let columns = table_columns(&conn, "mac_movie").unwrap();
        assert_eq!(columns.iter().filter(|c| *c == "translated").count(), 1);
    }

    #[test]
    fn added_column_defaults_to_zero() {
        let conn = movie_conn();
        conn.execute("INSERT INTO mac_movie (id, name) VALUES (1, 'a')", [])
            .unwrap();

        ensure_flag_column(&conn, &TableSpec::new("mac_movie")).unwrap();

        let flag: i64 = conn
            .query_row("SELECT translated FROM mac_movie WHERE id = 1", [], |r| r.get(0))
            .unwrap();
        assert_eq!(flag, 0);
    }

    #[test]
    fn missing_table_and_columns_are_errors() {
        let conn = movie_conn();

        let err = ensure_flag_column(&conn, &TableSpec::new("mac_vod")).unwrap_err();
        assert!(matches!(err, StoreError::TableNotFound(t) if t == "mac_vod"));

        let spec = TableSpec::new("mac_movie").with_title_column("title");
        let err = ensure_flag_column(&conn, &spec).unwrap_err();
        assert!(matches!(err, StoreError::ColumnNotFound { column, .. } if column == "title"));

        let spec = TableSpec::new("mac_movie").with_target_column("name_fr");
        assert!(ensure_flag_column(&conn, &spec).is_err());

        let spec = TableSpec::new("mac_movie").with_fields(vec![
            FieldSpec::new("name").with_target("name_en"),
            FieldSpec::new("blurb").with_target("blurb_en"),
        ]);
        let err = ensure_flag_column(&conn, &spec).unwrap_err();
        assert!(matches!(err, StoreError::ColumnNotFound { column, .. } if column == "blurb"));

        let spec = TableSpec::new("mac_movie").with_target_column("name_en");
        assert_eq!(ensure_flag_column(&conn, &spec).unwrap(), ColumnStatus::Added);
    }

    #[test]
    fn scan_query_has_no_cursor_on_the_first_page() {
        let spec = TableSpec::new("mac_vod").with_fields(vec![
            FieldSpec::new("vod_name").with_target("vod_name_en"),
            FieldSpec::new("vod_blurb"),
        ]);

        let first = queries::select_untranslated(&spec, false);
        assert!(first.starts_with("SELECT id, vod_name, vod_blurb FROM mac_vod"));
        assert!(!first.contains("?2"));
        assert!(queries::select_untranslated(&spec, true).contains("AND id > ?2"));

        let update = queries::update_translated(&spec, &["vod_name_en", "vod_blurb"]);
        assert!(update.contains("SET vod_name_en = ?1, vod_blurb = ?2, translated = 1"));
        assert!(update.contains("WHERE id = ?3 AND translated = 0"));
    }

    #[test]
    fn invalid_identifiers_never_reach_sql() {
        let conn = movie_conn();
        let spec = TableSpec::new("mac_movie; DROP TABLE mac_movie");

        let err = ensure_flag_column(&conn, &spec).unwrap_err();
        assert!(matches!(err, StoreError::InvalidSpec(_)));
        assert!(!table_columns(&conn, "mac_movie").unwrap().is_empty());
    }
}
