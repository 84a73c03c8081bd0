use std::sync::{Arc, Mutex};

use rusqlite::{params_from_iter, ToSql};

use crate::config::TableSpec;
use crate::models::VideoRow;
use crate::services::db::connection::VideoDbManager;
use crate::services::db::error::StoreResult;
use crate::services::db::schema::{self, queries, ColumnStatus};

/// 视频表的持久化能力
///
/// 回填任务只通过这个接口访问数据库。
pub trait VideoStore: Send + Sync + 'static {
    /// 当前操作的数据表
    fn table(&self) -> &TableSpec;

    /// 确保标记字段存在
    fn ensure_flag_column(&self) -> StoreResult<ColumnStatus>;

    /// 读取未翻译行，按主键升序，最多 `limit` 条
    ///
    /// `after_id` 为 `None` 时从头读取，否则只读主键大于它的行。
    fn fetch_untranslated(&self, after_id: Option<i64>, limit: usize)
        -> StoreResult<Vec<VideoRow>>;

    /// 写入译文并置位标记，返回是否有行被更新
    ///
    /// `translations` 与 `TableSpec::fields` 一一对应，`None` 的字段保持不变。
    fn mark_translated(&self, id: i64, translations: &[Option<String>]) -> StoreResult<bool>;
}

/// 基于 SQLite 的视频数据访问对象
pub struct VideoDao {
    db_manager: Arc<Mutex<VideoDbManager>>,
    spec: TableSpec,
}

impl VideoDao {
    /// 创建新的视频数据访问对象，表描述非法时返回错误
    pub fn new(db_manager: Arc<Mutex<VideoDbManager>>, spec: TableSpec) -> StoreResult<Self> {
        spec.validate()?;
        Ok(Self { db_manager, spec })
    }
}

impl VideoStore for VideoDao {
    fn table(&self) -> &TableSpec {
        &self.spec
    }

    fn ensure_flag_column(&self) -> StoreResult<ColumnStatus> {
        let db = self.db_manager.lock()?;
        schema::ensure_flag_column(&db.conn, &self.spec)
    }

    fn fetch_untranslated(
        &self,
        after_id: Option<i64>,
        limit: usize,
    ) -> StoreResult<Vec<VideoRow>> {
        let db = self.db_manager.lock()?;
        let sql = queries::select_untranslated(&self.spec, after_id.is_some());
        let mut stmt = db.conn.prepare(&sql)?;

        let mut values = vec![limit as i64];
        values.extend(after_id);
        let field_count = self.spec.fields.len();

        let row_iter = stmt.query_map(params_from_iter(values), |row| {
            let mut texts = Vec::with_capacity(field_count);
            for i in 0..field_count {
                texts.push(row.get::<_, Option<String>>(i + 1)?.unwrap_or_default());
            }
            Ok(VideoRow::new(row.get(0)?, texts))
        })?;

        let mut rows = Vec::new();
        for row in row_iter {
            rows.push(row?);
        }
        Ok(rows)
    }

    fn mark_translated(&self, id: i64, translations: &[Option<String>]) -> StoreResult<bool> {
        let assignments: Vec<(&str, &String)> = self
            .spec
            .fields
            .iter()
            .zip(translations)
            .filter_map(|(field, text)| text.as_ref().map(|t| (field.write_column(), t)))
            .collect();
        if assignments.is_empty() {
            return Ok(false);
        }

        let columns: Vec<&str> = assignments.iter().map(|(column, _)| *column).collect();
        let mut values: Vec<&dyn ToSql> = assignments
            .iter()
            .map(|(_, text)| *text as &dyn ToSql)
            .collect();
        values.push(&id);

        let db = self.db_manager.lock()?;
        let changed = db.conn.execute(
            &queries::update_translated(&self.spec, &columns),
            values.as_slice(),
        )?;
        Ok(changed > 0)
    }
}
