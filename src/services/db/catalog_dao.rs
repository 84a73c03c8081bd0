use std::cmp::Reverse;
use std::collections::BTreeMap;

use chrono::{DateTime, TimeZone};
use rusqlite::{params, OptionalExtension};

use crate::models::{ArticleSummary, LatestArticles, LatestUpdate, TypeInfo, VodSummary};
use crate::services::db::connection::VideoDbManager;
use crate::services::db::error::{StoreError, StoreResult};
use crate::services::db::schema::queries;
use crate::utils::{is_valid_prefix, recent_window};

/// 首页每个分类展示的最近影片数
pub const LATEST_LIMIT: usize = 9;

/// 演员分类的模型 id
pub const ACTOR_MID: i64 = 8;

/// 文章分类的模型 id
pub const ARTICLE_MID: i64 = 2;

/// 首页文章区块最多展示的行数，每行 3 篇
pub const ARTICLE_ROWS: u64 = 3;

/// 分类与影片列表的只读查询
pub struct CatalogDao<'a> {
    db_manager: &'a VideoDbManager,
    prefix: &'a str,
}

impl<'a> CatalogDao<'a> {
    pub fn new(db_manager: &'a VideoDbManager, prefix: &'a str) -> StoreResult<Self> {
        if !is_valid_prefix(prefix) {
            return Err(StoreError::InvalidSpec(
                crate::config::ConfigError::InvalidIdentifier(prefix.to_string()),
            ));
        }
        Ok(Self { db_manager, prefix })
    }

    /// 首页最近更新
    ///
    /// 对每个一级分类汇总其子分类（没有子分类时用自身）最近添加的影片，
    /// 并统计从昨天 00:00 起 48 小时内新增的影片数。不存在的分类 id 会被忽略。
    pub fn latest_updates<Tz: TimeZone>(
        &self,
        type_ids: &[i64],
        now: &DateTime<Tz>,
    ) -> StoreResult<Vec<LatestUpdate>> {
        let conn = &self.db_manager.conn;
        let (window_start, window_end) = recent_window(now);

        let mut type_stmt = conn.prepare(&queries::select_type_by_id(self.prefix))?;
        let mut child_stmt = conn.prepare(&queries::select_child_types(self.prefix))?;
        let mut vod_stmt = conn.prepare(&queries::select_latest_vods(self.prefix))?;
        let mut count_stmt = conn.prepare(&queries::count_vods_between(self.prefix))?;

        let mut updates = Vec::new();
        for &type_id in type_ids {
            let Some(type_name) = type_stmt
                .query_row([type_id], |row| row.get::<_, String>(1))
                .optional()?
            else {
                continue;
            };

            let children = child_stmt
                .query_map([type_id], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))?
                .collect::<rusqlite::Result<BTreeMap<i64, String>>>()?;

            let sources: Vec<i64> = if children.is_empty() {
                vec![type_id]
            } else {
                children.keys().copied().collect()
            };

            let mut details = Vec::new();
            let mut vod_count = 0u64;
            for source in sources {
                let vods = vod_stmt
                    .query_map(params![source, LATEST_LIMIT as i64], |row| {
                        Ok(VodSummary {
                            vod_id: row.get(0)?,
                            type_id: row.get(1)?,
                            vod_name: row.get(2)?,
                            vod_time_add: row.get(3)?,
                        })
                    })?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                details.extend(vods);

                let count: i64 = count_stmt
                    .query_row(params![source, window_start, window_end], |row| row.get(0))?;
                vod_count += count as u64;
            }

            details.sort_by_key(|vod| Reverse(vod.vod_time_add));
            details.truncate(LATEST_LIMIT);

            updates.push(LatestUpdate {
                type_id,
                vod_type_name: type_name,
                vod_son_name_list: children,
                vod_detail_array: details,
                vod_count,
            });
        }

        Ok(updates)
    }

    /// 首页文章区块
    ///
    /// 文章总数不足 3 篇时不展示，否则取启用的文章分类下最新的
    /// `ARTICLE_ROWS * 3` 篇，按发布时间倒序。
    pub fn latest_articles(&self) -> StoreResult<LatestArticles> {
        let conn = &self.db_manager.conn;

        let count_num: i64 =
            conn.query_row(&queries::count_articles(self.prefix), [], |row| row.get(0))?;
        let count_num = count_num.max(0) as u64;
        let rows = (count_num / 3 * 3).min(ARTICLE_ROWS);

        let mut type_stmt = conn.prepare(&queries::select_enabled_type_ids(self.prefix))?;
        let art_type_ids = type_stmt
            .query_map([ARTICLE_MID], |row| row.get::<_, i64>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut art_stmt = conn.prepare(&queries::select_latest_articles(self.prefix))?;
        let articles = art_stmt
            .query_map(params![ARTICLE_MID, (rows * 3) as i64], |row| {
                Ok(ArticleSummary {
                    art_id: row.get(0)?,
                    type_id: row.get(1)?,
                    art_name: row.get(2)?,
                    art_time: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(LatestArticles {
            count_num,
            art_type_ids,
            articles,
        })
    }

    /// 演员页使用的一级分类，按排序值倒序
    pub fn actor_types(&self) -> StoreResult<Vec<TypeInfo>> {
        let mut stmt = self
            .db_manager
            .conn
            .prepare(&queries::select_types_by_mid(self.prefix))?;

        let types = stmt
            .query_map([ACTOR_MID], |row| {
                Ok(TypeInfo {
                    type_id: row.get(0)?,
                    type_name: row.get(1)?,
                    type_pid: row.get(2)?,
                    type_mid: row.get(3)?,
                    type_sort: row.get(4)?,
                    type_status: row.get(5)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(types)
    }
}
