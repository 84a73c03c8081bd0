//! 翻译回填任务
//!
//! 分批扫描未翻译的行，并发调用翻译服务，成功后写回译文并置位标记：
//! - 键集分页，内存占用只与批大小有关
//! - 信号量控制并发数
//! - 支持取消和整体超时，中断时未完成的行保持原样
//! - 同一次运行中相同标题只翻译一次

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use log::{debug, error, info, warn};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::config::BackfillConfig;
use crate::models::BackfillReport;
use crate::services::db::{StoreError, VideoStore};
use crate::services::translator::{TranslateError, Translator};
use crate::utils::now_string;

#[derive(Debug, thiserror::Error)]
pub enum BackfillError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("翻译工作池已关闭")]
    PoolClosed,
}

/// 单行处理结果
enum RowOutcome {
    Translated,
    Failed,
    /// 取消或超时，未写入
    Abandoned,
    Store(StoreError),
}

/// 回填任务
pub struct BackfillJob<S, T> {
    store: Arc<S>,
    translator: Arc<T>,
    config: BackfillConfig,
}

impl<S: VideoStore, T: Translator> BackfillJob<S, T> {
    pub fn new(store: Arc<S>, translator: Arc<T>, config: BackfillConfig) -> Self {
        Self {
            store,
            translator,
            config,
        }
    }

    /// 执行一次完整回填
    ///
    /// 先确保标记字段存在，再逐批处理。数据库错误会中止本次运行，
    /// 翻译失败只计入失败数，对应行留待下次运行。
    pub async fn run(&self, cancel: CancellationToken) -> Result<BackfillReport, BackfillError> {
        let started = Instant::now();
        let table = self.store.table().table.clone();
        let mut report = BackfillReport {
            table: table.clone(),
            started_at: now_string(),
            ..Default::default()
        };

        self.store.ensure_flag_column()?;

        // 取消和超时统一通过 stop 传播
        let stop = cancel.child_token();
        let timer = self.config.run_timeout.map(|limit| {
            let stop = stop.clone();
            tokio::spawn(async move {
                tokio::time::sleep(limit).await;
                stop.cancel();
            })
        });

        let result = self.process(&stop, &mut report).await;

        if let Some(timer) = timer {
            timer.abort();
        }
        report.elapsed_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(()) => {
                info!(
                    "数据表 {} 回填完成: 扫描 {} 条, 成功 {} 条, 失败 {} 条, 跳过 {} 条{}",
                    table,
                    report.scanned,
                    report.succeeded,
                    report.failed,
                    report.skipped,
                    if report.interrupted { " (已中断)" } else { "" }
                );
                Ok(report)
            }
            Err(e) => {
                error!("数据表 {} 回填中止: {}", table, e);
                Err(e)
            }
        }
    }

    async fn process(
        &self,
        stop: &CancellationToken,
        report: &mut BackfillReport,
    ) -> Result<(), BackfillError> {
        let batch_size = self.config.batch_size.max(1);
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
        let memo: Arc<DashMap<String, String>> = Arc::new(DashMap::new());
        let mut cursor: Option<i64> = None;
        let mut batch_no = 0u64;

        loop {
            if stop.is_cancelled() {
                report.interrupted = true;
                break;
            }

            let rows = self.store.fetch_untranslated(cursor, batch_size)?;
            let Some(last) = rows.last() else {
                break;
            };
            cursor = Some(last.id);
            let page_len = rows.len();
            batch_no += 1;
            report.scanned += page_len as u64;
            debug!(
                "数据表 {} 第 {} 批: {} 条 (游标 {})",
                report.table, batch_no, page_len, last.id
            );

            let mut workers = JoinSet::new();
            for row in rows {
                if row.is_blank() {
                    debug!("记录 {} 待翻译字段均为空，跳过", row.id);
                    report.skipped += 1;
                    continue;
                }

                let permit = tokio::select! {
                    biased;
                    _ = stop.cancelled() => {
                        report.interrupted = true;
                        break;
                    }
                    permit = semaphore.clone().acquire_owned() => {
                        permit.map_err(|_| BackfillError::PoolClosed)?
                    }
                };

                let store = self.store.clone();
                let translator = self.translator.clone();
                let memo = memo.clone();
                let stop = stop.clone();
                workers.spawn(async move {
                    let _permit = permit;
                    let outcome = tokio::select! {
                        biased;
                        _ = stop.cancelled() => RowOutcome::Abandoned,
                        result = translate_row(&*translator, &memo, &row.texts) => {
                            match result {
                                Ok(translated) => match store.mark_translated(row.id, &translated) {
                                    Ok(true) => RowOutcome::Translated,
                                    Ok(false) => {
                                        warn!("记录 {} 未被更新，可能已被删除或已翻译", row.id);
                                        RowOutcome::Failed
                                    }
                                    Err(e) => RowOutcome::Store(e),
                                },
                                Err(e) => {
                                    warn!("记录 {} 翻译失败: {}", row.id, e);
                                    RowOutcome::Failed
                                }
                            }
                        }
                    };
                    (row.id, outcome)
                });
            }

            let mut store_error = None;
            while let Some(joined) = workers.join_next().await {
                match joined {
                    Ok((_, RowOutcome::Translated)) => report.succeeded += 1,
                    Ok((_, RowOutcome::Failed)) => report.failed += 1,
                    Ok((_, RowOutcome::Abandoned)) => report.interrupted = true,
                    Ok((id, RowOutcome::Store(e))) => {
                        error!("记录 {} 写入失败: {}", id, e);
                        stop.cancel();
                        store_error.get_or_insert(e);
                    }
                    Err(e) => {
                        error!("翻译任务异常退出: {}", e);
                        report.failed += 1;
                    }
                }
            }
            if let Some(e) = store_error {
                return Err(e.into());
            }

            if report.interrupted || page_len < batch_size {
                break;
            }

            if !self.config.batch_delay.is_zero() {
                pause(stop, self.config.batch_delay).await;
            }
        }

        Ok(())
    }
}

/// 先查本次运行的缓存，未命中再调用翻译服务
async fn translate_cached<T: Translator>(
    translator: &T,
    memo: &DashMap<String, String>,
    text: &str,
) -> Result<String, TranslateError> {
    let cached = memo.get(text).map(|hit| hit.value().clone());
    if let Some(translated) = cached {
        return Ok(translated);
    }

    let translated = translator.translate(text).await?;
    memo.insert(text.to_string(), translated.clone());
    Ok(translated)
}

/// 翻译一行的所有非空字段，任一字段失败则整行失败
async fn translate_row<T: Translator>(
    translator: &T,
    memo: &DashMap<String, String>,
    texts: &[String],
) -> Result<Vec<Option<String>>, TranslateError> {
    let mut translated = Vec::with_capacity(texts.len());
    for text in texts {
        let text = text.trim();
        if text.is_empty() {
            translated.push(None);
        } else {
            translated.push(Some(translate_cached(translator, memo, text).await?));
        }
    }
    Ok(translated)
}

async fn pause(stop: &CancellationToken, delay: Duration) {
    tokio::select! {
        _ = stop.cancelled() => {}
        _ = tokio::time::sleep(delay) => {}
    }
}

/// 回填运行登记
///
/// 同一张表同一时间只允许一个回填任务运行，并保留每张表最近一次的结果。
#[derive(Default)]
pub struct BackfillRegistry {
    running: Arc<DashMap<String, String>>,
    last_reports: DashMap<String, BackfillReport>,
}

/// 持有期间该表被标记为运行中
pub struct RunGuard {
    running: Arc<DashMap<String, String>>,
    table: String,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.running.remove(&self.table);
    }
}

impl BackfillRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 尝试登记运行，表已在运行时返回 `None`
    pub fn try_begin(&self, table: &str) -> Option<RunGuard> {
        match self.running.entry(table.to_string()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                slot.insert(now_string());
                Some(RunGuard {
                    running: self.running.clone(),
                    table: table.to_string(),
                })
            }
        }
    }

    pub fn is_running(&self, table: &str) -> bool {
        self.running.contains_key(table)
    }

    /// 运行中的表及其开始时间
    pub fn running_tables(&self) -> Vec<(String, String)> {
        let mut tables: Vec<(String, String)> = self
            .running
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        tables.sort();
        tables
    }

    pub fn record(&self, report: BackfillReport) {
        self.last_reports.insert(report.table.clone(), report);
    }

    /// 每张表最近一次的结果，按表名排序
    pub fn last_reports(&self) -> Vec<BackfillReport> {
        let mut reports: Vec<BackfillReport> = self
            .last_reports
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        reports.sort_by(|a, b| a.table.cmp(&b.table));
        reports
    }
}
