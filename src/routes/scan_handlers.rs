//! 翻译回填相关的 API 处理器

use axum::{
    Json,
    extract::{Query, State},
};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::AppState;
use crate::config::TableSpec;
use crate::models::{ApiResponse, BackfillReport, reports_message};
use crate::routes::error::ApiError;
use crate::services::{BackfillJob, ColumnStatus, VideoDao, VideoStore};

/// 可选的目标表参数，缺省时处理所有配置的表
#[derive(Deserialize, Debug, Default)]
pub struct TableQuery {
    pub table: Option<String>,
}

/// 回填状态响应
#[derive(Serialize, Deserialize, Debug)]
pub struct BackfillStatus {
    pub running: Vec<RunningTable>,
    pub reports: Vec<BackfillReport>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct RunningTable {
    pub table: String,
    pub started_at: String,
}

fn select_tables(state: &AppState, table: Option<&str>) -> Result<Vec<TableSpec>, ApiError> {
    match table {
        None => Ok(state.tables.clone()),
        Some(name) => state
            .tables
            .iter()
            .find(|spec| spec.matches(name, &state.table_prefix))
            .cloned()
            .map(|spec| vec![spec])
            .ok_or_else(|| ApiError::UnknownTable(name.to_string())),
    }
}

/// 检查并添加翻译标记字段
pub async fn check_translate_field(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TableQuery>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let mut status = ColumnStatus::AlreadyPresent;

    for spec in select_tables(&state, query.table.as_deref())? {
        let dao = VideoDao::new(state.db_manager.clone(), spec)?;
        if dao.ensure_flag_column()? == ColumnStatus::Added {
            status = ColumnStatus::Added;
        }
    }

    Ok(Json(ApiResponse::message(status.message())))
}

/// 扫描并翻译
///
/// 先登记所有目标表，任一表正在运行时整个请求被拒绝。单张表中止不影响
/// 其他表，只有全部中止时才返回失败。
pub async fn scan_and_translate(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TableQuery>,
) -> Result<Json<ApiResponse<Vec<BackfillReport>>>, ApiError> {
    let specs = select_tables(&state, query.table.as_deref())?;

    let mut guards = Vec::with_capacity(specs.len());
    for spec in &specs {
        let guard = state
            .registry
            .try_begin(&spec.table)
            .ok_or_else(|| ApiError::Busy(spec.table.clone()))?;
        guards.push(guard);
    }

    let mut reports = Vec::with_capacity(specs.len());
    let mut aborted = Vec::new();
    let mut first_error = None;

    for (spec, _guard) in specs.into_iter().zip(guards) {
        info!("开始回填数据表: {}", spec.table);
        let table = spec.table.clone();
        let result = match VideoDao::new(state.db_manager.clone(), spec) {
            Ok(dao) => {
                let job =
                    BackfillJob::new(Arc::new(dao), state.translator.clone(), state.backfill.clone());
                job.run(state.shutdown.child_token()).await.map_err(ApiError::from)
            }
            Err(e) => Err(ApiError::from(e)),
        };

        match result {
            Ok(report) => {
                state.registry.record(report.clone());
                reports.push(report);
            }
            Err(e) => {
                warn!("数据表 {} 回填中止: {}", table, e);
                aborted.push((table, e.to_string()));
                first_error.get_or_insert(e);
            }
        }
    }

    if reports.is_empty() {
        if let Some(e) = first_error {
            return Err(e);
        }
    }

    Ok(Json(ApiResponse::ok(
        reports_message(&reports, &aborted),
        reports,
    )))
}

/// 获取回填状态
pub async fn backfill_status(State(state): State<Arc<AppState>>) -> Json<ApiResponse<BackfillStatus>> {
    let running = state
        .registry
        .running_tables()
        .into_iter()
        .map(|(table, started_at)| RunningTable { table, started_at })
        .collect();

    Json(ApiResponse::ok(
        "ok",
        BackfillStatus {
            running,
            reports: state.registry.last_reports(),
        },
    ))
}
