use axum::{
    Json,
    extract::{Query, State},
};
use serde::Deserialize;
use std::sync::Arc;

use crate::AppState;
use crate::config::parse_id_list;
use crate::models::{ApiResponse, LatestArticles, LatestUpdate, TypeInfo};
use crate::routes::error::ApiError;
use crate::services::{CatalogDao, StoreError};

#[derive(Deserialize, Debug, Default)]
pub struct LatestQuery {
    /// 逗号分隔的一级分类 id，缺省使用 `HOME_TYPE_IDS`
    pub types: Option<String>,
}

/// 首页最近更新
pub async fn latest_updates(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LatestQuery>,
) -> Result<Json<ApiResponse<Vec<LatestUpdate>>>, ApiError> {
    let type_ids = match query.types.as_deref() {
        Some(raw) => parse_id_list(raw)
            .ok_or_else(|| ApiError::BadRequest(format!("types={}", raw)))?,
        None => state.home_type_ids.clone(),
    };

    let db_manager = state.db_manager.lock().map_err(StoreError::from)?;
    let dao = CatalogDao::new(&db_manager, &state.table_prefix)?;
    let updates = dao.latest_updates(&type_ids, &chrono::Local::now())?;

    Ok(Json(ApiResponse::ok("ok", updates)))
}

/// 首页文章区块
pub async fn latest_articles(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<LatestArticles>>, ApiError> {
    let db_manager = state.db_manager.lock().map_err(StoreError::from)?;
    let dao = CatalogDao::new(&db_manager, &state.table_prefix)?;

    Ok(Json(ApiResponse::ok("ok", dao.latest_articles()?)))
}

/// 演员分类
pub async fn actor_types(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<TypeInfo>>>, ApiError> {
    let db_manager = state.db_manager.lock().map_err(StoreError::from)?;
    let dao = CatalogDao::new(&db_manager, &state.table_prefix)?;

    Ok(Json(ApiResponse::ok("ok", dao.actor_types()?)))
}
