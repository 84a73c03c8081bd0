use axum::{
    Json,
    response::{IntoResponse, Response},
};
use log::error;

use crate::models::ApiResponse;
use crate::services::{BackfillError, StoreError};

/// 接口错误，统一转换为 `{"code": 0, "msg": "..."}`
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Backfill(#[from] BackfillError),

    #[error("未配置的数据表: {0}")]
    UnknownTable(String),

    #[error("数据表 {0} 的翻译任务正在运行")]
    Busy(String),

    #[error("参数错误: {0}")]
    BadRequest(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        error!("请求处理失败: {}", self);
        Json(ApiResponse::<()>::fail(self.to_string())).into_response()
    }
}
