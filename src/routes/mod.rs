pub mod catalog_handlers;
pub mod error;
pub mod scan_handlers;

use axum::{Router, routing::get};
use std::sync::Arc;
use tower_http::trace::{DefaultOnFailure, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::AppState;

pub use catalog_handlers::{actor_types, latest_articles, latest_updates};
pub use error::ApiError;
pub use scan_handlers::{backfill_status, check_translate_field, scan_and_translate};

/// 创建路由
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(|| async { "Hello, World!" }))
        // 检查并添加翻译字段
        .route("/api/scan/check-field", get(check_translate_field))
        // 扫描并翻译
        .route(
            "/api/scan/translate",
            get(scan_and_translate).post(scan_and_translate),
        )
        .route("/api/scan/status", get(backfill_status))
        // 首页最近更新
        .route("/api/index/latest", get(latest_updates))
        .route("/api/index/articles", get(latest_articles))
        .route("/api/actor/types", get(actor_types))
        // 请求日志，经 tracing 的 log 兼容层写入 log4rs
        .layer(
            TraceLayer::new_for_http()
                .on_response(DefaultOnResponse::new().level(Level::INFO))
                .on_failure(DefaultOnFailure::new().level(Level::WARN)),
        )
        .with_state(state)
}
