pub mod config;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;

use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;

use config::{AppConfig, BackfillConfig, TableSpec};
use services::{BackfillRegistry, HttpTranslator, VideoDbManager};

// 全局共享状态
pub struct AppState {
    pub db_manager: Arc<Mutex<VideoDbManager>>,
    pub translator: Arc<HttpTranslator>,
    pub tables: Vec<TableSpec>,
    pub table_prefix: String,
    pub home_type_ids: Vec<i64>,
    pub backfill: BackfillConfig,
    pub registry: BackfillRegistry,
    /// 服务关闭时取消所有运行中的回填任务
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(
        config: &AppConfig,
        db_manager: Arc<Mutex<VideoDbManager>>,
        translator: Arc<HttpTranslator>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            db_manager,
            translator,
            tables: config.tables.clone(),
            table_prefix: config.table_prefix.clone(),
            home_type_ids: config.home_type_ids.clone(),
            backfill: config.backfill.clone(),
            registry: BackfillRegistry::new(),
            shutdown,
        }
    }
}
