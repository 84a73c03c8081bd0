use anyhow::Context;
use axum::http::{HeaderName, HeaderValue};
use log::info;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;

use vod_backfill::config::AppConfig;
use vod_backfill::services::{HttpTranslator, VideoDbManager};
use vod_backfill::utils::init_logger;
use vod_backfill::{AppState, routes};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env().context("加载配置失败")?;
    init_logger(&config.log).context("初始化日志失败")?;

    let db_manager = VideoDbManager::new(&config.database_path)
        .with_context(|| format!("打开数据库失败: {}", config.database_path))?;
    let translator =
        HttpTranslator::new(config.translator.clone()).context("创建翻译客户端失败")?;

    let shutdown = CancellationToken::new();
    let state = Arc::new(AppState::new(
        &config,
        Arc::new(Mutex::new(db_manager)),
        Arc::new(translator),
        shutdown.clone(),
    ));

    // 创建 CORS 中间件 - 允许所有来源
    let cors = CorsLayer::new()
        .allow_origin(HeaderValue::from_static("*"))
        .allow_methods(vec![
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers(vec![HeaderName::from_static("*")]);

    let app = routes::router(state).layer(cors);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("监听地址失败: {}", config.bind_addr))?;
    info!("listening on {}", config.bind_addr);
    info!("翻译接口: {}", config.translator.endpoint);
    for spec in &config.tables {
        info!("回填数据表: {} ({})", spec.table, spec.describe_fields());
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    info!("服务已停止");
    Ok(())
}

async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("监听退出信号失败: {}", e);
        return;
    }
    info!("收到退出信号，取消运行中的回填任务");
    shutdown.cancel();
}
