//! 路由测试：内存数据库 + 进程内模拟翻译服务。

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::body::{to_bytes, Body};
use axum::extract::Query;
use axum::http::{Method, Request, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use vod_backfill::config::AppConfig;
use vod_backfill::routes;
use vod_backfill::services::{HttpTranslator, VideoDbManager};
use vod_backfill::AppState;

/// 模拟翻译服务：`坏` 开头的文本返回 500
async fn mock_translation_service() -> String {
    let app = Router::new().route(
        "/translate",
        get(|Query(q): Query<HashMap<String, String>>| async move {
            let text = q.get("text").cloned().unwrap_or_default();
            if text.starts_with('坏') {
                return Err((StatusCode::INTERNAL_SERVER_ERROR, "boom"));
            }
            Ok(Json(serde_json::json!({ "translated_text": format!("EN:{}", text) })))
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}/translate", addr)
}

async fn app_state(schema: &str, extra: &[(&str, &str)]) -> Arc<AppState> {
    let endpoint = mock_translation_service().await;
    let mut vars: HashMap<String, String> = HashMap::from([
        ("TRANSLATE_API_URL".to_string(), endpoint),
        ("TRANSLATE_RETRY_BACKOFF_MS".to_string(), "1".to_string()),
        ("TRANSLATE_MAX_RETRIES".to_string(), "1".to_string()),
        ("BACKFILL_BATCH_DELAY_MS".to_string(), "0".to_string()),
    ]);
    for (k, v) in extra {
        vars.insert(k.to_string(), v.to_string());
    }
    let config = AppConfig::from_lookup(|key| vars.get(key).cloned()).unwrap();

    let manager = VideoDbManager::open_in_memory().unwrap();
    manager.connection().execute_batch(schema).unwrap();

    Arc::new(AppState::new(
        &config,
        Arc::new(Mutex::new(manager)),
        Arc::new(HttpTranslator::new(config.translator.clone()).unwrap()),
        CancellationToken::new(),
    ))
}

async fn call(state: &Arc<AppState>, method: Method, uri: &str) -> Value {
    let response = routes::router(state.clone())
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

const MOVIES: &str = "CREATE TABLE mac_movie (id INTEGER PRIMARY KEY, name TEXT);
    INSERT INTO mac_movie (id, name) VALUES (1, '电影A'), (2, ''), (3, '坏片');";

#[tokio::test]
async fn check_field_adds_then_reports_existing() {
    let state = app_state(MOVIES, &[]).await;

    let first = call(&state, Method::GET, "/api/scan/check-field").await;
    assert_eq!(first["code"], 1);
    assert_eq!(first["msg"], "翻译字段添加成功");
    assert!(first.get("data").is_none());

    let second = call(&state, Method::GET, "/api/scan/check-field?table=movie").await;
    assert_eq!(second["code"], 1);
    assert_eq!(second["msg"], "翻译字段已存在");
}

#[tokio::test]
async fn scan_and_translate_reports_counts() {
    let state = app_state(MOVIES, &[]).await;

    let body = call(&state, Method::POST, "/api/scan/translate").await;
    assert_eq!(body["code"], 1);
    assert_eq!(body["msg"], "扫描完成，成功翻译: 1 条，失败: 1 条");
    let report = &body["data"][0];
    assert_eq!(report["table"], "mac_movie");
    assert_eq!(report["scanned"], 3);
    assert_eq!(report["skipped"], 1);

    {
        let db = state.db_manager.lock().unwrap();
        let (name, flag): (String, i64) = db
            .connection()
            .query_row("SELECT name, translated FROM mac_movie WHERE id = 1", [], |r| {
                Ok((r.get(0)?, r.get(1)?))
            })
            .unwrap();
        assert_eq!(name, "EN:电影A");
        assert_eq!(flag, 1);
    }

    // 失败的行在下一次运行中重试
    let again = call(&state, Method::GET, "/api/scan/translate?table=mac_movie").await;
    assert_eq!(again["msg"], "扫描完成，成功翻译: 0 条，失败: 1 条");
    assert_eq!(again["data"][0]["scanned"], 2);

    let status = call(&state, Method::GET, "/api/scan/status").await;
    assert_eq!(status["code"], 1);
    assert_eq!(status["data"]["running"].as_array().unwrap().len(), 0);
    assert_eq!(status["data"]["reports"][0]["failed"], 1);
}

#[tokio::test]
async fn errors_use_the_failure_envelope() {
    let state = app_state(MOVIES, &[]).await;

    let unknown = call(&state, Method::GET, "/api/scan/translate?table=vod").await;
    assert_eq!(unknown["code"], 0);
    assert_eq!(unknown["msg"], "未配置的数据表: vod");

    let missing = app_state("CREATE TABLE other (id INTEGER);", &[]).await;
    let body = call(&missing, Method::GET, "/api/scan/check-field").await;
    assert_eq!(body["code"], 0);
    assert_eq!(body["msg"], "数据表 mac_movie 不存在");
}

#[tokio::test]
async fn overlapping_runs_are_rejected() {
    let state = app_state(MOVIES, &[]).await;
    let _guard = state.registry.try_begin("mac_movie").unwrap();

    let body = call(&state, Method::GET, "/api/scan/translate").await;
    assert_eq!(body["code"], 0);
    assert_eq!(body["msg"], "数据表 mac_movie 的翻译任务正在运行");

    let status = call(&state, Method::GET, "/api/scan/status").await;
    assert_eq!(status["data"]["running"][0]["table"], "mac_movie");
}

#[tokio::test]
async fn busy_table_rejects_the_whole_request() {
    let state = app_state(MOVIES_AND_VODS, &[("BACKFILL_TABLES", "movie,vod")]).await;
    let _guard = state.registry.try_begin("mac_vod").unwrap();

    let body = call(&state, Method::GET, "/api/scan/translate").await;
    assert_eq!(body["code"], 0);
    assert_eq!(body["msg"], "数据表 mac_vod 的翻译任务正在运行");

    // 前面的表也没有被处理
    assert!(!state.registry.is_running("mac_movie"));
    assert!(state.registry.last_reports().is_empty());
    let db = state.db_manager.lock().unwrap();
    let name: String = db
        .connection()
        .query_row("SELECT name FROM mac_movie WHERE id = 1", [], |r| r.get(0))
        .unwrap();
    assert_eq!(name, "电影A");
}

#[tokio::test]
async fn aborted_table_keeps_other_reports() {
    let state = app_state(MOVIES, &[("BACKFILL_TABLES", "movie,vod")]).await;

    let body = call(&state, Method::POST, "/api/scan/translate").await;
    assert_eq!(body["code"], 1);
    assert_eq!(
        body["msg"],
        "扫描完成，成功翻译: 1 条，失败: 1 条；数据表 mac_vod 回填中止: 数据表 mac_vod 不存在"
    );
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"][0]["table"], "mac_movie");
    assert_eq!(body["data"][0]["succeeded"], 1);
}

#[tokio::test]
async fn interrupted_run_is_reported_in_the_message() {
    let state = app_state(MOVIES, &[]).await;
    state.shutdown.cancel();

    let body = call(&state, Method::GET, "/api/scan/translate").await;
    assert_eq!(body["code"], 1);
    assert_eq!(
        body["msg"],
        "扫描完成，成功翻译: 0 条，失败: 0 条；任务已中断，未处理的记录留待下次: mac_movie"
    );
    assert_eq!(body["data"][0]["interrupted"], true);
}

const MOVIES_AND_VODS: &str = "CREATE TABLE mac_movie (id INTEGER PRIMARY KEY, name TEXT);
    INSERT INTO mac_movie (id, name) VALUES (1, '电影A');
    CREATE TABLE mac_vod (id INTEGER PRIMARY KEY, name TEXT);
    INSERT INTO mac_vod (id, name) VALUES (1, '影片A');";

const CATALOG: &str = "CREATE TABLE mac_type (
        type_id INTEGER PRIMARY KEY, type_name TEXT NOT NULL, type_pid INTEGER NOT NULL,
        type_mid INTEGER NOT NULL, type_sort INTEGER NOT NULL, type_status INTEGER NOT NULL);
    CREATE TABLE mac_vod (
        vod_id INTEGER PRIMARY KEY, type_id INTEGER NOT NULL,
        vod_name TEXT NOT NULL, vod_time_add INTEGER NOT NULL);
    INSERT INTO mac_type VALUES (1, '电影', 0, 1, 1, 1), (6, '动作片', 1, 1, 1, 1),
        (20, '内地明星', 0, 8, 1, 1);
    INSERT INTO mac_vod VALUES (1, 6, '老片', 100), (2, 6, '新片', 200);
    CREATE TABLE mac_art (
        art_id INTEGER PRIMARY KEY, type_id INTEGER NOT NULL,
        art_name TEXT NOT NULL, art_time INTEGER NOT NULL);
    INSERT INTO mac_type VALUES (30, '新闻', 0, 2, 1, 1);
    INSERT INTO mac_art VALUES (1, 30, '旧闻', 10), (2, 30, '快讯', 30), (3, 30, '公告', 20);";

#[tokio::test]
async fn catalog_endpoints() {
    let state = app_state(CATALOG, &[("HOME_TYPE_IDS", "1")]).await;

    let latest = call(&state, Method::GET, "/api/index/latest").await;
    assert_eq!(latest["code"], 1);
    assert_eq!(latest["data"][0]["vod_type_name"], "电影");
    assert_eq!(latest["data"][0]["vod_son_name_list"]["6"], "动作片");
    assert_eq!(latest["data"][0]["vod_detail_array"][0]["vod_name"], "新片");

    let none = call(&state, Method::GET, "/api/index/latest?types=999").await;
    assert_eq!(none["data"].as_array().unwrap().len(), 0);

    let bad = call(&state, Method::GET, "/api/index/latest?types=a,b").await;
    assert_eq!(bad["code"], 0);

    let actors = call(&state, Method::GET, "/api/actor/types").await;
    assert_eq!(actors["data"][0]["type_name"], "内地明星");

    let articles = call(&state, Method::GET, "/api/index/articles").await;
    assert_eq!(articles["code"], 1);
    assert_eq!(articles["data"]["count_num"], 3);
    assert_eq!(articles["data"]["art_type_ids"][0], 30);
    assert_eq!(articles["data"]["articles"][0]["art_name"], "快讯");
    assert_eq!(articles["data"]["articles"].as_array().unwrap().len(), 3);
}
