//! 命令行一次性回填
//!
//! 依次处理所有配置的数据表后退出。单张表出错不影响其他表。

use anyhow::Context;
use log::{error, info};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

use vod_backfill::config::AppConfig;
use vod_backfill::models::summary_message;
use vod_backfill::services::{BackfillJob, HttpTranslator, VideoDao, VideoDbManager};
use vod_backfill::utils::init_logger;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env().context("加载配置失败")?;
    init_logger(&config.log).context("初始化日志失败")?;

    let db_manager = Arc::new(Mutex::new(
        VideoDbManager::new(&config.database_path)
            .with_context(|| format!("打开数据库失败: {}", config.database_path))?,
    ));
    let translator = Arc::new(
        HttpTranslator::new(config.translator.clone()).context("创建翻译客户端失败")?,
    );

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("收到退出信号，停止回填");
                cancel.cancel();
            }
        });
    }

    let (mut succeeded, mut failed, mut aborted) = (0u64, 0u64, 0usize);
    for spec in &config.tables {
        info!("Processing table: {}", spec.table);

        let dao = match VideoDao::new(db_manager.clone(), spec.clone()) {
            Ok(dao) => Arc::new(dao),
            Err(e) => {
                error!("数据表 {} 配置无效: {}", spec.table, e);
                aborted += 1;
                continue;
            }
        };

        let job = BackfillJob::new(dao, translator.clone(), config.backfill.clone());
        match job.run(cancel.clone()).await {
            Ok(report) => {
                info!("{}: {}", spec.table, report.summary());
                succeeded += report.succeeded;
                failed += report.failed;
                if report.interrupted {
                    break;
                }
            }
            Err(e) => {
                error!("数据表 {} 回填失败: {}", spec.table, e);
                aborted += 1;
            }
        }
    }

    info!("{}", summary_message(succeeded, failed));
    if aborted > 0 {
        anyhow::bail!("{} 张数据表回填失败", aborted);
    }
    Ok(())
}
