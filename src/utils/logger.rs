//! 日志初始化
//!
//! 基于 log4rs 输出到控制台，配置了 `LOG_FILE` 时同时写入文件。
//! tower-http 的请求日志通过 tracing 的 `log` 特性转发到这里。

use log4rs::append::console::ConsoleAppender;
use log4rs::append::file::FileAppender;
use log::LevelFilter;
use log4rs::config::{Appender, Config, Logger, Root};
use log4rs::encode::pattern::PatternEncoder;

use crate::config::LogConfig;

const PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S%.3f)} {h({l:<5})} {t} - {m}{n}";

/// 初始化全局日志
pub fn init_logger(config: &LogConfig) -> anyhow::Result<()> {
    let stdout = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(PATTERN)))
        .build();

    let mut builder =
        Config::builder().appender(Appender::builder().build("stdout", Box::new(stdout)));
    let mut root = Root::builder().appender("stdout");

    if let Some(path) = &config.file {
        let file = FileAppender::builder()
            .encoder(Box::new(PatternEncoder::new(PATTERN)))
            .build(path)?;
        builder = builder.appender(Appender::builder().build("file", Box::new(file)));
        root = root.appender("file");
    }

    // tracing 的 span 进出事件过于频繁，最多输出 warn 级别
    let span_level = config.level.min(LevelFilter::Warn);
    let log_config = builder
        .logger(Logger::builder().build("tracing::span", span_level))
        .build(root.build(config.level))?;
    log4rs::init_config(log_config)?;
    Ok(())
}
