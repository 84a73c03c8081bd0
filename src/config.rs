//! 运行配置
//!
//! 所有配置项都来自环境变量（启动时由 dotenvy 加载 `.env`），每一项都有默认值：
//!
//! | 变量 | 默认值 |
//! |---|---|
//! | `DATABASE_PATH` | `videos.db` |
//! | `DATABASE_TABLE_PREFIX` | `mac_` |
//! | `SERVER_ADDR` | `0.0.0.0:3000` |
//! | `BACKFILL_TABLES` | `movie:id:name` |
//! | `TRANSLATE_API_URL` | `http://127.0.0.1:8010/translate` |
//! | `TRANSLATE_TIMEOUT_SECS` | `10` |
//! | `TRANSLATE_MAX_RETRIES` | `2` |
//! | `TRANSLATE_RETRY_BACKOFF_MS` | `200` |
//! | `BACKFILL_BATCH_SIZE` | `100` |
//! | `BACKFILL_CONCURRENCY` | CPU 核数 |
//! | `BACKFILL_BATCH_DELAY_MS` | `100` |
//! | `BACKFILL_RUN_TIMEOUT_SECS` | 不限制 |
//! | `HOME_TYPE_IDS` | 空 |
//! | `LOG_LEVEL` | `info` |
//! | `LOG_FILE` | 不写文件 |

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use log::LevelFilter;
use serde::Serialize;
use url::Url;

use crate::utils::{is_valid_identifier, is_valid_prefix};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("环境变量 {name} 的值无效: {value}")]
    InvalidValue { name: &'static str, value: String },

    #[error("非法的 SQL 标识符: {0}")]
    InvalidIdentifier(String),

    #[error("数据表配置格式错误: {0}")]
    InvalidTableEntry(String),

    #[error("翻译接口地址无效: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("数据表 {0} 没有配置待翻译字段")]
    NoFields(String),

    #[error("数据表 {table} 的字段 {column} 不能作为译文字段")]
    ColumnConflict { table: String, column: String },

    #[error("未配置任何需要翻译的数据表")]
    NoTables,
}

/// 一个待翻译字段：从 `source` 读取原文，译文写入 `target`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldSpec {
    pub source: String,
    /// 未设置时直接覆盖源字段
    pub target: Option<String>,
}

impl FieldSpec {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: None,
        }
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// 译文实际写入的字段
    pub fn write_column(&self) -> &str {
        self.target.as_deref().unwrap_or(&self.source)
    }

    /// 解析 `source` 或 `source>target`
    fn parse(raw: &str) -> Option<Self> {
        match raw.split_once('>') {
            Some((source, target)) => {
                let (source, target) = (source.trim(), target.trim());
                if source.is_empty() || target.is_empty() {
                    return None;
                }
                Some(FieldSpec::new(source).with_target(target))
            }
            None => {
                let source = raw.trim();
                (!source.is_empty()).then(|| FieldSpec::new(source))
            }
        }
    }
}

impl std::fmt::Display for FieldSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.target {
            Some(target) => write!(f, "{} -> {}", self.source, target),
            None => write!(f, "{}", self.source),
        }
    }
}

/// 需要回填翻译的数据表描述
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableSpec {
    /// 完整表名（已包含前缀）
    pub table: String,
    pub primary_key: String,
    /// 待翻译的字段，第一个为标题字段
    pub fields: Vec<FieldSpec>,
    /// 是否已翻译的标记字段
    pub flag_column: String,
}

impl TableSpec {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            primary_key: "id".to_string(),
            fields: vec![FieldSpec::new("name")],
            flag_column: "translated".to_string(),
        }
    }

    pub fn with_primary_key(mut self, column: impl Into<String>) -> Self {
        self.primary_key = column.into();
        self
    }

    /// 修改标题字段的源字段
    pub fn with_title_column(mut self, column: impl Into<String>) -> Self {
        match self.fields.first_mut() {
            Some(first) => first.source = column.into(),
            None => self.fields.push(FieldSpec::new(column)),
        }
        self
    }

    /// 修改标题字段的译文字段
    pub fn with_target_column(mut self, column: impl Into<String>) -> Self {
        if let Some(first) = self.fields.first_mut() {
            first.target = Some(column.into());
        }
        self
    }

    pub fn with_fields(mut self, fields: Vec<FieldSpec>) -> Self {
        self.fields = fields;
        self
    }

    pub fn with_flag_column(mut self, column: impl Into<String>) -> Self {
        self.flag_column = column.into();
        self
    }

    /// 校验所有标识符，SQL 拼接前必须调用
    ///
    /// 同一个字段不能被写入两次，也不能是主键或标记字段。
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fields.is_empty() {
            return Err(ConfigError::NoFields(self.table.clone()));
        }

        let mut names = vec![&self.table, &self.primary_key, &self.flag_column];
        for field in &self.fields {
            names.push(&field.source);
            if let Some(target) = &field.target {
                names.push(target);
            }
        }
        for name in names {
            if !is_valid_identifier(name) {
                return Err(ConfigError::InvalidIdentifier(name.clone()));
            }
        }

        let mut written: Vec<&str> = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            let column = field.write_column();
            let reserved = [self.primary_key.as_str(), self.flag_column.as_str()];
            if reserved.iter().chain(written.iter()).any(|c| c.eq_ignore_ascii_case(column)) {
                return Err(ConfigError::ColumnConflict {
                    table: self.table.clone(),
                    column: column.to_string(),
                });
            }
            written.push(column);
        }
        Ok(())
    }

    /// 解析 `table[:primary_key[:fields[:target_column]]]`
    ///
    /// `fields` 为 `+` 分隔的 `source` 或 `source>target`，例如
    /// `vod:vod_id:vod_name>vod_name_en+vod_blurb>vod_blurb_en`。
    /// 只有一个字段时也可以用第四段指定译文字段。
    pub fn parse(entry: &str, prefix: &str) -> Result<Self, ConfigError> {
        let invalid = || ConfigError::InvalidTableEntry(entry.to_string());

        let parts: Vec<&str> = entry.trim().split(':').map(str::trim).collect();
        if parts.len() > 4 || parts.iter().any(|p| p.is_empty()) {
            return Err(invalid());
        }

        let mut spec = TableSpec::new(format!("{}{}", prefix, parts[0]));
        if let Some(pk) = parts.get(1) {
            spec = spec.with_primary_key(*pk);
        }
        if let Some(fields) = parts.get(2) {
            let fields = fields
                .split('+')
                .map(FieldSpec::parse)
                .collect::<Option<Vec<_>>>()
                .ok_or_else(invalid)?;
            spec = spec.with_fields(fields);
        }
        if let Some(target) = parts.get(3) {
            if spec.fields.len() != 1 || spec.fields[0].target.is_some() {
                return Err(invalid());
            }
            spec = spec.with_target_column(*target);
        }

        spec.validate()?;
        Ok(spec)
    }

    /// 按完整表名或去掉前缀后的表名匹配
    pub fn matches(&self, name: &str, prefix: &str) -> bool {
        self.table == name || self.table.strip_prefix(prefix) == Some(name)
    }

    /// 字段映射的可读描述，用于日志
    pub fn describe_fields(&self) -> String {
        self.fields
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// 翻译服务客户端配置
#[derive(Debug, Clone)]
pub struct TranslatorConfig {
    pub endpoint: Url,
    pub timeout: Duration,
    /// 首次请求之外的最大重试次数
    pub max_retries: u32,
    pub retry_backoff: Duration,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            endpoint: Url::parse("http://127.0.0.1:8010/translate").expect("default endpoint"),
            timeout: Duration::from_secs(10),
            max_retries: 2,
            retry_backoff: Duration::from_millis(200),
        }
    }
}

/// 回填任务配置
#[derive(Debug, Clone)]
pub struct BackfillConfig {
    pub batch_size: usize,
    pub concurrency: usize,
    pub batch_delay: Duration,
    pub run_timeout: Option<Duration>,
}

impl Default for BackfillConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            concurrency: num_cpus::get(),
            batch_delay: Duration::from_millis(100),
            run_timeout: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: LevelFilter,
    pub file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LevelFilter::Info,
            file: None,
        }
    }
}

/// 应用配置
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_path: String,
    pub table_prefix: String,
    pub bind_addr: SocketAddr,
    pub tables: Vec<TableSpec>,
    pub home_type_ids: Vec<i64>,
    pub translator: TranslatorConfig,
    pub backfill: BackfillConfig,
    pub log: LogConfig,
}

impl AppConfig {
    /// 从进程环境变量读取配置
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 从任意键值来源读取配置
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let table_prefix = get("DATABASE_TABLE_PREFIX").unwrap_or_else(|| "mac_".to_string());
        if !is_valid_prefix(&table_prefix) {
            return Err(ConfigError::InvalidIdentifier(table_prefix));
        }

        let tables = get("BACKFILL_TABLES")
            .unwrap_or_else(|| "movie:id:name".to_string())
            .split(',')
            .filter(|entry| !entry.trim().is_empty())
            .map(|entry| TableSpec::parse(entry, &table_prefix))
            .collect::<Result<Vec<_>, _>>()?;
        if tables.is_empty() {
            return Err(ConfigError::NoTables);
        }

        let home_type_ids = match get("HOME_TYPE_IDS") {
            Some(raw) => parse_id_list(&raw).ok_or(ConfigError::InvalidValue {
                name: "HOME_TYPE_IDS",
                value: raw,
            })?,
            None => Vec::new(),
        };

        let translator_defaults = TranslatorConfig::default();
        let translator = TranslatorConfig {
            endpoint: match get("TRANSLATE_API_URL") {
                Some(raw) => Url::parse(&raw)?,
                None => translator_defaults.endpoint,
            },
            timeout: Duration::from_secs(parse_or(
                &get,
                "TRANSLATE_TIMEOUT_SECS",
                translator_defaults.timeout.as_secs(),
            )?),
            max_retries: parse_or(&get, "TRANSLATE_MAX_RETRIES", translator_defaults.max_retries)?,
            retry_backoff: Duration::from_millis(parse_or(
                &get,
                "TRANSLATE_RETRY_BACKOFF_MS",
                translator_defaults.retry_backoff.as_millis() as u64,
            )?),
        };

        let backfill_defaults = BackfillConfig::default();
        let batch_size: usize = parse_or(&get, "BACKFILL_BATCH_SIZE", backfill_defaults.batch_size)?;
        let concurrency: usize =
            parse_or(&get, "BACKFILL_CONCURRENCY", backfill_defaults.concurrency)?;
        if batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                name: "BACKFILL_BATCH_SIZE",
                value: "0".to_string(),
            });
        }
        if concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                name: "BACKFILL_CONCURRENCY",
                value: "0".to_string(),
            });
        }

        let backfill = BackfillConfig {
            batch_size,
            concurrency,
            batch_delay: Duration::from_millis(parse_or(
                &get,
                "BACKFILL_BATCH_DELAY_MS",
                backfill_defaults.batch_delay.as_millis() as u64,
            )?),
            run_timeout: match get("BACKFILL_RUN_TIMEOUT_SECS") {
                Some(raw) => Some(Duration::from_secs(raw.trim().parse().map_err(|_| {
                    ConfigError::InvalidValue {
                        name: "BACKFILL_RUN_TIMEOUT_SECS",
                        value: raw.clone(),
                    }
                })?)),
                None => None,
            },
        };

        let log = LogConfig {
            level: parse_or(&get, "LOG_LEVEL", LevelFilter::Info)?,
            file: get("LOG_FILE").map(PathBuf::from),
        };

        Ok(Self {
            database_path: get("DATABASE_PATH").unwrap_or_else(|| "videos.db".to_string()),
            table_prefix,
            bind_addr: parse_or(&get, "SERVER_ADDR", SocketAddr::from(([0, 0, 0, 0], 3000)))?,
            tables,
            home_type_ids,
            translator,
            backfill,
            log,
        })
    }
}

/// 解析逗号分隔的 id 列表，空项忽略
pub fn parse_id_list(raw: &str) -> Option<Vec<i64>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse().ok())
        .collect()
}

fn parse_or<T, G>(get: &G, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { name, value: raw }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_target_prefixed_movie_table() {
        let config = config_from(&[]).unwrap();

        assert_eq!(config.database_path, "videos.db");
        assert_eq!(config.tables, vec![TableSpec::new("mac_movie")]);
        assert_eq!(
            config.translator.endpoint.as_str(),
            "http://127.0.0.1:8010/translate"
        );
        assert_eq!(config.translator.max_retries, 2);
        assert!(config.backfill.concurrency >= 1);
        assert_eq!(config.backfill.run_timeout, None);
        assert_eq!(config.log.level, LevelFilter::Info);
    }

    #[test]
    fn parses_table_entries() {
        let config = config_from(&[
            ("DATABASE_TABLE_PREFIX", "cms_"),
            ("BACKFILL_TABLES", "movie, vod:vod_id:vod_name:vod_en"),
        ])
        .unwrap();

        assert_eq!(config.tables.len(), 2);
        assert_eq!(config.tables[0].table, "cms_movie");
        let vod = &config.tables[1];
        assert_eq!(vod.table, "cms_vod");
        assert_eq!(vod.primary_key, "vod_id");
        assert_eq!(vod.fields, vec![FieldSpec::new("vod_name").with_target("vod_en")]);
        assert!(vod.matches("vod", "cms_"));
        assert!(vod.matches("cms_vod", "cms_"));
        assert!(!vod.matches("movie", "cms_"));
    }

    #[test]
    fn parses_several_fields_per_table() {
        let config = config_from(&[(
            "BACKFILL_TABLES",
            "vod:vod_id:vod_name>vod_name_en+vod_blurb>vod_blurb_en+vod_remarks",
        )])
        .unwrap();

        let vod = &config.tables[0];
        assert_eq!(
            vod.fields,
            vec![
                FieldSpec::new("vod_name").with_target("vod_name_en"),
                FieldSpec::new("vod_blurb").with_target("vod_blurb_en"),
                FieldSpec::new("vod_remarks"),
            ]
        );
        assert_eq!(vod.fields[2].write_column(), "vod_remarks");
        assert_eq!(
            vod.describe_fields(),
            "vod_name -> vod_name_en, vod_blurb -> vod_blurb_en, vod_remarks"
        );
    }

    #[test]
    fn rejects_ambiguous_field_lists() {
        for entry in [
            "vod:vod_id:vod_name+vod_blurb:vod_en",
            "vod:vod_id:vod_name>vod_en:other",
            "vod:vod_id:vod_name>",
            "vod:vod_id:vod_name++vod_blurb",
        ] {
            let err = config_from(&[("BACKFILL_TABLES", entry)]).unwrap_err();
            assert!(matches!(err, ConfigError::InvalidTableEntry(_)), "{}", entry);
        }

        let err = config_from(&[("BACKFILL_TABLES", "vod:vod_id:a>x+b>x")]).unwrap_err();
        assert!(matches!(err, ConfigError::ColumnConflict { column, .. } if column == "x"));

        let err = config_from(&[("BACKFILL_TABLES", "vod:vod_id:vod_name>translated")]).unwrap_err();
        assert!(matches!(err, ConfigError::ColumnConflict { .. }));

        let spec = TableSpec::new("mac_vod").with_fields(Vec::new());
        assert!(matches!(spec.validate(), Err(ConfigError::NoFields(_))));
    }

    #[test]
    fn rejects_unsafe_identifiers() {
        let err = config_from(&[("BACKFILL_TABLES", "movie:id:name;drop")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidIdentifier(_)));

        let err = config_from(&[("DATABASE_TABLE_PREFIX", "mac-")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidIdentifier(_)));

        let err = config_from(&[("BACKFILL_TABLES", "movie::name")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidTableEntry(_)));
    }

    #[test]
    fn rejects_bad_numbers_and_urls() {
        let err = config_from(&[("BACKFILL_CONCURRENCY", "0")]).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                name: "BACKFILL_CONCURRENCY",
                ..
            }
        ));

        let err = config_from(&[("TRANSLATE_TIMEOUT_SECS", "soon")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));

        let err = config_from(&[("TRANSLATE_API_URL", "not a url")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidUrl(_)));
    }

    #[test]
    fn reads_overrides() {
        let config = config_from(&[
            ("TRANSLATE_API_URL", "http://translate.local:9000/api/translate"),
            ("BACKFILL_RUN_TIMEOUT_SECS", "30"),
            ("BACKFILL_BATCH_SIZE", "5"),
            ("HOME_TYPE_IDS", "1, 2,,3"),
            ("LOG_LEVEL", "debug"),
            ("SERVER_ADDR", "127.0.0.1:8080"),
        ])
        .unwrap();

        assert_eq!(config.translator.endpoint.host_str(), Some("translate.local"));
        assert_eq!(config.backfill.run_timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.backfill.batch_size, 5);
        assert_eq!(config.home_type_ids, vec![1, 2, 3]);
        assert_eq!(config.log.level, LevelFilter::Debug);
        assert_eq!(config.bind_addr.port(), 8080);
    }
}
