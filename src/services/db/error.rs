use crate::config::ConfigError;

/// 数据库层错误
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("数据库错误: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("数据表 {0} 不存在")]
    TableNotFound(String),

    #[error("数据表 {table} 中不存在字段 {column}")]
    ColumnNotFound { table: String, column: String },

    #[error(transparent)]
    InvalidSpec(#[from] ConfigError),

    #[error("数据库连接锁已损坏")]
    LockPoisoned,
}

impl<T> From<std::sync::PoisonError<T>> for StoreError {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        StoreError::LockPoisoned
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
