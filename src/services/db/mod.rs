//! 数据库模块
//!
//! 提供连接管理、表结构检查、待翻译数据的读写以及分类列表查询。

pub mod catalog_dao;
pub mod connection;
pub mod error;
pub mod schema;
pub mod video_dao;

pub use catalog_dao::CatalogDao;
pub use connection::VideoDbManager;
pub use error::{StoreError, StoreResult};
pub use schema::ColumnStatus;
pub use video_dao::{VideoDao, VideoStore};
