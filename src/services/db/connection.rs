use std::time::Duration;

use rusqlite::{Connection, Result};

/// 数据库连接管理器
///
/// 负责数据库连接的创建和管理。业务表由 CMS 维护，这里只负责打开连接。
pub struct VideoDbManager {
    pub(crate) conn: Connection,
}

impl VideoDbManager {
    /// 打开数据库文件
    pub fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path)?;
        Self::configure(conn)
    }

    /// 打开内存数据库
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::configure(conn)
    }

    fn configure(conn: Connection) -> Result<Self> {
        // CMS 同时在写库时等待而不是立即报 SQLITE_BUSY
        conn.busy_timeout(Duration::from_secs(5))?;
        Ok(Self { conn })
    }

    /// 底层连接
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_database_persists_between_connections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("videos.db");
        let path = path.to_string_lossy().to_string();

        {
            let manager = VideoDbManager::new(&path).unwrap();
            manager
                .connection()
                .execute_batch(
                    "CREATE TABLE mac_movie (id INTEGER PRIMARY KEY, name TEXT);
                     INSERT INTO mac_movie VALUES (1, '电影A');",
                )
                .unwrap();
        }

        let manager = VideoDbManager::new(&path).unwrap();
        let name: String = manager
            .connection()
            .query_row("SELECT name FROM mac_movie WHERE id = 1", [], |r| r.get(0))
            .unwrap();
        assert_eq!(name, "电影A");
    }
}
