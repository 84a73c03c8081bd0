pub mod backfill;
pub mod db;
pub mod translator;

pub use backfill::{BackfillError, BackfillJob, BackfillRegistry, RunGuard};
pub use db::{CatalogDao, ColumnStatus, StoreError, VideoDao, VideoDbManager, VideoStore};
pub use translator::{HttpTranslator, TranslateError, Translator};
