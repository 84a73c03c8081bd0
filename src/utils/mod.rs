mod common;
mod logger;
pub use common::{is_valid_identifier, is_valid_prefix, now_string, recent_window};
pub use logger::init_logger;
