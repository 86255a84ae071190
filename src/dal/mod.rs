pub mod history_log;
pub mod place_db;
