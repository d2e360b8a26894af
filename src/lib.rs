pub mod classifier;
pub mod config;
pub mod expenses;
pub mod parser;
pub mod telegram_log;
