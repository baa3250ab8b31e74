pub mod bot;
pub mod config;
pub mod database;
pub mod emote;
pub mod telegram_log;
