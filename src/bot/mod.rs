//! Telegram side of the bot: client, member roster.

pub mod roster;
pub mod telegram;

pub use roster::{Roster, format_timestamp};
pub use telegram::{TelegramClient, member_from_user, render_caption};
