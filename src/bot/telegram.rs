//! Telegram client using teloxide.

use teloxide::prelude::*;
use teloxide::types::{InputFile, MessageId, ParseMode, ReplyParameters, User};
use teloxide::utils::html;
use thiserror::Error;
use tracing::{info, warn};

use crate::emote::{InteractionResult, Member};

#[derive(Debug, Error)]
pub enum SendError {
    #[error("invalid media url '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("telegram request failed: {0}")]
    Request(#[from] teloxide::RequestError),
}

/// How a media URL is posted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Animation,
    Photo,
}

impl MediaKind {
    pub fn for_url(url: &str) -> Self {
        let path = url.split(['?', '#']).next().unwrap_or(url).to_lowercase();
        if path.ends_with(".gif") || path.ends_with(".mp4") || path.ends_with(".gifv") {
            MediaKind::Animation
        } else {
            MediaKind::Photo
        }
    }
}

/// Build a `Member` from a Telegram user.
///
/// Users with an @handle are matched by handle and shown by full name;
/// users without one only have their full name.
pub fn member_from_user(user: &User) -> Member {
    match &user.username {
        Some(handle) => Member::new(user.id.0 as i64, handle.clone(), Some(user.full_name())),
        None => Member::new(user.id.0 as i64, user.full_name(), None),
    }
}

/// Telegram rejects media captions longer than this many characters.
pub const MAX_CAPTION_CHARS: usize = 1024;

/// HTML caption: description, blank line, italic footer.
///
/// The description is cut to keep the whole caption within
/// [`MAX_CAPTION_CHARS`]; the footer and markup are never cut.
pub fn render_caption(result: &InteractionResult) -> String {
    let footer = if result.footer.is_empty() {
        String::new()
    } else {
        format!("\n\n<i>{}</i>", html::escape(&result.footer))
    };
    let budget = MAX_CAPTION_CHARS.saturating_sub(footer.chars().count());
    format!("{}{}", escape_within(&result.description, budget), footer)
}

/// HTML-escape `text`, stopping before the escaped form exceeds `max_chars`.
/// Entities are never split.
fn escape_within(text: &str, max_chars: usize) -> String {
    let mut out = String::new();
    let mut len = 0;
    let mut buf = [0u8; 4];
    for c in text.chars() {
        let piece = match c {
            '<' => "&lt;",
            '>' => "&gt;",
            '&' => "&amp;",
            _ => &*c.encode_utf8(&mut buf),
        };
        let piece_len = piece.chars().count();
        if len + piece_len > max_chars {
            break;
        }
        out.push_str(piece);
        len += piece_len;
    }
    out
}

/// Telegram API client.
pub struct TelegramClient {
    bot: Bot,
}

impl TelegramClient {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    /// Post a rendered emote as an animation or photo with its caption.
    pub async fn send_interaction(
        &self,
        chat_id: i64,
        result: &InteractionResult,
        reply_to_message_id: Option<i64>,
    ) -> Result<i64, SendError> {
        let url = url::Url::parse(&result.image_url).map_err(|e| SendError::InvalidUrl {
            url: result.image_url.clone(),
            source: e,
        })?;
        let caption = render_caption(result);
        let chat_id = ChatId(chat_id);
        let reply_params = reply_to_message_id.map(|id| ReplyParameters::new(MessageId(id as i32)));

        let sent = match MediaKind::for_url(&result.image_url) {
            MediaKind::Animation => {
                let mut request = self
                    .bot
                    .send_animation(chat_id, InputFile::url(url))
                    .caption(caption)
                    .parse_mode(ParseMode::Html);
                if let Some(params) = reply_params {
                    request = request.reply_parameters(params);
                }
                request.await
            }
            MediaKind::Photo => {
                let mut request = self
                    .bot
                    .send_photo(chat_id, InputFile::url(url))
                    .caption(caption)
                    .parse_mode(ParseMode::Html);
                if let Some(params) = reply_params {
                    request = request.reply_parameters(params);
                }
                request.await
            }
        };

        let msg = sent.inspect_err(|e| warn!("Failed to send emote: {e}"))?;
        info!("📤 Sent emote to chat {} (msg {})", chat_id, msg.id.0);
        Ok(msg.id.0 as i64)
    }

    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<i64, SendError> {
        let msg = self
            .bot
            .send_message(ChatId(chat_id), text)
            .await
            .inspect_err(|e| warn!("Failed to send: {e}"))?;
        Ok(msg.id.0 as i64)
    }
}
