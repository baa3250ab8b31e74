//! Renders an emote and records it in the counter ledger.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::sync::{Arc, Mutex};

use crate::emote::error::EmoteError;
use crate::emote::member::Member;
use crate::emote::registry::EmoteRegistry;
use crate::emote::store::{Direction, StatsStore};
use crate::emote::template::{self, Arg};

/// Longest free text quoted into a description, in characters.
/// Keeps the rendered caption well under Telegram's 1024-character limit.
pub const MAX_QUOTE_CHARS: usize = 200;

/// Quote the user's free text, cutting it on a char boundary if too long.
fn quote(text: &str) -> String {
    match text.char_indices().nth(MAX_QUOTE_CHARS) {
        Some((end, _)) => format!("\"{}...\"", &text[..end]),
        None => format!("\"{}\"", text),
    }
}

/// A rendered emote, ready to be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InteractionResult {
    pub description: String,
    pub image_url: String,
    pub footer: String,
}

pub struct EmbedComposer {
    registry: Arc<EmoteRegistry>,
    store: StatsStore,
    rng: Mutex<StdRng>,
}

impl EmbedComposer {
    pub fn new(registry: Arc<EmoteRegistry>, store: StatsStore) -> Self {
        Self::with_rng(registry, store, StdRng::from_entropy())
    }

    pub fn with_rng(registry: Arc<EmoteRegistry>, store: StatsStore, rng: StdRng) -> Self {
        Self { registry, store, rng: Mutex::new(rng) }
    }

    /// Render `verb` from `sender`, optionally aimed at `receiver`.
    ///
    /// Returns `Ok(None)` without touching any counter when the verb has no
    /// templates or no media. Counters are incremented before the text is
    /// rendered; an increment that already committed stays committed if a
    /// later step fails.
    pub fn compose(
        &self,
        verb: &str,
        sender: &Member,
        receiver: Option<&Member>,
        message: Option<&str>,
    ) -> Result<Option<InteractionResult>, EmoteError> {
        let Some(emote) = self.registry.get(verb) else {
            return Ok(None);
        };
        let Some(image_url) = self.pick_media(verb) else {
            return Ok(None);
        };

        let sender_name = sender.display_name();
        let quoted = match message {
            Some(text) if !text.is_empty() => quote(text),
            _ => String::new(),
        };
        let sender_id = sender.counter_id();

        let (description, footer) = match receiver {
            None => {
                let received = self.store.get_received_count(verb, &sender_id)?;
                let sent = self.store.increment(verb, &sender_id, Direction::Sent)?;

                (
                    template::render(&emote.sender_message, &[sender_name.into(), quoted.as_str().into()]),
                    template::render(&emote.sender_stats, &[sender_name.into(), sent.into(), received.into()]),
                )
            }
            Some(receiver) => {
                let receiver_name = receiver.display_name();
                let receiver_id = receiver.counter_id();

                self.store.increment(verb, &sender_id, Direction::Sent)?;
                // The footer shows the receiver's own sent count as it stood
                let receiver_sent = self.store.get_sent_count(verb, &receiver_id)?;
                let receiver_received = self.store.increment(verb, &receiver_id, Direction::Received)?;

                (
                    template::render(
                        &emote.receiver_message,
                        &[sender_name.into(), receiver_name.into(), quoted.as_str().into()],
                    ),
                    template::render(
                        &emote.receiver_stats,
                        &[receiver_name.into(), Arg::Int(receiver_sent), Arg::Int(receiver_received)],
                    ),
                )
            }
        };

        Ok(Some(InteractionResult { description, image_url, footer }))
    }

    fn pick_media(&self, verb: &str) -> Option<String> {
        let media = self.registry.media(verb);
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        media.choose(&mut *rng).cloned()
    }
}
