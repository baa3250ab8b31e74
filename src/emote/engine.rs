//! Entry point used by the bot: message text in, outcome out.

use std::sync::Arc;
use tracing::debug;

use crate::emote::composer::{EmbedComposer, InteractionResult};
use crate::emote::error::EmoteError;
use crate::emote::member::{Member, MemberDirectory};
use crate::emote::registry::EmoteRegistry;
use crate::emote::resolver::{self, Command};
use crate::emote::store::StatsStore;

/// What the bot should do with a message addressed to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Not an emote we know; say nothing.
    Ignored,
    Interaction(InteractionResult),
    /// Sorted verbs that can be used.
    EmoteList(Vec<String>),
}

pub struct EmoteEngine {
    registry: Arc<EmoteRegistry>,
    composer: EmbedComposer,
    directory: Arc<dyn MemberDirectory>,
}

impl EmoteEngine {
    pub fn new(registry: Arc<EmoteRegistry>, store: StatsStore, directory: Arc<dyn MemberDirectory>) -> Self {
        let composer = EmbedComposer::new(registry.clone(), store);
        Self::with_composer(registry, composer, directory)
    }

    pub fn with_composer(
        registry: Arc<EmoteRegistry>,
        composer: EmbedComposer,
        directory: Arc<dyn MemberDirectory>,
    ) -> Self {
        Self { registry, composer, directory }
    }

    /// Handle the text that followed the bot's name in `chat_id`.
    pub fn handle(&self, chat_id: i64, sender: &Member, command_text: &str) -> Result<Outcome, EmoteError> {
        let tokens: Vec<&str> = command_text.split_whitespace().collect();
        let Some(parsed) = resolver::parse(&tokens) else {
            return Ok(Outcome::Ignored);
        };

        let command = resolver::resolve(parsed, &self.registry, chat_id, self.directory.as_ref())?;
        match command {
            None => Ok(Outcome::Ignored),
            Some(Command::ListEmotes) => Ok(Outcome::EmoteList(self.registry.verbs())),
            Some(Command::Emote(invocation)) => {
                let result = self.composer.compose(
                    &invocation.verb,
                    sender,
                    invocation.receiver.as_ref(),
                    invocation.message.as_deref(),
                )?;
                match result {
                    Some(result) => {
                        debug!(
                            "{} used {} on {:?} in chat {}",
                            sender.user_id,
                            invocation.verb,
                            invocation.receiver.as_ref().map(|r| r.user_id),
                            chat_id
                        );
                        Ok(Outcome::Interaction(result))
                    }
                    None => Ok(Outcome::Ignored),
                }
            }
        }
    }
}
