//! Emote definitions and their media, loaded once at startup.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

use crate::config::ConfigError;

/// A configured interaction type and its message templates.
#[derive(Debug, Clone, Deserialize)]
pub struct Emote {
    #[serde(alias = "Verb")]
    pub verb: String,
    /// Placeholders: sender name, quoted message.
    #[serde(alias = "SenderMessage", alias = "senderMessage")]
    pub sender_message: String,
    /// Placeholders: sender name, sent count, received count.
    #[serde(alias = "SenderDescription", alias = "senderDescription", alias = "senderStats")]
    pub sender_stats: String,
    /// Placeholders: sender name, receiver name, quoted message.
    #[serde(alias = "ReceiverMessage", alias = "receiverMessage")]
    pub receiver_message: String,
    /// Placeholders: receiver name, receiver's sent count, receiver's received count.
    #[serde(alias = "ReceiverDescription", alias = "receiverDescription", alias = "receiverStats")]
    pub receiver_stats: String,
}

/// One image associated with a verb.
#[derive(Debug, Clone, Deserialize)]
pub struct Gif {
    #[serde(alias = "Verb")]
    pub verb: String,
    #[serde(alias = "URL", alias = "Url")]
    pub url: String,
}

#[derive(Deserialize)]
struct EmotesFile {
    #[serde(default, rename = "emote")]
    emotes: Vec<Emote>,
    #[serde(default, rename = "gif")]
    gifs: Vec<Gif>,
}

/// Verb → templates and verb → media lookup. Verbs are case-insensitive.
#[derive(Debug, Default)]
pub struct EmoteRegistry {
    emotes: HashMap<String, Emote>,
    media: HashMap<String, Vec<String>>,
}

impl EmoteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the emotes file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFile { path: path.to_path_buf(), source: e })?;
        let file: EmotesFile = toml::from_str(&content)
            .map_err(|e| ConfigError::ParseToml { path: path.to_path_buf(), source: e })?;

        let registry = Self::from_entries(file.emotes, file.gifs)?;
        info!(
            "Loaded {} emotes and {} images from {:?}",
            registry.emotes.len(),
            registry.media.values().map(Vec::len).sum::<usize>(),
            path
        );
        Ok(registry)
    }

    /// Build a registry from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let file: EmotesFile = toml::from_str(content).map_err(|e| ConfigError::ParseToml {
            path: "<inline>".into(),
            source: e,
        })?;
        Self::from_entries(file.emotes, file.gifs)
    }

    fn from_entries(emotes: Vec<Emote>, gifs: Vec<Gif>) -> Result<Self, ConfigError> {
        let mut registry = Self::new();
        for emote in emotes {
            if emote.verb.trim().is_empty() {
                return Err(ConfigError::Validation("emote with empty verb".into()));
            }
            registry.add_emote(emote);
        }
        for gif in gifs {
            if gif.verb.trim().is_empty() {
                return Err(ConfigError::Validation(format!("gif '{}' has an empty verb", gif.url)));
            }
            registry.add_media(gif);
        }
        Ok(registry)
    }

    /// Register an emote. A later emote with the same verb replaces the earlier one.
    pub fn add_emote(&mut self, emote: Emote) {
        self.emotes.insert(normalize(&emote.verb), emote);
    }

    /// Append an image to the verb's media list.
    pub fn add_media(&mut self, gif: Gif) {
        self.media.entry(normalize(&gif.verb)).or_default().push(gif.url);
    }

    pub fn get(&self, verb: &str) -> Option<&Emote> {
        self.emotes.get(&normalize(verb))
    }

    /// Media URLs for a verb in load order. Empty for unknown verbs.
    pub fn media(&self, verb: &str) -> &[String] {
        self.media.get(&normalize(verb)).map(Vec::as_slice).unwrap_or(&[])
    }

    /// True if the verb has templates and at least one image.
    pub fn is_usable(&self, verb: &str) -> bool {
        self.get(verb).is_some() && !self.media(verb).is_empty()
    }

    /// Sorted list of verbs that can actually be used.
    pub fn verbs(&self) -> Vec<String> {
        let mut verbs: Vec<String> = self
            .emotes
            .keys()
            .filter(|verb| self.is_usable(verb))
            .cloned()
            .collect();
        verbs.sort();
        verbs
    }
}

fn normalize(verb: &str) -> String {
    verb.trim().to_lowercase()
}
