//! Emote interactions: registry, counter ledger, command parsing and rendering.

pub mod composer;
pub mod engine;
pub mod error;
pub mod member;
pub mod registry;
pub mod resolver;
pub mod store;
pub mod template;

pub use composer::{EmbedComposer, InteractionResult};
pub use engine::{EmoteEngine, Outcome};
pub use error::{EmoteError, LookupError};
pub use member::{Member, MemberDirectory};
pub use registry::{Emote, EmoteRegistry, Gif};
pub use store::{Direction, StatsStore};
