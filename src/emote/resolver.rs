//! Turns the text after the bot's name into an emote command.

use crate::emote::error::EmoteError;
use crate::emote::member::{Member, MemberDirectory};
use crate::emote::registry::EmoteRegistry;

/// Verbs that list the available emotes unless an emote claims them.
pub const LIST_VERBS: &[&str] = &["emotes", "help"];

/// Tokens split into their roles, before any lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand<'a> {
    pub verb: String,
    pub target: Option<&'a str>,
    pub message: Option<String>,
}

/// An emote ready to be composed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub verb: String,
    pub receiver: Option<Member>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    ListEmotes,
    Emote(Invocation),
}

/// Strip the bot's name from the start of a message.
///
/// Any of `triggers` may appear, optionally `@`-prefixed and in any case,
/// followed by whitespace, `,`, `:` or the end of the message. Returns the
/// text after the name.
pub fn strip_trigger<'a>(content: &'a str, triggers: &[String]) -> Option<&'a str> {
    let content = content.trim_start();
    let body = content.strip_prefix('@').unwrap_or(content);

    let mut names: Vec<&str> = triggers
        .iter()
        .map(|t| t.trim().trim_start_matches('@'))
        .filter(|t| !t.is_empty())
        .collect();
    // "Sophie Bot" must win over "Sophie"
    names.sort_by_key(|name| std::cmp::Reverse(name.chars().count()));

    for name in names {
        let Some(rest) = strip_prefix_ignore_case(body, name) else {
            continue;
        };
        match rest.chars().next() {
            None => return Some(rest),
            Some(c) if c.is_whitespace() || c == ',' || c == ':' => {
                return Some(rest.trim_start_matches(|c: char| c.is_whitespace() || c == ',' || c == ':'));
            }
            Some(_) => continue,
        }
    }
    None
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let mut rest = s;
    for p in prefix.chars() {
        let mut chars = rest.chars();
        let c = chars.next()?;
        if !c.to_lowercase().eq(p.to_lowercase()) {
            return None;
        }
        rest = chars.as_str();
    }
    Some(rest)
}

/// Split tokens into verb, optional target and optional free text.
pub fn parse<'a>(tokens: &[&'a str]) -> Option<ParsedCommand<'a>> {
    let (verb, rest) = tokens.split_first()?;

    let target = rest
        .first()
        .copied()
        .map(|t| t.strip_prefix('@').unwrap_or(t))
        .filter(|t| !t.is_empty());
    let message = (rest.len() > 1).then(|| rest[1..].join(" "));

    Some(ParsedCommand { verb: verb.to_lowercase(), target, message })
}

/// Find a member by name.
///
/// A case-insensitive exact match on nickname or username wins; failing
/// that, the first member whose nickname or username starts with `name`.
/// Ties go to whoever comes first in `members`.
pub fn find_member<'m>(members: &'m [Member], name: &str) -> Option<&'m Member> {
    let needle = name.to_lowercase();
    if needle.is_empty() {
        return None;
    }

    members
        .iter()
        .find(|m| {
            let (nick, user) = lowered_names(m);
            nick == needle || user == needle
        })
        .or_else(|| {
            members.iter().find(|m| {
                let (nick, user) = lowered_names(m);
                (!nick.is_empty() && nick.starts_with(&needle)) || user.starts_with(&needle)
            })
        })
}

fn lowered_names(member: &Member) -> (String, String) {
    let nick = member.nickname.as_deref().unwrap_or("").to_lowercase();
    (nick, member.username.to_lowercase())
}

/// Resolve a parsed command against the registry and the chat's members.
///
/// Returns `Ok(None)` for anything that should be silently ignored: unknown
/// verbs, verbs without media, and targets that match nobody.
pub fn resolve(
    parsed: ParsedCommand<'_>,
    registry: &EmoteRegistry,
    chat_id: i64,
    directory: &dyn MemberDirectory,
) -> Result<Option<Command>, EmoteError> {
    if !registry.is_usable(&parsed.verb) {
        if registry.get(&parsed.verb).is_none() && LIST_VERBS.contains(&parsed.verb.as_str()) {
            return Ok(Some(Command::ListEmotes));
        }
        return Ok(None);
    }

    let receiver = match parsed.target {
        Some(target) => {
            let members = directory.list_members(chat_id)?;
            match find_member(&members, target) {
                Some(member) => Some(member.clone()),
                None => return Ok(None),
            }
        }
        None => None,
    };

    Ok(Some(Command::Emote(Invocation {
        verb: parsed.verb,
        receiver,
        message: parsed.message,
    })))
}
