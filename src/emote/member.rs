use crate::emote::error::LookupError;

/// A chat member as seen by the emote engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub user_id: i64,
    /// Platform handle, or the full name when the user has no handle.
    pub username: String,
    pub nickname: Option<String>,
}

impl Member {
    pub fn new(user_id: i64, username: impl Into<String>, nickname: Option<String>) -> Self {
        Self { user_id, username: username.into(), nickname }
    }

    /// Nickname if set, otherwise the username.
    pub fn display_name(&self) -> &str {
        match self.nickname.as_deref() {
            Some(nick) if !nick.is_empty() => nick,
            _ => &self.username,
        }
    }

    /// Key used for this member's counters.
    pub fn counter_id(&self) -> String {
        self.user_id.to_string()
    }
}

/// Enumerates the members of a group chat.
pub trait MemberDirectory: Send + Sync {
    /// Members in enumeration order.
    fn list_members(&self, chat_id: i64) -> Result<Vec<Member>, LookupError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_prefers_nickname() {
        let member = Member::new(1, "grace_h", Some("Grace".to_string()));
        assert_eq!(member.display_name(), "Grace");
    }

    #[test]
    fn test_display_name_falls_back_to_username() {
        assert_eq!(Member::new(2, "Ada", None).display_name(), "Ada");
        assert_eq!(Member::new(3, "Ada", Some(String::new())).display_name(), "Ada");
    }
}
