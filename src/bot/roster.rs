//! Group member roster.
//!
//! The Bot API cannot enumerate a group's members, so the roster is built
//! from what the bot observes: authors of group messages and `chat_member`
//! updates. Target lookups for emotes search this roster.

use chrono::{DateTime, Utc};
use rusqlite::params;
use std::sync::Arc;
use tracing::{debug, info};

use crate::database::{Database, StorageError};
use crate::emote::{LookupError, Member, MemberDirectory};

/// Member status in the group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberStatus {
    Member,
    Left,
    Banned,
}

impl MemberStatus {
    fn as_str(self) -> &'static str {
        match self {
            MemberStatus::Member => "member",
            MemberStatus::Left => "left",
            MemberStatus::Banned => "banned",
        }
    }
}

/// Timestamp format stored in `first_seen` / `last_seen`.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M").to_string()
}

pub struct Roster {
    db: Arc<Database>,
}

impl Roster {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Record that `member` posted in `chat_id`.
    pub fn record_message(&self, chat_id: i64, member: &Member, timestamp: &str) -> Result<(), StorageError> {
        let conn = self.db.lock();
        conn.execute(
            "INSERT INTO members (chat_id, user_id, username, nickname, first_seen, last_seen, message_count, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5, 1, 'member')
             ON CONFLICT(chat_id, user_id) DO UPDATE SET
                username = ?3,
                nickname = ?4,
                last_seen = ?5,
                message_count = message_count + 1,
                status = 'member'",
            params![chat_id, member.user_id, member.username, member.nickname, timestamp],
        )?;
        Ok(())
    }

    /// Record a member joining or being added.
    pub fn member_joined(&self, chat_id: i64, member: &Member, timestamp: &str) -> Result<(), StorageError> {
        let conn = self.db.lock();
        conn.execute(
            "INSERT INTO members (chat_id, user_id, username, nickname, first_seen, status)
             VALUES (?1, ?2, ?3, ?4, ?5, 'member')
             ON CONFLICT(chat_id, user_id) DO UPDATE SET
                username = ?3,
                nickname = ?4,
                status = 'member'",
            params![chat_id, member.user_id, member.username, member.nickname, timestamp],
        )?;
        info!("👋 Member joined chat {}: {} ({})", chat_id, member.display_name(), member.user_id);
        Ok(())
    }

    pub fn member_left(&self, chat_id: i64, user_id: i64) -> Result<(), StorageError> {
        self.set_status(chat_id, user_id, MemberStatus::Left)
    }

    pub fn member_banned(&self, chat_id: i64, user_id: i64) -> Result<(), StorageError> {
        self.set_status(chat_id, user_id, MemberStatus::Banned)
    }

    fn set_status(&self, chat_id: i64, user_id: i64, status: MemberStatus) -> Result<(), StorageError> {
        let conn = self.db.lock();
        conn.execute(
            "UPDATE members SET status = ?3 WHERE chat_id = ?1 AND user_id = ?2",
            params![chat_id, user_id, status.as_str()],
        )?;
        debug!("Member {} in chat {} is now {}", user_id, chat_id, status.as_str());
        Ok(())
    }

    /// Current members of a chat in the order they were first seen.
    pub fn members(&self, chat_id: i64) -> Result<Vec<Member>, StorageError> {
        let conn = self.db.lock();
        let mut stmt = conn.prepare(
            "SELECT user_id, username, nickname FROM members
             WHERE chat_id = ?1 AND status = 'member'
             ORDER BY rowid ASC",
        )?;
        let rows = stmt.query_map(params![chat_id], |row| {
            Ok(Member {
                user_id: row.get(0)?,
                username: row.get(1)?,
                nickname: row.get(2)?,
            })
        })?;
        let members = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(members)
    }
}

impl MemberDirectory for Roster {
    fn list_members(&self, chat_id: i64) -> Result<Vec<Member>, LookupError> {
        Ok(self.members(chat_id)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emote::resolver::find_member;

    fn roster() -> Roster {
        Roster::new(Arc::new(Database::in_memory().unwrap()))
    }

    fn grace() -> Member {
        Member::new(1, "grace_h", Some("Grace Hopper".to_string()))
    }

    fn ada() -> Member {
        Member::new(2, "Ada Lovelace", None)
    }

    #[test]
    fn test_format_timestamp() {
        let at = DateTime::from_timestamp(1_705_312_800, 0).unwrap();
        assert_eq!(format_timestamp(at), "2024-01-15 10:00");
    }

    #[test]
    fn test_message_adds_member() {
        let roster = roster();
        roster.record_message(-100, &grace(), "2024-01-15 10:00").unwrap();
        roster.record_message(-100, &grace(), "2024-01-15 10:05").unwrap();

        assert_eq!(roster.members(-100).unwrap(), vec![grace()]);
        assert!(roster.members(-200).unwrap().is_empty());
    }

    #[test]
    fn test_members_in_first_seen_order() {
        let roster = roster();
        roster.record_message(-100, &grace(), "2024-01-15 10:00").unwrap();
        roster.member_joined(-100, &ada(), "2024-01-15 10:01").unwrap();
        roster.record_message(-100, &grace(), "2024-01-15 10:02").unwrap();

        let ids: Vec<i64> = roster.members(-100).unwrap().iter().map(|m| m.user_id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn test_profile_changes_are_tracked() {
        let roster = roster();
        roster.record_message(-100, &grace(), "2024-01-15 10:00").unwrap();

        let renamed = Member::new(1, "admiral", Some("Grace".to_string()));
        roster.record_message(-100, &renamed, "2024-01-16 10:00").unwrap();
        assert_eq!(roster.members(-100).unwrap(), vec![renamed]);
    }

    #[test]
    fn test_member_status_changes() {
        let roster = roster();
        roster.member_joined(-100, &ada(), "2024-01-15 10:00").unwrap();
        assert_eq!(roster.members(-100).unwrap().len(), 1);

        roster.member_left(-100, 2).unwrap();
        assert!(roster.members(-100).unwrap().is_empty());

        roster.member_joined(-100, &ada(), "2024-01-16 10:00").unwrap();
        assert_eq!(roster.members(-100).unwrap().len(), 1);

        roster.member_banned(-100, 2).unwrap();
        assert!(roster.members(-100).unwrap().is_empty());

        // Posting again brings the member back
        roster.record_message(-100, &ada(), "2024-01-17 10:00").unwrap();
        assert_eq!(roster.members(-100).unwrap().len(), 1);
    }

    #[test]
    fn test_directory_lookup() {
        let roster = roster();
        roster.record_message(-100, &grace(), "2024-01-15 10:00").unwrap();
        roster.record_message(-100, &ada(), "2024-01-15 10:01").unwrap();

        let members = roster.list_members(-100).unwrap();
        assert_eq!(find_member(&members, "ada").unwrap().user_id, 2);
        assert_eq!(find_member(&members, "GRACE_H").unwrap().user_id, 1);
        assert_eq!(find_member(&members, "grace hop").unwrap().user_id, 1);
    }
}
