use super::{Guild, Member, User};
use chrono::{DateTime, Utc};

/// Represents an incoming chat message
#[derive(Debug, Clone)]
pub struct Message {
    pub id: String,
    pub channel_id: String,
    pub guild: Option<Guild>,
    pub author: User,
    pub member: Option<Member>,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(channel_id: impl Into<String>, author: User, content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            channel_id: channel_id.into(),
            guild: None,
            author,
            member: None,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn in_guild(mut self, guild: Guild) -> Self {
        self.guild = Some(guild);
        self
    }

    pub fn with_member(mut self, member: Member) -> Self {
        self.member = Some(member);
        self
    }

    /// Scope the message belongs to, `None` for direct messages
    pub fn scope_id(&self) -> Option<&str> {
        self.guild.as_ref().map(|g| g.id.as_str())
    }

    /// Whitespace separated tokens of the trimmed content
    pub fn tokens(&self) -> Vec<&str> {
        self.content.split_whitespace().collect()
    }
}
