//! User and channel directory
//!
//! In-memory lookups over the `users.jsonl` and `channels.jsonl` snapshots
//! written by each sync. The snapshots keep server order, which is also the
//! order channels are synced in.

use crate::output::{jsonl, OutputResult, StoreLayout};
use crate::{ChannelRef, UserRef};
use std::collections::HashMap;

/// Workspace members by id
#[derive(Debug, Clone, Default)]
pub struct Users {
    users: Vec<UserRef>,
    index: HashMap<String, usize>,
}

impl Users {
    /// Build from a member list
    pub fn new(users: Vec<UserRef>) -> Self {
        let index = users
            .iter()
            .enumerate()
            .map(|(i, user)| (user.id.clone(), i))
            .collect();
        Self { users, index }
    }

    /// Load the store's snapshot
    pub fn load(layout: &StoreLayout) -> OutputResult<Self> {
        Ok(Self::new(jsonl::read_day(&layout.users_path())?))
    }

    /// Member with `user_id`
    pub fn for_id(&self, user_id: &str) -> Option<&UserRef> {
        self.index.get(user_id).map(|&i| &self.users[i])
    }

    /// Handle of `user_id`, falling back to the id itself
    pub fn handle<'a>(&'a self, user_id: &'a str) -> &'a str {
        self.for_id(user_id)
            .map(|user| user.name.as_str())
            .unwrap_or(user_id)
    }

    /// All members in snapshot order
    pub fn all(&self) -> &[UserRef] {
        &self.users
    }

    /// Number of members
    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// Whether the directory is empty
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

/// Conversations by id
#[derive(Debug, Clone, Default)]
pub struct Channels {
    channels: Vec<ChannelRef>,
    index: HashMap<String, usize>,
}

impl Channels {
    /// Build from a conversation list
    pub fn new(channels: Vec<ChannelRef>) -> Self {
        let index = channels
            .iter()
            .enumerate()
            .map(|(i, channel)| (channel.id.clone(), i))
            .collect();
        Self { channels, index }
    }

    /// Load the store's snapshot
    pub fn load(layout: &StoreLayout) -> OutputResult<Self> {
        Ok(Self::new(jsonl::read_day(&layout.channels_path())?))
    }

    /// Conversation with `channel_id`
    pub fn for_id(&self, channel_id: &str) -> Option<&ChannelRef> {
        self.index.get(channel_id).map(|&i| &self.channels[i])
    }

    /// Conversations whose history is synced, in snapshot order
    pub fn eligible(&self) -> impl Iterator<Item = &ChannelRef> {
        self.channels.iter().filter(|channel| channel.is_eligible())
    }

    /// Human readable name of `channel_id`
    ///
    /// The channel name, else the counterpart's handle for a direct message,
    /// else the id.
    pub fn display_name(&self, channel_id: &str, users: &Users) -> String {
        let Some(channel) = self.for_id(channel_id) else {
            return channel_id.to_string();
        };

        if let Some(name) = &channel.name {
            return name.clone();
        }

        channel
            .user
            .as_deref()
            .and_then(|user_id| users.for_id(user_id))
            .map(|user| user.name.clone())
            .unwrap_or_else(|| channel_id.to_string())
    }

    /// All conversations in snapshot order
    pub fn all(&self) -> &[ChannelRef] {
        &self.channels
    }

    /// Number of conversations
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Whether the directory is empty
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}
