use serde::Serialize;

use crate::id::{FeedId, ItemId};

/// Minimal article record handed to callers. Built fresh on every fetch.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Article {
    pub id: ItemId,
    pub title: String,
    pub summary: String,
    pub url: String,
    /// Unix timestamp, seconds.
    pub published: i64,
    pub feed_name: String,
    pub is_read: bool,
    pub is_starred: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Feed {
    pub id: FeedId,
    pub name: String,
    pub url: String,
    pub unread_count: u64,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FeedStats {
    pub feed_id: FeedId,
    pub feed_name: String,
    pub unread_count: u64,
    pub total_count: u64,
    pub last_updated: i64,
}
