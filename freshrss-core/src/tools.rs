//! Named operations for the outer request shell.
//!
//! Arguments arrive as loose JSON. Everything is type- and range-checked
//! here, before any network call, and results leave as compact JSON.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::OutputConfig;
use crate::data::{ReaderApi, UnreadQuery};
use crate::error::{ReaderError, Result};
use crate::id::{FeedId, ItemId};

pub const TOOL_NAMES: &[&str] = &[
    "get_unread_articles",
    "get_articles_by_feed",
    "search_articles",
    "list_feeds",
    "get_feed_info",
    "get_feed_stats",
    "mark_as_read",
    "mark_as_unread",
    "star_article",
    "unstar_article",
];

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UnreadArgs {
    pub limit: Option<i64>,
    pub feed_ids: Option<Vec<i64>>,
    pub since_timestamp: Option<i64>,
    pub max_summary_length: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FeedArticlesArgs {
    pub feed_id: i64,
    pub limit: Option<i64>,
    #[serde(default)]
    pub include_read: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SearchArgs {
    pub query: String,
    pub limit: Option<i64>,
    pub feed_ids: Option<Vec<i64>>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FeedArgs {
    pub feed_id: i64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArticleIdsArgs {
    pub article_ids: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArticleArgs {
    pub article_id: i64,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct NoArgs {}

#[derive(Debug, Clone, PartialEq)]
pub enum ToolCall {
    GetUnreadArticles(UnreadArgs),
    GetArticlesByFeed(FeedArticlesArgs),
    SearchArticles(SearchArgs),
    ListFeeds,
    GetFeedInfo(FeedArgs),
    GetFeedStats,
    MarkAsRead(ArticleIdsArgs),
    MarkAsUnread(ArticleIdsArgs),
    StarArticle(ArticleArgs),
    UnstarArticle(ArticleArgs),
}

impl ToolCall {
    /// Resolves a tool name and its JSON arguments. `null` arguments are
    /// treated as an empty object.
    pub fn parse(tool: &str, arguments: Value) -> Result<Self> {
        let arguments = match arguments {
            Value::Null => Value::Object(Map::new()),
            other => other,
        };
        let call = match tool {
            "get_unread_articles" => ToolCall::GetUnreadArticles(args(tool, arguments)?),
            "get_articles_by_feed" => ToolCall::GetArticlesByFeed(args(tool, arguments)?),
            "search_articles" => ToolCall::SearchArticles(args(tool, arguments)?),
            "list_feeds" => {
                args::<NoArgs>(tool, arguments)?;
                ToolCall::ListFeeds
            }
            "get_feed_info" => ToolCall::GetFeedInfo(args(tool, arguments)?),
            "get_feed_stats" => {
                args::<NoArgs>(tool, arguments)?;
                ToolCall::GetFeedStats
            }
            "mark_as_read" => ToolCall::MarkAsRead(args(tool, arguments)?),
            "mark_as_unread" => ToolCall::MarkAsUnread(args(tool, arguments)?),
            "star_article" => ToolCall::StarArticle(args(tool, arguments)?),
            "unstar_article" => ToolCall::UnstarArticle(args(tool, arguments)?),
            other => {
                return Err(ReaderError::Validation(format!("unknown tool {other:?}")));
            }
        };
        Ok(call)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ToolCall::GetUnreadArticles(_) => "get_unread_articles",
            ToolCall::GetArticlesByFeed(_) => "get_articles_by_feed",
            ToolCall::SearchArticles(_) => "search_articles",
            ToolCall::ListFeeds => "list_feeds",
            ToolCall::GetFeedInfo(_) => "get_feed_info",
            ToolCall::GetFeedStats => "get_feed_stats",
            ToolCall::MarkAsRead(_) => "mark_as_read",
            ToolCall::MarkAsUnread(_) => "mark_as_unread",
            ToolCall::StarArticle(_) => "star_article",
            ToolCall::UnstarArticle(_) => "unstar_article",
        }
    }
}

/// Parses and runs one tool call.
pub async fn call_tool(api: &ReaderApi, tool: &str, arguments: Value) -> Result<Value> {
    let call = ToolCall::parse(tool, arguments)?;
    dispatch(api, call).await
}

pub async fn dispatch(api: &ReaderApi, call: ToolCall) -> Result<Value> {
    let out = api.output();
    match call {
        ToolCall::GetUnreadArticles(args) => {
            let query = UnreadQuery {
                limit: resolve_limit(args.limit, out.default_limit, out),
                feeds: feed_ids(args.feed_ids)?,
                since: non_negative("since_timestamp", args.since_timestamp)?,
                summary_bound: Some(
                    non_negative("max_summary_length", args.max_summary_length)?
                        .map_or(out.default_summary_length, |n| n as usize),
                ),
            };
            to_json(api.unread_articles(&query).await?)
        }
        ToolCall::GetArticlesByFeed(args) => {
            let feed = FeedId::from_raw(args.feed_id)?;
            let limit = resolve_limit(args.limit, out.default_limit, out);
            to_json(api.articles_by_feed(feed, limit, args.include_read).await?)
        }
        ToolCall::SearchArticles(args) => {
            if args.query.trim().is_empty() {
                return Err(ReaderError::Validation("query must not be empty".into()));
            }
            let feeds = feed_ids(args.feed_ids)?;
            let limit = resolve_limit(args.limit, out.default_search_limit, out);
            to_json(api.search_articles(&args.query, limit, &feeds).await?)
        }
        ToolCall::ListFeeds => to_json(api.list_feeds().await?),
        ToolCall::GetFeedInfo(args) => {
            let feed = FeedId::from_raw(args.feed_id)?;
            to_json(api.feed_info(feed).await?)
        }
        ToolCall::GetFeedStats => to_json(api.feed_stats().await?),
        ToolCall::MarkAsRead(args) => {
            let items = item_ids(&args.article_ids)?;
            Ok(Value::Bool(api.mark_read(&items).await?))
        }
        ToolCall::MarkAsUnread(args) => {
            let items = item_ids(&args.article_ids)?;
            Ok(Value::Bool(api.mark_unread(&items).await?))
        }
        ToolCall::StarArticle(args) => {
            let item = ItemId::from_raw(args.article_id)?;
            Ok(Value::Bool(api.star(item).await?))
        }
        ToolCall::UnstarArticle(args) => {
            let item = ItemId::from_raw(args.article_id)?;
            Ok(Value::Bool(api.unstar(item).await?))
        }
    }
}

/// Absent or non-positive limits fall back to `default`; anything above
/// the configured maximum is clamped.
pub fn resolve_limit(raw: Option<i64>, default: usize, out: &OutputConfig) -> usize {
    let limit = match raw {
        Some(n) if n > 0 => usize::try_from(n).unwrap_or(usize::MAX),
        _ => default,
    };
    limit.min(out.max_limit)
}

fn args<T: DeserializeOwned>(tool: &str, arguments: Value) -> Result<T> {
    serde_json::from_value(arguments)
        .map_err(|e| ReaderError::Validation(format!("{tool}: {e}")))
}

fn feed_ids(raw: Option<Vec<i64>>) -> Result<Vec<FeedId>> {
    raw.unwrap_or_default()
        .into_iter()
        .map(FeedId::from_raw)
        .collect()
}

fn item_ids(raw: &[i64]) -> Result<Vec<ItemId>> {
    raw.iter().copied().map(ItemId::from_raw).collect()
}

fn non_negative(field: &str, raw: Option<i64>) -> Result<Option<i64>> {
    match raw {
        Some(n) if n < 0 => Err(ReaderError::Validation(format!(
            "{field} must not be negative, got {n}"
        ))),
        other => Ok(other),
    }
}

fn to_json<T: Serialize>(value: T) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| ReaderError::Decode(e.to_string()))
}
