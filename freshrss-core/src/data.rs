use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::sync::Arc;

use chrono::Utc;
use futures_util::future::try_join_all;
use tracing::{debug, info, warn};

use crate::config::{OutputConfig, ReaderConfig};
use crate::error::{ReaderError, Result};
use crate::feed::{Article, Feed, FeedStats};
use crate::id::{self, FeedId, ItemId, TagId};
use crate::projection::{project_batch, truncate, FeedDirectory};
use crate::session::SessionManager;
use crate::wire::{ItemBatch, RawSubscription, StreamRequest, StreamSelector, WireClient};

/// Parameters of [`ReaderApi::unread_articles`].
#[derive(Debug, Clone, Default)]
pub struct UnreadQuery {
    pub limit: usize,
    /// Empty means every subscription.
    pub feeds: Vec<FeedId>,
    /// Drop articles published strictly before this Unix timestamp.
    pub since: Option<i64>,
    pub summary_bound: Option<usize>,
}

/// Read-side queries and tag mutations against the aggregator. Cheap to
/// clone; clones share one HTTP client and one session.
#[derive(Clone)]
pub struct ReaderApi {
    wire: Arc<WireClient>,
    output: OutputConfig,
}

impl ReaderApi {
    pub fn new(config: &ReaderConfig) -> Result<Self> {
        Ok(Self {
            wire: Arc::new(WireClient::new(config)?),
            output: config.output.clone(),
        })
    }

    pub fn output(&self) -> &OutputConfig {
        &self.output
    }

    pub fn session(&self) -> &SessionManager {
        self.wire.session()
    }

    /// Unread articles, newest first. With several feeds, one stream call
    /// is issued per feed and the results are merged.
    pub async fn unread_articles(&self, query: &UnreadQuery) -> Result<Vec<Article>> {
        check_limit(query.limit)?;
        let articles = self
            .fetch_unread(query.limit, &query.feeds, query.since, query.summary_bound)
            .await?;
        info!(count = articles.len(), feeds = query.feeds.len(), "fetched unread articles");
        Ok(articles)
    }

    pub async fn articles_by_feed(
        &self,
        feed: FeedId,
        limit: usize,
        include_read: bool,
    ) -> Result<Vec<Article>> {
        check_limit(limit)?;
        let request = StreamRequest::new(StreamSelector::Feed(feed), limit).exclude_read(!include_read);
        let (directory, batch) =
            tokio::try_join!(self.directory(), self.wire.stream_contents(&request))?;

        let mut articles = project_batch(
            batch.items,
            &directory,
            Some(self.output.default_summary_length),
        );
        if !include_read {
            articles.retain(|article| !article.is_read);
        }
        articles.truncate(limit);
        info!(%feed, count = articles.len(), include_read, "fetched feed articles");
        Ok(articles)
    }

    /// Case-insensitive substring match on title and summary over an
    /// over-fetched batch of unread articles. Approximate: no stemming and
    /// no ranking, and matches beyond the fetch cap are never seen.
    pub async fn search_articles(
        &self,
        query: &str,
        limit: usize,
        feeds: &[FeedId],
    ) -> Result<Vec<Article>> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Err(ReaderError::Validation("search query must not be empty".into()));
        }
        check_limit(limit)?;

        let cap = limit
            .saturating_mul(self.output.search_overfetch_factor)
            .min(self.output.max_fetch)
            .max(limit);
        let pool = self.fetch_unread(cap, feeds, None, None).await?;
        let scanned = pool.len();

        let bound = Some(self.output.default_summary_length);
        let matches: Vec<Article> = pool
            .into_iter()
            .filter(|article| {
                article.title.to_lowercase().contains(&needle)
                    || article.summary.to_lowercase().contains(&needle)
            })
            .take(limit)
            .map(|mut article| {
                article.summary = truncate(&article.summary, bound).into_owned();
                article
            })
            .collect();
        info!(scanned, matched = matches.len(), "searched articles");
        Ok(matches)
    }

    pub async fn list_feeds(&self) -> Result<Vec<Feed>> {
        let (subscriptions, counts) =
            tokio::try_join!(self.wire.list_subscriptions(), self.wire.unread_counts())?;
        Ok(join_feeds(&subscriptions, &counts))
    }

    pub async fn feed_info(&self, feed: FeedId) -> Result<Feed> {
        self.list_feeds()
            .await?
            .into_iter()
            .find(|candidate| candidate.id == feed)
            .ok_or(ReaderError::FeedNotFound(feed.value()))
    }

    /// Per-feed counters. The API exposes no total or freshness per feed:
    /// `total_count` is always 0 and `last_updated` is the time of this call.
    pub async fn feed_stats(&self) -> Result<Vec<FeedStats>> {
        let (subscriptions, counts) =
            tokio::try_join!(self.wire.list_subscriptions(), self.wire.unread_counts())?;
        let now = Utc::now().timestamp();
        Ok(join_feeds(&subscriptions, &counts)
            .into_iter()
            .map(|feed| FeedStats {
                feed_id: feed.id,
                feed_name: feed.name,
                unread_count: feed.unread_count,
                total_count: 0,
                last_updated: now,
            })
            .collect())
    }

    pub async fn mark_read(&self, items: &[ItemId]) -> Result<bool> {
        self.edit_batch(items, Some(&TagId::READ), None).await
    }

    pub async fn mark_unread(&self, items: &[ItemId]) -> Result<bool> {
        self.edit_batch(items, None, Some(&TagId::READ)).await
    }

    pub async fn star(&self, item: ItemId) -> Result<bool> {
        self.wire.edit_tag(&[item], Some(&TagId::STARRED), None).await
    }

    pub async fn unstar(&self, item: ItemId) -> Result<bool> {
        self.wire.edit_tag(&[item], None, Some(&TagId::STARRED)).await
    }

    async fn edit_batch(
        &self,
        items: &[ItemId],
        add: Option<&TagId>,
        remove: Option<&TagId>,
    ) -> Result<bool> {
        let items = unique(items);
        if items.is_empty() {
            debug!("nothing to edit");
            return Ok(true);
        }
        self.wire.edit_tag(&items, add, remove).await
    }

    async fn directory(&self) -> Result<FeedDirectory> {
        let subscriptions = self.wire.list_subscriptions().await?;
        Ok(FeedDirectory::from_subscriptions(&subscriptions))
    }

    async fn fetch_unread(
        &self,
        limit: usize,
        feeds: &[FeedId],
        since: Option<i64>,
        summary_bound: Option<usize>,
    ) -> Result<Vec<Article>> {
        let feeds = unique(feeds);
        let (directory, batches): (FeedDirectory, Vec<ItemBatch>) = if feeds.is_empty() {
            let request = StreamRequest::new(StreamSelector::AllItems, limit).newer_than(since);
            let (directory, batch) =
                tokio::try_join!(self.directory(), self.wire.stream_contents(&request))?;
            (directory, vec![batch])
        } else {
            let requests: Vec<StreamRequest> = feeds
                .iter()
                .map(|feed| StreamRequest::new(StreamSelector::Feed(*feed), limit).newer_than(since))
                .collect();
            tokio::try_join!(
                self.directory(),
                try_join_all(requests.iter().map(|request| self.wire.stream_contents(request)))
            )?
        };

        let merged = batches.len() > 1;
        let mut articles = merge_unique(
            batches
                .into_iter()
                .map(|batch| project_batch(batch.items, &directory, summary_bound)),
        );
        articles.retain(|article| {
            !article.is_read && since.map_or(true, |floor| article.published >= floor)
        });
        if merged {
            // stable, so equal timestamps keep feed order
            articles.sort_by(|a, b| b.published.cmp(&a.published));
        }
        articles.truncate(limit);
        Ok(articles)
    }
}

/// Concatenates batches, keeping the first occurrence of each article id.
pub fn merge_unique<I>(batches: I) -> Vec<Article>
where
    I: IntoIterator<Item = Vec<Article>>,
{
    let mut seen = HashSet::new();
    batches
        .into_iter()
        .flatten()
        .filter(|article| seen.insert(article.id))
        .collect()
}

fn join_feeds(subscriptions: &[RawSubscription], counts: &HashMap<FeedId, u64>) -> Vec<Feed> {
    subscriptions
        .iter()
        .filter_map(|sub| match id::decode_feed(&sub.id) {
            Ok(feed) => Some(Feed {
                id: feed,
                name: sub.title.clone(),
                url: sub.url.clone(),
                unread_count: counts.get(&feed).copied().unwrap_or(0),
            }),
            Err(err) => {
                warn!(error = %err, "skipping subscription");
                None
            }
        })
        .collect()
}

fn check_limit(limit: usize) -> Result<()> {
    if limit == 0 {
        return Err(ReaderError::Validation("limit must be a positive integer".into()));
    }
    Ok(())
}

fn unique<T: Copy + Eq + Hash>(ids: &[T]) -> Vec<T> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article(id: &str, feed_name: &str, published: i64) -> Article {
        Article {
            id: id::decode_item(id).unwrap(),
            title: format!("article {id}"),
            summary: String::new(),
            url: String::new(),
            published,
            feed_name: feed_name.into(),
            is_read: false,
            is_starred: false,
        }
    }

    #[test]
    fn merge_keeps_first_copy_of_shared_article() {
        let first = vec![article("1", "A", 30), article("2", "A", 20)];
        let second = vec![article("2", "B", 20), article("3", "B", 10)];
        let merged = merge_unique([first, second]);

        let ids: Vec<u64> = merged.iter().map(|a| a.id.value()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(merged[1].feed_name, "A");
    }

    #[test]
    fn unique_preserves_order() {
        assert_eq!(unique(&[3, 1, 3, 2, 1]), vec![3, 1, 2]);
    }

    #[test]
    fn feeds_without_counts_default_to_zero() {
        let subs = vec![
            RawSubscription {
                id: "feed/1".into(),
                title: "One".into(),
                url: "https://one.example/rss".into(),
            },
            RawSubscription {
                id: "feed/http://legacy".into(),
                title: "Legacy".into(),
                url: String::new(),
            },
        ];
        let counts = HashMap::new();
        let feeds = join_feeds(&subs, &counts);
        assert_eq!(feeds.len(), 1);
        assert_eq!(feeds[0].unread_count, 0);
    }
}
