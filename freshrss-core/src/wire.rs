//! HTTP calls against the Google Reader endpoints of greader.php.

use std::collections::HashMap;

use reqwest::header::AUTHORIZATION;
use reqwest::{redirect, Client, ClientBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::ReaderConfig;
use crate::error::{ConfigError, ReaderError, Result};
use crate::id::{self, FeedId, Identifier, ItemId, TagId};
use crate::retry::RetryPolicy;
use crate::session::{SessionManager, SessionToken};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSubscription {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawItem {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub published: i64,
    #[serde(default)]
    pub alternate: Vec<RawLink>,
    #[serde(default)]
    pub canonical: Vec<RawLink>,
    #[serde(default)]
    pub summary: Option<RawContent>,
    #[serde(default)]
    pub content: Option<RawContent>,
    #[serde(default)]
    pub origin: Option<RawOrigin>,
    #[serde(default)]
    pub categories: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawLink {
    #[serde(default)]
    pub href: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawContent {
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawOrigin {
    #[serde(default)]
    pub stream_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Default)]
pub struct ItemBatch {
    pub items: Vec<RawItem>,
    pub continuation: Option<String>,
}

#[derive(Deserialize)]
struct SubscriptionList {
    #[serde(default)]
    subscriptions: Vec<RawSubscription>,
}

#[derive(Deserialize)]
struct UnreadCountList {
    #[serde(default)]
    unreadcounts: Vec<RawUnreadCount>,
}

#[derive(Deserialize)]
struct RawUnreadCount {
    #[serde(default)]
    id: String,
    #[serde(default)]
    count: u64,
}

// Items stay as loose JSON until projected one by one, so a single odd
// record cannot fail the whole batch.
#[derive(Deserialize)]
struct StreamContents {
    #[serde(default)]
    items: Vec<serde_json::Value>,
    #[serde(default)]
    continuation: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamSelector {
    AllItems,
    Feed(FeedId),
}

impl StreamSelector {
    pub fn stream_id(self) -> String {
        match self {
            StreamSelector::AllItems => TagId::READING_LIST.encode(),
            StreamSelector::Feed(feed) => feed.encode(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StreamRequest {
    pub selector: StreamSelector,
    pub count: usize,
    /// Ask the aggregator to leave read items out server-side.
    pub exclude_read: bool,
    pub newer_than: Option<i64>,
    pub continuation: Option<String>,
}

impl StreamRequest {
    pub fn new(selector: StreamSelector, count: usize) -> Self {
        Self {
            selector,
            count,
            exclude_read: true,
            newer_than: None,
            continuation: None,
        }
    }

    pub fn exclude_read(mut self, exclude: bool) -> Self {
        self.exclude_read = exclude;
        self
    }

    pub fn newer_than(mut self, timestamp: Option<i64>) -> Self {
        self.newer_than = timestamp;
        self
    }

    fn query(&self) -> Vec<(&'static str, String)> {
        let mut query = vec![("output", "json".to_owned()), ("n", self.count.to_string())];
        if self.exclude_read {
            query.push(("xt", TagId::READ.encode()));
        }
        if let Some(ts) = self.newer_than {
            query.push(("ot", ts.to_string()));
        }
        if let Some(token) = &self.continuation {
            query.push(("c", token.clone()));
        }
        query
    }
}

pub struct WireClient {
    http: Client,
    api_url: Url,
    session: SessionManager,
    reads: RetryPolicy,
    writes: RetryPolicy,
}

impl WireClient {
    pub fn new(config: &ReaderConfig) -> Result<Self> {
        config.validate()?;
        let api_url = config.api_url()?;
        let http = ClientBuilder::new()
            .redirect(redirect::Policy::limited(5))
            .user_agent(concat!("freshrss-core/", env!("CARGO_PKG_VERSION")))
            .timeout(config.requests.request_timeout())
            .build()
            .map_err(|e| {
                ReaderError::Config(ConfigError::Invalid {
                    field: "http_client",
                    reason: e.to_string(),
                })
            })?;

        let login_url = endpoint(&api_url, "accounts/ClientLogin");
        let session = SessionManager::new(
            http.clone(),
            login_url,
            config.connection.username.clone(),
            config.connection.password.clone(),
        );

        Ok(Self {
            http,
            api_url,
            session,
            reads: RetryPolicy::reads(&config.requests),
            writes: RetryPolicy::writes(&config.requests),
        })
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    pub async fn list_subscriptions(&self) -> Result<Vec<RawSubscription>> {
        let url = endpoint(&self.api_url, "reader/api/0/subscription/list");
        let query = [("output", "json".to_owned())];
        let list: SubscriptionList = self.read_json("subscription/list", &url, &query).await?;
        info!(count = list.subscriptions.len(), "retrieved subscriptions");
        Ok(list.subscriptions)
    }

    /// Unread count per feed. Label and state entries are skipped.
    pub async fn unread_counts(&self) -> Result<HashMap<FeedId, u64>> {
        let url = endpoint(&self.api_url, "reader/api/0/unread-count");
        let query = [("output", "json".to_owned())];
        let list: UnreadCountList = self.read_json("unread-count", &url, &query).await?;

        let mut counts = HashMap::with_capacity(list.unreadcounts.len());
        for entry in list.unreadcounts {
            match id::decode(&entry.id) {
                Ok(Identifier::Feed(feed)) => {
                    counts.insert(feed, entry.count);
                }
                Ok(_) => {}
                Err(err) => warn!(error = %err, "skipping unread count entry"),
            }
        }
        Ok(counts)
    }

    pub async fn stream_contents(&self, request: &StreamRequest) -> Result<ItemBatch> {
        let stream = request.selector.stream_id();
        let url = endpoint(&self.api_url, &format!("reader/api/0/stream/contents/{stream}"));
        let query = request.query();
        debug!(stream = %stream, count = request.count, exclude_read = request.exclude_read, "fetching stream contents");

        let contents: StreamContents = self.read_json("stream/contents", &url, &query).await?;
        let mut items = Vec::with_capacity(contents.items.len());
        for value in contents.items {
            match serde_json::from_value::<RawItem>(value) {
                Ok(item) => items.push(item),
                Err(err) => warn!(error = %err, "skipping undecodable stream item"),
            }
        }
        info!(stream = %stream, count = items.len(), "retrieved stream items");
        Ok(ItemBatch {
            items,
            continuation: contents.continuation,
        })
    }

    /// One edit-tag call for the whole batch. `Ok(false)` means the
    /// aggregator answered without acknowledging the change.
    pub async fn edit_tag(
        &self,
        items: &[ItemId],
        add: Option<&TagId>,
        remove: Option<&TagId>,
    ) -> Result<bool> {
        if items.is_empty() {
            return Err(ReaderError::Validation("edit-tag needs at least one item".into()));
        }
        if add.is_none() && remove.is_none() {
            return Err(ReaderError::Validation("edit-tag needs a tag to add or remove".into()));
        }

        let mut form: Vec<(&str, String)> = items.iter().map(|item| ("i", item.encode())).collect();
        if let Some(tag) = add {
            form.push(("a", tag.encode()));
        }
        if let Some(tag) = remove {
            form.push(("r", tag.encode()));
        }

        let url = endpoint(&self.api_url, "reader/api/0/edit-tag");
        let (url, form) = (&url, form.as_slice());
        let acknowledged = self
            .session
            .with_valid_session(|token| async move {
                self.writes
                    .run("edit-tag", || self.post_form(url, &token, form))
                    .await
            })
            .await?;

        if acknowledged {
            info!(count = items.len(), "updated item tags");
        } else {
            warn!(count = items.len(), "edit-tag was not acknowledged");
        }
        Ok(acknowledged)
    }

    async fn read_json<T: DeserializeOwned>(
        &self,
        operation: &str,
        url: &Url,
        query: &[(&str, String)],
    ) -> Result<T> {
        self.session
            .with_valid_session(|token| async move {
                self.reads
                    .run(operation, || self.get_json(url, &token, query))
                    .await
            })
            .await
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &Url,
        token: &SessionToken,
        query: &[(&str, String)],
    ) -> Result<T> {
        let response = self
            .http
            .get(url.clone())
            .header(AUTHORIZATION, token.authorization())
            .query(query)
            .send()
            .await
            .map_err(ReaderError::from_transport)?;
        let response = check_status(response)?;
        let body = response.bytes().await.map_err(ReaderError::from_transport)?;
        serde_json::from_slice(&body).map_err(|e| ReaderError::Decode(e.to_string()))
    }

    async fn post_form(
        &self,
        url: &Url,
        token: &SessionToken,
        form: &[(&str, String)],
    ) -> Result<bool> {
        let response = self
            .http
            .post(url.clone())
            .header(AUTHORIZATION, token.authorization())
            .form(form)
            .send()
            .await
            .map_err(ReaderError::from_transport)?;
        let response = check_status(response)?;
        let body = response.text().await.map_err(ReaderError::from_transport)?;
        Ok(body.trim() == "OK")
    }
}

fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(ReaderError::TokenRejected);
    }
    if !status.is_success() {
        return Err(ReaderError::Status {
            status: status.as_u16(),
        });
    }
    Ok(response)
}

fn endpoint(api_url: &Url, path: &str) -> Url {
    let mut url = api_url.clone();
    if let Ok(mut segments) = url.path_segments_mut() {
        segments.pop_if_empty().extend(path.split('/'));
    }
    url
}
