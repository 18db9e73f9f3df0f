#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};

use freshrss_core::ReaderConfig;
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

pub const LOGIN_PATH: &str = "/api/greader.php/accounts/ClientLogin";
pub const SUBSCRIPTIONS_PATH: &str = "/api/greader.php/reader/api/0/subscription/list";
pub const UNREAD_COUNT_PATH: &str = "/api/greader.php/reader/api/0/unread-count";
pub const EDIT_TAG_PATH: &str = "/api/greader.php/reader/api/0/edit-tag";
pub const READING_LIST_PATH: &str =
    "/api/greader.php/reader/api/0/stream/contents/user/-/state/com.google/reading-list";

pub const READ_STATE: &str = "user/-/state/com.google/read";
pub const STARRED_STATE: &str = "user/-/state/com.google/starred";

pub fn feed_stream_path(feed: u64) -> String {
    format!("/api/greader.php/reader/api/0/stream/contents/feed/{feed}")
}

pub fn long_item_id(id: u64) -> String {
    format!("tag:google.com,2005:reader/item/{id:016x}")
}

/// Config pointed at the mock server, with near-zero backoff.
pub fn config_for(server: &MockServer) -> ReaderConfig {
    let mut config = ReaderConfig::new(server.uri(), "alice", "s3cret");
    config.requests.retry_backoff_ms = 1;
    config.requests.request_timeout_seconds = 5;
    config
}

/// Answers every login with a fresh token: `tok-1`, `tok-2`, ...
pub struct TokenSequence(AtomicUsize);

impl TokenSequence {
    pub fn new() -> Self {
        Self(AtomicUsize::new(0))
    }
}

impl Respond for TokenSequence {
    fn respond(&self, _: &Request) -> ResponseTemplate {
        let n = self.0.fetch_add(1, Ordering::SeqCst) + 1;
        ResponseTemplate::new(200).set_body_string(format!("SID=tok-{n}\nLSID=null\nAuth=tok-{n}\n"))
    }
}

/// Plays the given responses in order and repeats the last one.
pub struct Scripted {
    responses: Vec<ResponseTemplate>,
    next: AtomicUsize,
}

impl Scripted {
    pub fn new(responses: Vec<ResponseTemplate>) -> Self {
        assert!(!responses.is_empty());
        Self {
            responses,
            next: AtomicUsize::new(0),
        }
    }
}

impl Respond for Scripted {
    fn respond(&self, _: &Request) -> ResponseTemplate {
        let n = self.next.fetch_add(1, Ordering::SeqCst);
        self.responses[n.min(self.responses.len() - 1)].clone()
    }
}

pub async fn mount_login(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(LOGIN_PATH))
        .respond_with(TokenSequence::new())
        .mount(server)
        .await;
}

pub async fn mount_subscriptions(server: &MockServer, feeds: &[(u64, &str)]) {
    Mock::given(method("GET"))
        .and(path(SUBSCRIPTIONS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(subscriptions_body(feeds)))
        .mount(server)
        .await;
}

pub fn subscriptions_body(feeds: &[(u64, &str)]) -> Value {
    let subscriptions: Vec<Value> = feeds
        .iter()
        .map(|(id, title)| {
            json!({
                "id": format!("feed/{id}"),
                "title": title,
                "categories": [{"id": "user/-/label/Tech", "label": "Tech"}],
                "url": format!("https://feeds.example.com/{id}.xml"),
                "htmlUrl": format!("https://feeds.example.com/{id}"),
                "iconUrl": "",
            })
        })
        .collect();
    json!({ "subscriptions": subscriptions })
}

pub fn unread_count_body(counts: &[(u64, u64)]) -> Value {
    let mut entries: Vec<Value> = counts
        .iter()
        .map(|(id, count)| {
            json!({
                "id": format!("feed/{id}"),
                "count": count,
                "newestItemTimestampUsec": "1716000000000000",
            })
        })
        .collect();
    let total: u64 = counts.iter().map(|(_, c)| c).sum();
    entries.push(json!({
        "id": "user/-/state/com.google/reading-list",
        "count": total,
        "newestItemTimestampUsec": "1716000000000000",
    }));
    json!({ "max": total, "unreadcounts": entries })
}

/// A stream item the way greader.php renders it.
pub fn item(id: u64, feed: u64, title: &str, published: i64) -> Value {
    json!({
        "id": long_item_id(id),
        "crawlTimeMsec": format!("{}000", published),
        "timestampUsec": format!("{}000000", published),
        "published": published,
        "title": title,
        "summary": { "content": format!("<p>Body of <b>{title}</b></p>") },
        "alternate": [{ "href": format!("https://example.com/posts/{id}") }],
        "categories": ["user/-/state/com.google/reading-list", "user/-/label/Tech"],
        "origin": {
            "streamId": format!("feed/{feed}"),
            "title": format!("Origin {feed}"),
            "htmlUrl": format!("https://feeds.example.com/{feed}"),
        },
    })
}

pub fn with_category(mut item: Value, category: &str) -> Value {
    if let Some(categories) = item["categories"].as_array_mut() {
        categories.push(json!(category));
    }
    item
}

pub fn with_summary(mut item: Value, html: &str) -> Value {
    item["summary"] = json!({ "content": html });
    item
}

pub fn stream_body(items: Vec<Value>) -> Value {
    json!({
        "id": "user/-/state/com.google/reading-list",
        "updated": 1716000000,
        "items": items,
    })
}

/// Form fields of a captured request body, in order.
pub fn form_fields(request: &Request) -> Vec<(String, String)> {
    url::form_urlencoded::parse(&request.body)
        .into_owned()
        .collect()
}

pub async fn requests_to(server: &MockServer, target: &str) -> Vec<Request> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|request| request.url.path() == target)
        .collect()
}
