//! Raw stream items -> minimal `Article` records.

use std::borrow::Cow;
use std::collections::HashMap;

use scraper::{Html, Node};
use tracing::warn;

use crate::error::Result;
use crate::feed::Article;
use crate::id::{self, FeedId, Identifier, TagId};
use crate::wire::{RawItem, RawOrigin, RawSubscription};

pub const ELLIPSIS: &str = "...";
const UNKNOWN_FEED: &str = "Unknown Feed";

const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "br", "dd", "div", "dl", "dt", "figcaption",
    "figure", "footer", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li", "ol", "p",
    "pre", "section", "table", "td", "th", "tr", "ul",
];

/// Feed names from the subscription list fetched for the current request.
#[derive(Debug, Clone, Default)]
pub struct FeedDirectory {
    names: HashMap<FeedId, String>,
}

impl FeedDirectory {
    pub fn from_subscriptions(subscriptions: &[RawSubscription]) -> Self {
        let names = subscriptions
            .iter()
            .filter_map(|sub| match id::decode_feed(&sub.id) {
                Ok(feed) => Some((feed, sub.title.clone())),
                Err(err) => {
                    warn!(error = %err, "skipping subscription");
                    None
                }
            })
            .collect();
        Self { names }
    }

    pub fn name(&self, feed: FeedId) -> Option<&str> {
        self.names.get(&feed).map(String::as_str)
    }
}

/// Cuts `text` to at most `bound` characters plus [`ELLIPSIS`], preferring
/// the last whitespace at or before the bound. `None` leaves it untouched.
pub fn truncate(text: &str, bound: Option<usize>) -> Cow<'_, str> {
    let Some(bound) = bound else {
        return Cow::Borrowed(text);
    };
    // first character past the bound; absent when the text already fits
    let Some((cut, next)) = text.char_indices().nth(bound) else {
        return Cow::Borrowed(text);
    };

    let head = &text[..cut];
    let head = if next.is_whitespace() {
        head
    } else {
        match head.rfind(char::is_whitespace) {
            Some(pos) if pos > 0 => &head[..pos],
            _ => head,
        }
    };
    Cow::Owned(format!("{}{ELLIPSIS}", head.trim_end()))
}

/// Drops markup, script and style bodies, decodes entities and collapses
/// whitespace.
pub fn strip_html(html: &str) -> String {
    if !html.contains(['<', '&']) {
        return collapse_whitespace(html);
    }

    let fragment = Html::parse_fragment(html);
    let mut text = String::with_capacity(html.len());
    for node in fragment.root_element().descendants() {
        match node.value() {
            Node::Text(chunk) => {
                let hidden = node
                    .parent()
                    .and_then(|parent| parent.value().as_element().map(|el| el.name()))
                    .is_some_and(|name| matches!(name, "script" | "style"));
                if !hidden {
                    text.push_str(chunk);
                }
            }
            Node::Element(el) if BLOCK_ELEMENTS.contains(&el.name()) => text.push(' '),
            _ => {}
        }
    }
    collapse_whitespace(&text)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn project_item(
    item: RawItem,
    directory: &FeedDirectory,
    summary_bound: Option<usize>,
) -> Result<Article> {
    let id = id::decode_item(&item.id)?;
    let title = item.title.as_deref().map(strip_html).unwrap_or_default();

    let body = [item.summary.as_ref(), item.content.as_ref()]
        .into_iter()
        .flatten()
        .map(|c| strip_html(&c.content))
        .find(|text| !text.is_empty())
        .unwrap_or_else(|| title.clone());
    let summary = truncate(&body, summary_bound).into_owned();

    let url = item
        .alternate
        .iter()
        .chain(item.canonical.iter())
        .map(|link| link.href.trim())
        .find(|href| !href.is_empty())
        .unwrap_or_default()
        .to_owned();

    let mut is_read = false;
    let mut is_starred = false;
    for category in &item.categories {
        // labels and unknown states are irrelevant here
        if let Ok(Identifier::Tag(tag)) = id::decode(category) {
            is_read |= tag == TagId::READ;
            is_starred |= tag == TagId::STARRED;
        }
    }

    Ok(Article {
        id,
        title,
        summary,
        url,
        published: item.published,
        feed_name: feed_name(item.origin.as_ref(), directory),
        is_read,
        is_starred,
    })
}

/// Projects a batch, skipping records whose id cannot be decoded.
pub fn project_batch(
    items: Vec<RawItem>,
    directory: &FeedDirectory,
    summary_bound: Option<usize>,
) -> Vec<Article> {
    items
        .into_iter()
        .filter_map(|item| {
            let raw_id = item.id.clone();
            match project_item(item, directory, summary_bound) {
                Ok(article) => Some(article),
                Err(err) => {
                    warn!(id = %raw_id, error = %err, "skipping stream item");
                    None
                }
            }
        })
        .collect()
}

fn feed_name(origin: Option<&RawOrigin>, directory: &FeedDirectory) -> String {
    let Some(origin) = origin else {
        return UNKNOWN_FEED.to_owned();
    };
    origin
        .stream_id
        .as_deref()
        .and_then(|raw| id::decode_feed(raw).ok())
        .and_then(|feed| directory.name(feed))
        .or(origin.title.as_deref())
        .filter(|name| !name.is_empty())
        .unwrap_or(UNKNOWN_FEED)
        .to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::{RawContent, RawLink};

    fn chars(text: &str) -> usize {
        text.chars().count()
    }

    #[test]
    fn truncate_respects_bound_for_all_inputs() {
        let samples = [
            "",
            "short",
            "The quick brown fox jumps over the lazy dog",
            "Supercalifragilisticexpialidocious",
            "  leading and trailing  ",
            "naïve café résumé — ünïcödé text with accents",
            "日本語のテキスト と 空白",
        ];
        for text in samples {
            assert_eq!(truncate(text, None), text);
            for bound in 0..=chars(text) + 2 {
                let out = truncate(text, Some(bound));
                assert!(chars(&out) <= bound + chars(ELLIPSIS), "{text:?} @ {bound}");
                let kept = out.strip_suffix(ELLIPSIS).unwrap_or(&out);
                assert!(text.starts_with(kept), "{text:?} @ {bound} fabricated {out:?}");
            }
        }
    }

    #[test]
    fn truncate_cuts_at_word_boundary() {
        assert_eq!(truncate("hello brave new world", Some(13)), "hello brave...");
        assert_eq!(truncate("hello brave new world", Some(11)), "hello brave...");
        assert_eq!(truncate("hello brave new world", Some(21)), "hello brave new world");
        assert_eq!(truncate("unbreakable", Some(4)), "unbr...");
    }

    #[test]
    fn strip_html_removes_markup_and_decodes_entities() {
        assert_eq!(
            strip_html("<p>Hello <b>world</b>!</p><p>Second&nbsp;para &amp; more</p>"),
            "Hello world! Second para & more"
        );
        assert_eq!(strip_html("<script>alert(1)</script>Visible"), "Visible");
        assert_eq!(strip_html("plain   text\n here"), "plain text here");
        assert_eq!(strip_html("line<br>break"), "line break");
    }

    fn raw_item(id: &str) -> RawItem {
        RawItem {
            id: id.to_owned(),
            title: Some("NixOS 24.05 <em>released</em>".into()),
            published: 1_716_000_000,
            alternate: vec![RawLink {
                href: "https://example.com/a".into(),
            }],
            summary: Some(RawContent {
                content: "<p>Lots of new things in this release</p>".into(),
            }),
            origin: Some(RawOrigin {
                stream_id: Some("feed/7".into()),
                title: Some("Origin Title".into()),
            }),
            categories: vec![
                "user/-/state/com.google/reading-list".into(),
                "user/-/state/com.google/starred".into(),
                "user/-/label/Linux".into(),
            ],
            ..RawItem::default()
        }
    }

    #[test]
    fn projects_item_with_directory_name_and_flags() {
        let directory = FeedDirectory::from_subscriptions(&[RawSubscription {
            id: "feed/7".into(),
            title: "NixOS Weekly".into(),
            url: "https://example.com/rss".into(),
        }]);
        let article = project_item(
            raw_item("tag:google.com,2005:reader/item/0000000000000065"),
            &directory,
            Some(12),
        )
        .unwrap();

        assert_eq!(article.id.value(), 101);
        assert_eq!(article.title, "NixOS 24.05 released");
        assert_eq!(article.summary, "Lots of new...");
        assert_eq!(article.url, "https://example.com/a");
        assert_eq!(article.feed_name, "NixOS Weekly");
        assert!(article.is_starred);
        assert!(!article.is_read);
    }

    #[test]
    fn falls_back_to_origin_title_then_unknown() {
        let empty = FeedDirectory::default();
        let article = project_item(raw_item("5"), &empty, None).unwrap();
        assert_eq!(article.feed_name, "Origin Title");

        let mut orphan = raw_item("6");
        orphan.origin = None;
        assert_eq!(project_item(orphan, &empty, None).unwrap().feed_name, UNKNOWN_FEED);
    }

    #[test]
    fn summary_falls_back_to_content_then_title() {
        let mut item = raw_item("9");
        item.summary = Some(RawContent {
            content: "<div>  </div>".into(),
        });
        item.content = Some(RawContent {
            content: "From content".into(),
        });
        let article = project_item(item, &FeedDirectory::default(), None).unwrap();
        assert_eq!(article.summary, "From content");

        let mut bare = raw_item("10");
        bare.summary = None;
        let article = project_item(bare, &FeedDirectory::default(), None).unwrap();
        assert_eq!(article.summary, "NixOS 24.05 released");
    }

    #[test]
    fn batch_skips_malformed_ids() {
        let items = vec![raw_item("11"), raw_item("feed/oops"), raw_item("12")];
        let articles = project_batch(items, &FeedDirectory::default(), None);
        let ids: Vec<u64> = articles.iter().map(|a| a.id.value()).collect();
        assert_eq!(ids, vec![11, 12]);
    }
}
