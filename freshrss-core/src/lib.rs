pub mod config;
pub mod data;
pub mod error;
pub mod feed;
pub mod id;
pub mod projection;
pub mod retry;
pub mod session;
pub mod tools;
pub mod wire;

pub use config::{ConnectionConfig, OutputConfig, ReaderConfig, RequestConfig};
pub use data::{merge_unique, ReaderApi, UnreadQuery};
pub use error::{ConfigError, ReaderError, Result};
pub use feed::{Article, Feed, FeedStats};
pub use id::{FeedId, Identifier, ItemForm, ItemId, StreamState, TagId};
pub use projection::{strip_html, truncate, FeedDirectory};
pub use retry::RetryPolicy;
pub use session::{SessionManager, SessionToken};
pub use tools::{call_tool, dispatch, ToolCall, TOOL_NAMES};
pub use wire::{StreamRequest, StreamSelector, WireClient};
