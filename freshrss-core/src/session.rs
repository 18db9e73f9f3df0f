//! Session token lifecycle.
//!
//! States: `Unauthenticated -> Authenticating -> Authenticated`, and back to
//! `Unauthenticated` when the aggregator rejects the token. `Authenticating`
//! is the window in which one caller holds the state lock while the login
//! call is in flight; every other caller queues on that lock and picks up
//! the token it produces instead of logging in again.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use reqwest::Client;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{ReaderError, Result};

/// Bearer credential from ClientLogin. `generation` tells a stale token
/// apart from the one that replaced it.
#[derive(Clone)]
pub struct SessionToken {
    value: Arc<str>,
    generation: u64,
}

impl SessionToken {
    pub(crate) fn authorization(&self) -> String {
        format!("GoogleLogin auth={}", self.value)
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionToken")
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
enum SessionState {
    Unauthenticated,
    Authenticated(SessionToken),
}

#[derive(Debug)]
struct Inner {
    state: SessionState,
    generation: u64,
}

pub struct SessionManager {
    http: Client,
    login_url: Url,
    username: String,
    password: String,
    inner: Mutex<Inner>,
    logins: AtomicUsize,
}

impl SessionManager {
    pub fn new(
        http: Client,
        login_url: Url,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            http,
            login_url,
            username: username.into(),
            password: password.into(),
            inner: Mutex::new(Inner {
                state: SessionState::Unauthenticated,
                generation: 0,
            }),
            logins: AtomicUsize::new(0),
        }
    }

    /// Number of login calls issued so far.
    pub fn login_count(&self) -> usize {
        self.logins.load(Ordering::SeqCst)
    }

    pub async fn is_authenticated(&self) -> bool {
        matches!(
            self.inner.lock().await.state,
            SessionState::Authenticated(_)
        )
    }

    /// Runs `operation` with a valid token. A `TokenRejected` outcome
    /// discards the token, re-authenticates once and retries once; a
    /// second rejection is reported as `Authentication`.
    pub async fn with_valid_session<T, F, Fut>(&self, operation: F) -> Result<T>
    where
        F: Fn(SessionToken) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let token = self.token().await?;
        match operation(token.clone()).await {
            Err(ReaderError::TokenRejected) => {
                warn!("session token rejected, re-authenticating");
                self.invalidate(&token).await;
            }
            other => return other,
        }

        let token = self.token().await?;
        match operation(token.clone()).await {
            Err(ReaderError::TokenRejected) => {
                self.invalidate(&token).await;
                Err(ReaderError::Authentication(
                    "aggregator rejected a freshly issued token".into(),
                ))
            }
            other => other,
        }
    }

    async fn token(&self) -> Result<SessionToken> {
        let mut inner = self.inner.lock().await;
        if let SessionState::Authenticated(token) = &inner.state {
            return Ok(token.clone());
        }

        let value = self.login().await?;
        inner.generation += 1;
        let token = SessionToken {
            value: value.into(),
            generation: inner.generation,
        };
        inner.state = SessionState::Authenticated(token.clone());
        Ok(token)
    }

    /// Drops `rejected` unless another caller already replaced it.
    async fn invalidate(&self, rejected: &SessionToken) {
        let mut inner = self.inner.lock().await;
        if let SessionState::Authenticated(current) = &inner.state {
            if current.generation == rejected.generation {
                debug!(generation = rejected.generation, "discarding session token");
                inner.state = SessionState::Unauthenticated;
            }
        }
    }

    async fn login(&self) -> Result<String> {
        self.logins.fetch_add(1, Ordering::SeqCst);
        debug!(url = %self.login_url, "authenticating");

        let params = [
            ("Email", self.username.as_str()),
            ("Passwd", self.password.as_str()),
        ];
        let response = self
            .http
            .post(self.login_url.clone())
            .form(&params)
            .send()
            .await
            .map_err(ReaderError::from_transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ReaderError::Authentication(format!(
                "login rejected with HTTP {}",
                status.as_u16()
            )));
        }

        let body = response.text().await.map_err(ReaderError::from_transport)?;
        let token = parse_login_body(&body).ok_or_else(|| {
            ReaderError::Authentication("login response carried no SID".into())
        })?;
        info!("authenticated with aggregator");
        Ok(token)
    }
}

/// Extracts the token from a ClientLogin body (`SID=...`, falling back to
/// `Auth=...`).
fn parse_login_body(body: &str) -> Option<String> {
    let field = |key: &str| {
        body.lines()
            .filter_map(|line| line.trim().strip_prefix(key))
            .find(|value| !value.is_empty())
            .map(ToOwned::to_owned)
    };
    field("SID=").or_else(|| field("Auth="))
}
