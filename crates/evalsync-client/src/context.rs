//! Session contexts and endpoint derivation

use url::Url;

use crate::error::{Result, SyncError};

/// Identifies one logical synchronization session: a configuration
/// scenario name plus an optional plan path and user identifier.
///
/// A context is immutable once a session starts; changing any field
/// means building a new `Context` and opening a new session. Two live
/// sessions for the same context are forbidden by the session
/// lifecycle, not by this type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Context {
    /// Scenario (testdata directory) name, encoded into the endpoint path
    pub scenario: String,
    /// Optional plan file path, sent as a query parameter
    pub plan: Option<String>,
    /// Optional user identifier, sent as a query parameter
    pub user: Option<String>,
}

impl Context {
    pub fn new(scenario: impl Into<String>) -> Self {
        Self {
            scenario: scenario.into(),
            plan: None,
            user: None,
        }
    }

    pub fn with_plan(mut self, plan: impl Into<String>) -> Self {
        self.plan = Some(plan.into());
        self
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Derives the WebSocket endpoint for this context on `host`
    /// (e.g. `"localhost:8100"`): `ws://{host}/ws/{scenario}`, with
    /// `plan` and `user` appended as query parameters only when
    /// non-empty. The scenario is percent-encoded so it stays a
    /// single path segment.
    pub fn socket_url(&self, host: &str) -> Result<Url> {
        let mut url = Url::parse(&format!("ws://{host}/"))?;
        url.path_segments_mut()
            .map_err(|_| SyncError::Parse(format!("host {host:?} cannot carry a path")))?
            .push("ws")
            .push(&self.scenario);

        if let Some(plan) = self.plan.as_deref().filter(|p| !p.is_empty()) {
            url.query_pairs_mut().append_pair("plan", plan);
        }
        if let Some(user) = self.user.as_deref().filter(|u| !u.is_empty()) {
            url.query_pairs_mut().append_pair("user", user);
        }

        Ok(url)
    }
}
