//! Pagination tokens and the page bag.
//!
//! Page tokens are opaque strings. When several sub-queries feed one
//! conceptual page, a [`PageBag`] linearizes them: a LIFO stack of
//! per-query states, fully serialized into the next-page token.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::error::{ConnectorError, ConnectorResult};

/// A page request: the opaque token from the previous page (empty on the
/// first call) and the requested page size (0 means default).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageToken {
    pub token: String,
    pub size: usize,
}

impl PageToken {
    /// A first-page request with the default size.
    pub fn first() -> Self {
        Self::default()
    }

    /// A request continuing from the given token.
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            size: 0,
        }
    }
}

/// Position within one sub-query of a multi-query page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageState {
    /// What kind of sub-query this state belongs to.
    pub kind: String,
    /// Identifier of the sub-query, e.g. its index in the configured list.
    pub id: String,
    /// Inner page token for the sub-query.
    #[serde(default)]
    pub token: String,
}

/// Ordered stack of [`PageState`]s consumed LIFO: the state pushed last is
/// drained first, and a sub-query's token is only ever consumed against
/// that same sub-query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageBag {
    states: Vec<PageState>,
}

impl PageBag {
    /// Create an empty bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a bag from an opaque token. An empty token yields an empty
    /// bag.
    pub fn unmarshal(token: &str) -> ConnectorResult<Self> {
        if token.is_empty() {
            return Ok(Self::default());
        }
        let raw = URL_SAFE_NO_PAD.decode(token).map_err(|e| {
            ConnectorError::invalid_page_token(format!("failed to decode page bag: {e}"))
        })?;
        serde_json::from_slice(&raw).map_err(|e| {
            ConnectorError::invalid_page_token(format!("failed to parse page bag: {e}"))
        })
    }

    /// Encode the bag into an opaque token. An empty bag yields an empty
    /// token, signalling the end of pages.
    pub fn marshal(&self) -> ConnectorResult<String> {
        if self.states.is_empty() {
            return Ok(String::new());
        }
        let raw = serde_json::to_vec(self).map_err(|e| {
            ConnectorError::invalid_page_token(format!("failed to serialize page bag: {e}"))
        })?;
        Ok(URL_SAFE_NO_PAD.encode(raw))
    }

    /// The state on top of the stack, if any.
    pub fn current(&self) -> Option<&PageState> {
        self.states.last()
    }

    /// Push a new state onto the stack.
    pub fn push(&mut self, state: PageState) {
        self.states.push(state);
    }

    /// Advance the current state with the inner token produced by its
    /// sub-query. An empty inner token means the sub-query is exhausted and
    /// pops its state.
    pub fn next(&mut self, inner_token: &str) {
        if inner_token.is_empty() {
            self.states.pop();
        } else if let Some(state) = self.states.last_mut() {
            state.token = inner_token.to_string();
        }
    }

    /// Whether the bag holds no states.
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}
