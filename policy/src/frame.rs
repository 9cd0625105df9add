//! Wire frames exchanged over the coordinator websocket.
//!
//! ARCHITECTURE
//! ============
//! Clients send a [`ClientFrame`]: a correlation `id` plus one [`Request`],
//! tagged on `action`. The coordinator answers every request with exactly
//! one terminal [`ServerFrame`] (`state` or `error`) carrying `parentId`,
//! and independently pushes `push` frames to pages. Pushes are
//! fire-and-forget; nothing answers them.
//!
//! DESIGN
//! ======
//! - Requests are a closed union matched exhaustively by the dispatcher;
//!   an unknown `action` fails to parse instead of being ignored.
//! - Every successful request returns the full policy, so a thin client
//!   can re-render from the reply alone.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::Policy;

// =============================================================================
// ERROR CODES
// =============================================================================

/// Grepable error code and retryable flag for structured error frames.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}

// =============================================================================
// REQUESTS
// =============================================================================

/// Everything a client may ask the coordinator to do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Request {
    GetState,
    SetGlobalEnabled {
        enabled: bool,
    },
    /// `enabled: null` removes the override, same as `removeSiteSetting`.
    /// The field itself is required.
    SetSiteEnabled {
        hostname: String,
        #[serde(deserialize_with = "Option::deserialize")]
        enabled: Option<bool>,
    },
    RemoveSiteSetting {
        hostname: String,
    },
    /// Sent by a page agent on load and after every navigation.
    AttachPage {
        url: String,
        #[serde(default, rename = "looksDark", skip_serializing_if = "Option::is_none")]
        looks_dark: Option<bool>,
    },
    DetachPage,
}

impl Request {
    /// Wire name of the action, for logs.
    #[must_use]
    pub fn action(&self) -> &'static str {
        match self {
            Self::GetState => "getState",
            Self::SetGlobalEnabled { .. } => "setGlobalEnabled",
            Self::SetSiteEnabled { .. } => "setSiteEnabled",
            Self::RemoveSiteSetting { .. } => "removeSiteSetting",
            Self::AttachPage { .. } => "attachPage",
            Self::DetachPage => "detachPage",
        }
    }

    /// Whether the request writes to the policy store.
    #[must_use]
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Self::SetGlobalEnabled { .. } | Self::SetSiteEnabled { .. } | Self::RemoveSiteSetting { .. }
        )
    }
}

/// A request as it travels on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientFrame {
    pub id: Uuid,
    #[serde(flatten)]
    pub request: Request,
}

impl ClientFrame {
    #[must_use]
    pub fn new(request: Request) -> Self {
        Self { id: Uuid::new_v4(), request }
    }
}

// =============================================================================
// SERVER FRAMES
// =============================================================================

/// Page-directed decision push.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageAction {
    Enable,
    Disable,
}

impl PageAction {
    #[must_use]
    pub fn for_decision(enabled: bool) -> Self {
        if enabled { Self::Enable } else { Self::Disable }
    }

    #[must_use]
    pub fn is_enable(self) -> bool {
        matches!(self, Self::Enable)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerFrame {
    /// First frame on every connection.
    Connected {
        #[serde(rename = "clientId")]
        client_id: Uuid,
    },
    /// Successful reply to a request.
    State {
        #[serde(rename = "parentId")]
        parent_id: Uuid,
        state: Policy,
    },
    /// Failed reply, or a frame that could not be parsed (no `parentId`).
    Error {
        #[serde(rename = "parentId", default, skip_serializing_if = "Option::is_none")]
        parent_id: Option<Uuid>,
        code: String,
        message: String,
        retryable: bool,
    },
    Push {
        action: PageAction,
    },
}

impl ServerFrame {
    /// Build a structured error frame from a typed error.
    #[must_use]
    pub fn error_from(parent_id: Option<Uuid>, err: &(impl ErrorCode + ?Sized)) -> Self {
        Self::Error {
            parent_id,
            code: err.error_code().to_owned(),
            message: err.to_string(),
            retryable: err.retryable(),
        }
    }

    #[must_use]
    pub fn push(action: PageAction) -> Self {
        Self::Push { action }
    }

    /// Correlation id of a reply frame.
    #[must_use]
    pub fn parent_id(&self) -> Option<Uuid> {
        match self {
            Self::State { parent_id, .. } => Some(*parent_id),
            Self::Error { parent_id, .. } => *parent_id,
            Self::Connected { .. } | Self::Push { .. } => None,
        }
    }
}

#[cfg(test)]
#[path = "frame_test.rs"]
mod tests;
