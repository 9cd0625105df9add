//! Page agent — per-page render state driven by pushes and on-load policy.
//!
//! DESIGN
//! ======
//! The agent owns one page's [`RenderState`] and is the only thing that
//! touches its [`Transform`]. Two inputs move it:
//! - a coordinator push carrying a binary decision, applied as-is;
//! - the policy the page fetched for itself on load, resolved locally with
//!   the same precedence rule the coordinator uses.
//!
//! The second path keeps a page correct even if it missed a broadcast.
//! Resolution needs computed styles, so a policy that arrives while the
//! document is still loading is parked until [`PageAgent::document_ready`].

use crate::frame::PageAction;
use crate::heuristic::{PageSignals, looks_dark};
use crate::hostname::PageAddress;
use crate::model::Policy;

/// Applies or removes the inversion filter on the rendered page.
pub trait Transform {
    fn apply(&mut self);
    fn remove(&mut self);
}

/// Reads resolved style values from the rendered page.
pub trait StyleReader {
    fn signals(&self) -> PageSignals;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderState {
    Unstyled,
    Styled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentState {
    Loading,
    Ready,
}

pub struct PageAgent<T: Transform> {
    address: PageAddress,
    transform: T,
    state: RenderState,
    document: DocumentState,
    pending: Option<Policy>,
}

impl<T: Transform> PageAgent<T> {
    #[must_use]
    pub fn new(url: &str, transform: T) -> Self {
        Self {
            address: PageAddress::classify(url),
            transform,
            state: RenderState::Unstyled,
            document: DocumentState::Loading,
            pending: None,
        }
    }

    #[must_use]
    pub fn state(&self) -> RenderState {
        self.state
    }

    #[must_use]
    pub fn address(&self) -> &PageAddress {
        &self.address
    }

    #[must_use]
    pub fn transform(&self) -> &T {
        &self.transform
    }

    /// Whether a policy is waiting for the document to become ready.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Style the page. No-op when already styled.
    pub fn apply(&mut self) {
        if self.state == RenderState::Styled {
            return;
        }
        self.transform.apply();
        self.state = RenderState::Styled;
    }

    /// Unstyle the page. No-op when already unstyled.
    pub fn remove(&mut self) {
        if self.state == RenderState::Unstyled {
            return;
        }
        self.transform.remove();
        self.state = RenderState::Unstyled;
    }

    /// Apply a coordinator push. A push is newer than any policy parked
    /// while loading, so that policy is dropped.
    pub fn handle_push(&mut self, action: PageAction) -> RenderState {
        self.pending = None;
        match action {
            PageAction::Enable => self.apply(),
            PageAction::Disable => self.remove(),
        }
        self.state
    }

    /// The heuristic verdict for this page, as reported to the coordinator.
    pub fn looks_dark(&self, reader: &impl StyleReader) -> bool {
        looks_dark(&reader.signals())
    }

    /// Effective decision for this page under `policy`.
    pub fn decide(&self, policy: &Policy, reader: &impl StyleReader) -> bool {
        policy.effective(self.address.hostname(), || looks_dark(&reader.signals()))
    }

    /// Handle the policy the page fetched on load.
    ///
    /// Returns the decision that was rendered, or `None` when resolution
    /// was deferred until the document is ready (or the page is privileged).
    pub fn on_policy(&mut self, policy: Policy, document: DocumentState, reader: &impl StyleReader) -> Option<bool> {
        if document == DocumentState::Ready {
            self.document = DocumentState::Ready;
        }
        if self.document == DocumentState::Loading {
            self.pending = Some(policy);
            return None;
        }
        self.render(&policy, reader)
    }

    /// The document finished loading; resolve any parked policy.
    pub fn document_ready(&mut self, reader: &impl StyleReader) -> Option<bool> {
        self.document = DocumentState::Ready;
        let policy = self.pending.take()?;
        self.render(&policy, reader)
    }

    fn render(&mut self, policy: &Policy, reader: &impl StyleReader) -> Option<bool> {
        if self.address.is_privileged() {
            return None;
        }
        let decision = self.decide(policy, reader);
        if decision {
            self.apply();
        } else {
            self.remove();
        }
        Some(decision)
    }
}

#[cfg(test)]
#[path = "agent_test.rs"]
mod tests;
