//! Live page registry — which pages are loaded and how to reach them.
//!
//! DESIGN
//! ======
//! Each attached page owns a bounded outbound channel feeding its
//! websocket. The coordinator never touches sockets: it enumerates pages and
//! delivers decisions through [`PageDirectory`], which the registry
//! implements with `try_send`. A full or closed channel is a delivery
//! failure for that page only.

use std::collections::HashMap;
use std::sync::Arc;

use policy::{Badge, PageAction, PageAddress, ServerFrame};
use serde::Serialize;
use tokio::sync::{RwLock, mpsc};
use tracing::info;
use uuid::Uuid;

// =============================================================================
// DIRECTORY TRAIT
// =============================================================================

/// What the coordinator knows about one live page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageInfo {
    pub page_id: Uuid,
    pub address: PageAddress,
    /// Heuristic verdict reported by the page's own agent, if any.
    pub looks_dark: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    #[error("page {0} is not attached")]
    Gone(Uuid),
    #[error("page {0} is a privileged page")]
    Privileged(Uuid),
    #[error("page {0} outbound queue is full")]
    Full(Uuid),
    #[error("page {0} connection is closed")]
    Closed(Uuid),
}

/// Enumerates loaded pages and delivers decisions to them.
#[async_trait::async_trait]
pub trait PageDirectory: Send + Sync {
    /// Currently attached pages, excluding privileged ones.
    async fn live_pages(&self) -> Vec<PageInfo>;

    async fn page(&self, page_id: Uuid) -> Option<PageInfo>;

    /// Best-effort push. The caller may ignore the result.
    async fn deliver(&self, page_id: Uuid, action: PageAction) -> Result<(), DeliveryError>;

    async fn show_badge(&self, page_id: Uuid, badge: Badge);
}

// =============================================================================
// REGISTRY
// =============================================================================

pub struct LivePage {
    pub url: String,
    pub address: PageAddress,
    pub looks_dark: Option<bool>,
    pub badge: Option<Badge>,
    pub tx: mpsc::Sender<ServerFrame>,
}

/// Row returned by the page listing endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSummary {
    pub page_id: Uuid,
    pub url: String,
    pub hostname: Option<String>,
    pub privileged: bool,
    pub looks_dark: Option<bool>,
    pub badge: Option<Badge>,
}

#[derive(Clone, Default)]
pub struct PageRegistry {
    pages: Arc<RwLock<HashMap<Uuid, LivePage>>>,
}

impl PageRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a page, or replace its address after a navigation.
    pub async fn attach(
        &self,
        page_id: Uuid,
        url: &str,
        looks_dark: Option<bool>,
        tx: mpsc::Sender<ServerFrame>,
    ) -> PageAddress {
        let address = PageAddress::classify(url);
        let page = LivePage { url: url.to_owned(), address: address.clone(), looks_dark, badge: None, tx };

        let mut pages = self.pages.write().await;
        pages.insert(page_id, page);
        info!(%page_id, url, privileged = address.is_privileged(), pages = pages.len(), "page attached");
        address
    }

    /// Forget a page. Returns whether it was attached.
    pub async fn detach(&self, page_id: Uuid) -> bool {
        let mut pages = self.pages.write().await;
        let removed = pages.remove(&page_id).is_some();
        if removed {
            info!(%page_id, remaining = pages.len(), "page detached");
        }
        removed
    }

    pub async fn list(&self) -> Vec<PageSummary> {
        let pages = self.pages.read().await;
        let mut out: Vec<PageSummary> = pages
            .iter()
            .map(|(page_id, page)| PageSummary {
                page_id: *page_id,
                url: page.url.clone(),
                hostname: page.address.hostname().map(ToString::to_string),
                privileged: page.address.is_privileged(),
                looks_dark: page.looks_dark,
                badge: page.badge,
            })
            .collect();
        out.sort_by(|a, b| a.url.cmp(&b.url).then(a.page_id.cmp(&b.page_id)));
        out
    }
}

#[async_trait::async_trait]
impl PageDirectory for PageRegistry {
    async fn live_pages(&self) -> Vec<PageInfo> {
        let pages = self.pages.read().await;
        pages
            .iter()
            .filter(|(_, page)| !page.address.is_privileged())
            .map(|(page_id, page)| PageInfo {
                page_id: *page_id,
                address: page.address.clone(),
                looks_dark: page.looks_dark,
            })
            .collect()
    }

    async fn page(&self, page_id: Uuid) -> Option<PageInfo> {
        let pages = self.pages.read().await;
        pages.get(&page_id).map(|page| PageInfo {
            page_id,
            address: page.address.clone(),
            looks_dark: page.looks_dark,
        })
    }

    async fn deliver(&self, page_id: Uuid, action: PageAction) -> Result<(), DeliveryError> {
        let pages = self.pages.read().await;
        let Some(page) = pages.get(&page_id) else {
            return Err(DeliveryError::Gone(page_id));
        };
        if page.address.is_privileged() {
            return Err(DeliveryError::Privileged(page_id));
        }
        page.tx.try_send(ServerFrame::push(action)).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DeliveryError::Full(page_id),
            mpsc::error::TrySendError::Closed(_) => DeliveryError::Closed(page_id),
        })
    }

    async fn show_badge(&self, page_id: Uuid, badge: Badge) {
        let mut pages = self.pages.write().await;
        if let Some(page) = pages.get_mut(&page_id) {
            page.badge = Some(badge);
        }
    }
}

#[cfg(test)]
#[path = "pages_test.rs"]
mod tests;
