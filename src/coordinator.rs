//! Synchronization coordinator — single writer of the policy store.
//!
//! ARCHITECTURE
//! ============
//! One tokio task owns the store and drains a bounded command queue. Every
//! mutation is a read-modify-write that runs to completion (store read,
//! store write, broadcast) before the next command is taken, so no request
//! ever observes a half-applied predecessor. Callers talk to the task
//! through a cloneable [`CoordinatorHandle`].
//!
//! BROADCAST
//! =========
//! After a successful write the coordinator recomputes the effective
//! decision for each affected live page and pushes it:
//! - `set_global`: every live page;
//! - `set_site_override` / `clear_site_override`: pages on that hostname.
//!
//! A page's heuristic input is the verdict its own agent reported when it
//! attached; pages that never reported count as not dark.
//!
//! ERROR HANDLING
//! ==============
//! A store failure aborts the command before anything is broadcast and is
//! returned to the caller. Delivery failures are logged and dropped; one
//! unreachable page never stops delivery to the rest.

use std::sync::Arc;

use policy::{Badge, ErrorCode, Hostname, HostnameError, PageAction, Policy};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::pages::{PageDirectory, PageInfo};
use crate::store::{PolicyStore, StoreError};

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("invalid hostname: {0}")]
    InvalidHostname(#[from] HostnameError),
    #[error("coordinator is not running")]
    Stopped,
}

impl ErrorCode for CoordinatorError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Store(e) => e.error_code(),
            Self::InvalidHostname(e) => e.error_code(),
            Self::Stopped => "E_COORDINATOR_STOPPED",
        }
    }

    fn retryable(&self) -> bool {
        match self {
            Self::Store(e) => e.retryable(),
            Self::InvalidHostname(_) => false,
            Self::Stopped => true,
        }
    }
}

type Reply = oneshot::Sender<Result<Policy, CoordinatorError>>;

enum Command {
    GetPolicy { reply: Reply },
    SetGlobal { enabled: bool, reply: Reply },
    SetSiteOverride { hostname: Hostname, enabled: bool, reply: Reply },
    ClearSiteOverride { hostname: Hostname, reply: Reply },
    PageAttached { page_id: Uuid, reply: Reply },
}

// =============================================================================
// HANDLE
// =============================================================================

#[derive(Clone)]
pub struct CoordinatorHandle {
    tx: mpsc::Sender<Command>,
}

impl CoordinatorHandle {
    /// Current policy as stored.
    ///
    /// # Errors
    ///
    /// Returns a store error, or [`CoordinatorError::Stopped`].
    pub async fn get_policy(&self) -> Result<Policy, CoordinatorError> {
        self.call(|reply| Command::GetPolicy { reply }).await
    }

    /// Set the global default and push new decisions to every live page.
    ///
    /// # Errors
    ///
    /// Returns a store error, or [`CoordinatorError::Stopped`].
    pub async fn set_global(&self, enabled: bool) -> Result<Policy, CoordinatorError> {
        self.call(|reply| Command::SetGlobal { enabled, reply }).await
    }

    /// Create or overwrite the override for `hostname`, then push to its pages.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorError::InvalidHostname`] before queueing anything
    /// if `hostname` cannot be normalized, otherwise a store error.
    pub async fn set_site_override(&self, hostname: &str, enabled: bool) -> Result<Policy, CoordinatorError> {
        let hostname = Hostname::parse(hostname)?;
        self.call(|reply| Command::SetSiteOverride { hostname, enabled, reply }).await
    }

    /// Remove the override for `hostname`, then push to its pages.
    ///
    /// # Errors
    ///
    /// Same as [`CoordinatorHandle::set_site_override`].
    pub async fn clear_site_override(&self, hostname: &str) -> Result<Policy, CoordinatorError> {
        let hostname = Hostname::parse(hostname)?;
        self.call(|reply| Command::ClearSiteOverride { hostname, reply }).await
    }

    /// A page finished loading: refresh its badge and return the policy it
    /// should resolve against. Nothing is pushed; the page decides itself.
    ///
    /// # Errors
    ///
    /// Returns a store error, or [`CoordinatorError::Stopped`].
    pub async fn page_attached(&self, page_id: Uuid) -> Result<Policy, CoordinatorError> {
        self.call(|reply| Command::PageAttached { page_id, reply }).await
    }

    async fn call(&self, make: impl FnOnce(Reply) -> Command) -> Result<Policy, CoordinatorError> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(make(reply)).await.map_err(|_| CoordinatorError::Stopped)?;
        rx.await.map_err(|_| CoordinatorError::Stopped)?
    }
}

/// Spawn the coordinator task. It runs until every handle is dropped.
#[must_use]
pub fn spawn_coordinator(
    store: Arc<dyn PolicyStore>,
    pages: Arc<dyn PageDirectory>,
    queue_capacity: usize,
) -> (CoordinatorHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(queue_capacity.max(1));
    let coordinator = Coordinator { store, pages };
    let task = tokio::spawn(coordinator.run(rx));
    (CoordinatorHandle { tx }, task)
}

// =============================================================================
// ACTOR
// =============================================================================

struct Coordinator {
    store: Arc<dyn PolicyStore>,
    pages: Arc<dyn PageDirectory>,
}

impl Coordinator {
    async fn run(self, mut rx: mpsc::Receiver<Command>) {
        info!("coordinator started");
        while let Some(command) = rx.recv().await {
            self.handle(command).await;
        }
        info!("coordinator stopped");
    }

    async fn handle(&self, command: Command) {
        let (result, reply) = match command {
            Command::GetPolicy { reply } => (self.store.load().await.map_err(Into::into), reply),
            Command::SetGlobal { enabled, reply } => (self.set_global(enabled).await, reply),
            Command::SetSiteOverride { hostname, enabled, reply } => {
                (self.set_site_override(&hostname, enabled).await, reply)
            }
            Command::ClearSiteOverride { hostname, reply } => (self.clear_site_override(&hostname).await, reply),
            Command::PageAttached { page_id, reply } => (self.page_attached(page_id).await, reply),
        };

        if let Err(e) = &result {
            error!(error = %e, code = e.error_code(), "coordinator command failed");
        }
        if reply.send(result).is_err() {
            debug!("requester dropped before coordinator replied");
        }
    }

    async fn set_global(&self, enabled: bool) -> Result<Policy, CoordinatorError> {
        let mut policy = self.store.load().await?;
        policy.set_global(enabled);
        self.store.save(&policy).await?;
        info!(enabled, "global policy updated");

        self.broadcast(&policy, None).await;
        Ok(policy)
    }

    async fn set_site_override(&self, hostname: &Hostname, enabled: bool) -> Result<Policy, CoordinatorError> {
        let mut policy = self.store.load().await?;
        policy.set_override(hostname, enabled);
        self.store.save(&policy).await?;
        info!(%hostname, enabled, "site override set");

        self.broadcast(&policy, Some(hostname)).await;
        Ok(policy)
    }

    async fn clear_site_override(&self, hostname: &Hostname) -> Result<Policy, CoordinatorError> {
        let mut policy = self.store.load().await?;
        let existed = policy.clear_override(hostname);
        self.store.save(&policy).await?;
        info!(%hostname, existed, "site override cleared");

        self.broadcast(&policy, Some(hostname)).await;
        Ok(policy)
    }

    async fn page_attached(&self, page_id: Uuid) -> Result<Policy, CoordinatorError> {
        let policy = self.store.load().await?;
        if let Some(page) = self.pages.page(page_id).await {
            if !page.address.is_privileged() {
                let enabled = decision_for(&policy, &page);
                self.pages.show_badge(page_id, Badge::for_decision(enabled)).await;
            }
        }
        Ok(policy)
    }

    /// Push the recomputed decision to live pages, optionally only those on
    /// `only`. Returns how many pushes were accepted.
    async fn broadcast(&self, policy: &Policy, only: Option<&Hostname>) -> usize {
        let mut delivered = 0;
        for page in self.pages.live_pages().await {
            if only.is_some_and(|host| page.address.hostname() != Some(host)) {
                continue;
            }

            let enabled = decision_for(policy, &page);
            match self.pages.deliver(page.page_id, PageAction::for_decision(enabled)).await {
                Ok(()) => delivered += 1,
                Err(e) => debug!(page_id = %page.page_id, error = %e, "push not delivered"),
            }
            self.pages.show_badge(page.page_id, Badge::for_decision(enabled)).await;
        }
        debug!(delivered, scope = ?only.map(Hostname::as_str), "broadcast complete");
        delivered
    }
}

fn decision_for(policy: &Policy, page: &PageInfo) -> bool {
    policy.effective(page.address.hostname(), || page.looks_dark.unwrap_or(false))
}

#[cfg(test)]
#[path = "coordinator_test.rs"]
mod tests;
