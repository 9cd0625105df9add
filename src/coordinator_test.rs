use super::*;
use crate::pages::{DeliveryError, PageRegistry};
use crate::store::MemoryStore;
use policy::ServerFrame;
use std::sync::Mutex;
use tokio::sync::mpsc;
use tokio::time::{Duration, timeout};

struct Harness {
    handle: CoordinatorHandle,
    store: Arc<MemoryStore>,
    registry: PageRegistry,
}

fn harness(policy: Policy) -> Harness {
    let store = Arc::new(MemoryStore::with_policy(policy));
    let registry = PageRegistry::new();
    let (handle, _task) = spawn_coordinator(store.clone(), Arc::new(registry.clone()), 16);
    Harness { handle, store, registry }
}

async fn attach(
    registry: &PageRegistry,
    url: &str,
    looks_dark: Option<bool>,
) -> (Uuid, mpsc::Receiver<ServerFrame>) {
    let page_id = Uuid::new_v4();
    let (tx, rx) = mpsc::channel(8);
    registry.attach(page_id, url, looks_dark, tx).await;
    (page_id, rx)
}

async fn recv_push(rx: &mut mpsc::Receiver<ServerFrame>) -> PageAction {
    let frame = timeout(Duration::from_millis(200), rx.recv())
        .await
        .expect("push timed out")
        .expect("channel closed");
    match frame {
        ServerFrame::Push { action } => action,
        other => panic!("expected push, got {other:?}"),
    }
}

async fn assert_silent(rx: &mut mpsc::Receiver<ServerFrame>) {
    assert!(timeout(Duration::from_millis(50), rx.recv()).await.is_err(), "unexpected frame");
}

async fn badge_of(registry: &PageRegistry, page_id: Uuid) -> Option<Badge> {
    registry.list().await.into_iter().find(|p| p.page_id == page_id).and_then(|p| p.badge)
}

fn host(raw: &str) -> Hostname {
    Hostname::parse(raw).unwrap()
}

// =============================================================================
// GLOBAL
// =============================================================================

#[tokio::test]
async fn set_global_off_disables_every_live_page() {
    let h = harness(Policy::default());
    let (a, mut rx_a) = attach(&h.registry, "https://a.test/", Some(false)).await;
    let (b, mut rx_b) = attach(&h.registry, "https://b.test/x", None).await;

    let policy = h.handle.set_global(false).await.unwrap();
    assert!(!policy.global);
    assert_eq!(h.store.snapshot().map(|p| p.global), Some(false));

    assert_eq!(recv_push(&mut rx_a).await, PageAction::Disable);
    assert_eq!(recv_push(&mut rx_b).await, PageAction::Disable);
    assert_eq!(badge_of(&h.registry, a).await, Some(Badge::Off));
    assert_eq!(badge_of(&h.registry, b).await, Some(Badge::Off));
}

#[tokio::test]
async fn global_off_keeps_override_true_page_enabled() {
    let mut initial = Policy::default();
    initial.set_override(&host("x.com"), true);
    let h = harness(initial);
    let (_x, mut rx_x) = attach(&h.registry, "https://x.com/", Some(false)).await;
    let (_y, mut rx_y) = attach(&h.registry, "https://y.com/", Some(false)).await;

    h.handle.set_global(false).await.unwrap();

    assert_eq!(recv_push(&mut rx_x).await, PageAction::Enable);
    assert_eq!(recv_push(&mut rx_y).await, PageAction::Disable);
}

#[tokio::test]
async fn reported_dark_page_is_disabled_when_global_on() {
    let h = harness(Policy::default());
    let (_dark, mut rx_dark) = attach(&h.registry, "https://dark.test/", Some(true)).await;
    let (_light, mut rx_light) = attach(&h.registry, "https://light.test/", Some(false)).await;

    h.handle.set_global(true).await.unwrap();

    assert_eq!(recv_push(&mut rx_dark).await, PageAction::Disable);
    assert_eq!(recv_push(&mut rx_light).await, PageAction::Enable);
}

#[tokio::test]
async fn privileged_pages_receive_nothing() {
    let h = harness(Policy::default());
    let (_p, mut rx_p) = attach(&h.registry, "chrome://extensions", None).await;

    h.handle.set_global(false).await.unwrap();
    assert_silent(&mut rx_p).await;
}

// =============================================================================
// SITE OVERRIDES
// =============================================================================

#[tokio::test]
async fn site_override_only_reaches_matching_hostname() {
    let h = harness(Policy::default());
    let (_a1, mut rx_a1) = attach(&h.registry, "https://a.com/one", Some(false)).await;
    let (_a2, mut rx_a2) = attach(&h.registry, "https://A.com:8443/two", Some(false)).await;
    let (_b, mut rx_b) = attach(&h.registry, "https://b.com/", Some(false)).await;

    let policy = h.handle.set_site_override("a.com", false).await.unwrap();
    assert_eq!(policy.override_for(&host("a.com")), Some(false));

    assert_eq!(recv_push(&mut rx_a1).await, PageAction::Disable);
    assert_eq!(recv_push(&mut rx_a2).await, PageAction::Disable);
    assert_silent(&mut rx_b).await;
}

#[tokio::test]
async fn site_override_accepts_url_and_normalizes_key() {
    let h = harness(Policy::default());
    let policy = h.handle.set_site_override("https://News.Example.com/path?q=1", false).await.unwrap();
    assert!(policy.overrides.contains_key("news.example.com"));
}

#[tokio::test]
async fn invalid_hostname_is_rejected_without_writing() {
    let h = harness(Policy::default());
    let err = h.handle.set_site_override("", true).await.unwrap_err();
    assert!(matches!(err, CoordinatorError::InvalidHostname(_)));
    assert_eq!(err.error_code(), "E_INVALID_HOSTNAME");
    assert!(!err.retryable());
    assert_eq!(h.store.write_count(), 0);
}

#[tokio::test]
async fn clear_override_pushes_recomputed_decision() {
    let mut initial = Policy::default();
    initial.set_override(&host("a.com"), false);
    let h = harness(initial);
    let (_a, mut rx_a) = attach(&h.registry, "https://a.com/", Some(false)).await;
    let (_b, mut rx_b) = attach(&h.registry, "https://b.com/", Some(false)).await;

    let policy = h.handle.clear_site_override("a.com").await.unwrap();
    assert!(policy.overrides.is_empty());

    assert_eq!(recv_push(&mut rx_a).await, PageAction::Enable);
    assert_silent(&mut rx_b).await;
}

#[tokio::test]
async fn clear_missing_override_is_not_an_error() {
    let h = harness(Policy::default());
    let policy = h.handle.clear_site_override("never.test").await.unwrap();
    assert_eq!(policy, Policy::default());
}

// =============================================================================
// FAILURES
// =============================================================================

#[tokio::test]
async fn store_write_failure_sends_no_push() {
    let h = harness(Policy::default());
    let (_a, mut rx_a) = attach(&h.registry, "https://a.test/", Some(false)).await;
    h.store.set_fail_writes(true);

    let err = h.handle.set_global(false).await.unwrap_err();
    assert_eq!(err.error_code(), "E_STORE_UNAVAILABLE");
    assert!(err.retryable());
    assert_silent(&mut rx_a).await;
    assert_eq!(h.store.snapshot().map(|p| p.global), Some(true));
}

#[tokio::test]
async fn store_read_failure_surfaces_on_get() {
    let h = harness(Policy::default());
    h.store.set_fail_reads(true);
    assert!(matches!(h.handle.get_policy().await, Err(CoordinatorError::Store(_))));

    h.store.set_fail_reads(false);
    assert_eq!(h.handle.get_policy().await.unwrap(), Policy::default());
}

#[tokio::test]
async fn unreachable_page_does_not_block_others() {
    let h = harness(Policy::default());
    let (gone, rx_gone) = attach(&h.registry, "https://gone.test/", Some(false)).await;
    drop(rx_gone);
    let (_ok, mut rx_ok) = attach(&h.registry, "https://ok.test/", Some(false)).await;

    h.handle.set_global(false).await.unwrap();
    assert_eq!(recv_push(&mut rx_ok).await, PageAction::Disable);
    // Badge still reflects the decision even though the push was lost.
    assert_eq!(badge_of(&h.registry, gone).await, Some(Badge::Off));
}

#[tokio::test]
async fn stopped_coordinator_reports_stopped() {
    let (tx, rx) = mpsc::channel(1);
    drop(rx);
    let handle = CoordinatorHandle { tx };
    let err = handle.get_policy().await.unwrap_err();
    assert!(matches!(err, CoordinatorError::Stopped));
    assert_eq!(err.error_code(), "E_COORDINATOR_STOPPED");
}

// =============================================================================
// ORDERING
// =============================================================================

/// Directory that records what the store held at the moment of each push.
struct RecordingDirectory {
    inner: PageRegistry,
    store: Arc<MemoryStore>,
    seen: Mutex<Vec<Option<Policy>>>,
}

#[async_trait::async_trait]
impl PageDirectory for RecordingDirectory {
    async fn live_pages(&self) -> Vec<PageInfo> {
        self.inner.live_pages().await
    }

    async fn page(&self, page_id: Uuid) -> Option<PageInfo> {
        self.inner.page(page_id).await
    }

    async fn deliver(&self, page_id: Uuid, action: PageAction) -> Result<(), DeliveryError> {
        self.seen.lock().unwrap().push(self.store.snapshot());
        self.inner.deliver(page_id, action).await
    }

    async fn show_badge(&self, page_id: Uuid, badge: Badge) {
        self.inner.show_badge(page_id, badge).await;
    }
}

#[tokio::test]
async fn store_write_lands_before_any_push() {
    let store = Arc::new(MemoryStore::with_policy(Policy::default()));
    let registry = PageRegistry::new();
    let (_a, _rx) = attach(&registry, "https://a.test/", Some(false)).await;
    let directory = Arc::new(RecordingDirectory { inner: registry, store: store.clone(), seen: Mutex::new(Vec::new()) });
    let (handle, _task) = spawn_coordinator(store, directory.clone(), 4);

    handle.set_global(false).await.unwrap();

    let seen = directory.seen.lock().unwrap().clone();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].as_ref().map(|p| p.global), Some(false));
}

#[tokio::test]
async fn concurrent_mutations_do_not_lose_updates() {
    let h = harness(Policy::default());
    let mut tasks = Vec::new();
    for i in 0..20 {
        let handle = h.handle.clone();
        tasks.push(tokio::spawn(async move { handle.set_site_override(&format!("site{i}.test"), i % 2 == 0).await }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let policy = h.handle.get_policy().await.unwrap();
    assert_eq!(policy.overrides.len(), 20);
    assert_eq!(policy.overrides.get("site4.test"), Some(&true));
    assert_eq!(policy.overrides.get("site7.test"), Some(&false));
    assert_eq!(h.store.write_count(), 20);
}

// =============================================================================
// PAGE ATTACH
// =============================================================================

#[tokio::test]
async fn page_attached_sets_badge_without_push() {
    let mut initial = Policy::default();
    initial.set_override(&host("a.test"), false);
    let h = harness(initial.clone());
    let (a, mut rx_a) = attach(&h.registry, "https://a.test/", None).await;

    let policy = h.handle.page_attached(a).await.unwrap();
    assert_eq!(policy, initial);
    assert_eq!(badge_of(&h.registry, a).await, Some(Badge::Off));
    assert_silent(&mut rx_a).await;
    assert_eq!(h.store.write_count(), 0);
}

#[tokio::test]
async fn page_attached_skips_badge_on_privileged_page() {
    let h = harness(Policy::default());
    let (p, _rx) = attach(&h.registry, "about:blank", None).await;
    h.handle.page_attached(p).await.unwrap();
    assert_eq!(badge_of(&h.registry, p).await, None);
}
