//! Profile router state machine: role dispatch, failure delay and cancellation.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio::time::Instant;

use getit::identity::{IdentityService, UserId};
use getit::profile::{
    CancelToken, Destination, NavEvent, Notice, NoticeLevel, ProfileRouter, RecordingNavigator, RouterState,
    FETCH_FAILED_NOTICE, UNAUTHENTICATED_NOTICE,
};
use getit::storage::{DocumentStore, MemoryDocumentStore, StoreError, UserRecord};

fn uid(s: &str) -> UserId { UserId::parse(s).unwrap() }

struct StaticIdentity(Option<UserId>);

#[async_trait]
impl IdentityService for StaticIdentity {
    async fn current_identity(&self) -> Option<UserId> { self.0.clone() }
}

/// Identity service that never reports.
struct SilentIdentity;

#[async_trait]
impl IdentityService for SilentIdentity {
    async fn current_identity(&self) -> Option<UserId> { std::future::pending().await }
}

/// Store whose reads block until the gate is opened.
struct GatedStore {
    inner: MemoryDocumentStore,
    gate: Notify,
}

#[async_trait]
impl DocumentStore for GatedStore {
    async fn get_user(&self, id: &UserId) -> Result<UserRecord, StoreError> {
        self.gate.notified().await;
        self.inner.get_user(id).await
    }
}

fn store_with(id: &str, role: Option<&str>) -> Arc<MemoryDocumentStore> {
    let store = MemoryDocumentStore::new();
    let record = match role {
        Some(r) => UserRecord::with_role(r),
        None => UserRecord::default(),
    };
    store.insert(uid(id), record);
    Arc::new(store)
}

fn router_for(identity: Option<&str>, store: Arc<dyn DocumentStore>) -> (ProfileRouter, Arc<RecordingNavigator>) {
    let nav = Arc::new(RecordingNavigator::new());
    let router = ProfileRouter::new(Arc::new(StaticIdentity(identity.map(uid))), store, nav.clone());
    (router, nav)
}

#[tokio::test]
async fn recruiter_goes_to_recruiter_profile_only() {
    for role in ["recruiter", "Recruiter", "RECRUITER"] {
        let (router, nav) = router_for(Some("r_7"), store_with("r_7", Some(role)));
        let end = router.run(&CancelToken::new()).await;
        assert_eq!(end, RouterState::Routed(Destination::RecruiterProfile(uid("r_7"))));
        assert_eq!(nav.events(), vec![NavEvent::Redirect(Destination::RecruiterProfile(uid("r_7")))]);
        assert_eq!(nav.redirects()[0].path(), "/profiles/recruiters/r_7");
    }
}

#[tokio::test]
async fn student_goes_to_student_profile() {
    let (router, nav) = router_for(Some("s_1"), store_with("s_1", Some("student")));
    let end = router.run(&CancelToken::new()).await;
    assert_eq!(end, RouterState::Routed(Destination::StudentProfile(uid("s_1"))));
    assert_eq!(nav.redirects(), vec![Destination::StudentProfile(uid("s_1"))]);
    assert!(nav.notices().is_empty());
}

#[tokio::test]
async fn unrecognized_role_shows_error_and_stays() {
    let (router, nav) = router_for(Some("m_1"), store_with("m_1", Some("manager")));
    let end = router.run(&CancelToken::new()).await;
    assert_eq!(end, RouterState::RoleError("manager".into()));
    assert!(nav.redirects().is_empty());
    let notices = nav.notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].level, NoticeLevel::Error);
    assert!(notices[0].message.contains("manager"));
}

#[tokio::test]
async fn absent_role_is_reported_as_none() {
    let (router, nav) = router_for(Some("n_1"), store_with("n_1", None));
    assert_eq!(router.run(&CancelToken::new()).await, RouterState::RoleError("none".into()));
    assert!(nav.notices()[0].message.contains("none"));
    assert!(nav.redirects().is_empty());
}

#[tokio::test]
async fn signed_out_user_is_sent_to_login() {
    let (router, nav) = router_for(None, Arc::new(MemoryDocumentStore::new()));
    assert_eq!(router.run(&CancelToken::new()).await, RouterState::Unauthenticated);
    assert_eq!(
        nav.events(),
        vec![NavEvent::Notice(Notice::info(UNAUTHENTICATED_NOTICE)), NavEvent::Redirect(Destination::Login)]
    );
}

#[tokio::test(start_paused = true)]
async fn fetch_failure_redirects_to_login_after_exactly_the_delay() {
    let store = MemoryDocumentStore::new();
    store.set_unavailable(true);
    let (router, nav) = router_for(Some("u_1"), Arc::new(store));
    let router = Arc::new(router.with_failure_delay(Duration::from_millis(3000)));

    let t0 = Instant::now();
    let handle = {
        let router = router.clone();
        tokio::spawn(async move { router.run(&CancelToken::new()).await })
    };

    tokio::time::sleep(Duration::from_millis(2999)).await;
    assert_eq!(nav.notices(), vec![Notice::error(FETCH_FAILED_NOTICE)]);
    assert!(nav.redirects().is_empty(), "redirect fired before the delay elapsed");
    assert_eq!(router.state(), RouterState::FetchFailed);

    assert_eq!(handle.await.unwrap(), RouterState::FetchFailed);
    let timed = nav.timed_events();
    assert_eq!(timed.len(), 2);
    let (at, ev) = &timed[1];
    assert_eq!(ev, &NavEvent::Redirect(Destination::Login));
    let waited = at.duration_since(t0);
    assert!(waited >= Duration::from_millis(3000), "waited {:?}", waited);
    assert!(waited < Duration::from_millis(3100), "waited {:?}", waited);
}

#[tokio::test(start_paused = true)]
async fn missing_record_counts_as_fetch_failure() {
    let (router, nav) = router_for(Some("ghost"), Arc::new(MemoryDocumentStore::new()));
    let router = router.with_failure_delay(Duration::from_millis(50));
    assert_eq!(router.run(&CancelToken::new()).await, RouterState::FetchFailed);
    assert_eq!(nav.redirects(), vec![Destination::Login]);
}

#[tokio::test]
async fn teardown_during_fetch_suppresses_everything() {
    let store = Arc::new(GatedStore { inner: MemoryDocumentStore::new(), gate: Notify::new() });
    store.inner.insert(uid("s_9"), UserRecord::with_role("student"));
    let (router, nav) = router_for(Some("s_9"), store.clone());
    let router = Arc::new(router);
    let cancel = CancelToken::new();

    let handle = {
        let (router, cancel) = (router.clone(), cancel.clone());
        tokio::spawn(async move { router.run(&cancel).await })
    };
    while router.state() != RouterState::FetchingRecord {
        tokio::task::yield_now().await;
    }

    cancel.cancel();
    // the read completes after the page is gone
    store.gate.notify_one();

    assert_eq!(handle.await.unwrap(), RouterState::Cancelled);
    tokio::task::yield_now().await;
    assert!(nav.events().is_empty());
}

#[tokio::test(start_paused = true)]
async fn teardown_during_failure_delay_suppresses_redirect() {
    let store = MemoryDocumentStore::new();
    store.set_unavailable(true);
    let (router, nav) = router_for(Some("u_2"), Arc::new(store));
    let router = Arc::new(router);
    let cancel = CancelToken::new();

    let handle = {
        let (router, cancel) = (router.clone(), cancel.clone());
        tokio::spawn(async move { router.run(&cancel).await })
    };
    tokio::time::sleep(Duration::from_millis(1000)).await;
    cancel.cancel();

    assert_eq!(handle.await.unwrap(), RouterState::Cancelled);
    tokio::time::sleep(Duration::from_millis(5000)).await;
    assert_eq!(nav.notices().len(), 1);
    assert!(nav.redirects().is_empty());
}

#[tokio::test]
async fn teardown_while_resolving_identity() {
    let nav = Arc::new(RecordingNavigator::new());
    let router = ProfileRouter::new(Arc::new(SilentIdentity), Arc::new(MemoryDocumentStore::new()), nav.clone());
    let cancel = CancelToken::new();
    let canceller = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            cancel.cancel();
        })
    };
    assert_eq!(router.run(&cancel).await, RouterState::Cancelled);
    canceller.await.unwrap();
    assert!(nav.events().is_empty());
}
