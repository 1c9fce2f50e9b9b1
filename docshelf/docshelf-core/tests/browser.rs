//! End-to-end browser engine tests over the in-memory store, including the
//! timing-sensitive paths: stale-response discard and search debouncing.

use async_trait::async_trait;
use docshelf_core::browser::{Browser, SEARCH_DEBOUNCE};
use docshelf_core::caps::ActorContext;
use docshelf_core::error::{EngineError, Result};
use docshelf_core::follow::FollowConfig;
use docshelf_core::model::{Node, NodeStatus};
use docshelf_core::nav::{QueryMode, Scope};
use docshelf_core::services::{CreateNode, FollowService, NodePatch, NodeService, ShareService};
use docshelf_core::store::MemoryStore;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

fn actor() -> ActorContext {
    ActorContext::primary(Uuid::new_v4(), "owner@example.com")
}

fn browser_over(
    nodes: Arc<dyn NodeService>,
    store: &Arc<MemoryStore>,
    actor: ActorContext,
) -> Arc<Browser> {
    Browser::new(
        nodes,
        store.clone() as Arc<dyn ShareService>,
        store.clone() as Arc<dyn FollowService>,
        actor,
        "Documents",
    )
}

/// Delegating wrapper that slows down root listings only, so a navigation
/// into a folder can overtake an in-flight root load.
struct SlowRootNodes {
    inner: Arc<MemoryStore>,
    delay: Duration,
}

#[async_trait]
impl NodeService for SlowRootNodes {
    async fn get(&self, actor: &ActorContext, id: Uuid) -> Result<Node> {
        self.inner.get(actor, id).await
    }

    async fn list(&self, actor: &ActorContext, parent: Option<Uuid>) -> Result<Vec<Node>> {
        if parent.is_none() {
            tokio::time::sleep(self.delay).await;
        }
        self.inner.list(actor, parent).await
    }

    async fn all_files(&self, actor: &ActorContext) -> Result<Vec<Node>> {
        self.inner.all_files(actor).await
    }

    async fn folders(&self, actor: &ActorContext) -> Result<Vec<Node>> {
        self.inner.folders(actor).await
    }

    async fn create(&self, actor: &ActorContext, req: CreateNode) -> Result<Node> {
        self.inner.create(actor, req).await
    }

    async fn update(&self, actor: &ActorContext, id: Uuid, patch: NodePatch) -> Result<Node> {
        self.inner.update(actor, id, patch).await
    }

    async fn delete(&self, actor: &ActorContext, id: Uuid) -> Result<()> {
        self.inner.delete(actor, id).await
    }

    async fn move_node(
        &self,
        actor: &ActorContext,
        id: Uuid,
        target: Option<Uuid>,
    ) -> Result<Node> {
        self.inner.move_node(actor, id, target).await
    }
}

/// Delegating wrapper counting global file queries.
struct CountingNodes {
    inner: Arc<MemoryStore>,
    all_files_calls: AtomicUsize,
}

#[async_trait]
impl NodeService for CountingNodes {
    async fn get(&self, actor: &ActorContext, id: Uuid) -> Result<Node> {
        self.inner.get(actor, id).await
    }

    async fn list(&self, actor: &ActorContext, parent: Option<Uuid>) -> Result<Vec<Node>> {
        self.inner.list(actor, parent).await
    }

    async fn all_files(&self, actor: &ActorContext) -> Result<Vec<Node>> {
        self.all_files_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.all_files(actor).await
    }

    async fn folders(&self, actor: &ActorContext) -> Result<Vec<Node>> {
        self.inner.folders(actor).await
    }

    async fn create(&self, actor: &ActorContext, req: CreateNode) -> Result<Node> {
        self.inner.create(actor, req).await
    }

    async fn update(&self, actor: &ActorContext, id: Uuid, patch: NodePatch) -> Result<Node> {
        self.inner.update(actor, id, patch).await
    }

    async fn delete(&self, actor: &ActorContext, id: Uuid) -> Result<()> {
        self.inner.delete(actor, id).await
    }

    async fn move_node(
        &self,
        actor: &ActorContext,
        id: Uuid,
        target: Option<Uuid>,
    ) -> Result<Node> {
        self.inner.move_node(actor, id, target).await
    }
}

#[tokio::test(start_paused = true)]
async fn slow_root_load_cannot_overwrite_newer_scope() {
    let store = Arc::new(MemoryStore::new());
    let user = actor();
    let dir = store
        .create(&user, CreateNode::folder("fiscal", None))
        .await
        .unwrap();
    store
        .create(&user, CreateNode::file("alvara.pdf", Some(dir.id)))
        .await
        .unwrap();
    store
        .create(&user, CreateNode::file("solto.pdf", None))
        .await
        .unwrap();

    let slow = Arc::new(SlowRootNodes {
        inner: store.clone(),
        delay: Duration::from_millis(100),
    });
    let browser = browser_over(slow, &store, user);

    // kick off the slow root load, then navigate away before it lands
    let racing = {
        let browser = browser.clone();
        tokio::spawn(async move { browser.refresh().await })
    };
    tokio::task::yield_now().await;
    browser.enter_folder(dir.id).await.unwrap();

    racing.await.unwrap().unwrap();

    // the stale root response was discarded; the folder view survived
    let nav = browser.nav().await;
    assert_eq!(nav.current_scope(), Scope::Folder(dir.id));
    let listing = browser.listing().await;
    assert_eq!(listing.entries.len(), 1);
    assert_eq!(listing.entries[0].node.name, "alvara.pdf");
}

#[tokio::test(start_paused = true)]
async fn rapid_search_edits_coalesce_into_one_query() {
    let store = Arc::new(MemoryStore::new());
    let user = actor();
    store
        .create(&user, CreateNode::file("alvara.pdf", None))
        .await
        .unwrap();
    store
        .create(&user, CreateNode::file("contrato.pdf", None))
        .await
        .unwrap();

    let counting = Arc::new(CountingNodes {
        inner: store.clone(),
        all_files_calls: AtomicUsize::new(0),
    });
    let browser = browser_over(counting.clone(), &store, user);

    browser.set_search_term("a").await;
    browser.set_search_term("al").await;
    browser.set_search_term("alv").await;

    tokio::time::sleep(SEARCH_DEBOUNCE + Duration::from_millis(100)).await;

    assert_eq!(counting.all_files_calls.load(Ordering::SeqCst), 1);
    let listing = browser.listing().await;
    assert_eq!(listing.mode, QueryMode::Global);
    assert_eq!(listing.entries.len(), 1);
    assert_eq!(listing.entries[0].node.name, "alvara.pdf");
}

#[tokio::test(start_paused = true)]
async fn navigation_before_debounce_fires_drops_the_search() {
    let store = Arc::new(MemoryStore::new());
    let user = actor();
    let dir = store
        .create(&user, CreateNode::folder("fiscal", None))
        .await
        .unwrap();

    let counting = Arc::new(CountingNodes {
        inner: store.clone(),
        all_files_calls: AtomicUsize::new(0),
    });
    let browser = browser_over(counting.clone(), &store, user);

    browser.set_search_term("alv").await;
    // navigating clears the filter before the debounce window elapses
    browser.enter_folder(dir.id).await.unwrap();
    tokio::time::sleep(SEARCH_DEBOUNCE + Duration::from_millis(100)).await;

    // the late refresh re-queries the folder scope, never the global files
    assert_eq!(counting.all_files_calls.load(Ordering::SeqCst), 0);
    assert_eq!(browser.listing().await.mode, QueryMode::Scoped);
}

#[tokio::test]
async fn filter_then_shared_navigation_restores_scoped_view() {
    let store = Arc::new(MemoryStore::new());
    let alice = actor();
    let bob = ActorContext::primary(Uuid::new_v4(), "bob@example.com");
    store.register_account(&bob.email, bob.user_id).await;

    let alice_browser = browser_over(store.clone(), &store, alice.clone());
    let dir = alice_browser
        .create(CreateNode::folder("projetos", None))
        .await
        .unwrap();
    alice_browser
        .create(CreateNode::file("plan.pdf", Some(dir.id)))
        .await
        .unwrap();
    alice_browser
        .share(dir.id, &bob.email, false)
        .await
        .unwrap();

    let bob_browser = browser_over(store.clone(), &store, bob);
    bob_browser
        .set_status_filter(Some(NodeStatus::Valid))
        .await
        .unwrap();
    assert_eq!(bob_browser.listing().await.mode, QueryMode::Global);

    bob_browser.enter_shared().await.unwrap();
    let nav = bob_browser.nav().await;
    assert!(nav.filter.is_default());
    assert_eq!(nav.current_scope(), Scope::SharedWithMe);
    let listing = bob_browser.listing().await;
    assert_eq!(listing.mode, QueryMode::Scoped);
    assert_eq!(listing.entries.len(), 1);
    assert_eq!(listing.entries[0].node.id, dir.id);
}

#[tokio::test]
async fn follow_lifecycle_enforces_owner_invariant() {
    let store = Arc::new(MemoryStore::new());
    let alice = actor();
    let bob = ActorContext::primary(Uuid::new_v4(), "bob@example.com");
    store.register_account(&bob.email, bob.user_id).await;

    let alice_browser = browser_over(store.clone(), &store, alice.clone());
    let doc = alice_browser
        .create(CreateNode::file("licenca.pdf", None))
        .await
        .unwrap();
    alice_browser
        .share(doc.id, &bob.email, false)
        .await
        .unwrap();

    // the owner is already subscribed and cannot leave
    assert!(matches!(
        alice_browser.unfollow(doc.id).await,
        Err(EngineError::OwnerUnfollow)
    ));

    let bob_browser = browser_over(store.clone(), &store, bob.clone());
    bob_browser
        .follow(doc.id, FollowConfig::default())
        .await
        .unwrap();
    assert!(matches!(
        bob_browser.follow(doc.id, FollowConfig::default()).await,
        Err(EngineError::AlreadyFollowing)
    ));

    let followers = alice_browser.followers(doc.id).await.unwrap();
    assert_eq!(followers.len(), 2);

    bob_browser.unfollow(doc.id).await.unwrap();
    let followers = alice_browser.followers(doc.id).await.unwrap();
    assert_eq!(followers.len(), 1);
    assert_eq!(followers[0].user_id, alice.user_id);

    // owner re-adds bob by email with a custom window
    alice_browser
        .add_follower_by_email(doc.id, &bob.email, FollowConfig::new(30, false).unwrap())
        .await
        .unwrap();
    let docs = bob_browser.followed_documents().await.unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].follower.config.days_before_alert, 30);
}
