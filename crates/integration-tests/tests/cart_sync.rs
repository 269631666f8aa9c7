//! Integration tests for the cart/wishlist synchronizer.
//!
//! Runs the real HTTP client, file cache, session holder and synchronizer
//! against the mock store.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use ecomall_client::cache::keys;
use ecomall_client::notice::messages;
use ecomall_client::{
    ClientConfig, CollectionKind, FileCache, LocalCache, NewAccount, Notice, Phase,
    SessionHolder, StoreApi, SyncError, Synchronizer,
};
use ecomall_core::{CartEntry, Item, ItemId, PaymentConfirmation, UserId};
use ecomall_integration_tests::{MockStore, payment_signature};
use secrecy::SecretString;
use serde_json::json;
use tempfile::TempDir;

struct TestContext {
    store: MockStore,
    dir: TempDir,
    api: Arc<StoreApi>,
    cache: Arc<FileCache>,
    session: SessionHolder,
    sync: Arc<Synchronizer>,
}

impl TestContext {
    async fn new() -> Self {
        let store = MockStore::spawn().await;
        store.add_item(7, "Bamboo Toothbrush", "49.50");
        store.add_item(9, "Jute Tote Bag", "199.00");
        store.add_account(1, "asha@example.com", "s3cret", "Asha");
        store.add_account(2, "ravi@example.com", "hunter2", "Ravi");

        let dir = tempfile::tempdir().unwrap();
        Self::with_store(store, dir)
    }

    fn with_store(store: MockStore, dir: TempDir) -> Self {
        let config = ClientConfig::for_base_url(&store.base_url(), dir.path()).unwrap();
        let api = Arc::new(StoreApi::from_config(&config).unwrap());
        let cache = Arc::new(FileCache::new(config.cache_dir.clone()));
        let session = SessionHolder::new(cache.clone());
        let sync = Arc::new(Synchronizer::new(api.clone(), cache.clone()));

        Self {
            store,
            dir,
            api,
            cache,
            session,
            sync,
        }
    }

    /// Rebuild the client stack over the same cache directory, as a restart
    /// would.
    fn restart(self) -> Self {
        Self::with_store(self.store, self.dir)
    }

    async fn login(&self, email: &str, password: &str) {
        let user = self
            .session
            .login(&self.api, email, &SecretString::from(password.to_string()))
            .await
            .unwrap();
        self.sync.handle_session_change(Some(user.user_id)).await;
    }

    async fn logout(&self) {
        self.session.logout();
        self.sync.handle_session_change(None).await;
    }

    fn quantity_of(&self, item: i32) -> Option<u32> {
        self.sync
            .cart()
            .iter()
            .find(|e| e.item_id == ItemId::new(item))
            .map(|e| e.quantity)
    }
}

fn item(id: i32) -> Item {
    Item::new(ItemId::new(id))
}

// =============================================================================
// Session and Hydration
// =============================================================================

#[tokio::test]
async fn test_login_replaces_cached_cart_with_server_copy() {
    let ctx = TestContext::new().await;
    ctx.cache
        .store(keys::CART_ITEMS, &json!([{"item_id": 7, "quantity": 2}]))
        .unwrap();
    ctx.store.seed_cart_row(1, 7, 5);
    let ctx = ctx.restart();
    assert_eq!(ctx.quantity_of(7), Some(2));

    ctx.login("asha@example.com", "s3cret").await;

    let cart = ctx.sync.cart();
    assert_eq!(cart.len(), 1);
    assert_eq!(cart[0].quantity, 5);
    assert!(cart[0].cart_row_id.is_some());
    assert_eq!(cart[0].title.as_deref(), Some("Bamboo Toothbrush"));
    assert_eq!(ctx.store.requests_matching("GET cart"), 1);
    assert_eq!(ctx.store.requests_matching("GET wishlist"), 1);
}

#[tokio::test]
async fn test_failed_login_keeps_session_empty() {
    let ctx = TestContext::new().await;

    let result = ctx
        .session
        .login(
            &ctx.api,
            "asha@example.com",
            &SecretString::from("wrong".to_string()),
        )
        .await;

    assert_eq!(result.unwrap_err().status(), Some(401));
    assert!(ctx.session.current().is_none());
}

#[tokio::test]
async fn test_session_and_cart_survive_restart() {
    let ctx = TestContext::new().await;
    ctx.login("asha@example.com", "s3cret").await;
    ctx.sync.add_to_cart(&item(7), 2).await.unwrap();

    let ctx = ctx.restart();

    // Before hydration: cached copy, local-only
    assert_eq!(ctx.session.user_id(), Some(UserId::new(1)));
    assert_eq!(ctx.sync.phase(CollectionKind::Cart), Phase::LocalOnly);
    assert_eq!(ctx.quantity_of(7), Some(2));

    ctx.sync.handle_session_change(ctx.session.user_id()).await;
    assert_eq!(ctx.sync.phase(CollectionKind::Cart), Phase::Synced);
    assert_eq!(ctx.quantity_of(7), Some(2));
}

#[tokio::test]
async fn test_logout_clears_everything() {
    let ctx = TestContext::new().await;
    ctx.login("asha@example.com", "s3cret").await;
    ctx.sync.add_to_cart(&item(7), 1).await.unwrap();
    ctx.sync.add_to_wishlist(&item(9)).await.unwrap();

    ctx.logout().await;

    assert_eq!(ctx.sync.cart_count(), 0);
    assert_eq!(ctx.sync.wishlist_count(), 0);
    assert!(ctx.cache.load(keys::AUTH_USER).unwrap().is_none());
    assert_eq!(ctx.cache.load(keys::CART_ITEMS).unwrap(), Some(json!([])));

    // Server copy is untouched
    assert_eq!(ctx.store.cart_of(1), vec![(7, 1)]);
}

#[tokio::test]
async fn test_switching_accounts() {
    let ctx = TestContext::new().await;
    ctx.store.seed_cart_row(2, 9, 3);

    ctx.login("asha@example.com", "s3cret").await;
    ctx.sync.add_to_cart(&item(7), 1).await.unwrap();
    ctx.logout().await;
    ctx.login("ravi@example.com", "hunter2").await;

    let cart = ctx.sync.cart();
    assert_eq!(cart.len(), 1);
    assert_eq!(cart[0].item_id, ItemId::new(9));
}

#[tokio::test]
async fn test_watch_session_hydrates_on_login() {
    let ctx = TestContext::new().await;
    ctx.store.seed_wishlist_row(1, 9);
    let watcher = ctx.sync.watch_session(&ctx.session);

    ctx.session
        .login(
            &ctx.api,
            "asha@example.com",
            &SecretString::from("s3cret".to_string()),
        )
        .await
        .unwrap();

    tokio::time::timeout(Duration::from_secs(5), async {
        while ctx.sync.phase(CollectionKind::Wishlist) != Phase::Synced {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
    assert_eq!(ctx.sync.wishlist_count(), 1);

    watcher.abort();
}

#[tokio::test]
async fn test_outage_keeps_cached_entries() {
    let ctx = TestContext::new().await;
    ctx.login("asha@example.com", "s3cret").await;
    ctx.sync.add_to_cart(&item(7), 3).await.unwrap();
    let ctx = ctx.restart();

    ctx.store.set_outage(true);
    let mut notices = ctx.sync.subscribe_notices();
    ctx.sync.handle_session_change(ctx.session.user_id()).await;

    assert_eq!(ctx.sync.phase(CollectionKind::Cart), Phase::Stale);
    assert_eq!(ctx.quantity_of(7), Some(3));
    assert_eq!(
        notices.try_recv().unwrap(),
        Notice::error(messages::FAILED_LOAD)
    );

    ctx.store.set_outage(false);
    ctx.sync.refresh().await.unwrap();
    assert_eq!(ctx.sync.phase(CollectionKind::Cart), Phase::Synced);
}

// =============================================================================
// Mutations
// =============================================================================

#[tokio::test]
async fn test_logged_out_mutations_make_no_requests() {
    let ctx = TestContext::new().await;
    let mut notices = ctx.sync.subscribe_notices();

    let result = ctx.sync.add_to_cart(&item(7), 1).await;

    assert_eq!(result, Err(SyncError::NotAuthenticated));
    assert_eq!(ctx.store.request_count(), 0);
    assert_eq!(
        notices.try_recv().unwrap(),
        Notice::info(messages::LOGIN_TO_ADD_CART)
    );
}

#[tokio::test]
async fn test_add_update_remove() {
    let ctx = TestContext::new().await;
    ctx.login("asha@example.com", "s3cret").await;

    ctx.sync.add_to_cart(&item(7), 1).await.unwrap();
    ctx.sync.add_to_cart(&item(7), 2).await.unwrap();
    assert_eq!(ctx.quantity_of(7), Some(3));
    assert_eq!(ctx.store.cart_of(1), vec![(7, 3)]);

    let entry = ctx.sync.cart()[0].clone();
    ctx.sync.update_quantity(&entry, 5).await.unwrap();
    assert_eq!(ctx.store.cart_of(1), vec![(7, 5)]);

    let entry = ctx.sync.cart()[0].clone();
    ctx.sync.update_quantity(&entry, 0).await.unwrap();
    assert!(ctx.sync.cart().is_empty());
    assert!(ctx.store.cart_of(1).is_empty());
}

#[tokio::test]
async fn test_remove_cached_entry_without_row_id() {
    let ctx = TestContext::new().await;
    ctx.store.seed_cart_row(1, 7, 2);
    ctx.cache
        .store(keys::CART_ITEMS, &json!([{"item_id": 7, "quantity": 2}]))
        .unwrap();
    let ctx = ctx.restart();

    // Hydration fails, leaving the cached entry without a row ID
    ctx.store.set_outage(true);
    ctx.login("asha@example.com", "s3cret").await;
    ctx.store.set_outage(false);
    assert!(ctx.sync.cart()[0].cart_row_id.is_none());

    ctx.sync
        .remove_cart_entry(&CartEntry::new(ItemId::new(7)))
        .await
        .unwrap();

    assert!(ctx.sync.cart().is_empty());
    assert!(ctx.store.cart_of(1).is_empty());
}

#[tokio::test]
async fn test_rejected_add_reports_server_message() {
    let ctx = TestContext::new().await;
    ctx.login("asha@example.com", "s3cret").await;
    let mut notices = ctx.sync.subscribe_notices();

    let err = ctx.sync.add_to_cart(&item(404), 1).await.unwrap_err();

    assert_eq!(
        err,
        SyncError::RemoteRejected {
            status: 400,
            message: "Invalid item".to_string()
        }
    );
    assert_eq!(notices.try_recv().unwrap(), Notice::error("Invalid item"));
    assert!(ctx.sync.cart().is_empty());
}

#[tokio::test]
async fn test_move_to_wishlist_and_summary() {
    let ctx = TestContext::new().await;
    ctx.login("asha@example.com", "s3cret").await;
    ctx.sync.add_to_cart(&item(7), 2).await.unwrap();
    ctx.sync.add_to_cart(&item(9), 1).await.unwrap();

    let summary = ctx.sync.cart_summary();
    assert_eq!(summary.lines, 2);
    assert_eq!(summary.total_quantity, 3);
    assert_eq!(summary.subtotal.to_string(), "₹298.00");

    let entry = ctx
        .sync
        .cart()
        .into_iter()
        .find(|e| e.item_id == ItemId::new(9))
        .unwrap();
    ctx.sync.move_to_wishlist(&entry).await.unwrap();

    assert_eq!(ctx.store.cart_of(1), vec![(7, 2)]);
    assert_eq!(ctx.store.wishlist_of(1), vec![9]);
    assert_eq!(ctx.sync.wishlist_count(), 1);
    assert_eq!(ctx.sync.cart_count(), 1);
}

#[tokio::test]
async fn test_wishlist_add_and_remove() {
    let ctx = TestContext::new().await;
    ctx.login("asha@example.com", "s3cret").await;

    ctx.sync.add_to_wishlist(&item(9)).await.unwrap();
    ctx.sync.add_to_wishlist(&item(9)).await.unwrap();
    assert_eq!(ctx.store.requests_matching("POST wishlist"), 1);

    let entry = ctx.sync.wishlist()[0].clone();
    ctx.sync.remove_wishlist_entry(&entry).await.unwrap();
    assert!(ctx.sync.wishlist().is_empty());
    assert!(ctx.store.wishlist_of(1).is_empty());
}

#[tokio::test]
async fn test_clear_cart() {
    let ctx = TestContext::new().await;
    ctx.store.seed_cart_row(1, 7, 1);
    ctx.store.seed_cart_row(1, 9, 2);
    ctx.login("asha@example.com", "s3cret").await;

    ctx.sync.clear_cart().await.unwrap();

    assert!(ctx.sync.cart().is_empty());
    assert!(ctx.store.cart_of(1).is_empty());
}

// =============================================================================
// Rows Recreated Elsewhere
// =============================================================================

#[tokio::test]
async fn test_update_after_row_recreated_elsewhere() {
    let ctx = TestContext::new().await;
    ctx.login("asha@example.com", "s3cret").await;
    ctx.sync.add_to_cart(&item(7), 1).await.unwrap();
    let entry = ctx.sync.cart()[0].clone();
    ctx.store.recreate_rows(1);

    ctx.sync.update_quantity(&entry, 3).await.unwrap();

    assert_eq!(ctx.store.cart_of(1), vec![(7, 3)]);
    assert_eq!(ctx.quantity_of(7), Some(3));
    assert_ne!(ctx.sync.cart()[0].cart_row_id, entry.cart_row_id);
}

#[tokio::test]
async fn test_remove_after_row_recreated_elsewhere() {
    let ctx = TestContext::new().await;
    ctx.login("asha@example.com", "s3cret").await;
    ctx.sync.add_to_cart(&item(7), 2).await.unwrap();
    let entry = ctx.sync.cart()[0].clone();
    ctx.store.recreate_rows(1);

    ctx.sync.remove_cart_entry(&entry).await.unwrap();

    assert!(ctx.store.cart_of(1).is_empty());
    assert!(ctx.sync.cart().is_empty());
    assert_eq!(ctx.store.requests_matching("DELETE cart"), 2);
}

#[tokio::test]
async fn test_wishlist_remove_after_row_recreated_elsewhere() {
    let ctx = TestContext::new().await;
    ctx.login("asha@example.com", "s3cret").await;
    ctx.sync.add_to_wishlist(&item(9)).await.unwrap();
    let entry = ctx.sync.wishlist()[0].clone();
    ctx.store.recreate_rows(1);

    ctx.sync.remove_wishlist_entry(&entry).await.unwrap();

    assert!(ctx.store.wishlist_of(1).is_empty());
    assert!(ctx.sync.wishlist().is_empty());
}

// =============================================================================
// Registration and Checkout
// =============================================================================

#[tokio::test]
async fn test_registered_user_gets_a_cart() {
    let ctx = TestContext::new().await;
    let account = NewAccount::from_full_name(
        "Meera",
        "meera@example.com",
        "9845012345",
        SecretString::from("leafy-green".to_string()),
    );

    let user = ctx.session.register(&ctx.api, &account).await.unwrap();
    ctx.sync.handle_session_change(Some(user.user_id)).await;

    assert_eq!(ctx.session.user_id(), Some(user.user_id));
    assert_eq!(user.last_name.as_deref(), Some("NA"));
    assert_eq!(ctx.sync.phase(CollectionKind::Cart), Phase::Synced);

    ctx.sync.add_to_cart(&item(9), 1).await.unwrap();
    assert_eq!(ctx.store.cart_of(user.user_id.as_i32()), vec![(9, 1)]);
}

#[tokio::test]
async fn test_failed_registration_keeps_session_empty() {
    let ctx = TestContext::new().await;
    let account = NewAccount::from_full_name(
        "Asha Again",
        "asha@example.com",
        "9845012345",
        SecretString::from("pw".to_string()),
    );

    let err = ctx.session.register(&ctx.api, &account).await.unwrap_err();

    assert_eq!(err.message(), "user with this email already exists.");
    assert!(ctx.session.current().is_none());
}

fn paid(gateway_order: &str) -> PaymentConfirmation {
    PaymentConfirmation {
        razorpay_order_id: gateway_order.to_string(),
        razorpay_payment_id: "pay_777".to_string(),
        razorpay_signature: payment_signature(gateway_order, "pay_777"),
    }
}

#[tokio::test]
async fn test_checkout_empties_cart_after_payment() {
    let ctx = TestContext::new().await;
    ctx.login("asha@example.com", "s3cret").await;
    ctx.sync.add_to_cart(&item(7), 2).await.unwrap();
    ctx.sync.add_to_cart(&item(9), 1).await.unwrap();

    // 298 + 74.50 GST + 7 platform + 40 delivery
    let totals = ctx.sync.checkout_totals();
    assert_eq!(totals.total.to_string(), "₹419.50");

    let order = ctx.sync.place_order().await.unwrap();
    let (lines, total) = ctx.store.order_contents(order.order_id.as_i32()).unwrap();
    assert_eq!(lines, vec![(7, 2), (9, 1)]);
    assert_eq!(total, "419.50");
    assert_eq!(ctx.sync.cart_count(), 2);

    let mut notices = ctx.sync.subscribe_notices();
    let verified = ctx
        .sync
        .confirm_payment(&paid(&order.razorpay_order_id))
        .await
        .unwrap();

    assert_eq!(verified.order_id, order.order_id);
    assert_eq!(
        ctx.store.order_status(order.order_id.as_i32()).as_deref(),
        Some("confirmed")
    );
    assert!(ctx.sync.cart().is_empty());
    assert!(ctx.store.cart_of(1).is_empty());
    assert_eq!(ctx.cache.load(keys::CART_ITEMS).unwrap(), Some(json!([])));

    let mut received = Vec::new();
    while let Ok(notice) = notices.try_recv() {
        received.push(notice);
    }
    assert!(received.contains(&Notice::success(messages::ORDER_CONFIRMED)));
}

#[tokio::test]
async fn test_forged_payment_keeps_cart() {
    let ctx = TestContext::new().await;
    ctx.login("asha@example.com", "s3cret").await;
    ctx.sync.add_to_cart(&item(7), 1).await.unwrap();
    let order = ctx.sync.place_order().await.unwrap();

    let mut forged = paid(&order.razorpay_order_id);
    forged.razorpay_signature = "forged".to_string();
    let err = ctx.sync.confirm_payment(&forged).await.unwrap_err();

    assert_eq!(
        err,
        SyncError::RemoteRejected {
            status: 400,
            message: "Payment verification failed".to_string()
        }
    );
    assert_eq!(ctx.store.cart_of(1), vec![(7, 1)]);
    assert_eq!(ctx.quantity_of(7), Some(1));
    assert_eq!(
        ctx.store.order_status(order.order_id.as_i32()).as_deref(),
        Some("pending")
    );
}

#[tokio::test]
async fn test_order_outage_keeps_cart() {
    let ctx = TestContext::new().await;
    ctx.login("asha@example.com", "s3cret").await;
    ctx.sync.add_to_cart(&item(9), 1).await.unwrap();
    ctx.store.set_outage(true);

    let err = ctx.sync.place_order().await.unwrap_err();

    assert!(matches!(err, SyncError::RemoteUnavailable(_)));
    assert_eq!(ctx.quantity_of(9), Some(1));
}
