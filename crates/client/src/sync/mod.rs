//! Cart and wishlist synchronizer.
//!
//! The [`Synchronizer`] owns the in-memory cart and wishlist, mirrors them to
//! the local cache after every change, and keeps them consistent with the
//! remote store while a session is active.
//!
//! # Session lifecycle
//!
//! - No session: collections are local-only. Whatever the cache held at
//!   startup stays visible, but every mutation is refused with a login
//!   notice and no network call.
//! - Session established: both collections are fetched (concurrently) and
//!   each is replaced wholesale by the server's copy. The server is
//!   authoritative; cached entries are not merged back.
//! - Session ended: both collections and their cache blobs are cleared.
//!
//! # Checkout
//!
//! [`Synchronizer::place_order`] opens an order for the whole cart and leaves
//! the cart alone. Once the payment gateway reports success,
//! [`Synchronizer::confirm_payment`] has the backend verify it and then
//! empties the cart.
//!
//! Every session transition bumps a generation counter. Results of requests
//! issued under an older generation are discarded, so a slow response for a
//! previous session never lands in the current one.
//!
//! # Locking
//!
//! State lives behind a `std::sync::Mutex` that is never held across an
//! `.await`. Requests snapshot what they need, release the lock, and re-lock
//! to apply the result after checking the generation.

mod backend;
mod collection;
mod error;


use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use ecomall_core::{
    CartEntry, CartRowId, CartSummary, CheckoutTotals, Item, ItemId, OrderRequest,
    PaymentConfirmation, PlacedOrder, UserId, VerifiedPayment, WishlistEntry, WishlistRowId,
};

pub use backend::CartBackend;
pub use error::SyncError;

use crate::cache::{LocalCache, keys, load_or_none, store_or_warn};
use crate::notice::{Notice, messages};
use crate::session::SessionHolder;

/// Buffered notices per subscriber before the oldest are dropped.
const NOTICE_CAPACITY: usize = 64;

/// Which collection an operation concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionKind {
    Cart,
    Wishlist,
}

/// Synchronization state of one collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// No session; contents come from the local cache only.
    LocalOnly,
    /// Session established, initial fetch in flight.
    Hydrating,
    /// Contents reflect the server as of the last request.
    Synced,
    /// Session active but the last fetch failed; contents may be outdated.
    Stale,
}

#[derive(Debug)]
struct SyncState {
    user: Option<UserId>,
    generation: u64,
    cart: Vec<CartEntry>,
    wishlist: Vec<WishlistEntry>,
    cart_phase: Phase,
    wishlist_phase: Phase,
}

impl SyncState {
    fn set_phase(&mut self, phase: Phase) {
        self.cart_phase = phase;
        self.wishlist_phase = phase;
    }
}

/// A session snapshot a request was issued under.
#[derive(Debug, Clone, Copy)]
struct Ticket {
    user: UserId,
    generation: u64,
}

/// Keeps the cart and wishlist in sync with the remote store.
pub struct Synchronizer {
    backend: Arc<dyn CartBackend>,
    cache: Arc<dyn LocalCache>,
    state: Mutex<SyncState>,
    notices: broadcast::Sender<Notice>,
}

impl Synchronizer {
    /// Create a synchronizer in the local-only phase, restoring both
    /// collections from the cache.
    ///
    /// Missing or corrupt cache blobs yield empty collections.
    pub fn new(backend: Arc<dyn CartBackend>, cache: Arc<dyn LocalCache>) -> Self {
        let cart = load_or_none::<Vec<CartEntry>>(cache.as_ref(), keys::CART_ITEMS)
            .map(collection::from_rows)
            .unwrap_or_default();
        let wishlist = load_or_none::<Vec<WishlistEntry>>(cache.as_ref(), keys::WISHLIST_ITEMS)
            .map(collection::from_rows)
            .unwrap_or_default();

        debug!(
            cart = cart.len(),
            wishlist = wishlist.len(),
            "Restored collections from cache"
        );

        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);

        Self {
            backend,
            cache,
            state: Mutex::new(SyncState {
                user: None,
                generation: 0,
                cart,
                wishlist,
                cart_phase: Phase::LocalOnly,
                wishlist_phase: Phase::LocalOnly,
            }),
            notices,
        }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Snapshot of the cart.
    #[must_use]
    pub fn cart(&self) -> Vec<CartEntry> {
        self.lock().cart.clone()
    }

    /// Snapshot of the wishlist.
    #[must_use]
    pub fn wishlist(&self) -> Vec<WishlistEntry> {
        self.lock().wishlist.clone()
    }

    /// Number of distinct cart lines.
    #[must_use]
    pub fn cart_count(&self) -> usize {
        self.lock().cart.len()
    }

    #[must_use]
    pub fn wishlist_count(&self) -> usize {
        self.lock().wishlist.len()
    }

    /// Line count, total quantity and subtotal of the cart.
    #[must_use]
    pub fn cart_summary(&self) -> CartSummary {
        CartSummary::of(&self.lock().cart)
    }

    #[must_use]
    pub fn phase(&self, kind: CollectionKind) -> Phase {
        let state = self.lock();
        match kind {
            CollectionKind::Cart => state.cart_phase,
            CollectionKind::Wishlist => state.wishlist_phase,
        }
    }

    /// The user the collections currently belong to.
    #[must_use]
    pub fn user(&self) -> Option<UserId> {
        self.lock().user
    }

    /// Receive notices published after this call.
    #[must_use]
    pub fn subscribe_notices(&self) -> broadcast::Receiver<Notice> {
        self.notices.subscribe()
    }

    // =========================================================================
    // Session handling
    // =========================================================================

    /// React to the session becoming `user`, waiting for hydration to finish.
    ///
    /// Repeating the current user is a no-op.
    pub async fn handle_session_change(&self, user: Option<UserId>) {
        if let Some(ticket) = self.begin_session(user) {
            let _ = self.hydrate(ticket).await;
        }
    }

    /// Follow a session holder until it is dropped.
    ///
    /// The current session is applied immediately; each later change starts
    /// its hydration in a separate task so a slow fetch never delays the
    /// next transition.
    pub fn watch_session(self: &Arc<Self>, session: &SessionHolder) -> JoinHandle<()> {
        let mut rx = session.subscribe();
        let this = Arc::clone(self);

        tokio::spawn(async move {
            let initial = rx.borrow_and_update().as_ref().map(|u| u.user_id);
            this.spawn_hydration(initial);

            while rx.changed().await.is_ok() {
                let user = rx.borrow_and_update().as_ref().map(|u| u.user_id);
                this.spawn_hydration(user);
            }

            debug!("Session holder dropped; no longer watching");
        })
    }

    /// Re-fetch both collections for the current session.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotAuthenticated`] without a session, or the
    /// first fetch failure. Collections whose fetch failed keep their
    /// contents and move to [`Phase::Stale`].
    #[instrument(skip_all)]
    pub async fn refresh(&self) -> Result<(), SyncError> {
        let ticket = {
            let mut state = self.lock();
            let user = state.user.ok_or(SyncError::NotAuthenticated)?;
            state.set_phase(Phase::Hydrating);
            Ticket {
                user,
                generation: state.generation,
            }
        };
        self.hydrate(ticket).await
    }

    fn spawn_hydration(self: &Arc<Self>, user: Option<UserId>) {
        if let Some(ticket) = self.begin_session(user) {
            let this = Arc::clone(self);
            tokio::spawn(async move {
                let _ = this.hydrate(ticket).await;
            });
        }
    }

    /// Record a session transition. Returns the ticket to hydrate with when
    /// a user is now present.
    fn begin_session(&self, user: Option<UserId>) -> Option<Ticket> {
        let mut state = self.lock();
        if state.user == user {
            return None;
        }

        let previous = state.user;
        state.user = user;
        state.generation += 1;

        // Another user's collections must never be shown, even briefly
        if previous.is_some() {
            info!(previous = ?previous, "Session ended; clearing cart and wishlist");
            state.cart.clear();
            state.wishlist.clear();
            self.persist(&state, CollectionKind::Cart);
            self.persist(&state, CollectionKind::Wishlist);
        }

        match user {
            Some(user) => {
                info!(%user, generation = state.generation, "Session started; hydrating");
                state.set_phase(Phase::Hydrating);
                Some(Ticket {
                    user,
                    generation: state.generation,
                })
            }
            None => {
                state.set_phase(Phase::LocalOnly);
                None
            }
        }
    }

    /// Fetch both collections and replace each one that loaded.
    async fn hydrate(&self, ticket: Ticket) -> Result<(), SyncError> {
        let (cart, wishlist) = tokio::join!(
            self.backend.fetch_cart(ticket.user),
            self.backend.fetch_wishlist(ticket.user)
        );

        let mut first_error = None;
        {
            let mut state = self.lock();
            if state.generation != ticket.generation {
                debug!(user = %ticket.user, "Discarding hydration for superseded session");
                return Err(SyncError::Superseded);
            }

            match cart {
                Ok(rows) => {
                    state.cart = collection::from_rows(rows);
                    state.cart_phase = Phase::Synced;
                    self.persist(&state, CollectionKind::Cart);
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load cart; keeping cached entries");
                    state.cart_phase = Phase::Stale;
                    first_error.get_or_insert(SyncError::from(e));
                }
            }

            match wishlist {
                Ok(rows) => {
                    state.wishlist = collection::from_rows(rows);
                    state.wishlist_phase = Phase::Synced;
                    self.persist(&state, CollectionKind::Wishlist);
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load wishlist; keeping cached entries");
                    state.wishlist_phase = Phase::Stale;
                    first_error.get_or_insert(SyncError::from(e));
                }
            }

            debug!(
                cart = state.cart.len(),
                wishlist = state.wishlist.len(),
                "Hydration finished"
            );
        }

        match first_error {
            None => Ok(()),
            Some(err) => {
                self.notify(Notice::error(messages::FAILED_LOAD));
                Err(err)
            }
        }
    }

    // =========================================================================
    // Cart mutations
    // =========================================================================

    /// Add `quantity` units of `item` to the cart.
    ///
    /// An item already in the cart has its quantity increased. A quantity of
    /// zero does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotAuthenticated`] without a session, or the
    /// remote failure. The cart is unchanged on error.
    #[instrument(skip_all, fields(item_id = %item.item_id, quantity = quantity))]
    pub async fn add_to_cart(&self, item: &Item, quantity: u32) -> Result<(), SyncError> {
        let ticket = self.ticket(messages::LOGIN_TO_ADD_CART)?;
        if quantity == 0 {
            return Ok(());
        }

        match self.add_to_cart_remote(ticket, item.item_id, quantity).await {
            Ok(()) => {
                self.notify(Notice::success(messages::ADDED_TO_CART));
                Ok(())
            }
            Err(e) => Err(self.fail(e, messages::FAILED_ADD_CART)),
        }
    }

    async fn add_to_cart_remote(
        &self,
        ticket: Ticket,
        item_id: ItemId,
        quantity: u32,
    ) -> Result<(), SyncError> {
        let existing = {
            let state = self.lock();
            collection::find(&state.cart, item_id)
                .and_then(|e| e.cart_row_id.clone().map(|row| (row, e.quantity)))
        };

        let row = match existing {
            Some((row_id, current)) => {
                let target = current.saturating_add(quantity);
                match self.backend.update_cart_row(&row_id, target).await {
                    Err(e) if e.is_not_found() => {
                        debug!(%row_id, "Cart row vanished remotely; creating a new one");
                        self.backend
                            .create_cart_row(ticket.user, item_id, quantity)
                            .await?
                    }
                    other => other?,
                }
            }
            None => {
                self.backend
                    .create_cart_row(ticket.user, item_id, quantity)
                    .await?
            }
        };

        self.apply_cart_row(ticket, row).await
    }

    /// Set the quantity of a cart line. Zero or negative removes it.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotAuthenticated`] without a session, or the
    /// remote failure.
    #[instrument(skip_all, fields(item_id = %entry.item_id, new_quantity = new_quantity))]
    pub async fn update_quantity(
        &self,
        entry: &CartEntry,
        new_quantity: i64,
    ) -> Result<(), SyncError> {
        if new_quantity <= 0 {
            return self.remove_cart_entry(entry).await;
        }

        let ticket = self.ticket(messages::LOGIN_TO_MANAGE_CART)?;
        let quantity = u32::try_from(new_quantity).unwrap_or(u32::MAX);

        match self.update_quantity_remote(ticket, entry, quantity).await {
            Ok(()) => {
                self.notify(Notice::success(messages::CART_UPDATED));
                Ok(())
            }
            Err(e) => Err(self.fail(e, messages::FAILED_UPDATE_CART)),
        }
    }

    async fn update_quantity_remote(
        &self,
        ticket: Ticket,
        entry: &CartEntry,
        quantity: u32,
    ) -> Result<(), SyncError> {
        let hint = entry.cart_row_id.clone();
        let (mut row_id, mut fresh) = self.resolve_cart_row(ticket, entry.item_id, hint).await?;

        loop {
            let Some(id) = row_id else {
                debug!(item_id = %entry.item_id, "No remote cart row; dropping local entry");
                return self.drop_cart_entry(ticket, entry.item_id);
            };

            match self.backend.update_cart_row(&id, quantity).await {
                Ok(row) => return self.apply_cart_row(ticket, row).await,
                Err(e) if e.is_not_found() && !fresh => {
                    debug!(row_id = %id, "Cart row ID outdated; looking up the current row");
                    row_id = self.refetch_cart_row(ticket, entry.item_id, &id).await?;
                    fresh = true;
                }
                Err(e) if e.is_not_found() => {
                    debug!(row_id = %id, "Cart row vanished remotely; dropping local entry");
                    return self.drop_cart_entry(ticket, entry.item_id);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Remove a line from the cart.
    ///
    /// Entries without a known row ID are matched against a fresh copy of
    /// the remote cart, as are known IDs the server no longer recognizes. An
    /// item with no remote row counts as removed.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotAuthenticated`] without a session, or the
    /// remote failure. The cart is unchanged on error.
    #[instrument(skip_all, fields(item_id = %entry.item_id))]
    pub async fn remove_cart_entry(&self, entry: &CartEntry) -> Result<(), SyncError> {
        let ticket = self.ticket(messages::LOGIN_TO_MANAGE_CART)?;

        match self
            .remove_cart_remote(ticket, entry.item_id, entry.cart_row_id.clone())
            .await
        {
            Ok(()) => {
                self.notify(Notice::success(messages::REMOVED_FROM_CART));
                Ok(())
            }
            Err(e) => Err(self.fail(e, messages::FAILED_REMOVE_CART)),
        }
    }

    async fn remove_cart_remote(
        &self,
        ticket: Ticket,
        item_id: ItemId,
        hint: Option<CartRowId>,
    ) -> Result<(), SyncError> {
        let (mut row_id, mut fresh) = self.resolve_cart_row(ticket, item_id, hint).await?;

        loop {
            let Some(id) = row_id else {
                debug!(%item_id, "No remote cart row; treating as already removed");
                return self.drop_cart_entry(ticket, item_id);
            };

            match self.backend.delete_cart_row(&id).await {
                Ok(()) => break,
                Err(e) if e.is_not_found() && !fresh => {
                    debug!(row_id = %id, "Cart row ID outdated; looking up the current row");
                    row_id = self.refetch_cart_row(ticket, item_id, &id).await?;
                    fresh = true;
                }
                Err(e) if e.is_not_found() => {
                    debug!(row_id = %id, "Cart row already removed");
                    break;
                }
                Err(e) => return Err(e.into()),
            }
        }

        match self.backend.fetch_cart(ticket.user).await {
            Ok(rows) => self.replace_cart(ticket, rows),
            Err(e) => {
                warn!(error = %e, "Cart reload after removal failed; dropping entry locally");
                self.drop_cart_entry(ticket, item_id)
            }
        }
    }

    /// Remove every cart line.
    ///
    /// Stops at the first session change; otherwise attempts every line and
    /// reports the first failure.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotAuthenticated`] without a session, or the
    /// first remote failure.
    #[instrument(skip_all)]
    pub async fn clear_cart(&self) -> Result<(), SyncError> {
        let ticket = self.ticket(messages::LOGIN_TO_MANAGE_CART)?;
        let entries = self.cart();

        let mut first_error = None;
        for entry in &entries {
            match self
                .remove_cart_remote(ticket, entry.item_id, entry.cart_row_id.clone())
                .await
            {
                Ok(()) => {}
                Err(SyncError::Superseded) => return Err(SyncError::Superseded),
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            None => {
                self.notify(Notice::success(messages::CART_CLEARED));
                Ok(())
            }
            Some(e) => Err(self.fail(e, messages::FAILED_REMOVE_CART)),
        }
    }

    /// Move a cart line to the wishlist.
    ///
    /// The cart line is only removed once the wishlist holds the item.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotAuthenticated`] without a session, or the
    /// failure of whichever step failed.
    #[instrument(skip_all, fields(item_id = %entry.item_id))]
    pub async fn move_to_wishlist(&self, entry: &CartEntry) -> Result<(), SyncError> {
        let ticket = self.ticket(messages::LOGIN_TO_MANAGE_CART)?;

        let result = match self.add_to_wishlist_remote(ticket, entry.item_id).await {
            Ok(()) => {
                self.remove_cart_remote(ticket, entry.item_id, entry.cart_row_id.clone())
                    .await
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                self.notify(Notice::success(messages::MOVED_TO_WISHLIST));
                Ok(())
            }
            Err(e) => Err(self.fail(e, messages::FAILED_MOVE_TO_WISHLIST)),
        }
    }

    /// Row ID to mutate for `item_id`, and whether it came from a fetch made
    /// just now. Known IDs (from the caller or local state) are used without a
    /// request and may be outdated.
    async fn resolve_cart_row(
        &self,
        ticket: Ticket,
        item_id: ItemId,
        hint: Option<CartRowId>,
    ) -> Result<(Option<CartRowId>, bool), SyncError> {
        if let Some(row_id) = hint.or_else(|| {
            let state = self.lock();
            collection::find(&state.cart, item_id).and_then(|e| e.cart_row_id.clone())
        }) {
            return Ok((Some(row_id), false));
        }

        let rows = self.backend.fetch_cart(ticket.user).await?;
        Ok((collection::row_id_for(&rows, item_id), true))
    }

    /// Look up the current row for `item_id` after `outdated` was reported
    /// missing. `None` when the item has no other row.
    async fn refetch_cart_row(
        &self,
        ticket: Ticket,
        item_id: ItemId,
        outdated: &CartRowId,
    ) -> Result<Option<CartRowId>, SyncError> {
        let rows = self.backend.fetch_cart(ticket.user).await?;
        Ok(collection::row_id_for(&rows, item_id).filter(|id| id != outdated))
    }

    async fn apply_cart_row(
        &self,
        ticket: Ticket,
        row: Option<CartEntry>,
    ) -> Result<(), SyncError> {
        match row {
            Some(entry) => self.commit(ticket, CollectionKind::Cart, |state| {
                collection::merge(&mut state.cart, entry);
            }),
            None => {
                debug!("No usable row in response; reloading cart");
                let rows = self.backend.fetch_cart(ticket.user).await?;
                self.replace_cart(ticket, rows)
            }
        }
    }

    fn replace_cart(&self, ticket: Ticket, rows: Vec<CartEntry>) -> Result<(), SyncError> {
        self.commit(ticket, CollectionKind::Cart, |state| {
            state.cart = collection::from_rows(rows);
            state.cart_phase = Phase::Synced;
        })
    }

    fn drop_cart_entry(&self, ticket: Ticket, item_id: ItemId) -> Result<(), SyncError> {
        self.commit(ticket, CollectionKind::Cart, |state| {
            collection::remove(&mut state.cart, item_id);
        })
    }

    // =========================================================================
    // Wishlist mutations
    // =========================================================================

    /// Save `item` to the wishlist. Items already saved are left alone.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotAuthenticated`] without a session, or the
    /// remote failure. The wishlist is unchanged on error.
    #[instrument(skip_all, fields(item_id = %item.item_id))]
    pub async fn add_to_wishlist(&self, item: &Item) -> Result<(), SyncError> {
        let ticket = self.ticket(messages::LOGIN_TO_ADD_WISHLIST)?;

        let present = collection::find(&self.lock().wishlist, item.item_id).is_some();
        if present {
            self.notify(Notice::info(messages::ALREADY_IN_WISHLIST));
            return Ok(());
        }

        match self.add_to_wishlist_remote(ticket, item.item_id).await {
            Ok(()) => {
                self.notify(Notice::success(messages::ADDED_TO_WISHLIST));
                Ok(())
            }
            Err(e) => Err(self.fail(e, messages::FAILED_ADD_WISHLIST)),
        }
    }

    async fn add_to_wishlist_remote(
        &self,
        ticket: Ticket,
        item_id: ItemId,
    ) -> Result<(), SyncError> {
        match self.backend.create_wishlist_row(ticket.user, item_id).await? {
            Some(entry) => self.commit(ticket, CollectionKind::Wishlist, |state| {
                collection::merge(&mut state.wishlist, entry);
            }),
            None => {
                debug!("No usable row in response; reloading wishlist");
                let rows = self.backend.fetch_wishlist(ticket.user).await?;
                self.replace_wishlist(ticket, rows)
            }
        }
    }

    /// Remove an entry from the wishlist.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotAuthenticated`] without a session, or the
    /// remote failure. The wishlist is unchanged on error.
    #[instrument(skip_all, fields(item_id = %entry.item_id))]
    pub async fn remove_wishlist_entry(&self, entry: &WishlistEntry) -> Result<(), SyncError> {
        let ticket = self.ticket(messages::LOGIN_TO_MANAGE_WISHLIST)?;

        match self
            .remove_wishlist_remote(ticket, entry.item_id, entry.wishlist_row_id.clone())
            .await
        {
            Ok(()) => {
                self.notify(Notice::success(messages::REMOVED_FROM_WISHLIST));
                Ok(())
            }
            Err(e) => Err(self.fail(e, messages::FAILED_REMOVE_WISHLIST)),
        }
    }

    async fn remove_wishlist_remote(
        &self,
        ticket: Ticket,
        item_id: ItemId,
        hint: Option<WishlistRowId>,
    ) -> Result<(), SyncError> {
        let hint = hint.or_else(|| {
            let state = self.lock();
            collection::find(&state.wishlist, item_id).and_then(|e| e.wishlist_row_id.clone())
        });
        let (mut row_id, mut fresh) = match hint {
            Some(row_id) => (Some(row_id), false),
            None => {
                let rows = self.backend.fetch_wishlist(ticket.user).await?;
                (collection::row_id_for(&rows, item_id), true)
            }
        };

        loop {
            let Some(id) = row_id else {
                debug!(%item_id, "No remote wishlist row; treating as already removed");
                return self.commit(ticket, CollectionKind::Wishlist, |state| {
                    collection::remove(&mut state.wishlist, item_id);
                });
            };

            match self.backend.delete_wishlist_row(&id).await {
                Ok(()) => break,
                Err(e) if e.is_not_found() && !fresh => {
                    debug!(row_id = %id, "Wishlist row ID outdated; looking up the current row");
                    let rows = self.backend.fetch_wishlist(ticket.user).await?;
                    row_id = collection::row_id_for(&rows, item_id)
                        .filter(|current| current != &id);
                    fresh = true;
                }
                Err(e) if e.is_not_found() => {
                    debug!(row_id = %id, "Wishlist row already removed");
                    break;
                }
                Err(e) => return Err(e.into()),
            }
        }

        match self.backend.fetch_wishlist(ticket.user).await {
            Ok(rows) => self.replace_wishlist(ticket, rows),
            Err(e) => {
                warn!(error = %e, "Wishlist reload after removal failed; dropping entry locally");
                self.commit(ticket, CollectionKind::Wishlist, |state| {
                    collection::remove(&mut state.wishlist, item_id);
                })
            }
        }
    }

    fn replace_wishlist(&self, ticket: Ticket, rows: Vec<WishlistEntry>) -> Result<(), SyncError> {
        self.commit(ticket, CollectionKind::Wishlist, |state| {
            state.wishlist = collection::from_rows(rows);
            state.wishlist_phase = Phase::Synced;
        })
    }

    // =========================================================================
    // Checkout
    // =========================================================================

    /// Charges for an order over the current cart.
    #[must_use]
    pub fn checkout_totals(&self) -> CheckoutTotals {
        CheckoutTotals::for_cart(&self.lock().cart)
    }

    /// Open an order for every cart line at the current totals.
    ///
    /// The cart is kept until the payment is confirmed.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotAuthenticated`] without a session,
    /// [`SyncError::EmptyCart`] (without a request) when there is nothing to
    /// order, or the remote failure.
    #[instrument(skip_all)]
    pub async fn place_order(&self) -> Result<PlacedOrder, SyncError> {
        let ticket = self.ticket(messages::LOGIN_TO_PLACE_ORDER)?;
        let request = OrderRequest::for_cart(ticket.user, &self.lock().cart);
        if request.items.is_empty() {
            self.notify(Notice::info(messages::CART_EMPTY));
            return Err(SyncError::EmptyCart);
        }

        match self.backend.create_order(&request).await {
            Ok(order) => {
                info!(
                    order_id = %order.order_id,
                    total = %request.total_amount,
                    "Order created"
                );
                Ok(order)
            }
            Err(e) => Err(self.fail(e.into(), messages::FAILED_CREATE_ORDER)),
        }
    }

    /// Confirm a payment the gateway reported as successful, then empty the
    /// cart.
    ///
    /// Emptying is best effort: a line that fails to delete is logged and
    /// kept, and the payment still counts as confirmed.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotAuthenticated`] without a session, or the
    /// verification failure. The cart is unchanged on error.
    #[instrument(skip_all, fields(gateway_order = %confirmation.razorpay_order_id))]
    pub async fn confirm_payment(
        &self,
        confirmation: &PaymentConfirmation,
    ) -> Result<VerifiedPayment, SyncError> {
        let ticket = self.ticket(messages::LOGIN_TO_PLACE_ORDER)?;

        let verified = match self.backend.verify_payment(confirmation).await {
            Ok(verified) => verified,
            Err(e) => return Err(self.fail(e.into(), messages::FAILED_VERIFY_PAYMENT)),
        };
        info!(order_id = %verified.order_id, "Payment confirmed");

        for entry in self.cart() {
            match self
                .remove_cart_remote(ticket, entry.item_id, entry.cart_row_id.clone())
                .await
            {
                Ok(()) => {}
                Err(SyncError::Superseded) => break,
                Err(e) => {
                    warn!(item_id = %entry.item_id, error = %e, "Failed to remove paid cart line");
                }
            }
        }

        self.notify(Notice::success(messages::ORDER_CONFIRMED));
        Ok(verified)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn lock(&self) -> MutexGuard<'_, SyncState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot the session for a mutation, or refuse with `login_notice`.
    fn ticket(&self, login_notice: &str) -> Result<Ticket, SyncError> {
        let current = {
            let state = self.lock();
            state.user.map(|user| Ticket {
                user,
                generation: state.generation,
            })
        };

        current.ok_or_else(|| {
            debug!("Mutation refused without a session");
            self.notify(Notice::info(login_notice));
            SyncError::NotAuthenticated
        })
    }

    /// Apply `change` if the session is still the one the request was issued
    /// under, then persist the changed collection.
    fn commit(
        &self,
        ticket: Ticket,
        kind: CollectionKind,
        change: impl FnOnce(&mut SyncState),
    ) -> Result<(), SyncError> {
        let mut state = self.lock();
        if state.generation != ticket.generation {
            debug!(user = %ticket.user, "Discarding result for superseded session");
            return Err(SyncError::Superseded);
        }

        change(&mut *state);
        self.persist(&state, kind);
        Ok(())
    }

    fn persist(&self, state: &SyncState, kind: CollectionKind) {
        match kind {
            CollectionKind::Cart => {
                store_or_warn(self.cache.as_ref(), keys::CART_ITEMS, &state.cart);
            }
            CollectionKind::Wishlist => {
                store_or_warn(self.cache.as_ref(), keys::WISHLIST_ITEMS, &state.wishlist);
            }
        }
    }

    fn notify(&self, notice: Notice) {
        // Nobody listening is fine
        let _ = self.notices.send(notice);
    }

    /// Publish a failure notice unless the result was merely superseded.
    fn fail(&self, err: SyncError, fallback: &str) -> SyncError {
        match &err {
            SyncError::Superseded => debug!("Operation superseded by session change"),
            _ => {
                warn!(error = %err, "{fallback}");
                self.notify(Notice::error(err.notice_message(fallback)));
            }
        }
        err
    }
}
