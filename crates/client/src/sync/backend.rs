//! The remote side of the synchronizer.

use async_trait::async_trait;

use ecomall_core::{
    CartEntry, CartRowId, ItemId, OrderRequest, PaymentConfirmation, PlacedOrder, UserId,
    VerifiedPayment, WishlistEntry, WishlistRowId,
};

use crate::api::ApiError;

/// Remote store operations the synchronizer depends on.
///
/// [`StoreApi`](crate::api::StoreApi) is the HTTP implementation. Single-row
/// mutations return `None` when the server acknowledged the request but sent
/// no usable row; the synchronizer then reloads the whole collection.
#[async_trait]
pub trait CartBackend: Send + Sync {
    /// Fetch the user's full cart.
    async fn fetch_cart(&self, user: UserId) -> Result<Vec<CartEntry>, ApiError>;

    /// Create a cart row (the backend increments the quantity of an existing
    /// row for the same item).
    async fn create_cart_row(
        &self,
        user: UserId,
        item: ItemId,
        quantity: u32,
    ) -> Result<Option<CartEntry>, ApiError>;

    /// Set the quantity of an existing cart row.
    async fn update_cart_row(
        &self,
        row: &CartRowId,
        quantity: u32,
    ) -> Result<Option<CartEntry>, ApiError>;

    /// Delete a cart row.
    async fn delete_cart_row(&self, row: &CartRowId) -> Result<(), ApiError>;

    /// Fetch the user's full wishlist.
    async fn fetch_wishlist(&self, user: UserId) -> Result<Vec<WishlistEntry>, ApiError>;

    /// Create a wishlist row (idempotent per item on the backend).
    async fn create_wishlist_row(
        &self,
        user: UserId,
        item: ItemId,
    ) -> Result<Option<WishlistEntry>, ApiError>;

    /// Delete a wishlist row.
    async fn delete_wishlist_row(&self, row: &WishlistRowId) -> Result<(), ApiError>;

    /// Open a pending order and its payment gateway order.
    async fn create_order(&self, order: &OrderRequest) -> Result<PlacedOrder, ApiError>;

    /// Check a gateway payment and confirm its order.
    async fn verify_payment(
        &self,
        confirmation: &PaymentConfirmation,
    ) -> Result<VerifiedPayment, ApiError>;
}
