//! Core types for EcoMall.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod entry;
pub mod id;
pub mod order;
pub mod price;
pub mod user;

pub use entry::{CartEntry, CartSummary, CollectionEntry, Item, WishlistEntry};
pub use id::*;
pub use order::{
    CheckoutTotals, OrderLine, OrderRequest, PaymentConfirmation, PaymentOutcome, PlacedOrder,
    VerifiedPayment,
};
pub use price::{CurrencyCode, Price};
pub use user::CurrentUser;
