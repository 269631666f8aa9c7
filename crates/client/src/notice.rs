//! Transient user-facing notices (toasts).

use core::fmt;

use serde::{Deserialize, Serialize};

/// Severity of a notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

impl NoticeLevel {
    /// Lowercase label for display.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

/// A short message for the UI to show and then dismiss.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    #[must_use]
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.level.as_str(), self.message)
    }
}

/// Notice texts.
pub mod messages {
    pub const LOGIN_TO_ADD_CART: &str = "Please login to add items to your cart";
    pub const LOGIN_TO_ADD_WISHLIST: &str = "Please login to add items to your wishlist";
    pub const LOGIN_TO_MANAGE_CART: &str = "Please login to manage your cart";
    pub const LOGIN_TO_MANAGE_WISHLIST: &str = "Please login to manage your wishlist";
    pub const LOGIN_TO_PLACE_ORDER: &str = "Please login to place an order";

    pub const ADDED_TO_CART: &str = "Added to cart";
    pub const ADDED_TO_WISHLIST: &str = "Added to wishlist";
    pub const ALREADY_IN_WISHLIST: &str = "Already in your wishlist";
    pub const CART_UPDATED: &str = "Cart updated";
    pub const REMOVED_FROM_CART: &str = "Removed from cart";
    pub const REMOVED_FROM_WISHLIST: &str = "Removed from wishlist";
    pub const MOVED_TO_WISHLIST: &str = "Moved to wishlist";
    pub const CART_CLEARED: &str = "Cart cleared";
    pub const CART_EMPTY: &str = "Your cart is empty";
    pub const ORDER_CONFIRMED: &str = "Payment received, order confirmed";

    pub const FAILED_ADD_CART: &str = "Failed to add to cart";
    pub const FAILED_ADD_WISHLIST: &str = "Failed to add to wishlist";
    pub const FAILED_UPDATE_CART: &str = "Failed to update cart";
    pub const FAILED_REMOVE_CART: &str = "Failed to remove from cart";
    pub const FAILED_MOVE_TO_WISHLIST: &str = "Failed to move to wishlist";
    pub const FAILED_REMOVE_WISHLIST: &str = "Failed to remove from wishlist";
    pub const FAILED_LOAD: &str = "Could not load your saved cart and wishlist";
    pub const FAILED_CREATE_ORDER: &str = "Unable to create order.";
    pub const FAILED_VERIFY_PAYMENT: &str = "Payment verification failed. Please contact support.";
}
