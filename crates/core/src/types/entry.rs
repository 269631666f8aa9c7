//! Cart and wishlist entries.
//!
//! Entries are the client-side view of rows in the remote store. An entry
//! created from a remote row carries the row identifier; entries restored
//! from an old local cache may not, and are resolved against the remote
//! collection by item ID when they need to be mutated.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

use super::id::{CartRowId, ItemId, WishlistRowId};
use super::price::Price;

/// Common behaviour of entries held in a keyed collection.
///
/// A collection holds at most one entry per [`ItemId`].
pub trait CollectionEntry: Clone {
    /// Identifier the remote store assigns to the entry's row.
    type RowId: Clone + PartialEq + core::fmt::Display;

    /// The product this entry refers to.
    fn item_id(&self) -> ItemId;

    /// The remote row identifier, if known.
    fn row_id(&self) -> Option<&Self::RowId>;
}

/// A product reference passed to add-operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub item_id: ItemId,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub unit_price: Option<Price>,
}

impl Item {
    /// An item known only by its ID.
    #[must_use]
    pub const fn new(item_id: ItemId) -> Self {
        Self {
            item_id,
            title: None,
            image: None,
            unit_price: None,
        }
    }
}

/// One product line in the shopping cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartEntry {
    pub item_id: ItemId,
    /// Assigned by the remote store once the line is persisted there.
    #[serde(default)]
    pub cart_row_id: Option<CartRowId>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    /// Display price per unit; not authoritative for checkout.
    #[serde(default)]
    pub unit_price: Option<Price>,
    /// Always at least 1.
    #[serde(default = "default_quantity", deserialize_with = "quantity_at_least_one")]
    pub quantity: u32,
    #[serde(default)]
    pub added_at: Option<DateTime<Utc>>,
}

const fn default_quantity() -> u32 {
    1
}

/// Missing, null, zero, negative or oversized quantities become 1.
fn quantity_at_least_one<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    let raw = Option::<i64>::deserialize(deserializer)?;
    Ok(raw
        .and_then(|q| u32::try_from(q).ok())
        .filter(|q| *q >= 1)
        .unwrap_or_else(default_quantity))
}

impl CartEntry {
    /// A cart entry with quantity 1 and no remote row.
    #[must_use]
    pub const fn new(item_id: ItemId) -> Self {
        Self {
            item_id,
            cart_row_id: None,
            title: None,
            image: None,
            unit_price: None,
            quantity: 1,
            added_at: None,
        }
    }

    /// Price of the whole line, if the unit price is known.
    #[must_use]
    pub fn line_price(&self) -> Option<Price> {
        self.unit_price.map(|price| price.times(self.quantity))
    }

    /// The product this line refers to, with its display attributes.
    #[must_use]
    pub fn to_item(&self) -> Item {
        Item {
            item_id: self.item_id,
            title: self.title.clone(),
            image: self.image.clone(),
            unit_price: self.unit_price,
        }
    }
}

impl CollectionEntry for CartEntry {
    type RowId = CartRowId;

    fn item_id(&self) -> ItemId {
        self.item_id
    }

    fn row_id(&self) -> Option<&CartRowId> {
        self.cart_row_id.as_ref()
    }
}

/// Totals over a cart, for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartSummary {
    /// Number of distinct lines.
    pub lines: usize,
    /// Sum of line quantities.
    pub total_quantity: u64,
    /// Sum of known line prices; lines without a price contribute nothing.
    pub subtotal: Price,
}

impl CartSummary {
    /// Summarize a set of cart lines.
    #[must_use]
    pub fn of(entries: &[CartEntry]) -> Self {
        let subtotal = entries
            .iter()
            .filter_map(CartEntry::line_price)
            .fold(Decimal::ZERO, |acc, price| acc + price.amount);

        Self {
            lines: entries.len(),
            total_quantity: entries.iter().map(|e| u64::from(e.quantity)).sum(),
            subtotal: Price::from_amount(subtotal),
        }
    }
}

/// One saved-for-later product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WishlistEntry {
    pub item_id: ItemId,
    #[serde(default)]
    pub wishlist_row_id: Option<WishlistRowId>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub unit_price: Option<Price>,
    #[serde(default)]
    pub added_at: Option<DateTime<Utc>>,
}

impl WishlistEntry {
    /// A wishlist entry with no remote row.
    #[must_use]
    pub const fn new(item_id: ItemId) -> Self {
        Self {
            item_id,
            wishlist_row_id: None,
            title: None,
            image: None,
            unit_price: None,
            added_at: None,
        }
    }
}

impl CollectionEntry for WishlistEntry {
    type RowId = WishlistRowId;

    fn item_id(&self) -> ItemId {
        self.item_id
    }

    fn row_id(&self) -> Option<&WishlistRowId> {
        self.wishlist_row_id.as_ref()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_cart_entry_cache_shape_defaults() {
        // Older cache blobs may only carry the item and quantity
        let entry: CartEntry = serde_json::from_str(r#"{"item_id": 7}"#).unwrap();
        assert_eq!(entry.item_id, ItemId::new(7));
        assert_eq!(entry.quantity, 1);
        assert!(entry.cart_row_id.is_none());
    }

    #[test]
    fn test_cart_entry_quantity_never_below_one() {
        for raw in ["0", "-3", "null", "4294967296"] {
            let json = format!(r#"{{"item_id": 7, "quantity": {raw}}}"#);
            let entry: CartEntry = serde_json::from_str(&json).unwrap();
            assert_eq!(entry.quantity, 1, "quantity {raw}");
        }

        let entry: CartEntry = serde_json::from_str(r#"{"item_id": 7, "quantity": 5}"#).unwrap();
        assert_eq!(entry.quantity, 5);
    }

    #[test]
    fn test_line_price() {
        let mut entry = CartEntry::new(ItemId::new(1));
        assert!(entry.line_price().is_none());

        entry.unit_price = Some(Price::from_amount(Decimal::new(250, 2)));
        entry.quantity = 4;
        assert_eq!(entry.line_price().unwrap().amount, Decimal::from(10));
    }

    #[test]
    fn test_to_item_keeps_display_attributes() {
        let mut entry = CartEntry::new(ItemId::new(3));
        entry.title = Some("Bamboo toothbrush".to_string());
        let item = entry.to_item();
        assert_eq!(item.item_id, ItemId::new(3));
        assert_eq!(item.title.as_deref(), Some("Bamboo toothbrush"));
    }

    #[test]
    fn test_cart_summary() {
        let mut priced = CartEntry::new(ItemId::new(1));
        priced.unit_price = Some(Price::from_amount(Decimal::new(4950, 2)));
        priced.quantity = 2;

        let mut unpriced = CartEntry::new(ItemId::new(2));
        unpriced.quantity = 3;

        let summary = CartSummary::of(&[priced, unpriced]);
        assert_eq!(summary.lines, 2);
        assert_eq!(summary.total_quantity, 5);
        assert_eq!(summary.subtotal.amount, Decimal::from(99));
        assert_eq!(summary.subtotal.to_string(), "₹99.00");
    }

    #[test]
    fn test_empty_cart_summary() {
        let summary = CartSummary::of(&[]);
        assert_eq!(summary.lines, 0);
        assert_eq!(summary.subtotal.amount, Decimal::ZERO);
    }
}
