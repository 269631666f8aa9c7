//! Checkout totals and the order placement contract.
//!
//! Totals are computed client-side from the cart's display prices and sent
//! with the order; the backend records them as given. Amounts are in rupees.
//!
//! # Charges
//!
//! | Subtotal        | GST |
//! |-----------------|-----|
//! | up to 500       | 25% |
//! | up to 1000      | 20% |
//! | up to 2500      | 18% |
//! | above 2500      | 16% |
//!
//! A platform fee of 7 applies to every non-empty cart, and a delivery fee of
//! 40 applies unless the subtotal exceeds 499.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use super::entry::{CartEntry, CartSummary};
use super::id::{ItemId, OrderId, UserId};
use super::price::Price;

/// Flat fee charged on every non-empty order.
pub const PLATFORM_FEE: Decimal = Decimal::from_parts(7, 0, 0, false, 0);

/// Delivery charge for small orders.
pub const DELIVERY_FEE: Decimal = Decimal::from_parts(40, 0, 0, false, 0);

/// Subtotals above this ship free.
pub const FREE_DELIVERY_ABOVE: Decimal = Decimal::from_parts(499, 0, 0, false, 0);

/// GST rate (percent) for a subtotal.
#[must_use]
pub fn gst_percent(subtotal: Decimal) -> Decimal {
    let percent = if subtotal <= Decimal::from(500) {
        25
    } else if subtotal <= Decimal::from(1000) {
        20
    } else if subtotal <= Decimal::from(2500) {
        18
    } else {
        16
    };
    Decimal::from(percent)
}

fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Breakdown of what an order over the current cart costs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutTotals {
    pub subtotal: Price,
    /// Percent, e.g. `18` for 18%.
    pub gst_percent: Decimal,
    pub gst_amount: Price,
    pub platform_fee: Price,
    pub delivery_fee: Price,
    /// Rounded to paise; this is the amount sent with the order.
    pub total: Price,
}

impl CheckoutTotals {
    /// Compute the charges for a cart. An empty cart costs nothing.
    #[must_use]
    pub fn for_cart(entries: &[CartEntry]) -> Self {
        if entries.is_empty() {
            let zero = Price::from_amount(Decimal::ZERO);
            return Self {
                subtotal: zero,
                gst_percent: Decimal::ZERO,
                gst_amount: zero,
                platform_fee: zero,
                delivery_fee: zero,
                total: zero,
            };
        }

        let subtotal = CartSummary::of(entries).subtotal.amount;
        let percent = gst_percent(subtotal);
        let gst = subtotal * percent / Decimal::ONE_HUNDRED;
        let delivery = if subtotal > FREE_DELIVERY_ABOVE {
            Decimal::ZERO
        } else {
            DELIVERY_FEE
        };
        let total = round_money((subtotal + gst + PLATFORM_FEE + delivery).max(Decimal::ZERO));

        Self {
            subtotal: Price::from_amount(subtotal),
            gst_percent: percent,
            gst_amount: Price::from_amount(round_money(gst)),
            platform_fee: Price::from_amount(PLATFORM_FEE),
            delivery_fee: Price::from_amount(delivery),
            total: Price::from_amount(total),
        }
    }
}

/// One line of an order, priced at the cart's display price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub item_id: ItemId,
    pub quantity: u32,
    /// Unit price; zero when the cart line carried none.
    pub price: Decimal,
}

impl From<&CartEntry> for OrderLine {
    fn from(entry: &CartEntry) -> Self {
        Self {
            item_id: entry.item_id,
            quantity: entry.quantity,
            price: entry.unit_price.map_or(Decimal::ZERO, |p| p.amount),
        }
    }
}

/// Body of an order creation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub user_id: UserId,
    pub items: Vec<OrderLine>,
    pub total_amount: Decimal,
}

impl OrderRequest {
    /// An order for every line of `entries` at the computed total.
    #[must_use]
    pub fn for_cart(user_id: UserId, entries: &[CartEntry]) -> Self {
        Self {
            user_id,
            items: entries.iter().map(OrderLine::from).collect(),
            total_amount: CheckoutTotals::for_cart(entries).total.amount,
        }
    }
}

/// A pending order and the gateway order to pay it with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacedOrder {
    pub order_id: OrderId,
    pub razorpay_order_id: String,
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_currency() -> String {
    "INR".to_string()
}

/// What the payment gateway hands back after a successful payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentConfirmation {
    pub razorpay_order_id: String,
    pub razorpay_payment_id: String,
    pub razorpay_signature: String,
}

/// The backend's answer once a payment signature checks out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedPayment {
    pub order_id: OrderId,
    pub payment_id: String,
    #[serde(default)]
    pub status: Option<String>,
}

/// A payment that did not complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentOutcome {
    /// The customer closed the payment window; the order stays open.
    Pending,
    /// The gateway reported the payment as failed.
    Failed,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn line(item: i32, price: &str, quantity: u32) -> CartEntry {
        let mut entry = CartEntry::new(ItemId::new(item));
        entry.unit_price = Some(Price::from_amount(price.parse().unwrap()));
        entry.quantity = quantity;
        entry
    }

    #[test]
    fn test_gst_slabs() {
        assert_eq!(gst_percent(Decimal::from(500)), Decimal::from(25));
        assert_eq!(gst_percent(Decimal::new(50001, 2)), Decimal::from(20));
        assert_eq!(gst_percent(Decimal::from(1000)), Decimal::from(20));
        assert_eq!(gst_percent(Decimal::from(2500)), Decimal::from(18));
        assert_eq!(gst_percent(Decimal::from(2501)), Decimal::from(16));
    }

    #[test]
    fn test_small_cart_pays_delivery() {
        let totals = CheckoutTotals::for_cart(&[line(1, "49.50", 2)]);

        assert_eq!(totals.subtotal.amount, Decimal::from(99));
        assert_eq!(totals.gst_percent, Decimal::from(25));
        assert_eq!(totals.gst_amount.amount, Decimal::new(2475, 2));
        assert_eq!(totals.platform_fee.amount, Decimal::from(7));
        assert_eq!(totals.delivery_fee.amount, Decimal::from(40));
        // 99 + 24.75 + 7 + 40
        assert_eq!(totals.total.amount, Decimal::new(17075, 2));
    }

    #[test]
    fn test_delivery_free_above_threshold() {
        let at_threshold = CheckoutTotals::for_cart(&[line(1, "499", 1)]);
        assert_eq!(at_threshold.delivery_fee.amount, Decimal::from(40));

        let above = CheckoutTotals::for_cart(&[line(1, "1200", 1)]);
        assert_eq!(above.delivery_fee.amount, Decimal::ZERO);
        assert_eq!(above.gst_percent, Decimal::from(18));
        // 1200 + 216 + 7
        assert_eq!(above.total.amount, Decimal::from(1423));
    }

    #[test]
    fn test_total_rounds_to_paise() {
        // 3 * 33.33 = 99.99; GST 24.9975
        let totals = CheckoutTotals::for_cart(&[line(1, "33.33", 3)]);
        assert_eq!(totals.gst_amount.amount, Decimal::new(2500, 2));
        assert_eq!(totals.total.amount, Decimal::new(17199, 2));
    }

    #[test]
    fn test_empty_cart_costs_nothing() {
        let totals = CheckoutTotals::for_cart(&[]);
        assert_eq!(totals.total.amount, Decimal::ZERO);
        assert_eq!(totals.delivery_fee.amount, Decimal::ZERO);
    }

    #[test]
    fn test_order_request_for_cart() {
        let unpriced = CartEntry::new(ItemId::new(2));
        let request = OrderRequest::for_cart(UserId::new(5), &[line(1, "49.50", 2), unpriced]);

        assert_eq!(request.items.len(), 2);
        assert_eq!(request.items[0].price, Decimal::new(4950, 2));
        assert_eq!(request.items[1].price, Decimal::ZERO);
        assert_eq!(request.items[1].quantity, 1);

        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["user_id"], 5);
        assert_eq!(body["items"][0]["item_id"], 1);
        assert_eq!(body["total_amount"], "170.75");
    }

    #[test]
    fn test_placed_order_from_backend() {
        let order: PlacedOrder = serde_json::from_value(json!({
            "order_id": 12,
            "razorpay_order_id": "order_abc",
            "amount": 177.75
        }))
        .unwrap();

        assert_eq!(order.order_id, OrderId::new(12));
        assert_eq!(order.amount, Some(Decimal::new(17775, 2)));
        assert_eq!(order.currency, "INR");
    }
}
