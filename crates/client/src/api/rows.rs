//! Wire rows returned by the cart and wishlist endpoints, and their
//! conversion into core entries.
//!
//! Rows are parsed leniently: absent optional fields default (`quantity`
//! becomes 1), unparseable prices and timestamps are dropped, and only a row
//! without an item ID is rejected.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use ecomall_core::{CartEntry, CartRowId, ItemId, Price, WishlistEntry, WishlistRowId};

use super::ApiError;

/// Cart row as serialized by the backend.
#[derive(Debug, Deserialize)]
pub(crate) struct CartRow {
    #[serde(default)]
    item: Option<ItemId>,
    #[serde(default)]
    item_name: Option<String>,
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    selling_price: Option<Value>,
    #[serde(default)]
    quantity: Option<i64>,
    #[serde(default)]
    cart_id: Option<CartRowId>,
    #[serde(default)]
    added_at: Option<String>,
}

/// Wishlist row as serialized by the backend.
#[derive(Debug, Deserialize)]
pub(crate) struct WishlistRow {
    #[serde(default)]
    item: Option<ItemId>,
    #[serde(default)]
    item_name: Option<String>,
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    selling_price: Option<Value>,
    #[serde(default)]
    wishlist_id: Option<WishlistRowId>,
    #[serde(default)]
    added_at: Option<String>,
}

// =============================================================================
// Row Conversions
// =============================================================================

pub(crate) fn convert_cart_row(row: CartRow) -> Option<CartEntry> {
    let item_id = row.item?;
    Some(CartEntry {
        item_id,
        cart_row_id: row.cart_id,
        title: non_empty(row.item_name),
        image: non_empty(row.image),
        unit_price: row.selling_price.as_ref().and_then(Price::from_json),
        quantity: row
            .quantity
            .and_then(|q| u32::try_from(q).ok())
            .filter(|q| *q >= 1)
            .unwrap_or(1),
        added_at: row.added_at.as_deref().and_then(parse_timestamp),
    })
}

pub(crate) fn convert_wishlist_row(row: WishlistRow) -> Option<WishlistEntry> {
    let item_id = row.item?;
    Some(WishlistEntry {
        item_id,
        wishlist_row_id: row.wishlist_id,
        title: non_empty(row.item_name),
        image: non_empty(row.image),
        unit_price: row.selling_price.as_ref().and_then(Price::from_json),
        added_at: row.added_at.as_deref().and_then(parse_timestamp),
    })
}

/// Map a list payload into entries.
///
/// `None`/`null` is an empty list. Individual rows that cannot be mapped are
/// skipped with a warning. A payload that is not a list at all is an error,
/// so a misbehaving endpoint never wipes a collection.
pub(crate) fn convert_rows<R, T>(
    payload: Option<Value>,
    convert: fn(R) -> Option<T>,
) -> Result<Vec<T>, ApiError>
where
    R: for<'de> Deserialize<'de>,
{
    let rows = match payload {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(rows)) => rows,
        Some(other) => {
            return Err(ApiError::Malformed(format!(
                "expected a list of rows, got {}",
                json_kind(&other)
            )));
        }
    };

    Ok(rows
        .into_iter()
        .filter_map(|row| match serde_json::from_value::<R>(row) {
            Ok(parsed) => {
                let converted = convert(parsed);
                if converted.is_none() {
                    warn!("Skipping row without an item id");
                }
                converted
            }
            Err(e) => {
                warn!(error = %e, "Skipping malformed row");
                None
            }
        })
        .collect())
}

/// Map a single-row payload into an entry.
///
/// Returns `None` when the payload is absent or unusable; callers fall back
/// to reloading the collection.
pub(crate) fn convert_single<R, T>(payload: Option<Value>, convert: fn(R) -> Option<T>) -> Option<T>
where
    R: for<'de> Deserialize<'de>,
{
    let payload = payload?;
    match serde_json::from_value::<R>(payload) {
        Ok(row) => convert(row),
        Err(e) => {
            warn!(error = %e, "Ignoring malformed row in mutation response");
            None
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Parse a backend timestamp, with or without a UTC offset.
fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|naive| naive.and_utc())
        })
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
