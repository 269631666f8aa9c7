//! Keyed-collection helpers.
//!
//! Every function here preserves the invariant that a collection holds at
//! most one entry per item ID.

use ecomall_core::{CollectionEntry, ItemId};

/// Insert `entry`, replacing any entry for the same item in place.
pub(crate) fn merge<T: CollectionEntry>(entries: &mut Vec<T>, entry: T) {
    match entries.iter_mut().find(|e| e.item_id() == entry.item_id()) {
        Some(existing) => *existing = entry,
        None => entries.push(entry),
    }
}

/// Build a collection from rows, keeping the last row seen for each item.
pub(crate) fn from_rows<T: CollectionEntry>(rows: Vec<T>) -> Vec<T> {
    let mut entries = Vec::with_capacity(rows.len());
    for row in rows {
        merge(&mut entries, row);
    }
    entries
}

/// Remove the entry for `item_id`. Returns whether anything was removed.
pub(crate) fn remove<T: CollectionEntry>(entries: &mut Vec<T>, item_id: ItemId) -> bool {
    let before = entries.len();
    entries.retain(|e| e.item_id() != item_id);
    entries.len() != before
}

/// Find the entry for `item_id`.
pub(crate) fn find<T: CollectionEntry>(entries: &[T], item_id: ItemId) -> Option<&T> {
    entries.iter().find(|e| e.item_id() == item_id)
}

/// Find the remote row ID for `item_id` in a freshly fetched collection.
pub(crate) fn row_id_for<T: CollectionEntry>(entries: &[T], item_id: ItemId) -> Option<T::RowId> {
    find(entries, item_id).and_then(|e| e.row_id().cloned())
}
