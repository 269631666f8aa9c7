//! Cart commands.

use ecomall_client::{CollectionKind, Phase};
use ecomall_core::{CartEntry, Item, ItemId};

use super::{CommandError, Context};

/// Print the cart and its subtotal.
#[allow(clippy::print_stdout)]
pub fn show(ctx: &Context) {
    print_phase_note(ctx.sync.phase(CollectionKind::Cart));

    let entries = ctx.sync.cart();
    if entries.is_empty() {
        println!("Your cart is empty");
        return;
    }

    for entry in &entries {
        let price = entry
            .line_price()
            .map_or_else(|| "-".to_string(), |p| p.to_string());
        println!(
            "{:>6}  {:<32}  x{:<4} {}",
            entry.item_id.to_string(),
            entry.title.as_deref().unwrap_or("(untitled)"),
            entry.quantity,
            price
        );
    }

    let summary = ctx.sync.cart_summary();
    println!(
        "{} line(s), {} item(s), subtotal {}",
        summary.lines, summary.total_quantity, summary.subtotal
    );
}

#[allow(clippy::print_stdout)]
pub(super) fn print_phase_note(phase: Phase) {
    match phase {
        Phase::LocalOnly => println!("(not logged in; showing saved copy)"),
        Phase::Stale => println!("(store unreachable; showing saved copy)"),
        Phase::Hydrating | Phase::Synced => {}
    }
}

pub async fn add(ctx: &Context, item_id: ItemId, quantity: u32) -> Result<(), CommandError> {
    ctx.sync.add_to_cart(&Item::new(item_id), quantity).await?;
    Ok(())
}

pub async fn update(ctx: &Context, item_id: ItemId, quantity: i64) -> Result<(), CommandError> {
    let entry = entry_for(ctx, item_id);
    ctx.sync.update_quantity(&entry, quantity).await?;
    Ok(())
}

pub async fn remove(ctx: &Context, item_id: ItemId) -> Result<(), CommandError> {
    let entry = entry_for(ctx, item_id);
    ctx.sync.remove_cart_entry(&entry).await?;
    Ok(())
}

pub async fn clear(ctx: &Context) -> Result<(), CommandError> {
    ctx.sync.clear_cart().await?;
    Ok(())
}

pub async fn move_to_wishlist(ctx: &Context, item_id: ItemId) -> Result<(), CommandError> {
    let entry = entry_for(ctx, item_id);
    ctx.sync.move_to_wishlist(&entry).await?;
    Ok(())
}

/// Re-fetch the cart and wishlist.
#[allow(clippy::print_stdout)]
pub async fn sync(ctx: &Context) -> Result<(), CommandError> {
    ctx.sync.refresh().await?;
    println!(
        "Synced: {} cart line(s), {} wishlist item(s)",
        ctx.sync.cart_count(),
        ctx.sync.wishlist_count()
    );
    Ok(())
}

/// The local entry for `item_id`, or a bare one the synchronizer resolves
/// against the store.
fn entry_for(ctx: &Context, item_id: ItemId) -> CartEntry {
    ctx.sync
        .cart()
        .into_iter()
        .find(|e| e.item_id == item_id)
        .unwrap_or_else(|| CartEntry::new(item_id))
}
