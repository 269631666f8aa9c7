//! Wishlist commands.

use ecomall_client::CollectionKind;
use ecomall_core::{Item, ItemId, WishlistEntry};

use super::cart::print_phase_note;
use super::{CommandError, Context};

#[allow(clippy::print_stdout)]
pub fn show(ctx: &Context) {
    print_phase_note(ctx.sync.phase(CollectionKind::Wishlist));

    let entries = ctx.sync.wishlist();
    if entries.is_empty() {
        println!("Your wishlist is empty");
        return;
    }

    for entry in &entries {
        let price = entry
            .unit_price
            .map_or_else(|| "-".to_string(), |p| p.to_string());
        println!(
            "{:>6}  {:<32}  {}",
            entry.item_id.to_string(),
            entry.title.as_deref().unwrap_or("(untitled)"),
            price
        );
    }
}

pub async fn add(ctx: &Context, item_id: ItemId) -> Result<(), CommandError> {
    ctx.sync.add_to_wishlist(&Item::new(item_id)).await?;
    Ok(())
}

pub async fn remove(ctx: &Context, item_id: ItemId) -> Result<(), CommandError> {
    let entry = ctx
        .sync
        .wishlist()
        .into_iter()
        .find(|e| e.item_id == item_id)
        .unwrap_or_else(|| WishlistEntry::new(item_id));
    ctx.sync.remove_wishlist_entry(&entry).await?;
    Ok(())
}
