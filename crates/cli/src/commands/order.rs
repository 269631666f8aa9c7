//! Order and payment commands.
//!
//! Payment itself happens in the gateway's checkout page; these commands
//! open the order and hand the gateway's result back to the store.

use ecomall_client::CollectionKind;
use ecomall_core::{OrderId, PaymentConfirmation, PaymentOutcome};

use super::cart::print_phase_note;
use super::{CommandError, Context};

/// Print what an order over the current cart would cost.
#[allow(clippy::print_stdout)]
pub fn totals(ctx: &Context) {
    print_phase_note(ctx.sync.phase(CollectionKind::Cart));

    let totals = ctx.sync.checkout_totals();
    println!("Subtotal       {}", totals.subtotal);
    println!("GST ({:>2}%)      {}", totals.gst_percent, totals.gst_amount);
    println!("Platform fee   {}", totals.platform_fee);
    println!("Delivery       {}", totals.delivery_fee);
    println!("Total          {}", totals.total);
}

/// Open an order for the cart and print the gateway order to pay.
#[allow(clippy::print_stdout)]
pub async fn place(ctx: &Context) -> Result<(), CommandError> {
    let order = ctx.sync.place_order().await?;

    println!("Order #{} created", order.order_id);
    println!("Gateway order: {}", order.razorpay_order_id);
    if let Some(amount) = order.amount {
        println!("Amount due: {amount} {}", order.currency);
    }
    Ok(())
}

/// Confirm a completed payment; the cart is emptied afterwards.
#[allow(clippy::print_stdout)]
pub async fn confirm(
    ctx: &Context,
    razorpay_order_id: String,
    razorpay_payment_id: String,
    razorpay_signature: String,
) -> Result<(), CommandError> {
    let confirmation = PaymentConfirmation {
        razorpay_order_id,
        razorpay_payment_id,
        razorpay_signature,
    };
    let verified = ctx.sync.confirm_payment(&confirmation).await?;

    println!(
        "Order #{} paid (payment {})",
        verified.order_id, verified.payment_id
    );
    Ok(())
}

/// Record that a payment was abandoned or failed.
#[allow(clippy::print_stdout)]
pub async fn abandon(ctx: &Context, order_id: OrderId, failed: bool) -> Result<(), CommandError> {
    let outcome = if failed {
        PaymentOutcome::Failed
    } else {
        PaymentOutcome::Pending
    };
    ctx.api.report_payment_outcome(order_id, outcome).await?;

    println!("Order #{order_id} marked {outcome:?}");
    Ok(())
}
