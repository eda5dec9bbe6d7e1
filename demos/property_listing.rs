//! Property listing walkthrough
//!
//! A landlord edits a listing price while the network is flaky: the price
//! shows up instantly, survives two failed saves, and finally reconciles
//! with a server copy that picked up new view counts in the meantime.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use optimist::prelude::*;
use serde_json::{Value, json};
use tokio::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    println!("🏠 Optimistic listing updates");
    println!("=============================\n");

    let store = Arc::new(MemoryStore::<Value>::new());
    let optimist = Optimist::<Value>::builder()
        .store(store.clone())
        .config(OptimisticConfig::interactive())
        .retry_delay(Duration::from_millis(200))
        .build()?;

    let listing = QueryKey::from(["property", "ph-0042"]);
    store.set(
        &listing,
        json!({"title": "2 bed flat, Old GRA", "price": 1_200_000, "views": 3}),
    );

    price_change_with_retries(&optimist, &listing).await?;
    price_change_with_conflict(&optimist, &listing)?;
    new_listing_rejected(&optimist, &store)?;

    let stats = optimist.lifetime_stats();
    println!(
        "📊 applied {} / confirmed {} / rolled back {} / retries {}",
        stats.applied, stats.confirmed, stats.rolled_back, stats.retried
    );

    Ok(())
}

/// Save a price change through `mutate`, failing twice before the server accepts it
async fn price_change_with_retries(
    optimist: &Optimist<Value>,
    listing: &QueryKey,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    println!("💸 PRICE CHANGE WITH RETRIES");

    let attempts = Arc::new(AtomicU32::new(0));
    let counter = attempts.clone();
    let id = optimist
        .mutate(
            listing.clone(),
            |old| {
                let mut next = old.cloned().unwrap_or(Value::Null);
                next["price"] = json!(1_100_000);
                next
            },
            UpdateType::Update,
            move || {
                let attempt = counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 2 {
                        Err(format!("gateway timeout (attempt {})", attempt + 1))
                    } else {
                        Ok(None)
                    }
                }
            },
        )
        .await?;

    println!(
        "   ✅ {} settled after {} calls",
        id,
        attempts.load(Ordering::SeqCst)
    );
    println!("   cache now: {}\n", optimist.read(listing).unwrap_or(Value::Null));
    Ok(())
}

/// Lower the price again, then merge with a server copy that moved on
fn price_change_with_conflict(
    optimist: &Optimist<Value>,
    listing: &QueryKey,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    println!("⚔️  PRICE CHANGE WITH CONFLICT");

    let id = optimist.apply_optimistic_update(
        listing.clone(),
        |_| json!({"title": "2 bed flat, Old GRA", "price": 1_000_000}),
        UpdateType::Update,
    );
    let server = json!({"title": "2 bed flat, Old GRA", "price": 1_100_000, "views": 17});
    let merged = optimist.resolve_conflict(id, server, ConflictResolution::Merge(None));
    optimist.confirm_update(id, Some(merged));

    println!("   merged: {}\n", optimist.read(listing).unwrap_or(Value::Null));
    Ok(())
}

/// A brand new listing the server refuses; the slot had no prior value
fn new_listing_rejected(
    optimist: &Optimist<Value>,
    store: &MemoryStore<Value>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    println!("🚫 REJECTED LISTING");

    let draft = QueryKey::from(["property", "draft-7"]);
    let id = optimist.apply_optimistic_update(
        draft.clone(),
        |_| json!({"title": "Self-contained, Rumuola", "price": 450_000}),
        UpdateType::Create,
    );
    optimist.rollback_update(id, Some("Listing is missing photos"));

    println!("   invalidated: {}\n", store.is_invalidated(&draft));
    Ok(())
}
