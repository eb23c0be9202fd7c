//! Inventory merging
//!
//! Combines object lists produced by separate photo analyses into one
//! deduplicated inventory.
//!
//! **Merge strategy:**
//! - Items are matched on trimmed, lowercased names
//! - Counts of matching items are summed
//! - The display name of the first occurrence wins (existing before incoming)
//! - Blank names and zero counts are dropped
//! - Output is sorted by display name, case-insensitively

use std::collections::HashMap;

use crate::models::InventoryItem;

/// Merge `incoming` into `existing`
///
/// Counts are additive: merging the same photo's objects twice doubles them,
/// so callers must only pass objects from photos not already analyzed.
pub fn merge(existing: &[InventoryItem], incoming: &[InventoryItem]) -> Vec<InventoryItem> {
    let mut merged: Vec<InventoryItem> = Vec::with_capacity(existing.len() + incoming.len());
    let mut index: HashMap<String, usize> = HashMap::new();

    for item in existing.iter().chain(incoming.iter()) {
        let name = item.name.trim();
        if name.is_empty() || item.count == 0 {
            continue;
        }

        match index.get(&item.key()) {
            Some(&pos) => {
                merged[pos].count = merged[pos].count.saturating_add(item.count);
            }
            None => {
                index.insert(item.key(), merged.len());
                merged.push(InventoryItem::new(name, item.count));
            }
        }
    }

    sort_inventory(&mut merged);
    merged
}

/// Collapse one analysis result into a normalized inventory
pub fn normalize(items: &[InventoryItem]) -> Vec<InventoryItem> {
    merge(&[], items)
}

/// Sort by display name ignoring case; ties fall back to the exact name
pub fn sort_inventory(items: &mut [InventoryItem]) {
    items.sort_by(|a, b| {
        a.name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then_with(|| a.name.cmp(&b.name))
    });
}
