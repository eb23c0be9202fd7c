//! Discrepancy policy
//!
//! Turns an independent inventory of the tenant's photos into the list of
//! shortfalls against the owner's expected inventory, and picks the single
//! missing-item suggestion shown to the tenant and owner.
//!
//! Rules:
//! - Only shortfalls are reported (`actual < expected`); surplus and
//!   unexpected items never appear
//! - Names match on trimmed, lowercased text; the expected item's name is used
//! - Built-in fixtures (walls, floors, ceilings, windows, doors, cabinets,
//!   their parts, switches and outlets) are never inventoried or compared
//! - An empty expected list skips the comparison entirely

use std::collections::HashMap;

use crate::models::inventory::item_key;
use crate::models::{Discrepancy, InventoryItem, PhotoData, RoomFindings};
use crate::services::inventory_merger;
use crate::services::vision_client::{VisionAnalysisGateway, VisionError};

/// Suggestion used when the owner never recorded anything for the room
pub const EMPTY_EXPECTED_SUGGESTION: &str =
    "Owner's initial list for this room was empty. Discrepancy check skipped.";

pub const NOTE_MISSING: &str = "Missing";
pub const NOTE_FEWER: &str = "Less than expected";

const STRUCTURAL: [&str; 14] = [
    "wall", "walls", "floor", "floors", "flooring", "ceiling", "ceilings", "window", "windows",
    "door", "doors", "cabinet", "cabinets", "cabinetry",
];

const STRUCTURAL_PARTS: [&str; 12] = [
    "frame", "frames", "handle", "handles", "knob", "knobs", "hinge", "hinges", "sill", "pane",
    "panes", "trim",
];

const FIXTURES: [&str; 8] = [
    "light switch", "light switches", "power outlet", "power outlets", "outlet", "outlets",
    "baseboard", "baseboards",
];

/// True for built-in fixtures that are excluded from every inventory
pub fn is_structural(name: &str) -> bool {
    let key = item_key(name);
    if FIXTURES.contains(&key.as_str()) {
        return true;
    }
    let words: Vec<&str> = key.split_whitespace().collect();
    match words.as_slice() {
        [] => false,
        [single] => STRUCTURAL.contains(single),
        [first, rest @ ..] => {
            STRUCTURAL.contains(first) && rest.iter().all(|w| STRUCTURAL_PARTS.contains(w))
        }
    }
}

/// Drop structural fixtures from a model-produced inventory
pub fn without_structural(items: &[InventoryItem]) -> Vec<InventoryItem> {
    items.iter().filter(|i| !is_structural(&i.name)).cloned().collect()
}

/// Compute the shortfalls of `found` against `expected`
pub fn reduce(expected: &[InventoryItem], found: &[InventoryItem]) -> Vec<Discrepancy> {
    let mut found_counts: HashMap<String, u32> = HashMap::new();
    for item in found {
        let entry = found_counts.entry(item.key()).or_insert(0);
        *entry = entry.saturating_add(item.count);
    }

    inventory_merger::normalize(expected)
        .into_iter()
        .filter(|item| !is_structural(&item.name))
        .filter_map(|item| {
            let actual = found_counts.get(&item.key()).copied().unwrap_or(0);
            (actual < item.count).then(|| Discrepancy {
                note: if actual == 0 { NOTE_MISSING } else { NOTE_FEWER }.to_string(),
                name: item.name,
                expected_count: item.count,
                actual_count: actual,
            })
        })
        .collect()
}

/// The discrepancy a suggestion should name
///
/// Fully missing items come first, then the larger shortfall, then the larger
/// expected count, then the name.
pub fn most_notable(discrepancies: &[Discrepancy]) -> Option<&Discrepancy> {
    discrepancies.iter().min_by(|a, b| {
        b.is_fully_missing()
            .cmp(&a.is_fully_missing())
            .then_with(|| b.shortfall().cmp(&a.shortfall()))
            .then_with(|| b.expected_count.cmp(&a.expected_count))
            .then_with(|| item_key(&a.name).cmp(&item_key(&b.name)))
    })
}

/// Deterministic suggestion text for a set of discrepancies
pub fn fallback_suggestion(discrepancies: &[Discrepancy]) -> String {
    match most_notable(discrepancies) {
        None => String::new(),
        Some(d) if d.is_fully_missing() => format!(
            "No {} could be found in the photos. Please check whether it is still in the room.",
            d.name
        ),
        Some(d) => format!(
            "Only {} of {} {} could be found. Please look for the remaining {}.",
            d.actual_count,
            d.expected_count,
            d.name,
            d.shortfall()
        ),
    }
}

/// Keep a model-written suggestion only if it names a suitable discrepancy
///
/// The suggestion must mention one of the discrepant items, and when any item
/// is fully missing it must mention a fully missing one. Otherwise the
/// deterministic fallback is used. No discrepancies means no suggestion.
pub fn accept_suggestion(candidate: Option<&str>, discrepancies: &[Discrepancy]) -> String {
    if discrepancies.is_empty() {
        return String::new();
    }

    let candidate = candidate.map(str::trim).unwrap_or_default();
    if candidate.is_empty() {
        return fallback_suggestion(discrepancies);
    }

    let lowered = candidate.to_lowercase();
    let any_missing = discrepancies.iter().any(Discrepancy::is_fully_missing);
    let names_suitable = discrepancies
        .iter()
        .filter(|d| !any_missing || d.is_fully_missing())
        .any(|d| lowered.contains(&item_key(&d.name)));

    if names_suitable {
        candidate.to_string()
    } else {
        fallback_suggestion(discrepancies)
    }
}

/// Enforce the discrepancy rules on findings returned by a gateway
///
/// Entries that are not shortfalls of an expected item are dropped, expected
/// counts and names are taken from the expected list, and duplicates are
/// collapsed. The suggestion is re-validated against what remains.
pub fn sanitize(expected: &[InventoryItem], findings: RoomFindings) -> RoomFindings {
    let expected = inventory_merger::normalize(expected);
    let mut kept: Vec<Discrepancy> = Vec::new();

    for d in findings.discrepancies {
        let key = item_key(&d.name);
        let Some(item) = expected.iter().find(|i| i.key() == key) else {
            continue;
        };
        if is_structural(&item.name) || d.actual_count >= item.count {
            continue;
        }
        if kept.iter().any(|k| item_key(&k.name) == key) {
            continue;
        }
        kept.push(Discrepancy {
            note: if d.actual_count == 0 { NOTE_MISSING } else { NOTE_FEWER }.to_string(),
            name: item.name.clone(),
            expected_count: item.count,
            actual_count: d.actual_count,
        });
    }

    let suggestion = accept_suggestion(Some(&findings.missing_item_suggestion), &kept);
    RoomFindings {
        discrepancies: kept,
        missing_item_suggestion: suggestion,
    }
}

/// Compare a room's photos against its expected inventory
///
/// An empty expected list short-circuits without calling the gateway.
pub async fn compare_room(
    gateway: &dyn VisionAnalysisGateway,
    photos: &[PhotoData],
    expected: &[InventoryItem],
) -> Result<RoomFindings, VisionError> {
    if photos.is_empty() {
        return Err(VisionError::NoPhotos);
    }

    if inventory_merger::normalize(expected).is_empty() {
        tracing::debug!("Expected inventory is empty, skipping comparison");
        return Ok(RoomFindings {
            discrepancies: Vec::new(),
            missing_item_suggestion: EMPTY_EXPECTED_SUGGESTION.to_string(),
        });
    }

    let findings = gateway.compare(photos, expected).await?;
    Ok(sanitize(expected, findings))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(name: &str, count: u32) -> InventoryItem {
        InventoryItem::new(name, count)
    }

    fn disc(name: &str, expected: u32, actual: u32) -> Discrepancy {
        Discrepancy {
            name: name.to_string(),
            expected_count: expected,
            actual_count: actual,
            note: if actual == 0 { NOTE_MISSING } else { NOTE_FEWER }.to_string(),
        }
    }

    #[test]
    fn test_reduce_reports_only_shortfalls() {
        let expected = vec![item("Chair", 4), item("Table", 1), item("Lamp", 2)];
        let found = vec![item("chair", 2), item("Table", 3), item("Lamp", 2), item("Piano", 1)];

        let result = reduce(&expected, &found);

        assert_eq!(result, vec![disc("Chair", 4, 2)]);
        assert_eq!(result[0].note, NOTE_FEWER);
    }

    #[test]
    fn test_reduce_marks_fully_missing() {
        let result = reduce(&[item("Television", 1)], &[]);
        assert_eq!(result, vec![disc("Television", 1, 0)]);
        assert_eq!(result[0].note, NOTE_MISSING);
    }

    #[test]
    fn test_reduce_ignores_structural_fixtures() {
        let expected = vec![item("Window", 2), item("Door Handle", 1), item("Sofa", 1)];
        let result = reduce(&expected, &[item("Sofa", 1)]);
        assert!(result.is_empty());
    }

    #[test]
    fn test_is_structural() {
        assert!(is_structural("Walls"));
        assert!(is_structural(" window frame "));
        assert!(is_structural("Cabinet handles"));
        assert!(is_structural("Light switch"));
        assert!(!is_structural("Window curtain"));
        assert!(!is_structural("Sofa"));
        assert!(!is_structural(""));
    }

    #[test]
    fn test_most_notable_prefers_fully_missing() {
        let discrepancies = vec![disc("Chair", 10, 1), disc("Vase", 1, 0)];
        assert_eq!(most_notable(&discrepancies).unwrap().name, "Vase");
    }

    #[test]
    fn test_most_notable_then_largest_shortfall() {
        let discrepancies = vec![disc("Cup", 6, 5), disc("Plate", 6, 2)];
        assert_eq!(most_notable(&discrepancies).unwrap().name, "Plate");
    }

    #[test]
    fn test_accept_suggestion_keeps_valid_model_text() {
        let discrepancies = vec![disc("Vase", 1, 0), disc("Chair", 4, 3)];
        let text = accept_suggestion(Some("The blue vase by the window is gone."), &discrepancies);
        assert_eq!(text, "The blue vase by the window is gone.");
    }

    #[test]
    fn test_accept_suggestion_rejects_text_naming_partial_when_missing_exists() {
        let discrepancies = vec![disc("Vase", 1, 0), disc("Chair", 4, 3)];
        let text = accept_suggestion(Some("One chair is missing."), &discrepancies);
        assert!(text.contains("Vase"));
    }

    #[test]
    fn test_accept_suggestion_empty_without_discrepancies() {
        assert_eq!(accept_suggestion(Some("Everything looks great"), &[]), "");
    }

    #[test]
    fn test_sanitize_drops_non_shortfalls_and_unknown_names() {
        let expected = vec![item("Chair", 4), item("Table", 1)];
        let findings = RoomFindings {
            discrepancies: vec![
                disc("chair", 99, 2),
                disc("Table", 1, 1),
                disc("Piano", 1, 0),
                disc("CHAIR", 4, 1),
            ],
            missing_item_suggestion: "Two chairs are missing.".to_string(),
        };

        let result = sanitize(&expected, findings);

        assert_eq!(result.discrepancies, vec![disc("Chair", 4, 2)]);
        assert_eq!(result.missing_item_suggestion, "Two chairs are missing.");
    }

    #[test]
    fn test_fallback_suggestion_texts() {
        assert_eq!(fallback_suggestion(&[]), "");
        assert!(fallback_suggestion(&[disc("Rug", 1, 0)]).starts_with("No Rug"));
        assert!(fallback_suggestion(&[disc("Cup", 6, 4)]).starts_with("Only 4 of 6 Cup"));
    }
}
