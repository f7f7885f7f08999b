//! Save-state reconciliation.
//!
//! The backend has no endpoint answering "has the current user saved this
//! exact place, and under which list", so the client derives it from the
//! user's full saved-items snapshot. Two wrinkles make this non-trivial: the
//! same place can be saved under several lists at once (one `Item` row per
//! list), and a place recommended to the user shows up in the snapshot as a
//! recommendation row that must never be mistaken for a save.
//!
//! Everything here is a pure function of its inputs - no I/O, no caches -
//! so screens can re-run it on every snapshot change.

use std::collections::HashSet;

use crate::model::{Item, ListRef};

/// Answer to "is this place saved by me, and where".
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SaveResolution {
    pub is_saved: bool,
    /// The list holding the genuine save. `None` whenever `is_saved` is
    /// false, including the recommendation-only case.
    pub owning_list: Option<ListRef>,
}

impl SaveResolution {
    fn unsaved() -> Self {
        Self::default()
    }
}

/// Resolve `target`'s save status against the user's saved-items snapshot.
///
/// Rows are matched on `data_id` (place identity), never `id` (row
/// identity). When both a genuine save and a recommendation placeholder
/// match, the genuine save wins: a place can be "recommended to me" and
/// "already saved by me" at the same time, and the UI must show the save
/// context. Among multiple genuine saves the first in snapshot order wins.
///
/// A recommendation-only match resolves as unsaved - a recommendation is
/// not a save of itself.
pub fn resolve(snapshot: &[Item], target: &Item) -> SaveResolution {
    let save_row = snapshot
        .iter()
        .filter(|row| row.data_id == target.data_id)
        .find(|row| !row.is_recommendation);

    match save_row {
        Some(row) => SaveResolution {
            is_saved: true,
            owning_list: Some(row.owning_list()),
        },
        None => SaveResolution::unsaved(),
    }
}

/// The two collections a list screen renders.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconciledList {
    /// Non-recommendation rows, newest first.
    pub entries: Vec<Item>,
    /// Pending recommendations, newest first.
    pub recommendations: Vec<Item>,
}

/// Annotate a list's items with save status and split them into entries and
/// recommendations, both sorted by `created_at` descending.
///
/// Only an existence check runs here (`data_id` present in the snapshot at
/// all); the owning-list detail is resolved lazily per visible row via
/// [`resolve`], so off-screen items never pay for the full lookup.
///
/// `saved_snapshot` is `None` when the snapshot fetch failed; the pass then
/// degrades to marking everything unsaved rather than failing the render.
pub fn reconcile(list_items: &[Item], saved_snapshot: Option<&[Item]>) -> ReconciledList {
    let saved_ids: HashSet<&str> = saved_snapshot
        .unwrap_or_default()
        .iter()
        .map(|item| item.data_id.as_str())
        .collect();

    let mut entries = Vec::new();
    let mut recommendations = Vec::new();

    for item in list_items {
        let mut item = item.clone();
        item.is_saved = Some(saved_ids.contains(item.data_id.as_str()));
        if item.is_recommendation {
            recommendations.push(item);
        } else {
            entries.push(item);
        }
    }

    entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    recommendations.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    ReconciledList {
        entries,
        recommendations,
    }
}
