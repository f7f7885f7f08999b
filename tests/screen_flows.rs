//! End-to-end flows the screen controllers run against the engines, driven
//! by the in-memory mock backend.

use std::sync::Arc;

use favespot::data::{FaveService, FeedService, ListService, MockBackend, SavedItemsService};
use favespot::feed::{FeedPager, FeedReload};
use favespot::saves;

#[test]
fn list_screen_reconciles_and_resolves_rows() {
    let backend = MockBackend::sample();

    let items = backend.list_items("list-cafes").unwrap();
    let snapshot = backend.saved_items("me").unwrap();
    let reconciled = saves::reconcile(&items, Some(&snapshot));

    assert_eq!(
        reconciled.entries.len() + reconciled.recommendations.len(),
        items.len()
    );
    assert_eq!(reconciled.entries.len(), 1);
    assert_eq!(reconciled.recommendations.len(), 1);

    // The genuine entry resolves to its owning list.
    let entry = &reconciled.entries[0];
    assert_eq!(entry.is_saved, Some(true));
    let resolution = saves::resolve(&snapshot, entry);
    assert!(resolution.is_saved);
    assert_eq!(resolution.owning_list.unwrap().id, "list-cafes");

    // The pending recommendation only matches its own recommendation row,
    // which is not a save.
    let rec = &reconciled.recommendations[0];
    assert!(!saves::resolve(&snapshot, rec).is_saved);
}

#[test]
fn faving_a_recommendation_flips_its_state_after_refetch() {
    let backend = MockBackend::sample();

    let items = backend.list_items("list-cafes").unwrap();
    let snapshot = backend.saved_items("me").unwrap();
    let before = saves::reconcile(&items, Some(&snapshot));
    let rec = before.recommendations[0].clone();
    assert!(!saves::resolve(&snapshot, &rec).is_saved);

    // Accept the recommendation, then refetch the snapshot before
    // re-reconciling; the stale snapshot must not be reused.
    backend.add_fave("me", "list-cafes", &rec.id).unwrap();
    let snapshot = backend.saved_items("me").unwrap();

    let after = saves::reconcile(&items, Some(&snapshot));
    let rec_after = after
        .recommendations
        .iter()
        .find(|item| item.id == rec.id)
        .unwrap();
    assert_eq!(rec_after.is_saved, Some(true));

    let resolution = saves::resolve(&snapshot, rec_after);
    assert!(resolution.is_saved);
    assert_eq!(resolution.owning_list.unwrap().id, "list-cafes");
}

#[test]
fn snapshot_fetch_failure_degrades_to_unsaved() {
    let backend = MockBackend::sample();
    let items = backend.list_items("list-cafes").unwrap();

    let reconciled = saves::reconcile(&items, None);
    assert!(reconciled
        .entries
        .iter()
        .chain(reconciled.recommendations.iter())
        .all(|item| item.is_saved == Some(false)));
}

#[test]
fn feed_screen_pages_sequentially_and_resets() {
    let backend = MockBackend::sample();
    let service: Arc<dyn FeedService> = backend.clone();
    let mut pager = FeedPager::new(service, 7);

    let first = pager.load_next_page().unwrap().unwrap();
    assert_eq!(first, FeedReload::Rows(0..7));
    assert_eq!(pager.controller().current_count(), 7);
    assert_eq!(pager.controller().total_count(), 20);

    let second = pager.load_next_page().unwrap().unwrap();
    assert_eq!(second, FeedReload::Rows(7..14));

    // Appending in increasing offset order preserves newest-first globally.
    let events = pager.controller().events();
    assert!(events
        .windows(2)
        .all(|pair| pair[0].created_at() >= pair[1].created_at()));

    // Earlier rows keep their identity across appends.
    let third_row = pager.controller().event(3).cloned().unwrap();
    let third = pager.load_next_page().unwrap().unwrap();
    assert_eq!(third, FeedReload::Rows(14..20));
    assert_eq!(pager.controller().event(3), Some(&third_row));

    // Exhausted: no further fetch is issued.
    assert!(pager.controller().is_exhausted());
    assert!(pager.load_next_page().unwrap().is_none());

    // Pull-to-refresh starts over from the initial window.
    let refreshed = pager.refresh().unwrap().unwrap();
    assert_eq!(refreshed, FeedReload::Rows(0..7));
    assert_eq!(pager.controller().window(), (7, 14));
}

#[test]
fn empty_feed_signals_full_reload() {
    let backend = MockBackend::new(Vec::new(), Vec::new(), Vec::new());
    let service: Arc<dyn FeedService> = backend;
    let mut pager = FeedPager::new(service, 7);

    let reload = pager.load_next_page().unwrap().unwrap();
    assert_eq!(reload, FeedReload::Full);
    assert_eq!(pager.controller().current_count(), 0);
}
