//! Feed pagination.
//!
//! The activity feed loads in fixed-size pages as the user scrolls. The
//! controller accumulates events across fetches and reports exactly which
//! row positions changed, so the screen can do a partial reload - keeping
//! scroll position and row identity stable - instead of redrawing the whole
//! table after every page.

use std::ops::Range;
use std::sync::Arc;

use anyhow::Result;

use crate::data::FeedService;
use crate::model::FeedEvent;

/// Default window step; the initial request window is `[0, 7)`.
pub const DEFAULT_INCREMENT: usize = 7;

/// What the screen must redraw after a page lands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedReload {
    /// No specific rows: the feed is still empty after the fetch, and only a
    /// full reload can swap the empty-state UI for a populated table.
    Full,
    /// Exactly the appended row positions; prior rows never change on
    /// pagination.
    Rows(Range<usize>),
}

/// Observer for feed updates; receives the full accumulated event list plus
/// the reload scope after every append.
pub trait FeedObserver: Send + Sync {
    fn feed_updated(&self, events: &[FeedEvent], reload: &FeedReload);
}

/// Accumulates feed events across sequential page fetches.
///
/// Events are append-only between resets: pages arrive newest-first and are
/// requested in increasing offset order, so a plain append preserves the
/// global ordering. The window cursors (`current_from_index`,
/// `current_to_index`, half-open) advance by `increment` after every append.
///
/// Fetches must be strictly sequential. The `begin_fetch`/`finish_fetch`
/// guard is for callers to honor around their network call; the window
/// arithmetic does not defend against overlapping fetches, which would
/// produce duplicate or skipped rows.
pub struct FeedPaginationController {
    events: Vec<FeedEvent>,
    current_from_index: usize,
    current_to_index: usize,
    increment: usize,
    total_count: usize,
    fetch_in_progress: bool,
    observer: Option<Arc<dyn FeedObserver>>,
}

impl Default for FeedPaginationController {
    fn default() -> Self {
        Self::new(DEFAULT_INCREMENT)
    }
}

impl FeedPaginationController {
    pub fn new(increment: usize) -> Self {
        let increment = increment.max(1);
        Self {
            events: Vec::new(),
            current_from_index: 0,
            current_to_index: increment,
            increment,
            total_count: 0,
            fetch_in_progress: false,
            observer: None,
        }
    }

    pub fn set_observer(&mut self, observer: Arc<dyn FeedObserver>) {
        self.observer = Some(observer);
    }

    pub fn current_count(&self) -> usize {
        self.events.len()
    }

    pub fn total_count(&self) -> usize {
        self.total_count
    }

    pub fn set_total_count(&mut self, total: usize) {
        self.total_count = total;
    }

    pub fn event(&self, index: usize) -> Option<&FeedEvent> {
        self.events.get(index)
    }

    pub fn events(&self) -> &[FeedEvent] {
        &self.events
    }

    /// The half-open window to request next.
    pub fn window(&self) -> (usize, usize) {
        (self.current_from_index, self.current_to_index)
    }

    /// True once every server-known event has been fetched.
    pub fn is_exhausted(&self) -> bool {
        self.total_count > 0 && self.events.len() >= self.total_count
    }

    /// Claim the in-flight slot. Returns false if a fetch is already
    /// running, in which case the caller must not issue another request.
    pub fn begin_fetch(&mut self) -> bool {
        if self.fetch_in_progress {
            return false;
        }
        self.fetch_in_progress = true;
        true
    }

    pub fn finish_fetch(&mut self) {
        self.fetch_in_progress = false;
    }

    pub fn is_fetch_in_progress(&self) -> bool {
        self.fetch_in_progress
    }

    /// Append a fetched page, notify the observer with the full updated
    /// list, then advance the request window.
    pub fn add_new_events(&mut self, new_events: Vec<FeedEvent>) -> FeedReload {
        let appended = new_events.len();
        self.events.extend(new_events);

        let reload = if self.events.is_empty() {
            FeedReload::Full
        } else {
            FeedReload::Rows(self.rows_to_reload(appended))
        };

        if let Some(observer) = &self.observer {
            observer.feed_updated(&self.events, &reload);
        }

        self.current_from_index += self.increment;
        self.current_to_index += self.increment;

        reload
    }

    /// Row positions needing a reload after appending `appended` events:
    /// the contiguous tail `[old_count, old_count + appended)`.
    pub fn rows_to_reload(&self, appended: usize) -> Range<usize> {
        let end = self.events.len();
        let start = end.saturating_sub(appended);
        start..end
    }

    /// Drop all accumulated events and rewind the window to its initial
    /// position. Pull-to-refresh refetches from the beginning rather than
    /// continuing to append.
    pub fn reset_content(&mut self) {
        self.events.clear();
        self.current_from_index = 0;
        self.current_to_index = self.increment;
        self.total_count = 0;
    }
}

/// Drives a [`FeedPaginationController`] against a [`FeedService`] with
/// strictly sequential, guarded page loads.
pub struct FeedPager {
    controller: FeedPaginationController,
    service: Arc<dyn FeedService>,
}

impl FeedPager {
    pub fn new(service: Arc<dyn FeedService>, increment: usize) -> Self {
        Self {
            controller: FeedPaginationController::new(increment),
            service,
        }
    }

    pub fn controller(&self) -> &FeedPaginationController {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut FeedPaginationController {
        &mut self.controller
    }

    /// Fetch the next window and fold it into the controller. Returns `None`
    /// without fetching when a load is already in flight or the feed is
    /// exhausted.
    pub fn load_next_page(&mut self) -> Result<Option<FeedReload>> {
        if self.controller.is_exhausted() || !self.controller.begin_fetch() {
            return Ok(None);
        }

        let (from, to) = self.controller.window();
        let page = match self.service.feed_page(from, to) {
            Ok(page) => page,
            Err(err) => {
                self.controller.finish_fetch();
                return Err(err);
            }
        };

        self.controller.set_total_count(page.total_count);
        let reload = self.controller.add_new_events(page.events);
        self.controller.finish_fetch();
        Ok(Some(reload))
    }

    /// Pull-to-refresh: reset and fetch the first window again.
    pub fn refresh(&mut self) -> Result<Option<FeedReload>> {
        if self.controller.is_fetch_in_progress() {
            return Ok(None);
        }
        self.controller.reset_content();
        self.load_next_page()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Item, ListRef};
    use parking_lot::Mutex;

    fn event(id: usize) -> FeedEvent {
        FeedEvent {
            item: Item {
                id: format!("save-{}", id),
                data_id: format!("place-{}", id),
                ..Item::default()
            },
            list: ListRef {
                id: "list-1".into(),
                title: "Brunch".into(),
            },
        }
    }

    fn events(range: Range<usize>) -> Vec<FeedEvent> {
        range.map(event).collect()
    }

    #[test]
    fn append_preserves_existing_rows() {
        let mut controller = FeedPaginationController::default();
        controller.add_new_events(events(0..8));
        let first = controller.event(3).cloned().unwrap();

        controller.add_new_events(events(8..16));
        assert_eq!(controller.current_count(), 16);
        assert_eq!(controller.event(3), Some(&first));
    }

    #[test]
    fn reload_range_covers_only_new_rows() {
        let mut controller = FeedPaginationController::default();
        assert_eq!(
            controller.add_new_events(events(0..8)),
            FeedReload::Rows(0..8)
        );
        assert_eq!(
            controller.add_new_events(events(8..16)),
            FeedReload::Rows(8..16)
        );
    }

    #[test]
    fn empty_first_page_requests_full_reload() {
        let mut controller = FeedPaginationController::default();
        assert_eq!(controller.add_new_events(Vec::new()), FeedReload::Full);
    }

    #[test]
    fn window_advances_by_increment_after_append() {
        let mut controller = FeedPaginationController::new(7);
        assert_eq!(controller.window(), (0, 7));
        controller.add_new_events(events(0..7));
        assert_eq!(controller.window(), (7, 14));
    }

    #[test]
    fn reset_restores_initial_window() {
        let mut controller = FeedPaginationController::new(7);
        for page in 0..5 {
            controller.add_new_events(events(page * 8..(page + 1) * 8));
        }
        assert_eq!(controller.current_count(), 40);

        controller.reset_content();
        assert_eq!(controller.current_count(), 0);
        assert_eq!(controller.window(), (0, 7));
    }

    #[test]
    fn fetch_guard_refuses_overlap() {
        let mut controller = FeedPaginationController::default();
        assert!(controller.begin_fetch());
        assert!(!controller.begin_fetch());
        controller.finish_fetch();
        assert!(controller.begin_fetch());
    }

    #[test]
    fn exhaustion_tracks_total_count() {
        let mut controller = FeedPaginationController::default();
        controller.set_total_count(10);
        controller.add_new_events(events(0..7));
        assert!(!controller.is_exhausted());
        controller.add_new_events(events(7..10));
        assert!(controller.is_exhausted());
    }

    #[derive(Default)]
    struct RecordingObserver {
        seen: Mutex<Vec<(usize, FeedReload)>>,
    }

    impl FeedObserver for RecordingObserver {
        fn feed_updated(&self, events: &[FeedEvent], reload: &FeedReload) {
            self.seen.lock().push((events.len(), reload.clone()));
        }
    }

    #[test]
    fn observer_sees_full_list_and_reload_scope() {
        let observer = Arc::new(RecordingObserver::default());
        let mut controller = FeedPaginationController::default();
        controller.set_observer(observer.clone());

        controller.add_new_events(events(0..8));
        controller.add_new_events(events(8..12));

        let seen = observer.seen.lock();
        assert_eq!(
            *seen,
            vec![
                (8, FeedReload::Rows(0..8)),
                (12, FeedReload::Rows(8..12)),
            ]
        );
    }
}
