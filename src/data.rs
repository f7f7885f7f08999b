use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{Duration, Utc};
use parking_lot::Mutex;

use crate::api::{self, FeedPage};
use crate::model::{FeedEvent, Item, ItemContent, List, User};

pub trait SavedItemsService: Send + Sync {
    /// The user's full saved snapshot: every item they own, saved, or were
    /// recommended, across all lists. Input to `saves::resolve`/`reconcile`.
    fn saved_items(&self, user_id: &str) -> Result<Vec<Item>>;
}

pub trait ListService: Send + Sync {
    fn list(&self, list_id: &str) -> Result<List>;
    fn list_items(&self, list_id: &str) -> Result<Vec<Item>>;
}

pub trait FeedService: Send + Sync {
    /// Half-open window `[from, to)`, server-sorted newest first.
    fn feed_page(&self, from: usize, to: usize) -> Result<FeedPage>;
}

pub trait FaveService: Send + Sync {
    /// Fire-and-refetch: after either call completes, re-fetch the saved
    /// snapshot before re-reconciling. Neither returns the updated state.
    fn add_fave(&self, user_id: &str, list_id: &str, item_id: &str) -> Result<()>;
    fn remove_fave(&self, user_id: &str, item_id: &str) -> Result<()>;
}

pub struct HttpSavedItemsService {
    client: Arc<api::Client>,
}

impl HttpSavedItemsService {
    pub fn new(client: Arc<api::Client>) -> Self {
        Self { client }
    }
}

impl SavedItemsService for HttpSavedItemsService {
    fn saved_items(&self, user_id: &str) -> Result<Vec<Item>> {
        self.client
            .saved_items(user_id)
            .context("fetch saved snapshot")
    }
}

pub struct HttpListService {
    client: Arc<api::Client>,
}

impl HttpListService {
    pub fn new(client: Arc<api::Client>) -> Self {
        Self { client }
    }
}

impl ListService for HttpListService {
    fn list(&self, list_id: &str) -> Result<List> {
        self.client.list(list_id).context("fetch list")
    }

    fn list_items(&self, list_id: &str) -> Result<Vec<Item>> {
        self.client.list_items(list_id).context("fetch list items")
    }
}

pub struct HttpFeedService {
    client: Arc<api::Client>,
}

impl HttpFeedService {
    pub fn new(client: Arc<api::Client>) -> Self {
        Self { client }
    }
}

impl FeedService for HttpFeedService {
    fn feed_page(&self, from: usize, to: usize) -> Result<FeedPage> {
        self.client.feed_page(from, to).context("fetch feed page")
    }
}

pub struct HttpFaveService {
    client: Arc<api::Client>,
}

impl HttpFaveService {
    pub fn new(client: Arc<api::Client>) -> Self {
        Self { client }
    }
}

impl FaveService for HttpFaveService {
    fn add_fave(&self, user_id: &str, list_id: &str, item_id: &str) -> Result<()> {
        self.client.add_fave(user_id, list_id, item_id)
    }

    fn remove_fave(&self, user_id: &str, item_id: &str) -> Result<()> {
        self.client.remove_fave(user_id, item_id)
    }
}

/// In-memory backend for offline use and tests. One instance backs all four
/// service traits, so a fave added through [`FaveService`] is visible on the
/// next [`SavedItemsService`] fetch - the same fire-and-refetch loop the
/// real backend requires.
pub struct MockBackend {
    state: Mutex<MockState>,
}

struct MockState {
    saved: Vec<Item>,
    lists: Vec<List>,
    feed: Vec<FeedEvent>,
    next_row: usize,
}

impl MockBackend {
    pub fn new(saved: Vec<Item>, lists: Vec<List>, feed: Vec<FeedEvent>) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(MockState {
                saved,
                lists,
                feed,
                next_row: 1000,
            }),
        })
    }

    /// A small fixture: one list of cafes with a pending recommendation, a
    /// feed of sample events, and a saved snapshot for user `me`.
    pub fn sample() -> Arc<Self> {
        let owner = User {
            id: "me".into(),
            username: "me".into(),
            display_name: "Sample User".into(),
            avatar_url: String::new(),
        };
        let friend = User {
            id: "friend".into(),
            username: "friend".into(),
            display_name: "A Friend".into(),
            avatar_url: String::new(),
        };

        let now = Utc::now();
        let entry = Item {
            id: "save-1".into(),
            data_id: "place-espresso".into(),
            is_recommendation: false,
            list_id: "list-cafes".into(),
            list_title: "Cafes".into(),
            owner: Some(owner.clone()),
            added_by: Some(owner.clone()),
            note: Some("best flat white in town".into()),
            created_at: now - Duration::hours(2),
            is_saved: None,
            content: ItemContent::Google {
                place_id: "ChIJespresso".into(),
                name: "Espresso Bar".into(),
                address: "12 Bean St".into(),
                latitude: 45.52,
                longitude: -73.6,
                rating: Some(4.7),
            },
        };
        let recommendation = Item {
            id: "rec-1".into(),
            data_id: "place-bagels".into(),
            is_recommendation: true,
            list_id: "list-cafes".into(),
            list_title: "Cafes".into(),
            owner: Some(owner.clone()),
            added_by: Some(friend.clone()),
            note: Some("you have to try these".into()),
            created_at: now - Duration::hours(1),
            is_saved: None,
            content: ItemContent::Unknown,
        };

        let list = List {
            id: "list-cafes".into(),
            title: "Cafes".into(),
            owner: owner.clone(),
            items: vec![entry.clone(), recommendation.clone()],
            followers: vec![friend.clone()],
            number_of_followers: 1,
            is_user_following: Some(false),
        };

        let feed = (0..20i64)
            .map(|i| FeedEvent {
                item: Item {
                    id: format!("feed-save-{}", i),
                    data_id: format!("feed-place-{}", i),
                    list_id: "list-cafes".into(),
                    list_title: "Cafes".into(),
                    added_by: Some(friend.clone()),
                    created_at: now - Duration::minutes(i),
                    ..Item::default()
                },
                list: list.as_list_ref(),
            })
            .collect();

        Self::new(vec![entry, recommendation], vec![list], feed)
    }
}

impl SavedItemsService for MockBackend {
    fn saved_items(&self, _user_id: &str) -> Result<Vec<Item>> {
        Ok(self.state.lock().saved.clone())
    }
}

impl ListService for MockBackend {
    fn list(&self, list_id: &str) -> Result<List> {
        let state = self.state.lock();
        match state.lists.iter().find(|list| list.id == list_id) {
            Some(list) => Ok(list.clone()),
            None => bail!("mock: list {} not found", list_id),
        }
    }

    fn list_items(&self, list_id: &str) -> Result<Vec<Item>> {
        Ok(self.list(list_id)?.items)
    }
}

impl FeedService for MockBackend {
    fn feed_page(&self, from: usize, to: usize) -> Result<FeedPage> {
        if to <= from {
            bail!("mock: feed window must be non-empty");
        }
        let state = self.state.lock();
        let total = state.feed.len();
        let start = from.min(total);
        let end = to.min(total);
        Ok(FeedPage {
            events: state.feed[start..end].to_vec(),
            total_count: total,
        })
    }
}

impl FaveService for MockBackend {
    fn add_fave(&self, user_id: &str, list_id: &str, item_id: &str) -> Result<()> {
        let mut state = self.state.lock();

        // Source row: either a row of the target list or an existing
        // recommendation the user is accepting.
        let source = state
            .lists
            .iter()
            .flat_map(|list| list.items.iter())
            .chain(state.saved.iter())
            .find(|item| item.id == item_id)
            .cloned();
        let source = match source {
            Some(item) => item,
            None => bail!("mock: item {} not found", item_id),
        };

        let (list_title, list_owner) = match state.lists.iter().find(|list| list.id == list_id) {
            Some(list) => (list.title.clone(), list.owner.clone()),
            None => bail!("mock: list {} not found", list_id),
        };

        let row_id = format!("save-{}", state.next_row);
        state.next_row += 1;
        state.saved.push(Item {
            id: row_id,
            data_id: source.data_id,
            is_recommendation: false,
            list_id: list_id.to_string(),
            list_title,
            owner: Some(list_owner),
            added_by: Some(User {
                id: user_id.to_string(),
                ..User::default()
            }),
            note: source.note,
            created_at: Utc::now(),
            is_saved: None,
            content: source.content,
        });
        Ok(())
    }

    fn remove_fave(&self, _user_id: &str, item_id: &str) -> Result<()> {
        let mut state = self.state.lock();
        let before = state.saved.len();
        state.saved.retain(|item| item.id != item_id);
        if state.saved.len() == before {
            bail!("mock: item {} not found", item_id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_backend_serves_list_and_snapshot() {
        let backend = MockBackend::sample();
        let list = backend.list("list-cafes").unwrap();
        assert_eq!(list.items.len(), 2);

        let snapshot = backend.saved_items("me").unwrap();
        assert!(snapshot.iter().any(|item| !item.is_recommendation));
        assert!(snapshot.iter().any(|item| item.is_recommendation));
    }

    #[test]
    fn feed_pages_clamp_to_total() {
        let backend = MockBackend::sample();
        let page = backend.feed_page(14, 21).unwrap();
        assert_eq!(page.total_count, 20);
        assert_eq!(page.events.len(), 6);
    }

    #[test]
    fn add_then_remove_fave_round_trips_snapshot() {
        let backend = MockBackend::sample();
        let before = backend.saved_items("me").unwrap().len();

        backend.add_fave("me", "list-cafes", "rec-1").unwrap();
        let snapshot = backend.saved_items("me").unwrap();
        assert_eq!(snapshot.len(), before + 1);
        let added = snapshot.last().unwrap();
        assert!(!added.is_recommendation);
        assert_eq!(added.data_id, "place-bagels");

        backend.remove_fave("me", &added.id.clone()).unwrap();
        assert_eq!(backend.saved_items("me").unwrap().len(), before);
    }

    #[test]
    fn unknown_list_is_an_error() {
        let backend = MockBackend::sample();
        assert!(backend.list("list-missing").is_err());
    }
}
