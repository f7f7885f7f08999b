use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A Favespot account. Only `id` carries identity; the rest is display data.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub avatar_url: String,
}

/// The minimal handle to a list: enough to render "already saved under X".
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ListRef {
    pub id: String,
    #[serde(default)]
    pub title: String,
}

/// A saved (or recommended) place row.
///
/// Identity has two facets: `id` is the save row, unique per (list, place)
/// pairing; `data_id` is the underlying place, stable across lists. The same
/// place shows up as one `Item` per list it was saved to, plus one more if
/// somebody recommended it. `data_id` equality is the only valid test for
/// "same place" - comparing `id` across lists answers the wrong question.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: String,
    pub data_id: String,
    #[serde(default)]
    pub is_recommendation: bool,
    #[serde(default)]
    pub list_id: String,
    #[serde(default)]
    pub list_title: String,
    #[serde(default)]
    pub owner: Option<User>,
    #[serde(default)]
    pub added_by: Option<User>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub created_at: DateTime<Utc>,
    /// Derived, never authoritative. `None` means not yet reconciled against
    /// the user's saved snapshot; stale values are a correctness bug, so this
    /// is recomputed whenever the snapshot changes (see `saves::reconcile`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_saved: Option<bool>,
    #[serde(default)]
    pub content: ItemContent,
}

impl Item {
    /// Projection of the facts needed to answer "where did I save this".
    pub fn as_saved_ref(&self) -> SavedItemRef {
        SavedItemRef {
            data_id: self.data_id.clone(),
            list_id: self.list_id.clone(),
            list_title: self.list_title.clone(),
        }
    }

    pub fn owning_list(&self) -> ListRef {
        ListRef {
            id: self.list_id.clone(),
            title: self.list_title.clone(),
        }
    }
}

/// Minimal projection of an [`Item`] for save-ownership queries.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SavedItemRef {
    pub data_id: String,
    pub list_id: String,
    #[serde(default)]
    pub list_title: String,
}

/// Place content, tagged by source. Matched exhaustively at display points;
/// payloads the client does not understand fall back to `Unknown` instead of
/// failing the whole decode.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(tag = "source", rename_all = "lowercase")]
pub enum ItemContent {
    #[serde(rename_all = "camelCase")]
    Google {
        place_id: String,
        #[serde(default)]
        name: String,
        #[serde(default)]
        address: String,
        #[serde(default)]
        latitude: f64,
        #[serde(default)]
        longitude: f64,
        #[serde(default)]
        rating: Option<f64>,
    },
    #[default]
    #[serde(other)]
    Unknown,
}

impl ItemContent {
    /// Display name for the place, or `None` when the source is unknown and
    /// the screen should fall back to the item's own fields.
    pub fn display_name(&self) -> Option<&str> {
        match self {
            ItemContent::Google { name, .. } if !name.is_empty() => Some(name),
            ItemContent::Google { .. } => None,
            ItemContent::Unknown => None,
        }
    }

    pub fn display_address(&self) -> Option<&str> {
        match self {
            ItemContent::Google { address, .. } if !address.is_empty() => Some(address),
            ItemContent::Google { .. } => None,
            ItemContent::Unknown => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct List {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub owner: User,
    #[serde(default)]
    pub items: Vec<Item>,
    #[serde(default)]
    pub followers: Vec<User>,
    #[serde(default)]
    pub number_of_followers: i64,
    /// `None` until the follow state is fetched for the current user.
    #[serde(default)]
    pub is_user_following: Option<bool>,
}

impl List {
    pub fn as_list_ref(&self) -> ListRef {
        ListRef {
            id: self.id.clone(),
            title: self.title.clone(),
        }
    }
}

/// One row of the social activity feed: somebody saved `item` to `list`.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FeedEvent {
    pub item: Item,
    pub list: ListRef,
}

impl FeedEvent {
    /// Ordering key for the feed; newest first is a server guarantee the
    /// pagination controller relies on.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.item.created_at
    }
}
