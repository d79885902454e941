//! Content items and the child records stored beneath them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What kind of primary entity a content item is.
///
/// The ledger treats every kind the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Post,
    Achievement,
    PlacementDrive,
    Entry,
    Comment,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Post => "post",
            ContentKind::Achievement => "achievement",
            ContentKind::PlacementDrive => "placement_drive",
            ContentKind::Entry => "entry",
            ContentKind::Comment => "comment",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "post" => Some(ContentKind::Post),
            "achievement" => Some(ContentKind::Achievement),
            "placement_drive" => Some(ContentKind::PlacementDrive),
            "entry" => Some(ContentKind::Entry),
            "comment" => Some(ContentKind::Comment),
            _ => None,
        }
    }
}

/// An entity that can accumulate engagement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentItem {
    /// Opaque unique id
    pub id: String,

    pub kind: ContentKind,

    /// Author, when the creating subsystem records one
    pub owner_id: Option<String>,

    /// Denormalized number of engagement records under this item
    pub engagement_count: u64,

    /// Bumped by the store on every committed write. Observability only.
    pub version: u64,

    pub updated_at: DateTime<Utc>,
}

impl ContentItem {
    /// Create a new item with no engagement.
    pub fn new(id: impl Into<String>, kind: ContentKind) -> Self {
        Self {
            id: id.into(),
            kind,
            owner_id: None,
            engagement_count: 0,
            version: 0,
            updated_at: Utc::now(),
        }
    }

    pub fn with_owner(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }

    pub fn with_engagement_count(mut self, count: u64) -> Self {
        self.engagement_count = count;
        self
    }
}

/// Address of a child record: parent id, collection name, record id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChildKey {
    pub content_id: String,
    pub collection: String,
    pub record_id: String,
}

impl ChildKey {
    pub fn new(
        content_id: impl Into<String>,
        collection: impl Into<String>,
        record_id: impl Into<String>,
    ) -> Self {
        Self {
            content_id: content_id.into(),
            collection: collection.into(),
            record_id: record_id.into(),
        }
    }
}

impl std::fmt::Display for ChildKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "content/{}/{}/{}",
            self.content_id, self.collection, self.record_id
        )
    }
}

/// Any record stored as a child of a content item (engagement, comment, feedback).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildRecord {
    pub content_id: String,
    pub collection: String,
    pub record_id: String,
    pub owner_id: Option<String>,
    pub created_at: DateTime<Utc>,

    /// Collection-specific payload (comment text, feedback rating, ...)
    #[serde(default)]
    pub body: serde_json::Value,
}

impl ChildRecord {
    pub fn new(
        content_id: impl Into<String>,
        collection: impl Into<String>,
        record_id: impl Into<String>,
    ) -> Self {
        Self {
            content_id: content_id.into(),
            collection: collection.into(),
            record_id: record_id.into(),
            owner_id: None,
            created_at: Utc::now(),
            body: serde_json::Value::Null,
        }
    }

    pub fn with_owner(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }

    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = body;
        self
    }

    pub fn key(&self) -> ChildKey {
        ChildKey::new(&self.content_id, &self.collection, &self.record_id)
    }
}

/// "User U has engaged with content C".
///
/// Stored as a [`ChildRecord`] whose record id is the user id, so at most
/// one can exist per `(content_id, user_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngagementRecord {
    pub content_id: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

impl EngagementRecord {
    pub fn new(content_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            content_id: content_id.into(),
            user_id: user_id.into(),
            created_at: Utc::now(),
        }
    }

    /// Store form under the given engagement collection.
    pub fn into_child(self, collection: &str) -> ChildRecord {
        ChildRecord {
            content_id: self.content_id,
            collection: collection.to_string(),
            record_id: self.user_id.clone(),
            owner_id: Some(self.user_id),
            created_at: self.created_at,
            body: serde_json::Value::Null,
        }
    }

    pub fn from_child(record: &ChildRecord) -> Self {
        Self {
            content_id: record.content_id.clone(),
            user_id: record.record_id.clone(),
            created_at: record.created_at,
        }
    }
}
