use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Kinds of innovation records the assistant can create
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Idea,
    Challenge,
    Pilot,
    Solution,
}

impl RecordKind {
    pub const ALL: [RecordKind; 4] = [
        RecordKind::Idea,
        RecordKind::Challenge,
        RecordKind::Pilot,
        RecordKind::Solution,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Idea => "idea",
            RecordKind::Challenge => "challenge",
            RecordKind::Pilot => "pilot",
            RecordKind::Solution => "solution",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A record created through the assistant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub kind: RecordKind,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub attributes: Map<String, Value>,
    pub created_at: DateTime<Utc>,
}

impl Record {
    pub fn new(kind: RecordKind, title: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            title: title.into(),
            description: None,
            attributes: Map::new(),
            created_at: Utc::now(),
        }
    }
}

/// A tool call held back until the user confirms it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingAction {
    pub id: String,
    pub tool: String,
    pub arguments: Map<String, Value>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl PendingAction {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

#[derive(Debug)]
struct StateInner {
    pending: RwLock<HashMap<String, PendingAction>>,
    records: DashMap<String, Record>,
    pending_ttl: Duration,
}

/// Shared conversation state handed explicitly to the coordinator and tools.
/// Cloning the handle shares the underlying state.
#[derive(Debug, Clone)]
pub struct ConversationState {
    inner: Arc<StateInner>,
}

impl Default for ConversationState {
    fn default() -> Self {
        Self::new(Duration::minutes(15))
    }
}

impl ConversationState {
    pub fn new(pending_ttl: Duration) -> Self {
        Self {
            inner: Arc::new(StateInner {
                pending: RwLock::new(HashMap::new()),
                records: DashMap::new(),
                pending_ttl,
            }),
        }
    }

    /// Hold a tool call for confirmation and return the stored action
    pub fn add_pending(&self, tool: &str, arguments: Map<String, Value>) -> PendingAction {
        self.add_pending_at(tool, arguments, Utc::now())
    }

    /// Store a pending action created at `now`. Actions already expired at
    /// `now` are dropped first so abandoned confirmations do not accumulate.
    pub(crate) fn add_pending_at(&self, tool: &str, arguments: Map<String, Value>, now: DateTime<Utc>) -> PendingAction {
        let action = PendingAction {
            id: Uuid::new_v4().to_string(),
            tool: tool.to_string(),
            arguments,
            created_at: now,
            expires_at: now
                .checked_add_signed(self.inner.pending_ttl)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        };

        let mut pending = self.inner.pending.write();
        let before = pending.len();
        pending.retain(|_, existing| !existing.is_expired_at(now));
        let purged = before - pending.len();
        if purged > 0 {
            debug!("Dropped {} expired pending actions", purged);
        }
        pending.insert(action.id.clone(), action.clone());
        drop(pending);

        debug!("Stored pending action {} for tool {}", action.id, tool);
        action
    }

    /// Remove and return a pending action. Expired actions are dropped and
    /// reported as missing.
    pub fn take_pending(&self, id: &str) -> Option<PendingAction> {
        self.take_pending_at(id, Utc::now())
    }

    pub(crate) fn take_pending_at(&self, id: &str, now: DateTime<Utc>) -> Option<PendingAction> {
        let action = self.inner.pending.write().remove(id)?;
        if action.is_expired_at(now) {
            debug!("Pending action {} expired at {}", id, action.expires_at);
            return None;
        }
        Some(action)
    }

    pub fn cancel_pending(&self, id: &str) -> bool {
        self.inner.pending.write().remove(id).is_some()
    }

    pub fn pending_count(&self) -> usize {
        self.inner.pending.read().len()
    }

    pub fn insert_record(&self, record: Record) {
        self.inner.records.insert(record.id.clone(), record);
    }

    pub fn record(&self, id: &str) -> Option<Record> {
        self.inner.records.get(id).map(|entry| entry.value().clone())
    }

    /// Records in creation order, optionally filtered by kind
    pub fn records(&self, kind: Option<RecordKind>) -> Vec<Record> {
        let mut records: Vec<Record> = self
            .inner
            .records
            .iter()
            .filter(|entry| kind.is_none_or(|kind| entry.value().kind == kind))
            .map(|entry| entry.value().clone())
            .collect();
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        records
    }
}
