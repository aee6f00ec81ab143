//! Typed local replicas of the remote vault.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use keeper_core::models::item::{BinaryInfo, Card, Credential, MetaEntry, Note};
use keeper_core::rpc::ItemResponse;

/// One replicated item with its metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedItem<T> {
    pub id: String,
    pub name: String,
    pub item: T,
    pub updated_at: DateTime<Utc>,
    pub metadata: Vec<MetaEntry>,
}

impl<T> CachedItem<T> {
    pub fn from_response(resp: ItemResponse<T>, metadata: Vec<MetaEntry>) -> Self {
        Self {
            id: resp.id,
            name: resp.name,
            item: resp.item,
            updated_at: resp.updated_at,
            metadata,
        }
    }
}

/// A fetched item ready to be stored in the matching cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalItem {
    Credential(CachedItem<Credential>),
    Note(CachedItem<Note>),
    Card(CachedItem<Card>),
    Binary(CachedItem<BinaryInfo>),
}

/// Per-kind caches keyed by item id, plus the sync watermark.
#[derive(Debug, Default)]
pub struct LocalVault {
    credentials: HashMap<String, CachedItem<Credential>>,
    notes: HashMap<String, CachedItem<Note>>,
    cards: HashMap<String, CachedItem<Card>>,
    binaries: HashMap<String, CachedItem<BinaryInfo>>,
    watermark: Option<DateTime<Utc>>,
}

impl LocalVault {
    pub fn credentials(&self) -> &HashMap<String, CachedItem<Credential>> {
        &self.credentials
    }

    pub fn notes(&self) -> &HashMap<String, CachedItem<Note>> {
        &self.notes
    }

    pub fn cards(&self) -> &HashMap<String, CachedItem<Card>> {
        &self.cards
    }

    pub fn binaries(&self) -> &HashMap<String, CachedItem<BinaryInfo>> {
        &self.binaries
    }

    /// Time of the last pass that stored anything.
    pub fn watermark(&self) -> Option<DateTime<Utc>> {
        self.watermark
    }

    pub(crate) fn set_watermark(&mut self, at: DateTime<Utc>) {
        self.watermark = Some(at);
    }

    /// Whether an item last changed at `updated_at` must be fetched.
    pub fn is_stale(&self, updated_at: DateTime<Utc>) -> bool {
        self.watermark.is_none_or(|mark| updated_at >= mark)
    }

    /// Insert `item`, replacing any entry with the same id wholesale.
    pub fn store(&mut self, item: LocalItem) {
        match item {
            LocalItem::Credential(c) => {
                self.credentials.insert(c.id.clone(), c);
            }
            LocalItem::Note(c) => {
                self.notes.insert(c.id.clone(), c);
            }
            LocalItem::Card(c) => {
                self.cards.insert(c.id.clone(), c);
            }
            LocalItem::Binary(c) => {
                self.binaries.insert(c.id.clone(), c);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.credentials.len() + self.notes.len() + self.cards.len() + self.binaries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every cached item and reset the watermark.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn note(id: &str, text: &str, secs: i64) -> LocalItem {
        LocalItem::Note(CachedItem {
            id: id.into(),
            name: format!("note {id}"),
            item: Note { text: text.into() },
            updated_at: Utc.timestamp_opt(secs, 0).unwrap(),
            metadata: vec![MetaEntry::new("tag", "x")],
        })
    }

    #[test]
    fn store_replaces_by_id() {
        let mut vault = LocalVault::default();
        vault.store(note("n1", "first", 10));
        vault.store(note("n1", "second", 20));
        assert_eq!(vault.notes().len(), 1);
        assert_eq!(vault.notes()["n1"].item.text, "second");
        assert_eq!(vault.len(), 1);
    }

    #[test]
    fn items_land_in_their_kind_cache() {
        let mut vault = LocalVault::default();
        vault.store(note("n1", "a", 10));
        vault.store(LocalItem::Card(CachedItem {
            id: "c1".into(),
            name: "visa".into(),
            item: Card {
                number: "4111111111111111".into(),
                holder: "A B".into(),
                expiry: "01/30".into(),
                cvc: "123".into(),
            },
            updated_at: Utc.timestamp_opt(10, 0).unwrap(),
            metadata: vec![],
        }));
        assert_eq!(vault.notes().len(), 1);
        assert_eq!(vault.cards().len(), 1);
        assert!(vault.credentials().is_empty());
        assert!(vault.binaries().is_empty());
    }

    #[test]
    fn staleness_follows_watermark() {
        let mut vault = LocalVault::default();
        let mark = Utc.timestamp_opt(1_000, 0).unwrap();
        assert!(vault.is_stale(Utc.timestamp_opt(1, 0).unwrap()));

        vault.set_watermark(mark);
        assert!(!vault.is_stale(Utc.timestamp_opt(999, 0).unwrap()));
        assert!(vault.is_stale(mark));
        assert!(vault.is_stale(Utc.timestamp_opt(1_001, 0).unwrap()));
    }

    #[test]
    fn clear_resets_everything() {
        let mut vault = LocalVault::default();
        vault.store(note("n1", "a", 10));
        vault.set_watermark(Utc::now());
        vault.clear();
        assert!(vault.is_empty());
        assert_eq!(vault.watermark(), None);
    }
}
