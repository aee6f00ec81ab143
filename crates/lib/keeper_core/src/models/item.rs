//! Vault item models.
//!
//! Every item has a summary (identity, kind, name, last update) and a typed
//! payload. The payload is a closed set of variants; code that dispatches on
//! kind matches exhaustively so a new kind fails to compile until handled.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Kind of a vault item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Credential,
    Note,
    Card,
    Binary,
}

impl ItemKind {
    /// All kinds, in display order.
    pub const ALL: [ItemKind; 4] = [
        ItemKind::Credential,
        ItemKind::Note,
        ItemKind::Card,
        ItemKind::Binary,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ItemKind::Credential => "credential",
            ItemKind::Note => "note",
            ItemKind::Card => "card",
            ItemKind::Binary => "binary",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "credential" => Ok(ItemKind::Credential),
            "note" => Ok(ItemKind::Note),
            "card" => Ok(ItemKind::Card),
            "binary" => Ok(ItemKind::Binary),
            other => Err(format!("unknown item kind '{other}'")),
        }
    }
}

/// Listing entry for an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemSummary {
    pub id: String,
    pub kind: ItemKind,
    pub name: String,
    pub updated_at: DateTime<Utc>,
}

/// Free-form key/value attached to an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaEntry {
    pub key: String,
    pub value: String,
}

impl MetaEntry {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Login/password pair for some site or service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub login: String,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Free text note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub text: String,
}

/// Bank card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub number: String,
    pub holder: String,
    /// `MM/YY`.
    pub expiry: String,
    pub cvc: String,
}

/// Metadata describing a stored binary file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinaryInfo {
    pub file_name: String,
    pub size_bytes: u64,
    /// Lowercase hex SHA-256 of the content.
    pub sha256: String,
}

impl BinaryInfo {
    /// Describe `content` stored under `file_name`.
    pub fn from_bytes(file_name: impl Into<String>, content: &[u8]) -> Self {
        Self {
            file_name: file_name.into(),
            size_bytes: content.len() as u64,
            sha256: format!("{:x}", Sha256::digest(content)),
        }
    }
}

/// Typed item payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ItemPayload {
    Credential(Credential),
    Note(Note),
    Card(Card),
    Binary(BinaryInfo),
}

impl ItemPayload {
    pub fn kind(&self) -> ItemKind {
        match self {
            ItemPayload::Credential(_) => ItemKind::Credential,
            ItemPayload::Note(_) => ItemKind::Note,
            ItemPayload::Card(_) => ItemKind::Card,
            ItemPayload::Binary(_) => ItemKind::Binary,
        }
    }
}

/// Full stored item as held by the vault repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredItem {
    pub summary: ItemSummary,
    pub payload: ItemPayload,
}

/// Item creation or replacement request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemDraft {
    /// Existing item to replace; `None` creates a new one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub payload: ItemPayload,
    #[serde(default)]
    pub metadata: Vec<MetaEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_parses_its_own_display() {
        for kind in ItemKind::ALL {
            assert_eq!(kind.to_string().parse::<ItemKind>().unwrap(), kind);
        }
        assert!("wallet".parse::<ItemKind>().is_err());
    }

    #[test]
    fn payload_is_tagged_by_kind() {
        let payload = ItemPayload::Note(Note {
            text: "hello".into(),
        });
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["kind"], "note");
        assert_eq!(json["text"], "hello");
        assert_eq!(payload.kind(), ItemKind::Note);
    }

    #[test]
    fn binary_info_hashes_content() {
        let info = BinaryInfo::from_bytes("a.txt", b"abc");
        assert_eq!(info.size_bytes, 3);
        assert_eq!(
            info.sha256,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
