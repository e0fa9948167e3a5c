//! Pull and push messages.

use crate::payload::{CardCreate, DeckCreate};
use crate::record::{CardRecord, DeckRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Response to a pull: the authoritative delta (or full snapshot).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullResponse {
    /// Server time at which the snapshot/delta was taken; becomes the
    /// client's next watermark.
    pub server_timestamp: DateTime<Utc>,
    /// Decks changed since the requested watermark.
    #[serde(default)]
    pub decks: Vec<DeckRecord>,
    /// Cards changed since the requested watermark.
    #[serde(default)]
    pub cards: Vec<CardRecord>,
}

impl PullResponse {
    /// Creates a pull response.
    pub fn new(
        server_timestamp: DateTime<Utc>,
        decks: Vec<DeckRecord>,
        cards: Vec<CardRecord>,
    ) -> Self {
        Self {
            server_timestamp,
            decks,
            cards,
        }
    }
}

/// Outbound push: local creations, updates and deletions.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PushRequest {
    /// The client's watermark at the time the payload was built.
    pub client_timestamp: Option<DateTime<Utc>>,
    /// Decks pending creation.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub new_decks: Vec<DeckCreate>,
    /// Cards pending creation.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub new_cards: Vec<CardCreate>,
    /// Decks pending update or deletion (`is_deleted = true`).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub updated_decks: Vec<DeckRecord>,
    /// Cards pending update or deletion.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub updated_cards: Vec<CardRecord>,
}

impl PushRequest {
    /// Returns true if there is nothing to transmit.
    ///
    /// An empty push is skipped entirely; the cycle is pull-only.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.new_decks.is_empty()
            && self.new_cards.is_empty()
            && self.updated_decks.is_empty()
            && self.updated_cards.is_empty()
    }
}

/// Which kind of record a conflict refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    /// An update to an existing deck was rejected.
    Deck,
    /// An update to an existing card was rejected.
    Card,
    /// A deck creation was rejected.
    DeckCreation,
    /// A card creation was rejected.
    CardCreation,
}

/// A server-reported conflict on one pushed record.
///
/// Conflicts are non-fatal: the record stays dirty locally and the
/// message is surfaced to the caller for a manual follow-up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictInfo {
    /// What kind of record conflicted.
    pub kind: ConflictKind,
    /// Server id of the conflicting record, or 0 for creation failures.
    pub id: i64,
    /// Human-readable identifier (deck name, card front) when available.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    /// What went wrong.
    pub message: String,
}

/// Response to a push.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PushResponse {
    /// Created decks, each echoing its `client_token`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub created_decks: Vec<DeckRecord>,
    /// Created cards, each echoing its `client_token`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub created_cards: Vec<CardRecord>,
    /// Rejected records requiring manual resolution.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conflicts: Vec<ConflictInfo>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use recall_model::{Deck, TempId, Tracked};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn empty_push_detected() {
        let push = PushRequest::default();
        assert!(push.is_empty());

        let rec = Tracked::fresh(Deck::new("Spanish"), TempId::generate(), at(1));
        let push = PushRequest {
            new_decks: vec![DeckCreate::from_tracked(&rec).unwrap()],
            ..Default::default()
        };
        assert!(!push.is_empty());
    }

    #[test]
    fn push_request_omits_empty_arrays() {
        let push = PushRequest {
            client_timestamp: Some(at(100)),
            ..Default::default()
        };
        let json = serde_json::to_value(&push).unwrap();
        assert!(json.get("new_decks").is_none());
        assert!(json.get("updated_cards").is_none());
    }

    #[test]
    fn pull_response_roundtrip() {
        let rec = Tracked::fresh(Deck::new("Spanish"), TempId::generate(), at(1));
        let mut wire = DeckRecord::from_tracked(&rec);
        wire.id = 5;
        wire.client_token = None;

        let resp = PullResponse::new(at(100), vec![wire], vec![]);
        let json = serde_json::to_string(&resp).unwrap();
        let back: PullResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(back, resp);
    }

    #[test]
    fn pull_response_tolerates_missing_arrays() {
        let json = r#"{"server_timestamp":"2024-05-01T00:00:00Z"}"#;
        let resp: PullResponse = serde_json::from_str(json).unwrap();
        assert!(resp.decks.is_empty());
        assert!(resp.cards.is_empty());
    }

    #[test]
    fn conflict_kind_wire_names() {
        let info = ConflictInfo {
            kind: ConflictKind::DeckCreation,
            id: 0,
            identifier: Some("Spanish".into()),
            message: "duplicate name".into(),
        };
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["kind"], "deck_creation");
    }
}
