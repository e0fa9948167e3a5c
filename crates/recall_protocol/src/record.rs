//! Wire records for decks and cards.

use crate::error::{ProtocolError, ProtocolResult};
use chrono::{DateTime, Utc};
use recall_model::{
    Card, ContentBlock, Deck, DeckRef, ReviewPhase, ReviewState, ServerId, TempId, Tracked,
};
use serde::{Deserialize, Serialize};

/// A deck as it travels on the wire.
///
/// `id == 0` means "not yet assigned"; such records always carry a
/// `client_token` so the server can echo it on the created copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeckRecord {
    /// Server-assigned id, or 0 when unassigned.
    pub id: i64,
    /// Idempotency token echoed back on created records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_token: Option<TempId>,
    /// Deck name.
    pub name: String,
    /// Deck description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
    /// Soft-delete marker.
    pub is_deleted: bool,
    /// When the record was soft-deleted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl DeckRecord {
    /// Builds the wire form of a locally tracked deck.
    pub fn from_tracked(rec: &Tracked<Deck>) -> Self {
        Self {
            id: rec.server_id().map(ServerId::as_i64).unwrap_or(0),
            client_token: rec.temp_id(),
            name: rec.entity.name.clone(),
            description: rec.entity.description.clone(),
            created_at: rec.created_at,
            updated_at: rec.updated_at,
            is_deleted: rec.deleted,
            deleted_at: rec.deleted_at,
        }
    }

    /// Converts a server-owned wire record into a clean local record.
    ///
    /// Fails if the server sent the "unassigned" id sentinel.
    pub fn try_into_tracked(self) -> ProtocolResult<Tracked<Deck>> {
        if self.id <= 0 {
            return Err(ProtocolError::MissingServerId { kind: "deck" });
        }
        let mut rec = Tracked::synced(
            Deck {
                name: self.name,
                description: self.description,
            },
            ServerId::new(self.id),
            self.created_at,
            self.updated_at,
        );
        rec.deleted = self.is_deleted;
        rec.deleted_at = self.deleted_at;
        Ok(rec)
    }
}

/// A card as it travels on the wire.
///
/// The deck reference uses the same convention as the record id:
/// `deck_id == 0` plus a `deck_token` while the parent deck is still
/// unsynced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardRecord {
    /// Server-assigned id, or 0 when unassigned.
    pub id: i64,
    /// Idempotency token echoed back on created records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_token: Option<TempId>,
    /// Parent deck id, or 0 when the parent is unsynced.
    pub deck_id: i64,
    /// Parent deck token, present iff `deck_id == 0`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deck_token: Option<TempId>,
    /// Front face content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub front_content: Option<Vec<ContentBlock>>,
    /// Back face content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub back_content: Option<Vec<ContentBlock>>,
    /// Raw cloze source text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_cloze_text: Option<String>,
    /// Parsed cloze structure, opaque to the engine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloze_data: Option<serde_json::Value>,
    /// Free-form tags.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// When the card is next due.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_review_at: Option<DateTime<Utc>>,
    /// Memory stability estimate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fsrs_stability: Option<f64>,
    /// Difficulty estimate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fsrs_difficulty: Option<f64>,
    /// Number of lapses.
    #[serde(default)]
    pub fsrs_lapses: u32,
    /// Scheduling phase.
    #[serde(default)]
    pub fsrs_state: ReviewPhase,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
    /// Soft-delete marker.
    pub is_deleted: bool,
    /// When the record was soft-deleted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl CardRecord {
    /// Builds the wire form of a locally tracked card.
    pub fn from_tracked(rec: &Tracked<Card>) -> Self {
        let (deck_id, deck_token) = match rec.entity.deck {
            DeckRef::Server(id) => (id.as_i64(), None),
            DeckRef::Temp(token) => (0, Some(token)),
        };
        Self {
            id: rec.server_id().map(ServerId::as_i64).unwrap_or(0),
            client_token: rec.temp_id(),
            deck_id,
            deck_token,
            front_content: rec.entity.front.clone(),
            back_content: rec.entity.back.clone(),
            raw_cloze_text: rec.entity.raw_cloze_text.clone(),
            cloze_data: rec.entity.cloze_data.clone(),
            tags: rec.entity.tags.clone(),
            next_review_at: rec.entity.review.next_review_at,
            fsrs_stability: rec.entity.review.stability,
            fsrs_difficulty: rec.entity.review.difficulty,
            fsrs_lapses: rec.entity.review.lapses,
            fsrs_state: rec.entity.review.phase,
            created_at: rec.created_at,
            updated_at: rec.updated_at,
            is_deleted: rec.deleted,
            deleted_at: rec.deleted_at,
        }
    }

    /// Converts a server-owned wire record into a clean local record.
    ///
    /// Fails if the server sent the "unassigned" id sentinel for the
    /// record itself or for its deck reference.
    pub fn try_into_tracked(self) -> ProtocolResult<Tracked<Card>> {
        if self.id <= 0 {
            return Err(ProtocolError::MissingServerId { kind: "card" });
        }
        // The server never hands out unresolved deck references.
        if self.deck_id <= 0 {
            return Err(ProtocolError::MissingDeckRef);
        }
        let card = Card {
            deck: DeckRef::Server(ServerId::new(self.deck_id)),
            front: self.front_content,
            back: self.back_content,
            raw_cloze_text: self.raw_cloze_text,
            cloze_data: self.cloze_data,
            tags: self.tags,
            review: ReviewState {
                next_review_at: self.next_review_at,
                stability: self.fsrs_stability,
                difficulty: self.fsrs_difficulty,
                lapses: self.fsrs_lapses,
                phase: self.fsrs_state,
            },
        };
        let mut rec = Tracked::synced(
            card,
            ServerId::new(self.id),
            self.created_at,
            self.updated_at,
        );
        rec.deleted = self.is_deleted;
        rec.deleted_at = self.deleted_at;
        Ok(rec)
    }
}
