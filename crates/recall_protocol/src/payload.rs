//! Creation payloads.

use chrono::{DateTime, Utc};
use recall_model::{Card, ContentBlock, Deck, DeckRef, ReviewPhase, TempId, Tracked};
use serde::{Deserialize, Serialize};

/// Request to create a deck on the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeckCreate {
    /// Idempotency token; the server echoes it on the created record.
    pub client_token: TempId,
    /// Deck name.
    pub name: String,
    /// Deck description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl DeckCreate {
    /// Builds a creation payload from a locally tracked deck.
    ///
    /// Callers must only pass records that are pending creation; the
    /// token is the record's temporary id.
    pub fn from_tracked(rec: &Tracked<Deck>) -> Option<Self> {
        Some(Self {
            client_token: rec.temp_id()?,
            name: rec.entity.name.clone(),
            description: rec.entity.description.clone(),
        })
    }
}

/// Request to create a card on the server.
///
/// The parent deck is referenced either by `deck_id` (synced parent) or
/// by `deck_token` (parent created in the same or an earlier push).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardCreate {
    /// Idempotency token; the server echoes it on the created record.
    pub client_token: TempId,
    /// Parent deck id, or 0 when `deck_token` is set.
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
    /// Parsed cloze structure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloze_data: Option<serde_json::Value>,
    /// Free-form tags.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Scheduling state accumulated before the first sync.
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
}

impl CardCreate {
    /// Builds a creation payload from a locally tracked card.
    pub fn from_tracked(rec: &Tracked<Card>) -> Option<Self> {
        let (deck_id, deck_token) = match rec.entity.deck {
            DeckRef::Server(id) => (id.as_i64(), None),
            DeckRef::Temp(token) => (0, Some(token)),
        };
        Some(Self {
            client_token: rec.temp_id()?,
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
        })
    }
}
