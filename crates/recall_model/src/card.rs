//! The card entity and its content model.

use crate::envelope::{ServerId, TempId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reference from a card to its parent deck.
///
/// While the parent deck is unsynced the reference goes through the
/// deck's temporary id; once the deck's creation is confirmed, every
/// referencing card is rewritten to the numeric id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeckRef {
    /// The parent deck has a server-assigned id.
    Server(ServerId),
    /// The parent deck is still pending creation.
    Temp(TempId),
}

impl DeckRef {
    /// Returns the server id, if the parent deck is synced.
    #[must_use]
    pub fn server(self) -> Option<ServerId> {
        match self {
            DeckRef::Server(id) => Some(id),
            DeckRef::Temp(_) => None,
        }
    }

    /// Returns the temporary id, if the parent deck is unsynced.
    #[must_use]
    pub fn temp(self) -> Option<TempId> {
        match self {
            DeckRef::Server(_) => None,
            DeckRef::Temp(id) => Some(id),
        }
    }
}

/// One block of card face content.
///
/// Serialized with an external `type` tag to stay wire-compatible with
/// the editor's content format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Plain text.
    Text {
        /// The text content.
        content: String,
    },
    /// Rendered HTML.
    Html {
        /// The HTML markup.
        content: String,
    },
    /// An image reference.
    Image {
        /// Image source URL or data URI.
        src: String,
        /// Optional accessibility text.
        #[serde(skip_serializing_if = "Option::is_none")]
        alt: Option<String>,
    },
    /// An audio clip reference.
    Audio {
        /// Audio source URL or data URI.
        src: String,
    },
    /// Cloze text with `{{c1::...}}`-style placeholders.
    ClozeText {
        /// The text with placeholders substituted in.
        #[serde(rename = "textWithPlaceholders")]
        text_with_placeholders: String,
    },
}

/// The scheduling phase of a card.
///
/// Maintained by the review subsystem; the sync engine carries it as
/// data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewPhase {
    /// Never reviewed.
    #[default]
    New,
    /// In the initial learning steps.
    Learning,
    /// Graduated into regular review.
    Review,
    /// Lapsed and being relearned.
    Relearning,
}

/// Spaced-repetition scheduling state carried on every card.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReviewState {
    /// When the card is next due.
    pub next_review_at: Option<DateTime<Utc>>,
    /// Memory stability estimate.
    pub stability: Option<f64>,
    /// Difficulty estimate in `[0, 10]`.
    pub difficulty: Option<f64>,
    /// Number of lapses.
    pub lapses: u32,
    /// Current scheduling phase.
    pub phase: ReviewPhase,
}

/// A study card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    /// The deck this card belongs to.
    pub deck: DeckRef,
    /// Front face content.
    pub front: Option<Vec<ContentBlock>>,
    /// Back face content.
    pub back: Option<Vec<ContentBlock>>,
    /// Raw cloze source text, if the card was authored as cloze.
    pub raw_cloze_text: Option<String>,
    /// Parsed cloze structure; opaque to the sync engine.
    pub cloze_data: Option<serde_json::Value>,
    /// Free-form tags.
    pub tags: Vec<String>,
    /// Scheduling state.
    pub review: ReviewState,
}

impl Card {
    /// Creates an empty card in the given deck.
    pub fn new(deck: DeckRef) -> Self {
        Self {
            deck,
            front: None,
            back: None,
            raw_cloze_text: None,
            cloze_data: None,
            tags: Vec::new(),
            review: ReviewState::default(),
        }
    }

    /// Returns true if the card has any face content or cloze text.
    #[must_use]
    pub fn has_content(&self) -> bool {
        self.front.as_ref().is_some_and(|b| !b.is_empty())
            || self.back.as_ref().is_some_and(|b| !b.is_empty())
            || self
                .raw_cloze_text
                .as_ref()
                .is_some_and(|t| !t.trim().is_empty())
    }
}
