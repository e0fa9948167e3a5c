//! The deck entity.

use serde::{Deserialize, Serialize};

/// A deck of study cards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deck {
    /// Display name; unique among non-deleted decks.
    pub name: String,
    /// Optional free-form description.
    pub description: Option<String>,
}

impl Deck {
    /// Creates a deck with the given name and no description.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}
