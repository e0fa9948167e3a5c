//! The local record store.

use crate::backend::KeyValueBackend;
use crate::error::StoreResult;
use chrono::{DateTime, Utc};
use recall_model::{Card, Deck, ServerId, TempId, Tracked};
use std::collections::HashMap;
use tracing::debug;

const DECKS_KEY: &str = "sync/decks";
const CARDS_KEY: &str = "sync/cards";
const WATERMARK_KEY: &str = "sync/watermark";
const ID_MAP_KEY: &str = "sync/id_map";

/// The authoritative local view of every deck and card.
///
/// State is loaded from the backend on open, before any mutation is
/// accepted, and every mutating call persists before returning. The
/// store also keeps the sync watermark and the map of temporary ids
/// that earlier push cycles resolved to server ids (consulted when a
/// card still references its parent deck by temporary id).
pub struct RecordStore<B> {
    backend: B,
    decks: Vec<Tracked<Deck>>,
    cards: Vec<Tracked<Card>>,
    watermark: Option<DateTime<Utc>>,
    id_map: HashMap<TempId, ServerId>,
}

impl<B: KeyValueBackend> RecordStore<B> {
    /// Opens the store, loading any persisted state from the backend.
    pub fn open(backend: B) -> StoreResult<Self> {
        let decks: Vec<Tracked<Deck>> = load_key(&backend, DECKS_KEY)?.unwrap_or_default();
        let cards: Vec<Tracked<Card>> = load_key(&backend, CARDS_KEY)?.unwrap_or_default();
        let watermark = load_key(&backend, WATERMARK_KEY)?.unwrap_or_default();
        let id_map = load_key(&backend, ID_MAP_KEY)?.unwrap_or_default();

        debug!(
            decks = decks.len(),
            cards = cards.len(),
            "loaded record store"
        );

        Ok(Self {
            backend,
            decks,
            cards,
            watermark,
            id_map,
        })
    }

    /// All tracked decks, including soft-deleted ones pending push.
    #[must_use]
    pub fn decks(&self) -> &[Tracked<Deck>] {
        &self.decks
    }

    /// All tracked cards, including soft-deleted ones pending push.
    #[must_use]
    pub fn cards(&self) -> &[Tracked<Card>] {
        &self.cards
    }

    /// The watermark of the last completed sync cycle.
    #[must_use]
    pub fn watermark(&self) -> Option<DateTime<Utc>> {
        self.watermark
    }

    /// Resolved temporary-to-server id mappings from earlier cycles.
    #[must_use]
    pub fn id_map(&self) -> &HashMap<TempId, ServerId> {
        &self.id_map
    }

    /// Inserts or replaces a deck, matching on record identity.
    pub fn upsert_deck(&mut self, rec: Tracked<Deck>) -> StoreResult<()> {
        upsert(&mut self.decks, rec);
        self.persist_decks()
    }

    /// Inserts or replaces a card, matching on record identity.
    pub fn upsert_card(&mut self, rec: Tracked<Card>) -> StoreResult<()> {
        upsert(&mut self.cards, rec);
        self.persist_cards()
    }

    /// Removes all decks matching the predicate; returns how many.
    pub fn remove_decks_where<F>(&mut self, mut pred: F) -> StoreResult<usize>
    where
        F: FnMut(&Tracked<Deck>) -> bool,
    {
        let before = self.decks.len();
        self.decks.retain(|d| !pred(d));
        let removed = before - self.decks.len();
        if removed > 0 {
            self.persist_decks()?;
        }
        Ok(removed)
    }

    /// Removes all cards matching the predicate; returns how many.
    pub fn remove_cards_where<F>(&mut self, mut pred: F) -> StoreResult<usize>
    where
        F: FnMut(&Tracked<Card>) -> bool,
    {
        let before = self.cards.len();
        self.cards.retain(|c| !pred(c));
        let removed = before - self.cards.len();
        if removed > 0 {
            self.persist_cards()?;
        }
        Ok(removed)
    }

    /// Replaces the whole working set in one step.
    ///
    /// Used by the reconciler at the end of a sync cycle.
    pub fn replace(
        &mut self,
        decks: Vec<Tracked<Deck>>,
        cards: Vec<Tracked<Card>>,
    ) -> StoreResult<()> {
        self.decks = decks;
        self.cards = cards;
        self.persist_decks()?;
        self.persist_cards()
    }

    /// Advances the watermark after a completed cycle.
    pub fn set_watermark(&mut self, watermark: DateTime<Utc>) -> StoreResult<()> {
        self.watermark = Some(watermark);
        self.backend
            .put(WATERMARK_KEY, serde_json::to_string(&self.watermark)?)?;
        Ok(())
    }

    /// Records a resolved temporary-to-server id mapping.
    pub fn record_id_mapping(&mut self, temp: TempId, server: ServerId) -> StoreResult<()> {
        self.id_map.insert(temp, server);
        self.backend
            .put(ID_MAP_KEY, serde_json::to_string(&self.id_map)?)?;
        Ok(())
    }

    /// Records several resolved id mappings at once.
    pub fn record_id_mappings(
        &mut self,
        mappings: impl IntoIterator<Item = (TempId, ServerId)>,
    ) -> StoreResult<()> {
        let mut changed = false;
        for (temp, server) in mappings {
            self.id_map.insert(temp, server);
            changed = true;
        }
        if changed {
            self.backend
                .put(ID_MAP_KEY, serde_json::to_string(&self.id_map)?)?;
        }
        Ok(())
    }

    fn persist_decks(&mut self) -> StoreResult<()> {
        self.backend
            .put(DECKS_KEY, serde_json::to_string(&self.decks)?)?;
        Ok(())
    }

    fn persist_cards(&mut self) -> StoreResult<()> {
        self.backend
            .put(CARDS_KEY, serde_json::to_string(&self.cards)?)?;
        Ok(())
    }
}

fn load_key<B: KeyValueBackend, T: serde::de::DeserializeOwned>(
    backend: &B,
    key: &str,
) -> StoreResult<Option<T>> {
    match backend.get(key)? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

fn upsert<T>(records: &mut Vec<Tracked<T>>, rec: Tracked<T>) {
    match records.iter_mut().find(|r| r.id == rec.id) {
        Some(slot) => *slot = rec,
        None => records.push(rec),
    }
}
