//! The mutation API.
//!
//! These operations are what the UI (and the review subsystem) calls.
//! They are synchronous, touch only the local store, and never block on
//! the network; a sync cycle later carries the results to the server.

use crate::error::MutationError;
use chrono::{DateTime, Utc};
use recall_model::{
    find_record, Card, ContentBlock, Deck, DeckRef, RecordId, RecordKey, ReviewState, TempId,
    Tracked,
};
use recall_store::{KeyValueBackend, RecordStore};

const MAX_NAME_LEN: usize = 100;
const MAX_DESCRIPTION_LEN: usize = 1000;

/// Payload for creating a deck.
#[derive(Debug, Clone)]
pub struct NewDeck {
    /// Deck name; required, unique among non-deleted decks.
    pub name: String,
    /// Optional description.
    pub description: Option<String>,
}

/// Payload for creating a card.
#[derive(Debug, Clone, Default)]
pub struct NewCard {
    /// Front face content.
    pub front: Option<Vec<ContentBlock>>,
    /// Back face content.
    pub back: Option<Vec<ContentBlock>>,
    /// Raw cloze source text.
    pub raw_cloze_text: Option<String>,
    /// Parsed cloze structure.
    pub cloze_data: Option<serde_json::Value>,
    /// Free-form tags.
    pub tags: Vec<String>,
}

/// Partial update for a deck. `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct DeckPatch {
    /// New name.
    pub name: Option<String>,
    /// New description.
    pub description: Option<String>,
}

/// Partial update for a card. `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct CardPatch {
    /// New front face content.
    pub front: Option<Vec<ContentBlock>>,
    /// New back face content.
    pub back: Option<Vec<ContentBlock>>,
    /// New raw cloze text.
    pub raw_cloze_text: Option<String>,
    /// New cloze structure.
    pub cloze_data: Option<serde_json::Value>,
    /// New tags.
    pub tags: Option<Vec<String>>,
    /// New scheduling state; written by the review subsystem after a
    /// card is graded.
    pub review: Option<ReviewState>,
}

fn validate_deck_name<B: KeyValueBackend>(
    store: &RecordStore<B>,
    name: &str,
    own_id: Option<RecordId>,
) -> Result<(), MutationError> {
    if name.trim().is_empty() {
        return Err(MutationError::validation("name", "must not be empty"));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(MutationError::validation(
            "name",
            format!("must be at most {MAX_NAME_LEN} characters"),
        ));
    }
    let duplicate = store
        .decks()
        .iter()
        .any(|d| !d.deleted && d.entity.name == name && Some(d.id) != own_id);
    if duplicate {
        return Err(MutationError::validation(
            "name",
            format!("a deck named '{name}' already exists"),
        ));
    }
    Ok(())
}

fn validate_description(description: &Option<String>) -> Result<(), MutationError> {
    if let Some(desc) = description {
        if desc.chars().count() > MAX_DESCRIPTION_LEN {
            return Err(MutationError::validation(
                "description",
                format!("must be at most {MAX_DESCRIPTION_LEN} characters"),
            ));
        }
    }
    Ok(())
}

fn not_found(kind: &'static str, key: RecordKey) -> MutationError {
    let key = match key {
        RecordKey::Server(id) => id.to_string(),
        RecordKey::Temp(id) => id.to_string(),
    };
    MutationError::NotFound { kind, key }
}

pub(crate) fn create_deck<B: KeyValueBackend>(
    store: &mut RecordStore<B>,
    payload: NewDeck,
    now: DateTime<Utc>,
) -> Result<Tracked<Deck>, MutationError> {
    validate_deck_name(store, &payload.name, None)?;
    validate_description(&payload.description)?;

    let rec = Tracked::fresh(
        Deck {
            name: payload.name,
            description: payload.description,
        },
        TempId::generate(),
        now,
    );
    store.upsert_deck(rec.clone())?;
    Ok(rec)
}

pub(crate) fn create_card<B: KeyValueBackend>(
    store: &mut RecordStore<B>,
    deck: RecordKey,
    payload: NewCard,
    now: DateTime<Utc>,
) -> Result<Tracked<Card>, MutationError> {
    let parent = find_record(store.decks(), deck)
        .filter(|d| !d.deleted)
        .ok_or(not_found("deck", deck))?;
    let deck_ref = match parent.id {
        RecordId::Server(id) => DeckRef::Server(id),
        RecordId::Temp(id) => DeckRef::Temp(id),
    };

    let card = Card {
        deck: deck_ref,
        front: payload.front,
        back: payload.back,
        raw_cloze_text: payload.raw_cloze_text,
        cloze_data: payload.cloze_data,
        tags: payload.tags,
        review: ReviewState {
            next_review_at: Some(now),
            ..ReviewState::default()
        },
    };
    if !card.has_content() {
        return Err(MutationError::validation(
            "content",
            "card needs front/back content or cloze text",
        ));
    }

    let rec = Tracked::fresh(card, TempId::generate(), now);
    store.upsert_card(rec.clone())?;
    Ok(rec)
}

pub(crate) fn update_deck<B: KeyValueBackend>(
    store: &mut RecordStore<B>,
    key: RecordKey,
    patch: DeckPatch,
    now: DateTime<Utc>,
) -> Result<Tracked<Deck>, MutationError> {
    let mut rec = find_record(store.decks(), key)
        .filter(|d| !d.deleted)
        .ok_or(not_found("deck", key))?
        .clone();

    if let Some(name) = &patch.name {
        validate_deck_name(store, name, Some(rec.id))?;
    }
    validate_description(&patch.description)?;

    if let Some(name) = patch.name {
        rec.entity.name = name;
    }
    if let Some(description) = patch.description {
        rec.entity.description = Some(description);
    }
    rec.mark_edited(now);
    store.upsert_deck(rec.clone())?;
    Ok(rec)
}

pub(crate) fn update_card<B: KeyValueBackend>(
    store: &mut RecordStore<B>,
    key: RecordKey,
    patch: CardPatch,
    now: DateTime<Utc>,
) -> Result<Tracked<Card>, MutationError> {
    let mut rec = find_record(store.cards(), key)
        .filter(|c| !c.deleted)
        .ok_or(not_found("card", key))?
        .clone();

    if let Some(front) = patch.front {
        rec.entity.front = Some(front);
    }
    if let Some(back) = patch.back {
        rec.entity.back = Some(back);
    }
    if let Some(raw) = patch.raw_cloze_text {
        rec.entity.raw_cloze_text = Some(raw);
    }
    if let Some(cloze) = patch.cloze_data {
        rec.entity.cloze_data = Some(cloze);
    }
    if let Some(tags) = patch.tags {
        rec.entity.tags = tags;
    }
    if let Some(review) = patch.review {
        rec.entity.review = review;
    }
    if !rec.entity.has_content() {
        return Err(MutationError::validation(
            "content",
            "card needs front/back content or cloze text",
        ));
    }

    rec.mark_edited(now);
    store.upsert_card(rec.clone())?;
    Ok(rec)
}

pub(crate) fn delete_deck<B: KeyValueBackend>(
    store: &mut RecordStore<B>,
    key: RecordKey,
    now: DateTime<Utc>,
) -> Result<(), MutationError> {
    let rec = find_record(store.decks(), key)
        .filter(|d| !d.deleted)
        .ok_or(not_found("deck", key))?
        .clone();

    match rec.id {
        // Never synced: purge the deck and its cards outright, no
        // network round trip. All cards of an unsynced deck are
        // themselves unsynced.
        RecordId::Temp(token) => {
            store.remove_cards_where(|c| c.entity.deck == DeckRef::Temp(token))?;
            store.remove_decks_where(|d| d.id == rec.id)?;
        }
        RecordId::Server(id) => {
            let mut deck = rec;
            deck.mark_deleted(now);
            store.upsert_deck(deck)?;

            // Cascade: unsynced cards are purged, synced ones are
            // soft-deleted so the server hears about them.
            let synced_cards: Vec<Tracked<Card>> = store
                .cards()
                .iter()
                .filter(|c| c.entity.deck == DeckRef::Server(id) && !c.deleted && !c.is_new())
                .cloned()
                .collect();
            store.remove_cards_where(|c| c.entity.deck == DeckRef::Server(id) && c.is_new())?;
            for mut card in synced_cards {
                card.mark_deleted(now);
                store.upsert_card(card)?;
            }
        }
    }
    Ok(())
}

pub(crate) fn delete_card<B: KeyValueBackend>(
    store: &mut RecordStore<B>,
    key: RecordKey,
    now: DateTime<Utc>,
) -> Result<(), MutationError> {
    let rec = find_record(store.cards(), key)
        .filter(|c| !c.deleted)
        .ok_or(not_found("card", key))?
        .clone();

    if rec.is_new() {
        store.remove_cards_where(|c| c.id == rec.id)?;
    } else {
        let mut card = rec;
        card.mark_deleted(now);
        store.upsert_card(card)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use recall_model::ServerId;
    use recall_store::MemoryBackend;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn store() -> RecordStore<MemoryBackend> {
        RecordStore::open(MemoryBackend::new()).unwrap()
    }

    fn new_deck(name: &str) -> NewDeck {
        NewDeck {
            name: name.into(),
            description: None,
        }
    }

    fn cloze_card() -> NewCard {
        NewCard {
            raw_cloze_text: Some("{{c1::agua}}".into()),
            ..NewCard::default()
        }
    }

    #[test]
    fn create_deck_rejects_blank_name() {
        let mut store = store();
        let err = create_deck(&mut store, new_deck("   "), at(1)).unwrap_err();
        assert!(matches!(err, MutationError::Validation { field: "name", .. }));
    }

    #[test]
    fn create_deck_rejects_overlong_name() {
        let mut store = store();
        let err = create_deck(&mut store, new_deck(&"x".repeat(101)), at(1)).unwrap_err();
        assert!(matches!(err, MutationError::Validation { field: "name", .. }));
    }

    #[test]
    fn create_deck_rejects_duplicate_name() {
        let mut store = store();
        create_deck(&mut store, new_deck("Spanish"), at(1)).unwrap();
        let err = create_deck(&mut store, new_deck("Spanish"), at(2)).unwrap_err();
        assert!(matches!(err, MutationError::Validation { field: "name", .. }));
    }

    #[test]
    fn deleted_deck_does_not_block_name_reuse() {
        let mut store = store();
        let mut rec = Tracked::synced(Deck::new("Spanish"), ServerId::new(1), at(1), at(1));
        rec.mark_deleted(at(2));
        store.upsert_deck(rec).unwrap();

        assert!(create_deck(&mut store, new_deck("Spanish"), at(3)).is_ok());
    }

    #[test]
    fn created_deck_is_new_with_temp_id() {
        let mut store = store();
        let rec = create_deck(&mut store, new_deck("Spanish"), at(1)).unwrap();
        assert!(rec.is_new());
        assert!(rec.temp_id().is_some());
        assert_eq!(rec.created_at, at(1));
        assert_eq!(store.decks().len(), 1);
    }

    #[test]
    fn create_card_requires_existing_deck() {
        let mut store = store();
        let err = create_card(
            &mut store,
            RecordKey::Server(ServerId::new(99)),
            cloze_card(),
            at(1),
        )
        .unwrap_err();
        assert!(matches!(err, MutationError::NotFound { kind: "deck", .. }));
    }

    #[test]
    fn create_card_requires_content() {
        let mut store = store();
        let deck = create_deck(&mut store, new_deck("Spanish"), at(1)).unwrap();
        let err = create_card(
            &mut store,
            deck.temp_id().unwrap().into(),
            NewCard::default(),
            at(2),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            MutationError::Validation {
                field: "content",
                ..
            }
        ));
    }

    #[test]
    fn create_card_links_unsynced_parent_by_token() {
        let mut store = store();
        let deck = create_deck(&mut store, new_deck("Spanish"), at(1)).unwrap();
        let card = create_card(&mut store, deck.temp_id().unwrap().into(), cloze_card(), at(2))
            .unwrap();
        assert_eq!(card.entity.deck, DeckRef::Temp(deck.temp_id().unwrap()));
    }

    #[test]
    fn update_keeps_new_record_new() {
        let mut store = store();
        let deck = create_deck(&mut store, new_deck("Spanish"), at(1)).unwrap();
        let updated = update_deck(
            &mut store,
            deck.temp_id().unwrap().into(),
            DeckPatch {
                name: Some("Spanish A1".into()),
                ..DeckPatch::default()
            },
            at(5),
        )
        .unwrap();
        assert!(updated.is_new());
        assert!(!updated.is_dirty());
        assert_eq!(updated.updated_at, at(5));
    }

    #[test]
    fn update_dirties_synced_record() {
        let mut store = store();
        store
            .upsert_deck(Tracked::synced(
                Deck::new("Spanish"),
                ServerId::new(7),
                at(1),
                at(1),
            ))
            .unwrap();

        let updated = update_deck(
            &mut store,
            RecordKey::Server(ServerId::new(7)),
            DeckPatch {
                description: Some("A1 vocabulary".into()),
                ..DeckPatch::default()
            },
            at(5),
        )
        .unwrap();
        assert!(updated.is_dirty());
    }

    #[test]
    fn update_unknown_key_is_not_found() {
        let mut store = store();
        let err = update_deck(
            &mut store,
            RecordKey::Server(ServerId::new(1)),
            DeckPatch::default(),
            at(1),
        )
        .unwrap_err();
        assert!(matches!(err, MutationError::NotFound { .. }));
    }

    #[test]
    fn review_grade_flows_through_card_patch() {
        let mut store = store();
        store
            .upsert_deck(Tracked::synced(
                Deck::new("Spanish"),
                ServerId::new(7),
                at(1),
                at(1),
            ))
            .unwrap();
        let card = create_card(
            &mut store,
            RecordKey::Server(ServerId::new(7)),
            cloze_card(),
            at(2),
        )
        .unwrap();

        let review = ReviewState {
            next_review_at: Some(at(100)),
            stability: Some(3.2),
            difficulty: Some(5.0),
            lapses: 0,
            phase: recall_model::ReviewPhase::Learning,
        };
        let updated = update_card(
            &mut store,
            card.temp_id().unwrap().into(),
            CardPatch {
                review: Some(review.clone()),
                ..CardPatch::default()
            },
            at(3),
        )
        .unwrap();
        assert_eq!(updated.entity.review, review);
    }

    #[test]
    fn delete_new_deck_purges_it_and_its_cards() {
        let mut store = store();
        let deck = create_deck(&mut store, new_deck("Spanish"), at(1)).unwrap();
        create_card(&mut store, deck.temp_id().unwrap().into(), cloze_card(), at(2)).unwrap();

        delete_deck(&mut store, deck.temp_id().unwrap().into(), at(3)).unwrap();
        assert!(store.decks().is_empty());
        assert!(store.cards().is_empty());
    }

    #[test]
    fn delete_synced_deck_soft_deletes_and_cascades() {
        let mut store = store();
        store
            .upsert_deck(Tracked::synced(
                Deck::new("Spanish"),
                ServerId::new(7),
                at(1),
                at(1),
            ))
            .unwrap();
        let synced_card = {
            let mut card = Card::new(DeckRef::Server(ServerId::new(7)));
            card.raw_cloze_text = Some("{{c1::sol}}".into());
            Tracked::synced(card, ServerId::new(21), at(1), at(1))
        };
        store.upsert_card(synced_card).unwrap();
        create_card(
            &mut store,
            RecordKey::Server(ServerId::new(7)),
            cloze_card(),
            at(2),
        )
        .unwrap();

        delete_deck(&mut store, RecordKey::Server(ServerId::new(7)), at(3)).unwrap();

        // Deck and synced card are soft-deleted and dirty; the
        // unsynced card is gone entirely
        assert_eq!(store.decks().len(), 1);
        assert!(store.decks()[0].deleted);
        assert!(store.decks()[0].is_dirty());
        assert_eq!(store.cards().len(), 1);
        assert!(store.cards()[0].deleted);
    }

    #[test]
    fn delete_new_card_purges_immediately() {
        let mut store = store();
        let deck = create_deck(&mut store, new_deck("Spanish"), at(1)).unwrap();
        let card = create_card(&mut store, deck.temp_id().unwrap().into(), cloze_card(), at(2))
            .unwrap();

        delete_card(&mut store, card.temp_id().unwrap().into(), at(3)).unwrap();
        assert!(store.cards().is_empty());
    }

    #[test]
    fn delete_synced_card_soft_deletes() {
        let mut store = store();
        let card = {
            let mut c = Card::new(DeckRef::Server(ServerId::new(7)));
            c.raw_cloze_text = Some("{{c1::sol}}".into());
            Tracked::synced(c, ServerId::new(21), at(1), at(1))
        };
        store.upsert_card(card).unwrap();

        delete_card(&mut store, RecordKey::Server(ServerId::new(21)), at(3)).unwrap();
        assert_eq!(store.cards().len(), 1);
        assert!(store.cards()[0].deleted);
        assert_eq!(store.cards()[0].deleted_at, Some(at(3)));
    }
}
