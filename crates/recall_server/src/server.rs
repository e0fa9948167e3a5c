//! The in-memory sync server.

use crate::time::TimeSource;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use recall_model::TempId;
use recall_protocol::{
    CardRecord, ConflictInfo, ConflictKind, DeckRecord, PullResponse, PushRequest, PushResponse,
};
use std::collections::HashMap;

#[derive(Default)]
struct ServerState {
    decks: Vec<DeckRecord>,
    cards: Vec<CardRecord>,
    next_deck_id: i64,
    next_card_id: i64,
    // Token registries make creation replays idempotent.
    deck_tokens: HashMap<TempId, i64>,
    card_tokens: HashMap<TempId, i64>,
}

/// An in-memory authoritative store speaking the Recall sync protocol.
///
/// # Example
///
/// ```
/// use recall_server::SyncServer;
///
/// let server = SyncServer::new();
/// let snapshot = server.handle_pull(None);
/// assert!(snapshot.decks.is_empty());
/// ```
pub struct SyncServer {
    state: Mutex<ServerState>,
    time: TimeSource,
}

impl SyncServer {
    /// Creates a server using wall-clock time.
    #[must_use]
    pub fn new() -> Self {
        Self::with_time(TimeSource::System)
    }

    /// Creates a server with an explicit time source.
    #[must_use]
    pub fn with_time(time: TimeSource) -> Self {
        Self {
            state: Mutex::new(ServerState {
                next_deck_id: 1,
                next_card_id: 1,
                ..ServerState::default()
            }),
            time,
        }
    }

    /// Moves a manual time source forward.
    pub fn set_time(&self, now: DateTime<Utc>) {
        self.time.set(now);
    }

    /// Handles a pull: full snapshot when `since` is absent, otherwise
    /// every record (tombstones included) with `updated_at > since`.
    pub fn handle_pull(&self, since: Option<DateTime<Utc>>) -> PullResponse {
        let state = self.state.lock();
        let newer = |updated_at: DateTime<Utc>| since.is_none_or(|s| updated_at > s);

        let decks = state
            .decks
            .iter()
            .filter(|d| newer(d.updated_at))
            .cloned()
            .collect();
        let cards = state
            .cards
            .iter()
            .filter(|c| newer(c.updated_at))
            .cloned()
            .collect();

        PullResponse::new(self.time.now(), decks, cards)
    }

    /// Handles a push: creations first (decks before cards, so
    /// `deck_token` references resolve within the batch), then updates.
    pub fn handle_push(&self, request: &PushRequest) -> PushResponse {
        let mut state = self.state.lock();
        let now = self.time.now();
        let mut response = PushResponse::default();

        for create in &request.new_decks {
            let mut created = match state.deck_tokens.get(&create.client_token).copied() {
                // Replay of a push we already applied: echo the
                // original record, do not create a duplicate.
                Some(id) => match state.decks.iter().find(|d| d.id == id) {
                    Some(existing) => existing.clone(),
                    None => continue,
                },
                None => {
                    let id = state.next_deck_id;
                    state.next_deck_id += 1;
                    state.deck_tokens.insert(create.client_token, id);
                    let record = DeckRecord {
                        id,
                        client_token: None,
                        name: create.name.clone(),
                        description: create.description.clone(),
                        created_at: now,
                        updated_at: now,
                        is_deleted: false,
                        deleted_at: None,
                    };
                    state.decks.push(record.clone());
                    record
                }
            };
            created.client_token = Some(create.client_token);
            response.created_decks.push(created);
        }

        for create in &request.new_cards {
            let deck_id = if create.deck_id > 0 {
                Some(create.deck_id)
            } else {
                create
                    .deck_token
                    .and_then(|token| state.deck_tokens.get(&token).copied())
            };
            let Some(deck_id) = deck_id.filter(|id| state.decks.iter().any(|d| d.id == *id)) else {
                response.conflicts.push(ConflictInfo {
                    kind: ConflictKind::CardCreation,
                    id: 0,
                    identifier: None,
                    message: "card references an unknown deck".into(),
                });
                continue;
            };

            let mut created = match state.card_tokens.get(&create.client_token).copied() {
                Some(id) => match state.cards.iter().find(|c| c.id == id) {
                    Some(existing) => existing.clone(),
                    None => continue,
                },
                None => {
                    let id = state.next_card_id;
                    state.next_card_id += 1;
                    state.card_tokens.insert(create.client_token, id);
                    let record = CardRecord {
                        id,
                        client_token: None,
                        deck_id,
                        deck_token: None,
                        front_content: create.front_content.clone(),
                        back_content: create.back_content.clone(),
                        raw_cloze_text: create.raw_cloze_text.clone(),
                        cloze_data: create.cloze_data.clone(),
                        tags: create.tags.clone(),
                        next_review_at: create.next_review_at,
                        fsrs_stability: create.fsrs_stability,
                        fsrs_difficulty: create.fsrs_difficulty,
                        fsrs_lapses: create.fsrs_lapses,
                        fsrs_state: create.fsrs_state,
                        created_at: now,
                        updated_at: now,
                        is_deleted: false,
                        deleted_at: None,
                    };
                    state.cards.push(record.clone());
                    record
                }
            };
            created.client_token = Some(create.client_token);
            response.created_cards.push(created);
        }

        for update in &request.updated_decks {
            match state.decks.iter_mut().find(|d| d.id == update.id) {
                None => response.conflicts.push(ConflictInfo {
                    kind: ConflictKind::Deck,
                    id: update.id,
                    identifier: Some(update.name.clone()),
                    message: "deck does not exist on the server".into(),
                }),
                Some(existing) if existing.is_deleted && !update.is_deleted => {
                    response.conflicts.push(ConflictInfo {
                        kind: ConflictKind::Deck,
                        id: update.id,
                        identifier: Some(update.name.clone()),
                        message: "deck was deleted on the server".into(),
                    });
                }
                Some(existing) if existing.updated_at > update.updated_at => {
                    response.conflicts.push(ConflictInfo {
                        kind: ConflictKind::Deck,
                        id: update.id,
                        identifier: Some(update.name.clone()),
                        message: "a newer version exists on the server".into(),
                    });
                }
                Some(existing) => {
                    existing.name = update.name.clone();
                    existing.description = update.description.clone();
                    existing.is_deleted = update.is_deleted;
                    existing.deleted_at = update.deleted_at.or(update.is_deleted.then_some(now));
                    existing.updated_at = now;
                }
            }
        }

        for update in &request.updated_cards {
            match state.cards.iter_mut().find(|c| c.id == update.id) {
                None => response.conflicts.push(ConflictInfo {
                    kind: ConflictKind::Card,
                    id: update.id,
                    identifier: None,
                    message: "card does not exist on the server".into(),
                }),
                Some(existing) if existing.is_deleted && !update.is_deleted => {
                    response.conflicts.push(ConflictInfo {
                        kind: ConflictKind::Card,
                        id: update.id,
                        identifier: None,
                        message: "card was deleted on the server".into(),
                    });
                }
                Some(existing) if existing.updated_at > update.updated_at => {
                    response.conflicts.push(ConflictInfo {
                        kind: ConflictKind::Card,
                        id: update.id,
                        identifier: None,
                        message: "a newer version exists on the server".into(),
                    });
                }
                Some(existing) => {
                    existing.deck_id = if update.deck_id > 0 {
                        update.deck_id
                    } else {
                        existing.deck_id
                    };
                    existing.front_content = update.front_content.clone();
                    existing.back_content = update.back_content.clone();
                    existing.raw_cloze_text = update.raw_cloze_text.clone();
                    existing.cloze_data = update.cloze_data.clone();
                    existing.tags = update.tags.clone();
                    existing.next_review_at = update.next_review_at;
                    existing.fsrs_stability = update.fsrs_stability;
                    existing.fsrs_difficulty = update.fsrs_difficulty;
                    existing.fsrs_lapses = update.fsrs_lapses;
                    existing.fsrs_state = update.fsrs_state;
                    existing.is_deleted = update.is_deleted;
                    existing.deleted_at = update.deleted_at.or(update.is_deleted.then_some(now));
                    existing.updated_at = now;
                }
            }
        }

        response
    }

    /// Number of decks on the server, tombstones included.
    #[must_use]
    pub fn deck_count(&self) -> usize {
        self.state.lock().decks.len()
    }

    /// Number of cards on the server, tombstones included.
    #[must_use]
    pub fn card_count(&self) -> usize {
        self.state.lock().cards.len()
    }

    /// Snapshot of every deck on the server.
    #[must_use]
    pub fn decks(&self) -> Vec<DeckRecord> {
        self.state.lock().decks.clone()
    }

    /// Snapshot of every card on the server.
    #[must_use]
    pub fn cards(&self) -> Vec<CardRecord> {
        self.state.lock().cards.clone()
    }
}

impl Default for SyncServer {
    fn default() -> Self {
        Self::new()
    }
}
