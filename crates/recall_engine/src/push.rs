//! Applying the server's answer to a push.

use recall_model::{Card, Deck, DeckRef, ServerId, TempId, Tracked};
use recall_protocol::{ConflictKind, ProtocolError, ProtocolResult, PushResponse};
use std::collections::{HashMap, HashSet};

/// What a push response did to the working set.
#[derive(Debug, Default)]
pub struct PushApplication {
    /// Deck creations confirmed by this push: temporary id to assigned
    /// server id. Persisted so later cycles can rewrite card references
    /// that still use the temporary id.
    pub resolved_decks: HashMap<TempId, ServerId>,
    /// Card creations confirmed by this push. Nothing references card
    /// temporary ids, but the mapping lets callers correlate records
    /// whose identity changed under them.
    pub resolved_cards: HashMap<TempId, ServerId>,
    /// Conflicts reported by the server. Non-fatal; the named records
    /// keep their dirty state for a manual follow-up.
    pub conflicts: Vec<recall_protocol::ConflictInfo>,
}

/// Applies a push response to the merged working set.
///
/// Created records are matched to local pending creations by exact
/// `client_token` equality, never by content. Acknowledged updates
/// become clean; acknowledged deletions leave the working set; records
/// the server reported as conflicted are left untouched.
pub fn apply_push_response(
    decks: &mut Vec<Tracked<Deck>>,
    cards: &mut Vec<Tracked<Card>>,
    response: &PushResponse,
) -> ProtocolResult<PushApplication> {
    let mut resolved_decks = HashMap::new();

    for created in &response.created_decks {
        let token = created
            .client_token
            .ok_or(ProtocolError::MissingClientToken { kind: "deck" })?;
        let adopted = created.clone().try_into_tracked()?;
        resolved_decks.insert(token, ServerId::new(created.id));

        // A replayed creation may no longer have a local counterpart;
        // the mapping is still worth recording.
        if let Some(slot) = decks.iter_mut().find(|d| d.temp_id() == Some(token)) {
            *slot = adopted;
        }
    }

    let mut resolved_cards = HashMap::new();

    for created in &response.created_cards {
        let token = created
            .client_token
            .ok_or(ProtocolError::MissingClientToken { kind: "card" })?;
        let adopted = created.clone().try_into_tracked()?;
        resolved_cards.insert(token, ServerId::new(created.id));
        if let Some(slot) = cards.iter_mut().find(|c| c.temp_id() == Some(token)) {
            *slot = adopted;
        }
    }

    let deck_conflicts: HashSet<i64> = response
        .conflicts
        .iter()
        .filter(|c| c.kind == ConflictKind::Deck)
        .map(|c| c.id)
        .collect();
    let card_conflicts: HashSet<i64> = response
        .conflicts
        .iter()
        .filter(|c| c.kind == ConflictKind::Card)
        .map(|c| c.id)
        .collect();

    settle(decks, &deck_conflicts);
    settle(cards, &card_conflicts);

    // Cards referencing a deck whose creation this push confirmed are
    // rewritten to the numeric id, whether the card itself is new or
    // pre-existing.
    for card in cards.iter_mut() {
        if let DeckRef::Temp(token) = card.entity.deck {
            if let Some(&server_id) = resolved_decks.get(&token) {
                card.entity.deck = DeckRef::Server(server_id);
            }
        }
    }

    Ok(PushApplication {
        resolved_decks,
        resolved_cards,
        conflicts: response.conflicts.clone(),
    })
}

/// Clears pushed records that the server accepted: deletions leave the
/// set, updates become clean, conflicted records stay dirty.
fn settle<T>(records: &mut Vec<Tracked<T>>, conflicted: &HashSet<i64>) {
    records.retain_mut(|rec| {
        let Some(server_id) = rec.server_id() else {
            // Still pending creation (the server rejected or never saw
            // it); it will be retried next cycle.
            return true;
        };
        if conflicted.contains(&server_id.as_i64()) {
            return true;
        }
        if rec.deleted {
            // Acknowledged soft-delete: the active set never holds
            // tombstones.
            return false;
        }
        if rec.is_dirty() {
            rec.mark_synced();
        }
        true
    });
}
