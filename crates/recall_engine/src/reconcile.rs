//! The reconciler: merges pulled server state with pending local work.

use chrono::{DateTime, Utc};
use recall_model::{Card, Deck, DeckRef, ServerId, TempId, Tracked};
use recall_protocol::{
    CardCreate, CardRecord, DeckCreate, DeckRecord, ProtocolResult, PullResponse, PushRequest,
};
use std::collections::{BTreeMap, HashMap};

/// Whether a pull covered the whole store or only a delta.
///
/// The distinction decides what the absence of a record means: a
/// record missing from a *full* snapshot no longer exists on the
/// server, while a record missing from an incremental delta is merely
/// unchanged. Conflating the two either resurrects deleted records or
/// silently drops live ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullKind {
    /// The pull had no watermark; every live record was returned.
    Full,
    /// The pull returned only records changed since the watermark.
    Delta,
}

/// The result of reconciling one pull against local state.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileOutcome {
    /// The merged deck set that becomes the new local store contents.
    pub decks: Vec<Tracked<Deck>>,
    /// The merged card set.
    pub cards: Vec<Tracked<Card>>,
    /// The outbound payload derived from the merged sets.
    pub push: PushRequest,
}

/// Merges the local working set with a pull response.
///
/// Pure and deterministic: no clock, no I/O, no randomness. Running it
/// twice over its own output yields the same outcome, which is what
/// makes a partially failed cycle safe to retry.
///
/// The merge policy is last-local-write-wins-until-pushed: a record
/// with pending local changes is never overwritten by a concurrently
/// pulled version, it is carried into the push payload instead.
pub fn reconcile(
    local_decks: &[Tracked<Deck>],
    local_cards: &[Tracked<Card>],
    pull: &PullResponse,
    kind: PullKind,
    id_map: &HashMap<TempId, ServerId>,
) -> ProtocolResult<ReconcileOutcome> {
    let server_decks = pull
        .decks
        .iter()
        .cloned()
        .map(DeckRecord::try_into_tracked)
        .collect::<ProtocolResult<Vec<_>>>()?;
    let server_cards = pull
        .cards
        .iter()
        .cloned()
        .map(CardRecord::try_into_tracked)
        .collect::<ProtocolResult<Vec<_>>>()?;

    let decks = merge(local_decks, server_decks, kind);
    let mut cards = merge(local_cards, server_cards, kind);

    // Parent decks created in earlier cycles may have resolved to
    // numeric ids since this card was written; rewrite before the push
    // payload is built.
    for card in &mut cards {
        if let DeckRef::Temp(token) = card.entity.deck {
            if let Some(&server_id) = id_map.get(&token) {
                card.entity.deck = DeckRef::Server(server_id);
            }
        }
    }

    let push = build_push(&decks, &cards, pull.server_timestamp);

    Ok(ReconcileOutcome { decks, cards, push })
}

/// Per-entity merge, run once for decks and once for cards.
fn merge<T: Clone>(
    local: &[Tracked<T>],
    server: Vec<Tracked<T>>,
    kind: PullKind,
) -> Vec<Tracked<T>> {
    // BTreeMap keeps the "new from server" suffix in id order, so the
    // merge output is deterministic.
    let mut remaining: BTreeMap<i64, Tracked<T>> = server
        .into_iter()
        .filter_map(|r| r.server_id().map(|id| (id.as_i64(), r)))
        .collect();

    let mut out = Vec::with_capacity(local.len() + remaining.len());

    for rec in local {
        let Some(server_id) = rec.server_id() else {
            // Pending creation; it has no server counterpart yet.
            out.push(rec.clone());
            continue;
        };

        match remaining.remove(&server_id.as_i64()) {
            Some(server_rec) => {
                if server_rec.updated_at > rec.updated_at && !rec.has_pending_changes() {
                    // Server wins on a clean record. Tombstones leave
                    // the working set instead of being adopted.
                    if !server_rec.deleted {
                        out.push(server_rec);
                    }
                } else if rec.has_pending_changes() {
                    // Pending local work always survives a pull; it
                    // goes out with the next push.
                    out.push(rec.clone());
                } else {
                    let mut kept = rec.clone();
                    kept.mark_synced();
                    out.push(kept);
                }
            }
            None => {
                if rec.has_pending_changes() {
                    out.push(rec.clone());
                } else {
                    match kind {
                        // Absent from a delta: unchanged on the server.
                        PullKind::Delta => {
                            let mut kept = rec.clone();
                            kept.mark_synced();
                            out.push(kept);
                        }
                        // Absent from a full snapshot: gone remotely.
                        PullKind::Full => {}
                    }
                }
            }
        }
    }

    // Records this client has never seen. Live ones join the working
    // set; tombstones are omitted entirely.
    for (_, server_rec) in remaining {
        if !server_rec.deleted {
            out.push(server_rec);
        }
    }

    out
}

fn build_push(
    decks: &[Tracked<Deck>],
    cards: &[Tracked<Card>],
    server_timestamp: DateTime<Utc>,
) -> PushRequest {
    PushRequest {
        client_timestamp: Some(server_timestamp),
        new_decks: decks
            .iter()
            .filter(|d| d.is_new() && !d.deleted)
            .filter_map(DeckCreate::from_tracked)
            .collect(),
        new_cards: cards
            .iter()
            .filter(|c| c.is_new() && !c.deleted)
            .filter_map(CardCreate::from_tracked)
            .collect(),
        updated_decks: decks
            .iter()
            .filter(|d| d.server_id().is_some() && (d.is_dirty() || d.deleted))
            .map(DeckRecord::from_tracked)
            .collect(),
        updated_cards: cards
            .iter()
            .filter(|c| c.server_id().is_some() && (c.is_dirty() || c.deleted))
            .map(CardRecord::from_tracked)
            .collect(),
    }
}
