//! The sync engine state machine.

use crate::clock::{Clock, SystemClock};
use crate::config::SyncConfig;
use crate::error::{MutationError, SyncError, SyncResult};
use crate::mutate::{self, CardPatch, DeckPatch, NewCard, NewDeck};
use crate::push::apply_push_response;
use crate::reconcile::{reconcile, PullKind};
use crate::transport::SyncTransport;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use recall_model::{Card, Deck, DeckRef, RecordId, RecordKey, ServerId, SyncStatus, TempId, Tracked};
use recall_protocol::ConflictInfo;
use recall_store::{KeyValueBackend, RecordStore};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use tracing::{debug, info, warn};

/// The current phase of the sync engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// No cycle has run yet.
    Idle,
    /// Fetching the authoritative delta.
    Pulling,
    /// Merging pulled state with pending local work.
    Reconciling,
    /// Submitting local changes.
    Pushing,
    /// The last cycle completed.
    Synced,
    /// The last cycle aborted; see the last-error state.
    Error,
}

impl SyncPhase {
    /// Returns true while a cycle is actively running.
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            SyncPhase::Pulling | SyncPhase::Reconciling | SyncPhase::Pushing
        )
    }
}

/// Statistics about sync cycles.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Completed cycles.
    pub cycles_completed: u64,
    /// Records received across all pulls.
    pub records_pulled: u64,
    /// Records transmitted across all pushes.
    pub records_pushed: u64,
    /// Conflicts reported by the server.
    pub conflicts: u64,
    /// When the last cycle completed.
    pub last_synced_at: Option<DateTime<Utc>>,
    /// Message of the last cycle failure, cleared on success.
    ///
    /// Cycle errors are recorded here rather than thrown into the UI;
    /// callers observe this state.
    pub last_error: Option<String>,
}

/// Result of one completed sync cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
    /// Records received from the pull.
    pub pulled: u64,
    /// Records transmitted in the push (0 for a pull-only cycle).
    pub pushed: u64,
    /// Non-fatal conflicts reported by the server; the named records
    /// stay dirty until a user-directed follow-up.
    pub conflicts: Vec<ConflictInfo>,
    /// Whether this cycle ran a full (non-incremental) pull.
    pub full_resync: bool,
}

/// What a call to [`SyncEngine::sync`] did.
#[derive(Debug, Clone)]
pub enum SyncOutcome {
    /// Another cycle was already in flight; this call was a no-op.
    Skipped,
    /// A cycle ran to completion.
    Completed(CycleReport),
}

/// The offline-first sync engine.
///
/// Owns the local record store and every piece of sync state; the UI
/// reaches the data only through the read accessors and the mutation
/// API. One engine instance exists per local store.
pub struct SyncEngine<B: KeyValueBackend, T: SyncTransport> {
    config: SyncConfig,
    transport: T,
    clock: Box<dyn Clock>,
    store: RwLock<RecordStore<B>>,
    // Bumped by every mutation; lets the cycle detect stores that
    // changed while a network call was in flight.
    generation: AtomicU64,
    in_flight: AtomicBool,
    phase: RwLock<SyncPhase>,
    stats: RwLock<SyncStats>,
    cycles_since_full: AtomicU32,
}

impl<B: KeyValueBackend, T: SyncTransport> SyncEngine<B, T> {
    /// Creates an engine over an opened store, using wall-clock time.
    pub fn new(config: SyncConfig, store: RecordStore<B>, transport: T) -> Self {
        Self::with_clock(config, store, transport, SystemClock)
    }

    /// Creates an engine with an explicit clock.
    pub fn with_clock(
        config: SyncConfig,
        store: RecordStore<B>,
        transport: T,
        clock: impl Clock + 'static,
    ) -> Self {
        Self {
            config,
            transport,
            clock: Box::new(clock),
            store: RwLock::new(store),
            generation: AtomicU64::new(0),
            in_flight: AtomicBool::new(false),
            phase: RwLock::new(SyncPhase::Idle),
            stats: RwLock::new(SyncStats::default()),
            cycles_since_full: AtomicU32::new(0),
        }
    }

    // ---- read accessors -------------------------------------------------

    /// The active (non-deleted) decks, for rendering.
    pub fn decks(&self) -> Vec<Tracked<Deck>> {
        self.store
            .read()
            .decks()
            .iter()
            .filter(|d| !d.deleted)
            .cloned()
            .collect()
    }

    /// The active (non-deleted) cards, for rendering.
    pub fn cards(&self) -> Vec<Tracked<Card>> {
        self.store
            .read()
            .cards()
            .iter()
            .filter(|c| !c.deleted)
            .cloned()
            .collect()
    }

    /// The watermark of the last completed cycle.
    pub fn watermark(&self) -> Option<DateTime<Utc>> {
        self.store.read().watermark()
    }

    /// The current engine phase.
    pub fn phase(&self) -> SyncPhase {
        *self.phase.read()
    }

    /// A snapshot of the engine statistics.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// The last cycle failure, if the most recent cycle aborted.
    pub fn last_error(&self) -> Option<String> {
        self.stats.read().last_error.clone()
    }

    // ---- mutation API ---------------------------------------------------

    /// Creates a deck locally; it is pushed on the next cycle.
    pub fn create_deck(&self, payload: NewDeck) -> Result<Tracked<Deck>, MutationError> {
        let now = self.clock.now();
        let mut store = self.store.write();
        let rec = mutate::create_deck(&mut store, payload, now)?;
        self.generation.fetch_add(1, Ordering::SeqCst);
        Ok(rec)
    }

    /// Creates a card locally under the given deck.
    pub fn create_card(
        &self,
        deck: RecordKey,
        payload: NewCard,
    ) -> Result<Tracked<Card>, MutationError> {
        let now = self.clock.now();
        let mut store = self.store.write();
        let rec = mutate::create_card(&mut store, deck, payload, now)?;
        self.generation.fetch_add(1, Ordering::SeqCst);
        Ok(rec)
    }

    /// Applies a partial update to a deck.
    pub fn update_deck(
        &self,
        key: RecordKey,
        patch: DeckPatch,
    ) -> Result<Tracked<Deck>, MutationError> {
        let now = self.clock.now();
        let mut store = self.store.write();
        let rec = mutate::update_deck(&mut store, key, patch, now)?;
        self.generation.fetch_add(1, Ordering::SeqCst);
        Ok(rec)
    }

    /// Applies a partial update to a card.
    pub fn update_card(
        &self,
        key: RecordKey,
        patch: CardPatch,
    ) -> Result<Tracked<Card>, MutationError> {
        let now = self.clock.now();
        let mut store = self.store.write();
        let rec = mutate::update_card(&mut store, key, patch, now)?;
        self.generation.fetch_add(1, Ordering::SeqCst);
        Ok(rec)
    }

    /// Soft-deletes a deck (and its cards). A deck that was never
    /// synced is purged immediately with no network round trip.
    pub fn delete_deck(&self, key: RecordKey) -> Result<(), MutationError> {
        let now = self.clock.now();
        let mut store = self.store.write();
        mutate::delete_deck(&mut store, key, now)?;
        self.generation.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    /// Soft-deletes a card; purges it if it was never synced.
    pub fn delete_card(&self, key: RecordKey) -> Result<(), MutationError> {
        let now = self.clock.now();
        let mut store = self.store.write();
        mutate::delete_card(&mut store, key, now)?;
        self.generation.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    // ---- sync cycle -----------------------------------------------------

    /// Runs one sync cycle: pull, reconcile, push, apply.
    ///
    /// A call while a cycle is already in flight is a no-op (not
    /// queued). On failure the cycle aborts, the error is recorded as
    /// the engine's last-error state, and every pending local mutation
    /// is preserved unchanged; the merge is idempotent, so the next
    /// attempt converges to the same state.
    pub fn sync(&self) -> SyncResult<SyncOutcome> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("sync cycle already in flight, skipping");
            return Ok(SyncOutcome::Skipped);
        }

        let result = self.run_cycle();
        self.in_flight.store(false, Ordering::SeqCst);
        result
    }

    /// Runs [`sync`](Self::sync) with bounded retries on transient
    /// failures, backing off between attempts.
    pub fn sync_with_retry(&self) -> SyncResult<SyncOutcome> {
        let retry = self.config.retry.clone();
        let mut last_error = None;

        for attempt in 0..retry.max_attempts {
            if attempt > 0 {
                std::thread::sleep(retry.delay_for_attempt(attempt));
            }
            match self.sync() {
                Ok(outcome) => return Ok(outcome),
                Err(err) if err.is_retryable() && attempt + 1 < retry.max_attempts => {
                    last_error = Some(err);
                }
                Err(err) => return Err(err),
            }
        }

        Err(last_error.unwrap_or_else(|| SyncError::Protocol("no sync attempts made".into())))
    }

    fn run_cycle(&self) -> SyncResult<SyncOutcome> {
        let (since, kind) = {
            let store = self.store.read();
            let watermark = store.watermark();
            let full_due = watermark.is_none()
                || self
                    .config
                    .full_resync_interval
                    .is_some_and(|n| self.cycles_since_full.load(Ordering::SeqCst) >= n);
            if full_due {
                (None, PullKind::Full)
            } else {
                (watermark, PullKind::Delta)
            }
        };

        self.set_phase(SyncPhase::Pulling);
        let pull = match self.transport.pull(since) {
            Ok(pull) => pull,
            Err(err) => return self.fail(err),
        };
        let pulled = (pull.decks.len() + pull.cards.len()) as u64;

        self.set_phase(SyncPhase::Reconciling);
        let (snap_decks, snap_cards, id_map, generation) = {
            let store = self.store.read();
            (
                store.decks().to_vec(),
                store.cards().to_vec(),
                store.id_map().clone(),
                self.generation.load(Ordering::SeqCst),
            )
        };

        let outcome = match reconcile(&snap_decks, &snap_cards, &pull, kind, &id_map) {
            Ok(outcome) => outcome,
            Err(err) => return self.fail(err.into()),
        };

        // Commit the merged working set before pushing: if the push
        // fails, the pending records are still flagged and survive for
        // the next attempt.
        let no_resolutions = HashMap::new();
        let (mid_decks, mid_cards, mid_generation) = {
            let mut store = self.store.write();
            let (final_decks, final_cards) = if self.generation.load(Ordering::SeqCst) == generation
            {
                (outcome.decks.clone(), outcome.cards.clone())
            } else {
                // The UI mutated the store while the pull was in
                // flight; fold the cycle result around those edits.
                (
                    merge_back(store.decks(), &snap_decks, outcome.decks.clone(), &no_resolutions),
                    merge_back(store.cards(), &snap_cards, outcome.cards.clone(), &no_resolutions),
                )
            };
            if let Err(err) = store.replace(final_decks.clone(), final_cards.clone()) {
                return self.fail(err.into());
            }
            (
                final_decks,
                final_cards,
                self.generation.load(Ordering::SeqCst),
            )
        };

        if outcome.push.is_empty() {
            debug!("nothing to push, cycle is pull-only");
            {
                let mut store = self.store.write();
                if let Err(err) = store.set_watermark(pull.server_timestamp) {
                    return self.fail(err.into());
                }
            }
            return self.complete(kind, pulled, 0, Vec::new());
        }

        self.set_phase(SyncPhase::Pushing);
        let pushed = (outcome.push.new_decks.len()
            + outcome.push.new_cards.len()
            + outcome.push.updated_decks.len()
            + outcome.push.updated_cards.len()) as u64;
        let response = match self.transport.push(&outcome.push) {
            Ok(response) => response,
            Err(err) => return self.fail(err),
        };

        let mut decks = outcome.decks;
        let mut cards = outcome.cards;
        let applied = match apply_push_response(&mut decks, &mut cards, &response) {
            Ok(applied) => applied,
            Err(err) => return self.fail(err.into()),
        };

        {
            let mut store = self.store.write();
            let (final_decks, final_cards) =
                if self.generation.load(Ordering::SeqCst) == mid_generation {
                    (decks, cards)
                } else {
                    (
                        merge_back(store.decks(), &mid_decks, decks, &applied.resolved_decks),
                        merge_back(store.cards(), &mid_cards, cards, &applied.resolved_cards),
                    )
                };
            if let Err(err) = store.record_id_mappings(
                applied.resolved_decks.iter().map(|(t, s)| (*t, *s)),
            ) {
                return self.fail(err.into());
            }
            let final_cards = rewrite_deck_refs(final_cards, store.id_map());
            if let Err(err) = store.replace(final_decks, final_cards) {
                return self.fail(err.into());
            }
            if let Err(err) = store.set_watermark(pull.server_timestamp) {
                return self.fail(err.into());
            }
        }

        if !applied.conflicts.is_empty() {
            warn!(
                conflicts = applied.conflicts.len(),
                "server reported conflicts; records left dirty for manual resolution"
            );
        }

        self.complete(kind, pulled, pushed, applied.conflicts)
    }

    fn complete(
        &self,
        kind: PullKind,
        pulled: u64,
        pushed: u64,
        conflicts: Vec<ConflictInfo>,
    ) -> SyncResult<SyncOutcome> {
        match kind {
            PullKind::Full => self.cycles_since_full.store(0, Ordering::SeqCst),
            PullKind::Delta => {
                self.cycles_since_full.fetch_add(1, Ordering::SeqCst);
            }
        }

        {
            let mut stats = self.stats.write();
            stats.cycles_completed += 1;
            stats.records_pulled += pulled;
            stats.records_pushed += pushed;
            stats.conflicts += conflicts.len() as u64;
            stats.last_synced_at = Some(self.clock.now());
            stats.last_error = None;
        }

        info!(pulled, pushed, "sync cycle completed");
        self.set_phase(SyncPhase::Synced);
        Ok(SyncOutcome::Completed(CycleReport {
            pulled,
            pushed,
            conflicts,
            full_resync: kind == PullKind::Full,
        }))
    }

    fn fail(&self, err: SyncError) -> SyncResult<SyncOutcome> {
        warn!(error = %err, "sync cycle aborted");
        self.set_phase(SyncPhase::Error);
        self.stats.write().last_error = Some(err.to_string());
        Err(err)
    }

    fn set_phase(&self, phase: SyncPhase) {
        *self.phase.write() = phase;
    }
}

/// Folds a cycle's result back into a store that was mutated while the
/// cycle's network calls were in flight.
///
/// Rules, per record identity:
/// - untouched since the cycle's snapshot: the cycle result wins
/// - mutated during the cycle: the store copy wins (it is newer local
///   work and stays flagged for the next cycle); if its creation was
///   confirmed meanwhile, it adopts the assigned server id as a dirty
///   record so the next push updates instead of re-creating
/// - created during the cycle: kept
/// - purged during the cycle: stays gone
///
/// Identities are normalized through `resolved` so a record that
/// changed from a temporary to a server id mid-apply still matches its
/// store counterpart.
fn merge_back<T: Clone + PartialEq>(
    current: &[Tracked<T>],
    snapshot: &[Tracked<T>],
    merged: Vec<Tracked<T>>,
    resolved: &HashMap<TempId, ServerId>,
) -> Vec<Tracked<T>> {
    let key = |rec: &Tracked<T>| -> RecordId {
        match rec.id {
            RecordId::Temp(token) => resolved
                .get(&token)
                .map(|&id| RecordId::Server(id))
                .unwrap_or(rec.id),
            id => id,
        }
    };

    let snap_by: HashMap<RecordId, &Tracked<T>> = snapshot.iter().map(|r| (key(r), r)).collect();
    let cur_by: HashMap<RecordId, &Tracked<T>> = current.iter().map(|r| (key(r), r)).collect();
    let merged_keys: HashSet<RecordId> = merged.iter().map(|r| key(r)).collect();

    let mut out = Vec::with_capacity(merged.len());

    for rec in merged {
        let k = key(&rec);
        match cur_by.get(&k) {
            Some(cur) => {
                let untouched = snap_by.get(&k).is_some_and(|snap| *cur == *snap);
                if untouched {
                    out.push(rec);
                } else {
                    let mut kept = (*cur).clone();
                    if let RecordId::Temp(token) = kept.id {
                        if let Some(&server_id) = resolved.get(&token) {
                            kept.adopt_identity(server_id);
                            kept.status = SyncStatus::Dirty;
                        }
                    }
                    out.push(kept);
                }
            }
            None => {
                // In the cycle result but gone from the store: only
                // add it if it came from the server, not if the UI
                // purged it mid-cycle.
                if !snap_by.contains_key(&k) {
                    out.push(rec);
                }
            }
        }
    }

    for cur in current {
        let k = key(cur);
        if merged_keys.contains(&k) {
            continue;
        }
        let untouched = snap_by.get(&k).is_some_and(|snap| cur == *snap);
        if snap_by.contains_key(&k) && untouched {
            // The cycle dropped it deliberately (acknowledged delete,
            // server tombstone, full-resync removal).
            continue;
        }
        out.push(cur.clone());
    }

    out
}

fn rewrite_deck_refs(
    mut cards: Vec<Tracked<Card>>,
    id_map: &HashMap<TempId, ServerId>,
) -> Vec<Tracked<Card>> {
    for card in &mut cards {
        if let DeckRef::Temp(token) = card.entity.deck {
            if let Some(&server_id) = id_map.get(&token) {
                card.entity.deck = DeckRef::Server(server_id);
            }
        }
    }
    cards
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::transport::MockTransport;
    use chrono::TimeZone;
    use recall_protocol::{DeckRecord, PullResponse, PushResponse};
    use recall_store::MemoryBackend;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn engine_at(secs: i64) -> SyncEngine<MemoryBackend, MockTransport> {
        let store = RecordStore::open(MemoryBackend::new()).unwrap();
        SyncEngine::with_clock(
            SyncConfig::new(),
            store,
            MockTransport::new(),
            ManualClock::new(at(secs)),
        )
    }

    fn new_deck(name: &str) -> NewDeck {
        NewDeck {
            name: name.into(),
            description: None,
        }
    }

    fn empty_pull(secs: i64) -> PullResponse {
        PullResponse::new(at(secs), vec![], vec![])
    }

    #[test]
    fn offline_create_then_sync_assigns_server_id() {
        let engine = engine_at(10);
        let rec = engine.create_deck(new_deck("Spanish")).unwrap();
        let token = rec.temp_id().unwrap();

        assert_eq!(engine.decks().len(), 1);
        assert!(engine.decks()[0].is_new());

        engine.transport.set_pull_response(empty_pull(100));
        engine.transport.set_push_response(PushResponse {
            created_decks: vec![DeckRecord {
                id: 42,
                client_token: Some(token),
                name: "Spanish".into(),
                description: None,
                created_at: at(100),
                updated_at: at(100),
                is_deleted: false,
                deleted_at: None,
            }],
            ..Default::default()
        });

        let outcome = engine.sync().unwrap();
        assert!(matches!(outcome, SyncOutcome::Completed(_)));

        let decks = engine.decks();
        assert_eq!(decks.len(), 1);
        assert_eq!(decks[0].server_id(), Some(ServerId::new(42)));
        assert!(!decks[0].is_new());
        assert!(!decks[0].is_dirty());
        assert_eq!(engine.watermark(), Some(at(100)));
    }

    #[test]
    fn pull_failure_preserves_pending_work() {
        let engine = engine_at(10);
        engine.create_deck(new_deck("Spanish")).unwrap();
        engine.transport.fail_pulls(true);

        let err = engine.sync().unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(engine.phase(), SyncPhase::Error);
        assert!(engine.last_error().is_some());

        let decks = engine.decks();
        assert_eq!(decks.len(), 1);
        assert!(decks[0].is_new());
        assert!(engine.watermark().is_none());
    }

    #[test]
    fn push_failure_keeps_records_flagged_and_watermark_unmoved() {
        let engine = engine_at(10);
        engine.create_deck(new_deck("Spanish")).unwrap();
        engine.transport.set_pull_response(empty_pull(100));
        engine.transport.fail_pushes(true);

        engine.sync().unwrap_err();

        let decks = engine.decks();
        assert_eq!(decks.len(), 1);
        assert!(decks[0].is_new());
        assert!(engine.watermark().is_none());
    }

    #[test]
    fn empty_push_skips_the_network_call() {
        let engine = engine_at(10);
        engine.transport.set_pull_response(empty_pull(100));

        engine.sync().unwrap();
        assert_eq!(engine.transport.pull_calls(), 1);
        assert_eq!(engine.transport.push_calls(), 0);
        assert_eq!(engine.watermark(), Some(at(100)));
    }

    #[test]
    fn deleting_unsynced_deck_makes_no_network_calls() {
        let engine = engine_at(10);
        let rec = engine.create_deck(new_deck("Spanish")).unwrap();
        engine.delete_deck(rec.temp_id().unwrap().into()).unwrap();

        assert!(engine.decks().is_empty());
        assert_eq!(engine.transport.pull_calls(), 0);
        assert_eq!(engine.transport.push_calls(), 0);
    }

    #[test]
    fn bootstrap_pull_is_full_then_incremental() {
        let engine = engine_at(10);
        engine.transport.set_pull_response(empty_pull(100));

        engine.sync().unwrap();
        engine.transport.set_pull_response(empty_pull(200));
        engine.sync().unwrap();

        let pulls = engine.transport.pulls();
        assert_eq!(pulls, vec![None, Some(at(100))]);
    }

    #[test]
    fn full_resync_cadence_drops_the_watermark() {
        let store = RecordStore::open(MemoryBackend::new()).unwrap();
        let config = SyncConfig::new().with_full_resync_interval(Some(2));
        let engine = SyncEngine::with_clock(
            config,
            store,
            MockTransport::new(),
            ManualClock::new(at(10)),
        );

        for secs in [100, 200, 300, 400] {
            engine.transport.set_pull_response(empty_pull(secs));
            engine.sync().unwrap();
        }

        let pulls = engine.transport.pulls();
        // bootstrap full, two deltas, then the cadence forces a full
        assert_eq!(pulls, vec![None, Some(at(100)), Some(at(200)), None]);
    }

    #[test]
    fn stats_accumulate_across_cycles() {
        let engine = engine_at(10);
        engine.transport.set_pull_response(empty_pull(100));
        engine.sync().unwrap();

        let stats = engine.stats();
        assert_eq!(stats.cycles_completed, 1);
        assert_eq!(stats.records_pulled, 0);
        assert!(stats.last_error.is_none());
        assert_eq!(stats.last_synced_at, Some(at(10)));
    }

    #[test]
    fn error_state_clears_on_next_success() {
        let engine = engine_at(10);
        engine.transport.fail_pulls(true);
        engine.sync().unwrap_err();
        assert!(engine.last_error().is_some());

        engine.transport.fail_pulls(false);
        engine.transport.set_pull_response(empty_pull(100));
        engine.sync().unwrap();
        assert!(engine.last_error().is_none());
        assert_eq!(engine.phase(), SyncPhase::Synced);
    }

    // ---- merge_back -----------------------------------------------------

    fn deck_rec(name: &str, id: i64, updated: i64) -> Tracked<Deck> {
        Tracked::synced(Deck::new(name), ServerId::new(id), at(0), at(updated))
    }

    #[test]
    fn merge_back_prefers_cycle_result_for_untouched_records() {
        let snap = vec![deck_rec("old", 1, 100)];
        let current = snap.clone();
        let merged = vec![deck_rec("from server", 1, 200)];

        let out = merge_back(&current, &snap, merged, &HashMap::new());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].entity.name, "from server");
    }

    #[test]
    fn merge_back_keeps_mid_cycle_edits() {
        let snap = vec![deck_rec("old", 1, 100)];
        let mut edited = snap[0].clone();
        edited.entity.name = "edited during cycle".into();
        edited.mark_edited(at(150));

        let merged = vec![deck_rec("from server", 1, 200)];
        let out = merge_back(&[edited.clone()], &snap, merged, &HashMap::new());
        assert_eq!(out[0].entity.name, "edited during cycle");
        assert!(out[0].is_dirty());
    }

    #[test]
    fn merge_back_keeps_records_created_mid_cycle() {
        let created = Tracked::fresh(Deck::new("mid-cycle"), TempId::generate(), at(50));
        let out = merge_back(
            &[created.clone()],
            &[],
            vec![deck_rec("server", 1, 100)],
            &HashMap::new(),
        );
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn merge_back_respects_mid_cycle_purges() {
        let snap = vec![deck_rec("purged during cycle", 1, 100)];
        // The UI deleted it mid-cycle; the cycle result still has it
        let out = merge_back(&[], &snap, snap.clone(), &HashMap::new());
        assert!(out.is_empty());
    }

    #[test]
    fn merge_back_adopts_identity_for_edited_pending_creation() {
        let rec = Tracked::fresh(Deck::new("offline"), TempId::generate(), at(10));
        let token = rec.temp_id().unwrap();
        let snap = vec![rec.clone()];

        // Edited while the push was in flight
        let mut edited = rec.clone();
        edited.entity.name = "renamed meanwhile".into();
        edited.touch(at(50));

        // The cycle confirmed the creation under server id 9
        let mut confirmed = Tracked::synced(Deck::new("offline"), ServerId::new(9), at(40), at(40));
        confirmed.mark_synced();
        let mut resolved = HashMap::new();
        resolved.insert(token, ServerId::new(9));

        let out = merge_back(&[edited], &snap, vec![confirmed], &resolved);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].entity.name, "renamed meanwhile");
        assert_eq!(out[0].server_id(), Some(ServerId::new(9)));
        assert!(out[0].is_dirty());
    }
}
