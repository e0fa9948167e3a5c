//! The synchronization envelope shared by all record kinds.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier assigned by the remote store.
///
/// Server ids are positive and never reused. The wire's `0` sentinel
/// ("not yet assigned") is mapped to [`RecordId::Temp`] at the protocol
/// boundary and never appears inside a `ServerId`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServerId(pub i64);

impl ServerId {
    /// Creates a new server id.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the raw id value.
    #[must_use]
    pub const fn as_i64(self) -> i64 {
        self.0
    }
}

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Client-generated identifier for a record the server has not seen yet.
///
/// Doubles as the idempotency token on creation requests: the server
/// echoes it back on the created record, and the client maps it to the
/// assigned [`ServerId`] by exact equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TempId(pub Uuid);

impl TempId {
    /// Generates a fresh random temporary id.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parses a temporary id from its string form.
    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self)
    }
}

impl fmt::Display for TempId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The identity of a locally tracked record.
///
/// Exactly one of the two variants holds at any time: a record either
/// has a server-assigned id or a client-generated temporary id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordId {
    /// Assigned by the remote store; the record has been synced at
    /// least once.
    Server(ServerId),
    /// Client-generated; the record has never been accepted by the
    /// remote store.
    Temp(TempId),
}

impl RecordId {
    /// Returns the server id, if assigned.
    #[must_use]
    pub fn server(self) -> Option<ServerId> {
        match self {
            RecordId::Server(id) => Some(id),
            RecordId::Temp(_) => None,
        }
    }

    /// Returns the temporary id, if the record is unsynced.
    #[must_use]
    pub fn temp(self) -> Option<TempId> {
        match self {
            RecordId::Server(_) => None,
            RecordId::Temp(id) => Some(id),
        }
    }
}

/// Local synchronization status of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncStatus {
    /// Pending creation: the server has not confirmed this record.
    New,
    /// In step with the last successful sync.
    Clean,
    /// Locally edited or deleted after the last successful sync.
    Dirty,
}

/// A locally tracked record: the entity plus its sync envelope.
///
/// Every record held by the local store is wrapped in `Tracked`. The
/// envelope carries identity, status, and the timestamps the reconciler
/// compares against pulled server state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tracked<T> {
    /// Record identity (server-assigned or temporary).
    pub id: RecordId,
    /// Local sync status.
    pub status: SyncStatus,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time; never decreases.
    pub updated_at: DateTime<Utc>,
    /// Soft-delete marker.
    pub deleted: bool,
    /// When the record was soft-deleted.
    pub deleted_at: Option<DateTime<Utc>>,
    /// The record payload.
    pub entity: T,
}

impl<T> Tracked<T> {
    /// Wraps a freshly created entity that the server has never seen.
    pub fn fresh(entity: T, temp_id: TempId, now: DateTime<Utc>) -> Self {
        Self {
            id: RecordId::Temp(temp_id),
            status: SyncStatus::New,
            created_at: now,
            updated_at: now,
            deleted: false,
            deleted_at: None,
            entity,
        }
    }

    /// Wraps an entity received from the server, with flags cleared.
    pub fn synced(
        entity: T,
        server_id: ServerId,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: RecordId::Server(server_id),
            status: SyncStatus::Clean,
            created_at,
            updated_at,
            deleted: false,
            deleted_at: None,
            entity,
        }
    }

    /// Returns the server id, if assigned.
    #[must_use]
    pub fn server_id(&self) -> Option<ServerId> {
        self.id.server()
    }

    /// Returns the temporary id, if the record is unsynced.
    #[must_use]
    pub fn temp_id(&self) -> Option<TempId> {
        self.id.temp()
    }

    /// Returns true if the record is pending creation.
    #[must_use]
    pub fn is_new(&self) -> bool {
        self.status == SyncStatus::New
    }

    /// Returns true if the record is pending update or delete.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.status == SyncStatus::Dirty
    }

    /// Returns true if the record must be included in the next push.
    #[must_use]
    pub fn has_pending_changes(&self) -> bool {
        self.is_new() || self.is_dirty() || self.deleted
    }

    /// Bumps `updated_at`. The timestamp never moves backwards, even
    /// if the supplied clock does.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        if now > self.updated_at {
            self.updated_at = now;
        }
    }

    /// Records a local edit: bumps `updated_at` and marks the record
    /// dirty unless it is still pending creation.
    pub fn mark_edited(&mut self, now: DateTime<Utc>) {
        self.touch(now);
        if self.status != SyncStatus::New {
            self.status = SyncStatus::Dirty;
        }
    }

    /// Soft-deletes the record.
    ///
    /// Callers must purge `New` records instead of calling this: a
    /// record the server has never seen is not transmitted as a delete.
    pub fn mark_deleted(&mut self, now: DateTime<Utc>) {
        self.deleted = true;
        self.deleted_at = Some(now);
        self.mark_edited(now);
    }

    /// Adopts the server identity after a confirmed creation and clears
    /// the pending-creation status.
    pub fn adopt_identity(&mut self, server_id: ServerId) {
        self.id = RecordId::Server(server_id);
        self.status = SyncStatus::Clean;
    }

    /// Clears the dirty flag after the server acknowledged an update.
    pub fn mark_synced(&mut self) {
        self.status = SyncStatus::Clean;
    }
}
