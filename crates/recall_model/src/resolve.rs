//! Dual-key record lookup.
//!
//! Callers of the mutation API may hold either a server id or a
//! temporary id for the same record, depending on whether the record
//! existed before the last sync. `RecordKey` captures that duality, and
//! the resolver functions define the lookup precedence in one place.

use crate::envelope::{ServerId, TempId, Tracked};

/// A lookup key that may be either side of a record's identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKey {
    /// Look up by server-assigned id.
    Server(ServerId),
    /// Look up by client-generated temporary id.
    Temp(TempId),
}

impl RecordKey {
    /// Parses a key from its string form: a decimal integer is treated
    /// as a server id, a UUID as a temporary id.
    pub fn parse(s: &str) -> Option<Self> {
        if let Ok(id) = s.parse::<i64>() {
            if id > 0 {
                return Some(RecordKey::Server(ServerId::new(id)));
            }
        }
        TempId::parse(s).map(RecordKey::Temp)
    }
}

impl From<ServerId> for RecordKey {
    fn from(id: ServerId) -> Self {
        RecordKey::Server(id)
    }
}

impl From<TempId> for RecordKey {
    fn from(id: TempId) -> Self {
        RecordKey::Temp(id)
    }
}

/// Finds a record by key.
///
/// Server-id matches take precedence: the slice is scanned for a
/// server-id match first, and only then for a temporary-id match.
pub fn find_record<'a, T>(records: &'a [Tracked<T>], key: RecordKey) -> Option<&'a Tracked<T>> {
    let index = position(records, key)?;
    Some(&records[index])
}

/// Finds a record by key, mutably. Same precedence as [`find_record`].
pub fn find_record_mut<'a, T>(
    records: &'a mut [Tracked<T>],
    key: RecordKey,
) -> Option<&'a mut Tracked<T>> {
    let index = position(records, key)?;
    Some(&mut records[index])
}

fn position<T>(records: &[Tracked<T>], key: RecordKey) -> Option<usize> {
    if let RecordKey::Server(id) = key {
        if let Some(i) = records.iter().position(|r| r.server_id() == Some(id)) {
            return Some(i);
        }
    }
    if let RecordKey::Temp(id) = key {
        if let Some(i) = records.iter().position(|r| r.temp_id() == Some(id)) {
            return Some(i);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono::Utc;

    fn at(secs: i64) -> chrono::DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn sample() -> (Vec<Tracked<&'static str>>, TempId) {
        let temp = TempId::generate();
        let records = vec![
            Tracked::synced("synced", ServerId::new(7), at(1), at(1)),
            Tracked::fresh("unsynced", temp, at(2)),
        ];
        (records, temp)
    }

    #[test]
    fn finds_by_server_id() {
        let (records, _) = sample();
        let found = find_record(&records, ServerId::new(7).into()).unwrap();
        assert_eq!(found.entity, "synced");
    }

    #[test]
    fn finds_by_temp_id() {
        let (records, temp) = sample();
        let found = find_record(&records, temp.into()).unwrap();
        assert_eq!(found.entity, "unsynced");
    }

    #[test]
    fn missing_key_is_none() {
        let (records, _) = sample();
        assert!(find_record(&records, ServerId::new(99).into()).is_none());
        assert!(find_record(&records, TempId::generate().into()).is_none());
    }

    #[test]
    fn parse_prefers_numeric() {
        assert_eq!(
            RecordKey::parse("42"),
            Some(RecordKey::Server(ServerId::new(42)))
        );
        // Zero is the wire sentinel for "unassigned", never a valid key
        assert_eq!(RecordKey::parse("0"), None);
        assert_eq!(RecordKey::parse("not-a-key"), None);

        let temp = TempId::generate();
        assert_eq!(
            RecordKey::parse(&temp.to_string()),
            Some(RecordKey::Temp(temp))
        );
    }

    #[test]
    fn mutable_lookup_reaches_same_record() {
        let (mut records, temp) = sample();
        find_record_mut(&mut records, temp.into()).unwrap().entity = "edited";
        assert_eq!(find_record(&records, temp.into()).unwrap().entity, "edited");
    }
}
