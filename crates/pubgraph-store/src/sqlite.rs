//! SQLite implementation of the Store trait.
//!
//! This is the durable backend. It uses rusqlite with bundled SQLite,
//! wrapped in async via `tokio::task::spawn_blocking`. Each batch runs in
//! one transaction.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

use pubgraph_core::{
    from_cbor, to_cbor, Address, EventId, EventRecord, HubEvent, ProfileId, ProfileRecord, PubId,
    Publication, PublicationKey, PublicationType, SlotKey,
};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{Snapshot, Store, WriteBatch};

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn run<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = lock(&conn)?;
            f(&mut guard)
        })
        .await
        .map_err(|e| {
            StoreError::Database(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_ERROR),
                Some(format!("spawn_blocking failed: {}", e)),
            ))
        })?
    }
}

fn lock(conn: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>> {
    conn.lock().map_err(|e| {
        StoreError::Database(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_LOCKED),
            Some(format!("mutex poisoned: {}", e)),
        ))
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Row mapping
// ─────────────────────────────────────────────────────────────────────────────

fn address_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Address> {
    let bytes: Vec<u8> = row.get(idx)?;
    Address::try_from(bytes.as_slice())
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Blob, Box::new(e)))
}

fn event_id_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<EventId> {
    let bytes: Vec<u8> = row.get(idx)?;
    let arr: [u8; 32] = bytes
        .as_slice()
        .try_into()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Blob, Box::new(e)))?;
    Ok(EventId::from_bytes(arr))
}

fn key_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<PublicationKey> {
    let profile: i64 = row.get(idx)?;
    let pub_id: i64 = row.get(idx + 1)?;
    Ok(PublicationKey::new(ProfileId(profile as u64), PubId(pub_id as u64)))
}

fn row_to_profile(row: &Row<'_>) -> rusqlite::Result<ProfileRecord> {
    let profile_id: i64 = row.get(0)?;
    let pub_count: i64 = row.get(2)?;
    Ok(ProfileRecord {
        profile_id: ProfileId(profile_id as u64),
        owner: address_at(row, 1)?,
        pub_count: pub_count as u64,
        created_at: row.get(3)?,
    })
}

const PUBLICATION_COLUMNS: &str = "profile_id, pub_id, pub_type, content_uri,
    pointed_profile_id, pointed_pub_id, root_profile_id, root_pub_id,
    collect_module, reference_module";

fn row_to_publication(row: &Row<'_>) -> rusqlite::Result<(PublicationKey, Publication)> {
    let tag: i64 = row.get(2)?;
    let pub_type = u8::try_from(tag)
        .ok()
        .and_then(PublicationType::from_u8)
        .ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                2,
                Type::Integer,
                Box::new(pubgraph_core::CoreError::UnknownPublicationType(tag as u8)),
            )
        })?;
    Ok((
        key_at(row, 0)?,
        Publication {
            pub_type,
            content_uri: row.get(3)?,
            pointed: key_at(row, 4)?,
            root: key_at(row, 6)?,
            collect_module: address_at(row, 8)?,
            reference_module: address_at(row, 9)?,
        },
    ))
}

fn row_to_event(row: &Row<'_>) -> rusqlite::Result<EventRecord> {
    let seq: i64 = row.get(0)?;
    let body: Vec<u8> = row.get(4)?;
    let event: HubEvent = from_cbor(&body)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Blob, Box::new(e)))?;
    Ok(EventRecord {
        seq: seq as u64,
        id: event_id_at(row, 1)?,
        prev: event_id_at(row, 2)?,
        timestamp: row.get(3)?,
        event,
    })
}

fn read_head(conn: &Connection) -> Result<Option<(u64, EventId)>> {
    conn.query_row(
        "SELECT seq, event_id FROM events ORDER BY seq DESC LIMIT 1",
        [],
        |row| {
            let seq: i64 = row.get(0)?;
            Ok((seq as u64, event_id_at(row, 1)?))
        },
    )
    .optional()
    .map_err(StoreError::from)
}

// ─────────────────────────────────────────────────────────────────────────────
// Batch writes
// ─────────────────────────────────────────────────────────────────────────────

fn write_batch(conn: &mut Connection, batch: &WriteBatch) -> Result<()> {
    let tx = conn.transaction()?;

    for record in &batch.events {
        let taken: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM events WHERE seq = ?1)",
            params![record.seq as i64],
            |row| row.get(0),
        )?;
        if taken {
            return Err(StoreError::Conflict { seq: record.seq });
        }
    }

    for profile in &batch.profiles {
        tx.execute(
            "INSERT INTO profiles (profile_id, owner, pub_count, created_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(profile_id) DO UPDATE SET
                owner = excluded.owner,
                pub_count = excluded.pub_count",
            params![
                profile.profile_id.0 as i64,
                profile.owner.0.as_slice(),
                profile.pub_count as i64,
                profile.created_at,
            ],
        )?;
    }

    for (key, publication) in &batch.publications {
        tx.execute(
            "INSERT OR REPLACE INTO publications (
                profile_id, pub_id, pub_type, content_uri,
                pointed_profile_id, pointed_pub_id, root_profile_id, root_pub_id,
                collect_module, reference_module
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                key.profile_id.0 as i64,
                key.pub_id.0 as i64,
                publication.pub_type.to_u8() as i64,
                publication.content_uri,
                publication.pointed.profile_id.0 as i64,
                publication.pointed.pub_id.0 as i64,
                publication.root.profile_id.0 as i64,
                publication.root.pub_id.0 as i64,
                publication.collect_module.0.as_slice(),
                publication.reference_module.0.as_slice(),
            ],
        )?;
    }

    for write in &batch.slots {
        match &write.value {
            Some(value) => {
                tx.execute(
                    "INSERT OR REPLACE INTO state_slots (namespace, key, value)
                     VALUES (?1, ?2, ?3)",
                    params![write.slot.namespace, write.slot.key, value],
                )?;
            }
            None => {
                tx.execute(
                    "DELETE FROM state_slots WHERE namespace = ?1 AND key = ?2",
                    params![write.slot.namespace, write.slot.key],
                )?;
            }
        }
    }

    for record in &batch.events {
        let body = to_cbor(&record.event)?;
        tx.execute(
            "INSERT INTO events (seq, event_id, prev_id, kind, timestamp, body)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record.seq as i64,
                record.id.0.as_slice(),
                record.prev.0.as_slice(),
                record.event.kind().to_u16() as i64,
                record.timestamp,
                body,
            ],
        )?;
    }

    tx.commit()?;
    Ok(())
}

#[async_trait]
impl Store for SqliteStore {
    async fn apply_batch(&self, batch: &WriteBatch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let batch = batch.clone();
        self.run(move |conn| write_batch(conn, &batch)).await
    }

    async fn load_snapshot(&self) -> Result<Snapshot> {
        self.run(|conn| {
            let profiles = conn
                .prepare(
                    "SELECT profile_id, owner, pub_count, created_at
                     FROM profiles ORDER BY profile_id",
                )?
                .query_map([], row_to_profile)?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            let publications = conn
                .prepare(&format!(
                    "SELECT {PUBLICATION_COLUMNS} FROM publications
                     ORDER BY profile_id, pub_id"
                ))?
                .query_map([], row_to_publication)?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            let slots: Vec<(SlotKey, Vec<u8>)> = conn
                .prepare(
                    "SELECT namespace, key, value FROM state_slots
                     ORDER BY namespace, key",
                )?
                .query_map([], |row| {
                    Ok((
                        SlotKey::new(row.get::<_, String>(0)?, row.get::<_, Vec<u8>>(1)?),
                        row.get(2)?,
                    ))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            Ok(Snapshot {
                profiles,
                publications,
                slots,
                event_head: read_head(conn)?,
            })
        })
        .await
    }

    async fn get_profile(&self, profile_id: ProfileId) -> Result<Option<ProfileRecord>> {
        self.run(move |conn| {
            conn.query_row(
                "SELECT profile_id, owner, pub_count, created_at
                 FROM profiles WHERE profile_id = ?1",
                params![profile_id.0 as i64],
                row_to_profile,
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn get_publication(&self, key: &PublicationKey) -> Result<Option<Publication>> {
        let key = *key;
        self.run(move |conn| {
            conn.query_row(
                &format!(
                    "SELECT {PUBLICATION_COLUMNS} FROM publications
                     WHERE profile_id = ?1 AND pub_id = ?2"
                ),
                params![key.profile_id.0 as i64, key.pub_id.0 as i64],
                row_to_publication,
            )
            .optional()
            .map(|row| row.map(|(_, publication)| publication))
            .map_err(StoreError::from)
        })
        .await
    }

    async fn get_publications_range(
        &self,
        profile_id: ProfileId,
        start: PubId,
        end: PubId,
    ) -> Result<Vec<(PublicationKey, Publication)>> {
        self.run(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {PUBLICATION_COLUMNS} FROM publications
                 WHERE profile_id = ?1 AND pub_id >= ?2 AND pub_id <= ?3
                 ORDER BY pub_id"
            ))?;
            let rows = stmt
                .query_map(
                    params![profile_id.0 as i64, start.0 as i64, end.0 as i64],
                    row_to_publication,
                )?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
        .await
    }

    async fn get_slot(&self, slot: &SlotKey) -> Result<Option<Vec<u8>>> {
        let slot = slot.clone();
        self.run(move |conn| {
            conn.query_row(
                "SELECT value FROM state_slots WHERE namespace = ?1 AND key = ?2",
                params![slot.namespace, slot.key],
                |row| row.get(0),
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn get_events_since(&self, after_seq: u64, limit: usize) -> Result<Vec<EventRecord>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.run(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT seq, event_id, prev_id, timestamp, body FROM events
                 WHERE seq > ?1 ORDER BY seq LIMIT ?2",
            )?;
            let records = stmt
                .query_map(params![after_seq as i64, limit], row_to_event)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(records)
        })
        .await
    }

    async fn event_head(&self) -> Result<Option<(u64, EventId)>> {
        self.run(|conn| read_head(conn)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pubgraph_core::{verify_chain, SlotWrite};

    fn chain(count: u64) -> Vec<EventRecord> {
        let mut prev = EventId::ZERO;
        (1..=count)
            .map(|seq| {
                let record = EventRecord::chain(
                    prev,
                    seq,
                    1_700_000_000_000 + seq as i64,
                    HubEvent::Followed {
                        follower: ProfileId(seq),
                        followed: ProfileId(seq + 1),
                    },
                )
                .unwrap();
                prev = record.id;
                record
            })
            .collect()
    }

    fn sample_batch() -> WriteBatch {
        let author = Address::derive(b"alice");
        let mut comment = Publication::reference(
            PublicationType::Comment,
            "ipfs://comment",
            PublicationKey::from((1, 1)),
        );
        comment.root = PublicationKey::from((1, 1));
        comment.collect_module = Address::derive(b"free-collect");

        WriteBatch {
            profiles: vec![ProfileRecord {
                pub_count: 2,
                ..ProfileRecord::new(ProfileId(1), author, 42)
            }],
            publications: vec![
                (PublicationKey::from((1, 1)), Publication::post("ipfs://post")),
                (PublicationKey::from((1, 2)), comment),
            ],
            slots: vec![SlotWrite {
                slot: SlotKey::new("access.follow", vec![0x82, 0x02, 0x01]),
                value: Some(vec![0xf5]),
            }],
            events: chain(3),
        }
    }

    #[tokio::test]
    async fn test_batch_round_trip() {
        let store = SqliteStore::open_memory().unwrap();
        let batch = sample_batch();
        store.apply_batch(&batch).await.unwrap();

        let snapshot = store.load_snapshot().await.unwrap();
        assert_eq!(snapshot.profiles, batch.profiles);
        assert_eq!(snapshot.publications, batch.publications);
        assert_eq!(snapshot.slots.len(), 1);
        assert_eq!(snapshot.event_head, Some((3, batch.events[2].id)));

        let events = store.get_events_since(0, 100).await.unwrap();
        assert_eq!(events, batch.events);
        verify_chain(0, EventId::ZERO, &events).unwrap();
    }

    #[tokio::test]
    async fn test_profile_upsert_keeps_created_at() {
        let store = SqliteStore::open_memory().unwrap();
        store.apply_batch(&sample_batch()).await.unwrap();

        let new_owner = Address::derive(b"bob");
        let updated = ProfileRecord {
            profile_id: ProfileId(1),
            owner: new_owner,
            pub_count: 3,
            created_at: 999,
        };
        store
            .apply_batch(&WriteBatch {
                profiles: vec![updated],
                ..WriteBatch::default()
            })
            .await
            .unwrap();

        let profile = store.get_profile(ProfileId(1)).await.unwrap().unwrap();
        assert_eq!(profile.owner, new_owner);
        assert_eq!(profile.pub_count, 3);
        assert_eq!(profile.created_at, 42);
    }

    #[tokio::test]
    async fn test_conflict_rolls_back_whole_batch() {
        let store = SqliteStore::open_memory().unwrap();
        store.apply_batch(&sample_batch()).await.unwrap();

        let batch = WriteBatch {
            profiles: vec![ProfileRecord::new(ProfileId(9), Address::derive(b"z"), 0)],
            events: chain(1),
            ..WriteBatch::default()
        };
        let err = store.apply_batch(&batch).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { seq: 1 }));
        assert!(store.get_profile(ProfileId(9)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_slot_delete_and_range() {
        let store = SqliteStore::open_memory().unwrap();
        let batch = sample_batch();
        store.apply_batch(&batch).await.unwrap();

        let slot = batch.slots[0].slot.clone();
        assert_eq!(store.get_slot(&slot).await.unwrap(), Some(vec![0xf5]));
        store
            .apply_batch(&WriteBatch {
                slots: vec![SlotWrite { slot: slot.clone(), value: None }],
                ..WriteBatch::default()
            })
            .await
            .unwrap();
        assert_eq!(store.get_slot(&slot).await.unwrap(), None);

        let range = store
            .get_publications_range(ProfileId(1), PubId(2), PubId(10))
            .await
            .unwrap();
        assert_eq!(range.len(), 1);
        assert_eq!(range[0].1.pub_type, PublicationType::Comment);
        assert_eq!(range[0].1.root, PublicationKey::from((1, 1)));
    }

    #[tokio::test]
    async fn test_reopen_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hub.db");
        let batch = sample_batch();

        {
            let store = SqliteStore::open(&path).unwrap();
            store.apply_batch(&batch).await.unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        let snapshot = store.load_snapshot().await.unwrap();
        assert_eq!(snapshot.publications, batch.publications);
        assert_eq!(store.event_head().await.unwrap(), Some((3, batch.events[2].id)));
    }
}
