//! Database schema migrations for SQLite.
//!
//! Versioned: each `apply_vN` moves the schema from N-1 to N, and
//! `schema_migrations` records which versions have run.

use rusqlite::Connection;

use pubgraph_core::now_millis;

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Initialize or migrate the database schema. Idempotent.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    if current > CURRENT_VERSION {
        return Err(StoreError::Migration(format!(
            "database schema v{} is newer than supported v{}",
            current, CURRENT_VERSION
        )));
    }

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, now_millis()],
            )?;
        }

        tx.commit()?;
        tracing::debug!(from = current, to = CURRENT_VERSION, "schema migrated");
    }

    Ok(())
}

fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// Migration v1: Initial schema.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE profiles (
            profile_id INTEGER PRIMARY KEY,
            owner BLOB NOT NULL,              -- 20 bytes
            pub_count INTEGER NOT NULL,
            created_at INTEGER NOT NULL       -- Unix ms
        );

        CREATE TABLE publications (
            profile_id INTEGER NOT NULL,
            pub_id INTEGER NOT NULL,
            pub_type INTEGER NOT NULL,        -- 0 = untagged legacy record
            content_uri TEXT NOT NULL,
            pointed_profile_id INTEGER NOT NULL,
            pointed_pub_id INTEGER NOT NULL,
            root_profile_id INTEGER NOT NULL,
            root_pub_id INTEGER NOT NULL,
            collect_module BLOB NOT NULL,     -- 20 bytes, zero = none
            reference_module BLOB NOT NULL,   -- 20 bytes, zero = none
            PRIMARY KEY (profile_id, pub_id)
        );

        CREATE INDEX idx_publications_pointed
            ON publications(pointed_profile_id, pointed_pub_id);
        CREATE INDEX idx_publications_root
            ON publications(root_profile_id, root_pub_id);

        -- Everything else: delegation, social graph, governance,
        -- balances and module storage.
        CREATE TABLE state_slots (
            namespace TEXT NOT NULL,
            key BLOB NOT NULL,                -- CBOR
            value BLOB NOT NULL,              -- CBOR
            PRIMARY KEY (namespace, key)
        );

        CREATE TABLE events (
            seq INTEGER PRIMARY KEY,
            event_id BLOB NOT NULL UNIQUE,    -- 32 bytes
            prev_id BLOB NOT NULL,            -- 32 bytes, zero for seq 1
            kind INTEGER NOT NULL,            -- EventKind as u16
            timestamp INTEGER NOT NULL,       -- Unix ms
            body BLOB NOT NULL                -- CBOR of the event
        );

        CREATE INDEX idx_events_kind ON events(kind);
        "#,
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrate_fresh() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();

        for table in ["events", "profiles", "publications", "schema_migrations", "state_slots"] {
            assert!(tables.contains(&table.to_string()), "missing {table}");
        }
    }

    #[test]
    fn test_migrate_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        migrate(&mut conn).unwrap();

        let version: u32 = conn
            .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[test]
    fn test_newer_schema_rejected() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        conn.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, 0)",
            [CURRENT_VERSION + 1],
        )
        .unwrap();
        assert!(matches!(migrate(&mut conn), Err(StoreError::Migration(_))));
    }
}
