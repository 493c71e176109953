//! SQLite schema migrations, tracked through `PRAGMA user_version`.

use rusqlite::{Connection, TransactionBehavior};
use std::path::Path;
use std::time::Duration;

use crate::error::{StoreError, StoreResult};

struct Migration {
    version: u32,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        sql: include_str!("sql/0001_events.sql"),
    },
    Migration {
        version: 2,
        sql: include_str!("sql/0002_dispatch.sql"),
    },
    Migration {
        version: 3,
        sql: include_str!("sql/0003_outbox.sql"),
    },
];

pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

/// Open a database file (or `:memory:`) with all migrations applied.
pub fn open_connection(path: &Path) -> StoreResult<Connection> {
    let mut conn = if path == Path::new(":memory:") {
        Connection::open_in_memory()?
    } else {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Connection::open(path)?
    };

    // Store and channel may hold separate connections to the same file.
    conn.busy_timeout(Duration::from_secs(5))?;
    apply_migrations(&mut conn)?;
    Ok(conn)
}

pub fn apply_migrations(conn: &mut Connection) -> StoreResult<()> {
    // Read the version under the write lock so two processes opening a
    // fresh file do not both migrate it.
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let current = tx.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    let latest = latest_version();

    if current > latest {
        return Err(StoreError::UnsupportedSchema {
            db_version: current,
            latest,
        });
    }
    if current == latest {
        return Ok(());
    }

    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        tx.execute_batch(migration.sql)?;
        tx.execute_batch(&format!("PRAGMA user_version = {};", migration.version))?;
    }
    tx.commit()?;

    tracing::debug!(from = current, to = latest, "applied schema migrations");
    Ok(())
}
