// Copyright 2026 Pagewright Contributors
// SPDX-License-Identifier: Apache-2.0

//! Client, appointment and message records in SQLite.
//!
//! Schema creation is idempotent; opening an existing database leaves its
//! rows untouched. Foreign keys are enforced on every connection.

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;
use std::path::Path;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS clients (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    phone TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);
CREATE TABLE IF NOT EXISTS appointments (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    client_id INTEGER NOT NULL REFERENCES clients(id) ON DELETE CASCADE,
    scheduled_at TEXT NOT NULL,
    note TEXT,
    created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);
CREATE TABLE IF NOT EXISTS messages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    client_id INTEGER NOT NULL REFERENCES clients(id) ON DELETE CASCADE,
    body TEXT NOT NULL,
    provider_id TEXT,
    status TEXT NOT NULL,
    attempts INTEGER NOT NULL DEFAULT 0,
    error TEXT,
    sent_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);
CREATE INDEX IF NOT EXISTS idx_appointments_client ON appointments(client_id);
CREATE INDEX IF NOT EXISTS idx_messages_client ON messages(client_id);
";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Client {
    pub id: i64,
    pub name: String,
    pub phone: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Appointment {
    pub id: i64,
    pub client_id: i64,
    pub scheduled_at: String,
    pub note: Option<String>,
}

/// A message about to be recorded.
#[derive(Debug, Clone)]
pub struct NewMessage<'a> {
    pub body: &'a str,
    pub provider_id: Option<&'a str>,
    pub status: &'a str,
    pub attempts: u32,
    pub error: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageRecord {
    pub id: i64,
    pub client_id: i64,
    pub body: String,
    pub provider_id: Option<String>,
    pub status: String,
    pub attempts: u32,
    pub error: Option<String>,
    pub sent_at: String,
}

/// SQLite-backed store.
pub struct Store {
    db: Connection,
}

impl Store {
    /// Open or create the database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Connection::open(path)
            .with_context(|| format!("failed to open store: {}", path.display()))?;
        Self::init(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(db: Connection) -> Result<Self> {
        db.execute_batch("PRAGMA foreign_keys = ON;")
            .context("failed to enable foreign keys")?;
        db.execute_batch(SCHEMA)
            .context("failed to create store schema")?;
        Ok(Self { db })
    }

    /// Insert a client, or rename the existing one with the same phone.
    pub fn upsert_client(&self, name: &str, phone: &str) -> Result<i64> {
        let id = self.db.query_row(
            "INSERT INTO clients (name, phone) VALUES (?1, ?2)
             ON CONFLICT(phone) DO UPDATE SET name = excluded.name
             RETURNING id",
            params![name, phone],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    pub fn find_client_by_phone(&self, phone: &str) -> Result<Option<Client>> {
        let client = self
            .db
            .query_row(
                "SELECT id, name, phone, created_at FROM clients WHERE phone = ?1",
                params![phone],
                client_from_row,
            )
            .optional()?;
        Ok(client)
    }

    pub fn list_clients(&self) -> Result<Vec<Client>> {
        let mut stmt = self
            .db
            .prepare("SELECT id, name, phone, created_at FROM clients ORDER BY id")?;
        let rows = stmt.query_map([], client_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn add_appointment(
        &self,
        client_id: i64,
        scheduled_at: &str,
        note: Option<&str>,
    ) -> Result<i64> {
        self.db
            .execute(
                "INSERT INTO appointments (client_id, scheduled_at, note) VALUES (?1, ?2, ?3)",
                params![client_id, scheduled_at, note],
            )
            .with_context(|| format!("failed to add appointment for client {client_id}"))?;
        Ok(self.db.last_insert_rowid())
    }

    pub fn appointments_for_client(&self, client_id: i64) -> Result<Vec<Appointment>> {
        let mut stmt = self.db.prepare(
            "SELECT id, client_id, scheduled_at, note FROM appointments
             WHERE client_id = ?1 ORDER BY scheduled_at",
        )?;
        let rows = stmt.query_map(params![client_id], |row| {
            Ok(Appointment {
                id: row.get(0)?,
                client_id: row.get(1)?,
                scheduled_at: row.get(2)?,
                note: row.get(3)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn record_message(&self, client_id: i64, message: &NewMessage<'_>) -> Result<i64> {
        self.db
            .execute(
                "INSERT INTO messages (client_id, body, provider_id, status, attempts, error)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    client_id,
                    message.body,
                    message.provider_id,
                    message.status,
                    message.attempts,
                    message.error
                ],
            )
            .with_context(|| format!("failed to record message for client {client_id}"))?;
        Ok(self.db.last_insert_rowid())
    }

    pub fn messages_for_client(&self, client_id: i64) -> Result<Vec<MessageRecord>> {
        let mut stmt = self.db.prepare(
            "SELECT id, client_id, body, provider_id, status, attempts, error, sent_at
             FROM messages WHERE client_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![client_id], |row| {
            Ok(MessageRecord {
                id: row.get(0)?,
                client_id: row.get(1)?,
                body: row.get(2)?,
                provider_id: row.get(3)?,
                status: row.get(4)?,
                attempts: row.get(5)?,
                error: row.get(6)?,
                sent_at: row.get(7)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}

fn client_from_row(row: &Row<'_>) -> rusqlite::Result<Client> {
    Ok(Client {
        id: row.get(0)?,
        name: row.get(1)?,
        phone: row.get(2)?,
        created_at: row.get(3)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db/pagewright.db");
        {
            let store = Store::open(&path).unwrap();
            store.upsert_client("Ana", "12125551234").unwrap();
        }
        let store = Store::open(&path).unwrap();
        assert_eq!(store.list_clients().unwrap().len(), 1);
    }

    #[test]
    fn test_upsert_by_phone() {
        let store = Store::open_in_memory().unwrap();
        let a = store.upsert_client("Ana", "12125551234").unwrap();
        let b = store.upsert_client("Ana Maria", "12125551234").unwrap();
        let c = store.upsert_client("Ben", "13105550000").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);

        let client = store.find_client_by_phone("12125551234").unwrap().unwrap();
        assert_eq!(client.name, "Ana Maria");
        assert!(store.find_client_by_phone("10000000000").unwrap().is_none());
    }

    #[test]
    fn test_appointments_and_messages() {
        let store = Store::open_in_memory().unwrap();
        let id = store.upsert_client("Ana", "12125551234").unwrap();
        store
            .add_appointment(id, "2026-11-02T10:00:00", Some("consult"))
            .unwrap();
        store
            .record_message(
                id,
                &NewMessage {
                    body: "See you Monday",
                    provider_id: Some("SM1"),
                    status: "sent",
                    attempts: 2,
                    error: None,
                },
            )
            .unwrap();

        let appts = store.appointments_for_client(id).unwrap();
        assert_eq!(appts.len(), 1);
        assert_eq!(appts[0].note.as_deref(), Some("consult"));

        let msgs = store.messages_for_client(id).unwrap();
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].provider_id.as_deref(), Some("SM1"));
        assert_eq!(msgs[0].attempts, 2);
    }

    #[test]
    fn test_foreign_keys_enforced() {
        let store = Store::open_in_memory().unwrap();
        assert!(store.add_appointment(999, "2026-11-02T10:00:00", None).is_err());
        assert!(store
            .record_message(
                999,
                &NewMessage {
                    body: "x",
                    provider_id: None,
                    status: "failed",
                    attempts: 1,
                    error: Some("boom"),
                },
            )
            .is_err());
    }
}
