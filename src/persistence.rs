//! Database persistence layer for the settlements ledger

use crate::error::LedgerError;
use crate::events::Event;
use crate::ledger::LedgerState;
use rusqlite::{params, Connection};
use std::collections::HashMap;
use std::sync::Mutex;

/// Abstraction for persistence backends. Implementations provide atomic
/// saving/loading of ledger state plus the append-only event feed.
pub trait Store: Send + Sync {
    fn save_state(&self, state: &LedgerState) -> Result<(), LedgerError>;
    fn load_state(&self) -> Result<LedgerState, LedgerError>;
    fn append_events(&self, events: &[Event]) -> Result<(), LedgerError>;
    fn load_events(&self) -> Result<Vec<Event>, LedgerError>;
}

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: &str) -> Result<Self, LedgerError> {
        let conn = Connection::open(path)
            .map_err(|e| LedgerError::DatabaseError(format!("Failed to open database: {}", e)))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS balances (
                id TEXT PRIMARY KEY,
                client_balance INTEGER NOT NULL,
                native_balance INTEGER NOT NULL
            )",
            [],
        )
        .map_err(|e| {
            LedgerError::DatabaseError(format!("Failed to create balances table: {}", e))
        })?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS metadata (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            [],
        )
        .map_err(|e| {
            LedgerError::DatabaseError(format!("Failed to create metadata table: {}", e))
        })?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS events (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                payload TEXT NOT NULL
            )",
            [],
        )
        .map_err(|e| LedgerError::DatabaseError(format!("Failed to create events table: {}", e)))?;

        Ok(Database {
            conn: Mutex::new(conn),
        })
    }
}

impl Store for Database {
    fn save_state(&self, state: &LedgerState) -> Result<(), LedgerError> {
        let conn_guard = self
            .conn
            .lock()
            .map_err(|_| LedgerError::DatabaseError("Mutex poisoned".to_string()))?;
        let tx = conn_guard.unchecked_transaction().map_err(|e| {
            LedgerError::DatabaseError(format!("Failed to start transaction: {}", e))
        })?;

        tx.execute("DELETE FROM balances", [])
            .map_err(|e| LedgerError::DatabaseError(format!("Failed to clear balances: {}", e)))?;

        for (id, record) in &state.balances {
            tx.execute(
                "INSERT INTO balances (id, client_balance, native_balance) VALUES (?1, ?2, ?3)",
                params![
                    id,
                    record.client_balance as i64,
                    record.native_balance as i64
                ],
            )
            .map_err(|e| LedgerError::DatabaseError(format!("Failed to save balance: {}", e)))?;
        }

        for (key, value) in [
            ("version", state.version.to_string()),
            ("admin", hex::encode(state.admin)),
            ("token", hex::encode(state.token)),
        ] {
            tx.execute(
                "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
                params![key, value],
            )
            .map_err(|e| LedgerError::DatabaseError(format!("Failed to save metadata: {}", e)))?;
        }

        tx.commit()
            .map_err(|e| LedgerError::DatabaseError(format!("Failed to commit transaction: {}", e)))
    }

    fn load_state(&self) -> Result<LedgerState, LedgerError> {
        let conn_guard = self
            .conn
            .lock()
            .map_err(|_| LedgerError::DatabaseError("Mutex poisoned".to_string()))?;

        let mut state = LedgerState::new();

        let mut stmt = conn_guard
            .prepare("SELECT key, value FROM metadata")
            .map_err(|e| LedgerError::DatabaseError(format!("Failed to prepare query: {}", e)))?;
        let rows = stmt
            .query_map([], |row| {
                let key: String = row.get(0)?;
                let value: String = row.get(1)?;
                Ok((key, value))
            })
            .map_err(|e| LedgerError::DatabaseError(format!("Failed to query metadata: {}", e)))?;

        for row_result in rows {
            let (key, value) = row_result
                .map_err(|e| LedgerError::DatabaseError(format!("Failed to read row: {}", e)))?;
            match key.as_str() {
                "version" => {
                    state.version = value.parse().map_err(|e| {
                        LedgerError::DatabaseError(format!("Corrupt version metadata: {}", e))
                    })?;
                }
                "admin" => {
                    hex::decode_to_slice(&value, &mut state.admin).map_err(|e| {
                        LedgerError::DatabaseError(format!("Corrupt admin metadata: {}", e))
                    })?;
                }
                "token" => {
                    hex::decode_to_slice(&value, &mut state.token).map_err(|e| {
                        LedgerError::DatabaseError(format!("Corrupt token metadata: {}", e))
                    })?;
                }
                _ => {}
            }
        }

        let mut balances = HashMap::new();
        let mut stmt = conn_guard
            .prepare("SELECT id, client_balance, native_balance FROM balances")
            .map_err(|e| LedgerError::DatabaseError(format!("Failed to prepare query: {}", e)))?;
        let rows = stmt
            .query_map([], |row| {
                let id: String = row.get(0)?;
                let client_balance: i64 = row.get(1)?;
                let native_balance: i64 = row.get(2)?;
                Ok((id, client_balance, native_balance))
            })
            .map_err(|e| LedgerError::DatabaseError(format!("Failed to query balances: {}", e)))?;

        for row_result in rows {
            let (id, client_balance, native_balance) = row_result
                .map_err(|e| LedgerError::DatabaseError(format!("Failed to read row: {}", e)))?;
            balances.insert(
                id,
                crate::ledger::BalanceRecord {
                    client_balance: client_balance as u64,
                    native_balance: native_balance as u64,
                },
            );
        }
        state.balances = balances;

        Ok(state)
    }

    fn append_events(&self, events: &[Event]) -> Result<(), LedgerError> {
        if events.is_empty() {
            return Ok(());
        }
        let conn_guard = self
            .conn
            .lock()
            .map_err(|_| LedgerError::DatabaseError("Mutex poisoned".to_string()))?;
        let tx = conn_guard.unchecked_transaction().map_err(|e| {
            LedgerError::DatabaseError(format!("Failed to start transaction: {}", e))
        })?;

        for event in events {
            let payload = serde_json::to_string(event).map_err(|e| {
                LedgerError::DatabaseError(format!("Failed to serialize event: {}", e))
            })?;
            tx.execute("INSERT INTO events (payload) VALUES (?1)", params![payload])
                .map_err(|e| LedgerError::DatabaseError(format!("Failed to save event: {}", e)))?;
        }

        tx.commit()
            .map_err(|e| LedgerError::DatabaseError(format!("Failed to commit transaction: {}", e)))
    }

    fn load_events(&self) -> Result<Vec<Event>, LedgerError> {
        let conn_guard = self
            .conn
            .lock()
            .map_err(|_| LedgerError::DatabaseError("Mutex poisoned".to_string()))?;
        let mut stmt = conn_guard
            .prepare("SELECT payload FROM events ORDER BY seq ASC")
            .map_err(|e| LedgerError::DatabaseError(format!("Failed to prepare query: {}", e)))?;

        let rows = stmt
            .query_map([], |row| {
                let payload: String = row.get(0)?;
                Ok(payload)
            })
            .map_err(|e| LedgerError::DatabaseError(format!("Failed to query events: {}", e)))?;

        let mut events = Vec::new();
        for row_result in rows {
            let payload = row_result
                .map_err(|e| LedgerError::DatabaseError(format!("Failed to read row: {}", e)))?;
            let event: Event = serde_json::from_str(&payload).map_err(|e| {
                LedgerError::DatabaseError(format!("Failed to deserialize event: {}", e))
            })?;
            events.push(event);
        }
        Ok(events)
    }
}

/// Simple in-memory store useful for tests and ephemeral runs.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: std::sync::Arc<Mutex<LedgerState>>,
    events: std::sync::Arc<Mutex<Vec<Event>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for InMemoryStore {
    fn save_state(&self, state: &LedgerState) -> Result<(), LedgerError> {
        let mut st = self
            .state
            .lock()
            .map_err(|_| LedgerError::DatabaseError("Mutex poisoned".to_string()))?;
        *st = state.clone();
        Ok(())
    }

    fn load_state(&self) -> Result<LedgerState, LedgerError> {
        let st = self
            .state
            .lock()
            .map_err(|_| LedgerError::DatabaseError("Mutex poisoned".to_string()))?;
        Ok(st.clone())
    }

    fn append_events(&self, events: &[Event]) -> Result<(), LedgerError> {
        let mut log = self
            .events
            .lock()
            .map_err(|_| LedgerError::DatabaseError("Mutex poisoned".to_string()))?;
        log.extend_from_slice(events);
        Ok(())
    }

    fn load_events(&self) -> Result<Vec<Event>, LedgerError> {
        let log = self
            .events
            .lock()
            .map_err(|_| LedgerError::DatabaseError("Mutex poisoned".to_string()))?;
        Ok(log.clone())
    }
}
