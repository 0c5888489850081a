//! Emitted event log consumed by external indexers
//!
//! Wire field names match the schema downstream indexers already consume,
//! including the historical `reciever` spelling.

use crate::ledger::{hex_addr, Address};

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "event")]
pub enum Event {
    Initialized {
        version: u32,
    },
    ChangeAdmin {
        #[serde(rename = "newAdmin", with = "hex_addr")]
        new_admin: Address,
    },
    /// Retained for legacy indexer schemas; no current transition emits it.
    BalanceUpdated {
        #[serde(with = "hex_addr")]
        user: Address,
        #[serde(rename = "newBalance")]
        new_balance: u64,
    },
    TopUpClientBalance {
        #[serde(rename = "userId")]
        user_id: String,
        amount: u64,
        #[serde(rename = "currentClientBalance")]
        current_client_balance: u64,
        #[serde(with = "hex_addr")]
        sender: Address,
    },
    PaymentClientToNative {
        #[serde(rename = "clientId")]
        client_id: String,
        #[serde(rename = "clientBalance")]
        client_balance: u64,
        #[serde(rename = "nativeId")]
        native_id: String,
        #[serde(rename = "nativeBalance")]
        native_balance: u64,
        amount: u64,
        #[serde(rename = "sessionId")]
        session_id: String,
        timestamp: u64,
        #[serde(rename = "minutesQty")]
        minutes_qty: u64,
    },
    WithdrawFundsToNative {
        #[serde(rename = "userId")]
        user_id: String,
        #[serde(rename = "reciever", with = "hex_addr")]
        receiver: Address,
        amount: u64,
    },
    BackFundsToClient {
        #[serde(rename = "userId")]
        user_id: String,
        #[serde(rename = "reciever", with = "hex_addr")]
        receiver: Address,
        amount: u64,
    },
}

/// In-order append-only log of everything the ledger has emitted.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    entries: Vec<Event>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, event: Event) {
        self.entries.push(event);
    }

    pub fn extend(&mut self, events: impl IntoIterator<Item = Event>) {
        self.entries.extend(events);
    }

    pub fn entries(&self) -> &[Event] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_wire_names_match_abi() {
        let event = Event::WithdrawFundsToNative {
            user_id: "native123".to_string(),
            receiver: [1u8; 32],
            amount: 300,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"userId\""));
        assert!(json.contains("\"reciever\""));
        assert!(json.contains("\"WithdrawFundsToNative\""));
    }

    #[test]
    fn test_payment_event_carries_session_fields() {
        let event = Event::PaymentClientToNative {
            client_id: "c1".to_string(),
            client_balance: 0,
            native_id: "n1".to_string(),
            native_balance: 500,
            amount: 500,
            session_id: String::new(),
            timestamp: 0,
            minutes_qty: 0,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"sessionId\""));
        assert!(json.contains("\"minutesQty\""));

        let back: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_log_preserves_order() {
        let mut log = EventLog::new();
        log.append(Event::Initialized { version: 1 });
        log.append(Event::ChangeAdmin { new_admin: [2u8; 32] });
        assert_eq!(log.len(), 2);
        assert!(matches!(log.entries()[0], Event::Initialized { version: 1 }));
    }
}
