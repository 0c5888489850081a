use std::collections::HashMap;

/// Opaque 32-byte caller/receiver identity, hex-encoded at the edges.
pub type Address = [u8; 32];

/// The never-assigned identity. An uninitialized ledger has this admin.
pub const ZERO_ADDRESS: Address = [0u8; 32];

/// Serde helper: addresses travel as hex strings in persisted state and in
/// the event stream, matching what downstream indexers expect.
pub mod hex_addr {
    use super::Address;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(addr: &Address, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(addr))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Address, D::Error> {
        let s = String::deserialize(deserializer)?;
        let mut addr = [0u8; 32];
        hex::decode_to_slice(&s, &mut addr).map_err(serde::de::Error::custom)?;
        Ok(addr)
    }
}

/// Per-identifier balance pair, in token minor units.
///
/// Both fields are unsigned by construction; every debit path checks the
/// balance first and rejects rather than wrapping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct BalanceRecord {
    pub client_balance: u64,
    pub native_balance: u64,
}

/// Optional metadata attached to a client-to-native payment. The emitted
/// event always carries these fields; absent metadata defaults to zero values.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SessionInfo {
    pub session_id: String,
    pub timestamp: u64,
    pub minutes_qty: u64,
}

/// The ledger's delegated storage: balance table plus the admin and token
/// references set once at initialization.
///
/// `version == 0` means the initialize call has not happened yet. Proxy
/// bookkeeping (implementation pointer, proxy admin) deliberately does NOT
/// live here; see `proxy::Proxy`.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct LedgerState {
    pub version: u32,
    #[serde(with = "hex_addr")]
    pub admin: Address,
    #[serde(with = "hex_addr")]
    pub token: Address,
    pub balances: HashMap<String, BalanceRecord>,
}

impl LedgerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_initialized(&self) -> bool {
        self.version > 0
    }

    /// Balance lookup with the zero-record default. An identifier that has
    /// never been touched is indistinguishable from one holding zero.
    pub fn balance(&self, id: &str) -> BalanceRecord {
        self.balances.get(id).copied().unwrap_or_default()
    }

    /// Lazily creates the record on first mutation. Records are never deleted.
    pub(crate) fn record_mut(&mut self, id: &str) -> &mut BalanceRecord {
        self.balances.entry(id.to_string()).or_default()
    }

    /// Sum of every tracked balance, for the conservation check: this total
    /// must never exceed what the token contract reports at the custody
    /// address. Saturates rather than panicking, since it is a read-only
    /// accessor over values the transitions already bound-check.
    pub fn total_tracked(&self) -> u64 {
        self.balances.values().fold(0u64, |acc, r| {
            acc.saturating_add(r.client_balance)
                .saturating_add(r.native_balance)
        })
    }
}
