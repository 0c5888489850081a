//! Ledger core split into state and transitions for better modularity

pub mod ops;
pub mod state;

pub use state::*;

use crate::error::Result;
use crate::events::{Event, EventLog};
use crate::persistence::{InMemoryStore, Store};
use crate::token::TokenContract;
use std::sync::Arc;

/// The settlements ledger used directly, without the upgrade proxy
/// (testing and pre-upgrade deployments). Owns its state, the token handle,
/// a persistence backend, and the emitted event log.
pub struct SettlementsControl {
    address: Address,
    state: LedgerState,
    token: Arc<dyn TokenContract>,
    store: Box<dyn Store>,
    events: EventLog,
}

impl SettlementsControl {
    /// Ephemeral instance backed by the in-memory store.
    pub fn new(address: Address, token: Arc<dyn TokenContract>) -> Self {
        Self {
            address,
            state: LedgerState::new(),
            token,
            store: Box::new(InMemoryStore::new()),
            events: EventLog::new(),
        }
    }

    /// Loads state from `store` and persists back after every successful
    /// operation.
    pub fn with_store(
        address: Address,
        token: Arc<dyn TokenContract>,
        store: Box<dyn Store>,
    ) -> Result<Self> {
        let state = store.load_state()?;
        let mut events = EventLog::new();
        events.extend(store.load_events()?);
        Ok(Self {
            address,
            state,
            token,
            store,
            events,
        })
    }

    /// Custody address this ledger holds tokens at.
    pub fn address(&self) -> Address {
        self.address
    }

    pub fn state(&self) -> &LedgerState {
        &self.state
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    pub fn get_admin(&self) -> Address {
        self.state.admin
    }

    pub fn get_balance(&self, id: &str) -> BalanceRecord {
        self.state.balance(id)
    }

    /// Persists the mutated state and the emitted events. When the store
    /// rejects the write the in-memory state is rolled back to `snapshot`,
    /// so a failed operation stays invisible to readers.
    fn commit(&mut self, snapshot: LedgerState, events: Vec<Event>) -> Result<Vec<Event>> {
        let persisted = self
            .store
            .save_state(&self.state)
            .and_then(|_| self.store.append_events(&events));
        if let Err(err) = persisted {
            self.state = snapshot;
            return Err(err);
        }
        for event in &events {
            tracing::info!(event = ?event, "ledger.event");
        }
        self.events.extend(events.iter().cloned());
        Ok(events)
    }

    pub fn initialize(&mut self, token_address: Address, admin: Address) -> Result<Vec<Event>> {
        let snapshot = self.state.clone();
        let events = ops::initialize(&mut self.state, token_address, admin)?;
        self.commit(snapshot, events)
    }

    pub fn top_up_client_balance(
        &mut self,
        caller: Address,
        amount: u64,
        user_id: &str,
    ) -> Result<Vec<Event>> {
        let snapshot = self.state.clone();
        let events = ops::top_up_client_balance(
            &mut self.state,
            &*self.token,
            self.address,
            caller,
            amount,
            user_id,
        )?;
        self.commit(snapshot, events)
    }

    pub fn payment_client_to_native(
        &mut self,
        caller: Address,
        client_id: &str,
        native_id: &str,
        amount: u64,
    ) -> Result<Vec<Event>> {
        let snapshot = self.state.clone();
        let events = ops::payment_client_to_native(
            &mut self.state,
            caller,
            client_id,
            native_id,
            amount,
            None,
        )?;
        self.commit(snapshot, events)
    }

    pub fn payment_client_to_native_with_session(
        &mut self,
        caller: Address,
        client_id: &str,
        native_id: &str,
        amount: u64,
        session: SessionInfo,
    ) -> Result<Vec<Event>> {
        let snapshot = self.state.clone();
        let events = ops::payment_client_to_native(
            &mut self.state,
            caller,
            client_id,
            native_id,
            amount,
            Some(session),
        )?;
        self.commit(snapshot, events)
    }

    pub fn withdraw_funds_to_native(
        &mut self,
        caller: Address,
        native_id: &str,
        receiver: Address,
        amount: u64,
    ) -> Result<Vec<Event>> {
        let snapshot = self.state.clone();
        let events = ops::withdraw_funds_to_native(
            &mut self.state,
            &*self.token,
            self.address,
            caller,
            native_id,
            receiver,
            amount,
        )?;
        self.commit(snapshot, events)
    }

    pub fn back_funds_to_client(
        &mut self,
        caller: Address,
        client_id: &str,
        receiver: Address,
        amount: u64,
    ) -> Result<Vec<Event>> {
        let snapshot = self.state.clone();
        let events = ops::back_funds_to_client(
            &mut self.state,
            &*self.token,
            self.address,
            caller,
            client_id,
            receiver,
            amount,
        )?;
        self.commit(snapshot, events)
    }

    pub fn withdraw_tokens(
        &mut self,
        caller: Address,
        receiver: Address,
        amount: u64,
    ) -> Result<Vec<Event>> {
        let snapshot = self.state.clone();
        let events = ops::withdraw_tokens(
            &mut self.state,
            &*self.token,
            self.address,
            caller,
            receiver,
            amount,
        )?;
        self.commit(snapshot, events)
    }

    pub fn change_admin(&mut self, caller: Address, new_admin: Address) -> Result<Vec<Event>> {
        let snapshot = self.state.clone();
        let events = ops::change_admin(&mut self.state, caller, new_admin)?;
        self.commit(snapshot, events)
    }
}
