//! Upgrade proxy for the settlements ledger
//!
//! The proxy owns the persistent `LedgerState` and forwards every ledger call
//! to a replaceable logic implementation bound at call time. Swapping the
//! implementation changes behavior for all subsequent calls while the balance
//! table, admin binding and token reference survive untouched.
//!
//! Proxy bookkeeping (implementation pointer, proxy admin) is kept entirely
//! outside `LedgerState`, so a logic upgrade can never clobber it and the
//! proxy admin role stays disjoint from the ledger admin role.

use crate::error::{LedgerError, Result};
use crate::events::{Event, EventLog};
use crate::ledger::{ops, Address, BalanceRecord, LedgerState, SessionInfo};
use crate::persistence::{InMemoryStore, Store};
use crate::token::TokenContract;
use std::sync::Arc;

/// One forwarded ledger call. The proxy does not interpret these beyond
/// handing them to the bound logic.
#[derive(Debug, Clone)]
pub enum Call {
    Initialize {
        token: Address,
        admin: Address,
    },
    TopUpClientBalance {
        amount: u64,
        user_id: String,
    },
    PaymentClientToNative {
        client_id: String,
        native_id: String,
        amount: u64,
        session: Option<SessionInfo>,
    },
    WithdrawFundsToNative {
        native_id: String,
        receiver: Address,
        amount: u64,
    },
    BackFundsToClient {
        client_id: String,
        receiver: Address,
        amount: u64,
    },
    WithdrawTokens {
        receiver: Address,
        amount: u64,
    },
    ChangeAdmin {
        new_admin: Address,
    },
}

/// A ledger implementation the proxy can bind. `version` doubles as the
/// implementation pointer reported by `get_impl`.
pub trait LedgerLogic: Send + Sync {
    fn version(&self) -> u32;

    fn execute(
        &self,
        state: &mut LedgerState,
        token: &dyn TokenContract,
        this: Address,
        caller: Address,
        call: Call,
    ) -> Result<Vec<Event>>;
}

/// First-generation logic: straight dispatch into the transition functions.
pub struct SettlementsLogicV1;

impl LedgerLogic for SettlementsLogicV1 {
    fn version(&self) -> u32 {
        ops::LEDGER_VERSION
    }

    fn execute(
        &self,
        state: &mut LedgerState,
        token: &dyn TokenContract,
        this: Address,
        caller: Address,
        call: Call,
    ) -> Result<Vec<Event>> {
        match call {
            Call::Initialize { token: t, admin } => ops::initialize(state, t, admin),
            Call::TopUpClientBalance { amount, user_id } => {
                ops::top_up_client_balance(state, token, this, caller, amount, &user_id)
            }
            Call::PaymentClientToNative {
                client_id,
                native_id,
                amount,
                session,
            } => ops::payment_client_to_native(state, caller, &client_id, &native_id, amount, session),
            Call::WithdrawFundsToNative {
                native_id,
                receiver,
                amount,
            } => ops::withdraw_funds_to_native(
                state, token, this, caller, &native_id, receiver, amount,
            ),
            Call::BackFundsToClient {
                client_id,
                receiver,
                amount,
            } => {
                ops::back_funds_to_client(state, token, this, caller, &client_id, receiver, amount)
            }
            Call::WithdrawTokens { receiver, amount } => {
                ops::withdraw_tokens(state, token, this, caller, receiver, amount)
            }
            Call::ChangeAdmin { new_admin } => ops::change_admin(state, caller, new_admin),
        }
    }
}

pub struct Proxy {
    address: Address,
    proxy_admin: Address,
    logic: Box<dyn LedgerLogic>,
    state: LedgerState,
    token: Arc<dyn TokenContract>,
    store: Box<dyn Store>,
    events: EventLog,
}

impl Proxy {
    /// Ephemeral proxy backed by the in-memory store. The deployer becomes
    /// proxy admin, mirroring construction-time assignment.
    pub fn new(
        address: Address,
        proxy_admin: Address,
        logic: Box<dyn LedgerLogic>,
        token: Arc<dyn TokenContract>,
    ) -> Self {
        Self {
            address,
            proxy_admin,
            logic,
            state: LedgerState::new(),
            token,
            store: Box::new(InMemoryStore::new()),
            events: EventLog::new(),
        }
    }

    /// Loads delegated state from `store` and persists back after every
    /// successful forwarded call.
    pub fn with_store(
        address: Address,
        proxy_admin: Address,
        logic: Box<dyn LedgerLogic>,
        token: Arc<dyn TokenContract>,
        store: Box<dyn Store>,
    ) -> Result<Self> {
        let state = store.load_state()?;
        let mut events = EventLog::new();
        events.extend(store.load_events()?);
        Ok(Self {
            address,
            proxy_admin,
            logic,
            state,
            token,
            store,
            events,
        })
    }

    /// Custody address the proxy holds tokens at. Stable across upgrades.
    pub fn address(&self) -> Address {
        self.address
    }

    pub fn state(&self) -> &LedgerState {
        &self.state
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// Ledger admin, read from the delegated state.
    pub fn get_admin(&self) -> Address {
        self.state.admin
    }

    pub fn get_balance(&self, id: &str) -> BalanceRecord {
        self.state.balance(id)
    }

    /// Version of the currently bound implementation.
    pub fn get_impl(&self) -> u32 {
        self.logic.version()
    }

    /// Binds a new implementation. Proxy-admin only; the delegated state is
    /// left untouched.
    pub fn set_impl(&mut self, caller: Address, logic: Box<dyn LedgerLogic>) -> Result<()> {
        self.require_proxy_admin(caller)?;
        let from = self.logic.version();
        self.logic = logic;
        tracing::info!(from, to = self.logic.version(), "proxy.upgrade");
        Ok(())
    }

    pub fn get_proxy_admin(&self) -> Address {
        self.proxy_admin
    }

    /// Proxy-admin only. Independent of the ledger admin handover.
    pub fn change_proxy_admin(&mut self, caller: Address, new_admin: Address) -> Result<()> {
        self.require_proxy_admin(caller)?;
        self.proxy_admin = new_admin;
        Ok(())
    }

    /// Plain value sent to the proxy is always rejected. Funding goes through
    /// the token top-up path only.
    pub fn receive_value(&self, _from: Address, _amount: u64) -> Result<()> {
        Err(LedgerError::NotAcceptEtherDirectly)
    }

    fn require_proxy_admin(&self, caller: Address) -> Result<()> {
        if caller != self.proxy_admin {
            return Err(LedgerError::OnlyAdmin);
        }
        Ok(())
    }

    /// Forwards `call` to the bound logic, then persists state and events.
    /// On failure nothing is persisted and the in-memory state is unchanged:
    /// the transition functions guarantee no partial writes, and a rejected
    /// store write rolls the mutation back before the error propagates.
    pub fn call(&mut self, caller: Address, call: Call) -> Result<Vec<Event>> {
        let snapshot = self.state.clone();
        let events = self
            .logic
            .execute(&mut self.state, &*self.token, self.address, caller, call)?;
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
}
