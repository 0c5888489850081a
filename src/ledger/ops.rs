//! The ledger state transitions
//!
//! Single source of the operation semantics: the direct-call control and the
//! proxied logic implementations both dispatch here. Every function either
//! returns the events it emitted or fails with no observable state change.
//!
//! Ordering discipline: on outflow paths the balance debit happens before the
//! external token push and is restored if the push fails, so a re-entering
//! receiver can never observe a stale balance.

use crate::error::{LedgerError, Result};
use crate::events::Event;
use crate::ledger::state::{Address, LedgerState, SessionInfo};
use crate::token::TokenContract;

/// Version reported by `Initialized` and stamped into freshly set-up state.
pub const LEDGER_VERSION: u32 = 1;

/// Admin gate, checked first on every privileged path. An uninitialized
/// ledger has no admin, so every privileged call fails here too.
fn require_admin(state: &LedgerState, caller: Address) -> Result<()> {
    if !state.is_initialized() || caller != state.admin {
        return Err(LedgerError::OnlyAdmin);
    }
    Ok(())
}

/// One-time setup: binds the token reference and admin identity. This is the
/// constructor-equivalent for proxied deployments, which have no constructor
/// of their own.
pub fn initialize(state: &mut LedgerState, token: Address, admin: Address) -> Result<Vec<Event>> {
    if state.is_initialized() {
        return Err(LedgerError::AlreadyInitialized);
    }
    state.version = LEDGER_VERSION;
    state.token = token;
    state.admin = admin;
    Ok(vec![Event::Initialized {
        version: LEDGER_VERSION,
    }])
}

/// Callable by anyone: pulls `amount` tokens from the caller into custody at
/// `this`, then credits `user_id`'s client balance. The pull happens first;
/// if the token rejects it (e.g. insufficient allowance) no state is touched.
pub fn top_up_client_balance(
    state: &mut LedgerState,
    token: &dyn TokenContract,
    this: Address,
    caller: Address,
    amount: u64,
    user_id: &str,
) -> Result<Vec<Event>> {
    if !state.is_initialized() {
        return Err(LedgerError::NotInitialized);
    }
    if amount == 0 {
        return Err(LedgerError::InvalidAmount);
    }
    let new_balance = state
        .balance(user_id)
        .client_balance
        .checked_add(amount)
        .ok_or(LedgerError::BalanceOverflow)?;

    token.transfer_from(this, caller, this, amount)?;

    state.record_mut(user_id).client_balance = new_balance;
    Ok(vec![Event::TopUpClientBalance {
        user_id: user_id.to_string(),
        amount,
        current_client_balance: new_balance,
        sender: caller,
    }])
}

/// Admin-only internal transfer from a client balance to a native balance.
/// No token movement: both balances are claims on tokens already in custody.
pub fn payment_client_to_native(
    state: &mut LedgerState,
    caller: Address,
    client_id: &str,
    native_id: &str,
    amount: u64,
    session: Option<SessionInfo>,
) -> Result<Vec<Event>> {
    require_admin(state, caller)?;

    let client = state.balance(client_id).client_balance;
    if client < amount {
        return Err(LedgerError::InsufficientClientBalance);
    }
    let native = state
        .balance(native_id)
        .native_balance
        .checked_add(amount)
        .ok_or(LedgerError::BalanceOverflow)?;

    state.record_mut(client_id).client_balance = client - amount;
    state.record_mut(native_id).native_balance = native;

    let session = session.unwrap_or_default();
    Ok(vec![Event::PaymentClientToNative {
        client_id: client_id.to_string(),
        client_balance: client - amount,
        native_id: native_id.to_string(),
        native_balance: native,
        amount,
        session_id: session.session_id,
        timestamp: session.timestamp,
        minutes_qty: session.minutes_qty,
    }])
}

/// Admin-only outflow from a native balance to `receiver`.
pub fn withdraw_funds_to_native(
    state: &mut LedgerState,
    token: &dyn TokenContract,
    this: Address,
    caller: Address,
    native_id: &str,
    receiver: Address,
    amount: u64,
) -> Result<Vec<Event>> {
    require_admin(state, caller)?;

    let native = state.balance(native_id).native_balance;
    if native < amount {
        return Err(LedgerError::InsufficientNativeBalance);
    }

    // Debit before the external push; restore if the push fails.
    state.record_mut(native_id).native_balance = native - amount;
    if let Err(err) = token.transfer(this, receiver, amount) {
        state.record_mut(native_id).native_balance = native;
        return Err(err);
    }

    Ok(vec![Event::WithdrawFundsToNative {
        user_id: native_id.to_string(),
        receiver,
        amount,
    }])
}

/// Admin-only refund of a client balance to `receiver`. Checks the client
/// balance and fails `InsufficientClientBalance` when it falls short.
pub fn back_funds_to_client(
    state: &mut LedgerState,
    token: &dyn TokenContract,
    this: Address,
    caller: Address,
    client_id: &str,
    receiver: Address,
    amount: u64,
) -> Result<Vec<Event>> {
    require_admin(state, caller)?;

    let client = state.balance(client_id).client_balance;
    if client < amount {
        return Err(LedgerError::InsufficientClientBalance);
    }

    state.record_mut(client_id).client_balance = client - amount;
    if let Err(err) = token.transfer(this, receiver, amount) {
        state.record_mut(client_id).client_balance = client;
        return Err(err);
    }

    Ok(vec![Event::BackFundsToClient {
        user_id: client_id.to_string(),
        receiver,
        amount,
    }])
}

/// Admin-only sweep of tokens held at the custody address, independent of the
/// balance table (recovers tokens sent directly rather than via top-up).
pub fn withdraw_tokens(
    state: &mut LedgerState,
    token: &dyn TokenContract,
    this: Address,
    caller: Address,
    receiver: Address,
    amount: u64,
) -> Result<Vec<Event>> {
    require_admin(state, caller)?;
    token.transfer(this, receiver, amount)?;
    Ok(Vec::new())
}

/// Admin-only handover of the ledger admin role.
pub fn change_admin(
    state: &mut LedgerState,
    caller: Address,
    new_admin: Address,
) -> Result<Vec<Event>> {
    require_admin(state, caller)?;
    state.admin = new_admin;
    Ok(vec![Event::ChangeAdmin { new_admin }])
}
