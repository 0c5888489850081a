//! Token collaborator interface
//!
//! The ledger never implements its own transfer primitive: custody moves
//! through an external token contract exposing standard transfer /
//! transfer-from / balance-of semantics. Any failure signal from the token is
//! a hard failure of the enclosing ledger operation.

use crate::error::{LedgerError, Result};
use crate::ledger::Address;
use std::collections::HashMap;
use std::sync::Mutex;

/// Abstraction over the fungible token contract the ledger custodies.
///
/// Seats are explicit: `transfer` spends from `from`'s own balance;
/// `transfer_from` spends `from`'s balance against the allowance `from`
/// granted to `spender`. The token enforces its own balance and allowance
/// checks.
pub trait TokenContract: Send + Sync {
    fn address(&self) -> Address;
    fn transfer(&self, from: Address, to: Address, amount: u64) -> Result<()>;
    fn transfer_from(&self, spender: Address, from: Address, to: Address, amount: u64)
        -> Result<()>;
    fn balance_of(&self, who: Address) -> u64;
}

#[derive(Debug, Default)]
struct TokenBook {
    balances: HashMap<Address, u64>,
    allowances: HashMap<(Address, Address), u64>,
}

/// In-memory token implementation with allowance enforcement, useful for
/// tests and ephemeral dev runs.
pub struct MockToken {
    address: Address,
    book: Mutex<TokenBook>,
}

impl MockToken {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            book: Mutex::new(TokenBook::default()),
        }
    }

    pub fn mint(&self, to: Address, amount: u64) {
        let mut book = self.book.lock().expect("token book poisoned");
        *book.balances.entry(to).or_insert(0) += amount;
    }

    /// `owner` grants `spender` the right to pull up to `amount`.
    pub fn approve(&self, owner: Address, spender: Address, amount: u64) {
        let mut book = self.book.lock().expect("token book poisoned");
        book.allowances.insert((owner, spender), amount);
    }

    pub fn allowance(&self, owner: Address, spender: Address) -> u64 {
        let book = self.book.lock().expect("token book poisoned");
        book.allowances.get(&(owner, spender)).copied().unwrap_or(0)
    }
}

impl TokenContract for MockToken {
    fn address(&self) -> Address {
        self.address
    }

    fn transfer(&self, from: Address, to: Address, amount: u64) -> Result<()> {
        let mut book = self.book.lock().expect("token book poisoned");
        let from_balance = book.balances.get(&from).copied().unwrap_or(0);
        if from_balance < amount {
            return Err(LedgerError::TokenTransferFailed(format!(
                "insufficient balance: {} < {}",
                from_balance, amount
            )));
        }
        book.balances.insert(from, from_balance - amount);
        *book.balances.entry(to).or_insert(0) += amount;
        Ok(())
    }

    fn transfer_from(
        &self,
        spender: Address,
        from: Address,
        to: Address,
        amount: u64,
    ) -> Result<()> {
        let mut book = self.book.lock().expect("token book poisoned");
        let allowed = book.allowances.get(&(from, spender)).copied().unwrap_or(0);
        if allowed < amount {
            return Err(LedgerError::TokenTransferFailed(format!(
                "insufficient allowance: {} < {}",
                allowed, amount
            )));
        }
        let from_balance = book.balances.get(&from).copied().unwrap_or(0);
        if from_balance < amount {
            return Err(LedgerError::TokenTransferFailed(format!(
                "insufficient balance: {} < {}",
                from_balance, amount
            )));
        }
        book.allowances.insert((from, spender), allowed - amount);
        book.balances.insert(from, from_balance - amount);
        *book.balances.entry(to).or_insert(0) += amount;
        Ok(())
    }

    fn balance_of(&self, who: Address) -> u64 {
        let book = self.book.lock().expect("token book poisoned");
        book.balances.get(&who).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LedgerError;

    const ALICE: Address = [1u8; 32];
    const BOB: Address = [2u8; 32];
    const LEDGER: Address = [3u8; 32];

    #[test]
    fn test_transfer_moves_balance() {
        let token = MockToken::new([9u8; 32]);
        token.mint(ALICE, 100);
        token.transfer(ALICE, BOB, 60).unwrap();
        assert_eq!(token.balance_of(ALICE), 40);
        assert_eq!(token.balance_of(BOB), 60);
    }

    #[test]
    fn test_transfer_rejects_overdraft() {
        let token = MockToken::new([9u8; 32]);
        token.mint(ALICE, 10);
        let err = token.transfer(ALICE, BOB, 11).unwrap_err();
        assert!(matches!(err, LedgerError::TokenTransferFailed(_)));
        assert_eq!(token.balance_of(ALICE), 10);
    }

    #[test]
    fn test_transfer_from_consumes_allowance() {
        let token = MockToken::new([9u8; 32]);
        token.mint(ALICE, 1000);
        token.approve(ALICE, LEDGER, 1000);
        token.transfer_from(LEDGER, ALICE, LEDGER, 400).unwrap();
        assert_eq!(token.allowance(ALICE, LEDGER), 600);
        assert_eq!(token.balance_of(LEDGER), 400);
    }

    #[test]
    fn test_transfer_from_without_allowance_fails() {
        let token = MockToken::new([9u8; 32]);
        token.mint(ALICE, 1000);
        let err = token.transfer_from(LEDGER, ALICE, LEDGER, 1).unwrap_err();
        assert!(matches!(err, LedgerError::TokenTransferFailed(_)));
        assert_eq!(token.balance_of(ALICE), 1000);
    }
}
