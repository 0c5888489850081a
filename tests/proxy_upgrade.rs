//! Integration tests for the upgrade proxy
//!
//! Covers proxy admin management, implementation swaps over a live balance
//! table, the direct-value rejection and the forwarded operation suite.

use settlements_control::error::LedgerError;
use settlements_control::events::Event;
use settlements_control::ledger::{Address, LedgerState};
use settlements_control::proxy::{Call, LedgerLogic, Proxy, SettlementsLogicV1};
use settlements_control::token::{MockToken, TokenContract};
use std::sync::Arc;

fn create_test_address(s: &str) -> Address {
    let mut address = [0u8; 32];
    let bytes = s.as_bytes();
    address[..bytes.len()].copy_from_slice(bytes);
    address
}

fn setup() -> (Proxy, Arc<MockToken>, Address, Address, Address) {
    let token = Arc::new(MockToken::new(create_test_address("token")));
    let deployer = create_test_address("deployer");
    let admin = create_test_address("admin");
    let payer = create_test_address("payer");

    let mut proxy = Proxy::new(
        create_test_address("proxy"),
        deployer,
        Box::new(SettlementsLogicV1),
        token.clone(),
    );
    proxy
        .call(
            deployer,
            Call::Initialize {
                token: token.address(),
                admin,
            },
        )
        .expect("initialize failed");

    token.mint(payer, 10_000);
    token.approve(payer, proxy.address(), 10_000);

    (proxy, token, deployer, admin, payer)
}

/// Second-generation stand-in that doubles every top-up credit, to make the
/// logic swap observable from outside.
struct DoublingLogic;

impl LedgerLogic for DoublingLogic {
    fn version(&self) -> u32 {
        2
    }

    fn execute(
        &self,
        state: &mut LedgerState,
        token: &dyn TokenContract,
        this: Address,
        caller: Address,
        call: Call,
    ) -> Result<Vec<Event>, LedgerError> {
        let call = match call {
            Call::TopUpClientBalance { amount, user_id } => Call::TopUpClientBalance {
                amount: amount * 2,
                user_id,
            },
            other => other,
        };
        SettlementsLogicV1.execute(state, token, this, caller, call)
    }
}

#[test]
fn test_proxy_admin_assigned_at_construction() {
    let (proxy, _token, deployer, admin, _payer) = setup();
    assert_eq!(proxy.get_proxy_admin(), deployer);
    assert_eq!(proxy.get_admin(), admin);
    assert_eq!(proxy.get_impl(), 1);
}

#[test]
fn test_change_proxy_admin_rotates_authority() {
    let (mut proxy, _token, deployer, admin, _payer) = setup();
    let successor = create_test_address("successor");

    // Ledger admin holds no proxy authority
    assert!(matches!(
        proxy.change_proxy_admin(admin, successor).unwrap_err(),
        LedgerError::OnlyAdmin
    ));

    proxy.change_proxy_admin(deployer, successor).unwrap();
    assert_eq!(proxy.get_proxy_admin(), successor);

    // Former proxy admin is locked out, successor can rotate again
    assert!(matches!(
        proxy.change_proxy_admin(deployer, admin).unwrap_err(),
        LedgerError::OnlyAdmin
    ));
    proxy.change_proxy_admin(successor, deployer).unwrap();
    assert_eq!(proxy.get_proxy_admin(), deployer);
}

#[test]
fn test_upgrade_over_live_balances() {
    let (mut proxy, _token, deployer, admin, payer) = setup();

    proxy
        .call(
            payer,
            Call::TopUpClientBalance {
                amount: 500,
                user_id: "client1".to_string(),
            },
        )
        .unwrap();
    proxy
        .call(
            admin,
            Call::PaymentClientToNative {
                client_id: "client1".to_string(),
                native_id: "native1".to_string(),
                amount: 200,
                session: None,
            },
        )
        .unwrap();

    proxy.set_impl(deployer, Box::new(DoublingLogic)).unwrap();
    assert_eq!(proxy.get_impl(), 2);

    // Pre-upgrade state is intact
    assert_eq!(proxy.get_balance("client1").client_balance, 300);
    assert_eq!(proxy.get_balance("native1").native_balance, 200);
    assert_eq!(proxy.get_admin(), admin);

    // New behavior applies to subsequent calls
    proxy
        .call(
            payer,
            Call::TopUpClientBalance {
                amount: 100,
                user_id: "client1".to_string(),
            },
        )
        .unwrap();
    assert_eq!(proxy.get_balance("client1").client_balance, 500);
}

#[test]
fn test_set_impl_rejected_for_non_proxy_admin() {
    let (mut proxy, _token, _deployer, admin, _payer) = setup();
    assert!(matches!(
        proxy.set_impl(admin, Box::new(DoublingLogic)).unwrap_err(),
        LedgerError::OnlyAdmin
    ));
    assert_eq!(proxy.get_impl(), 1);
}

#[test]
fn test_direct_value_always_rejected() {
    let (proxy, _token, deployer, admin, payer) = setup();
    for sender in [deployer, admin, payer] {
        assert!(matches!(
            proxy.receive_value(sender, 100).unwrap_err(),
            LedgerError::NotAcceptEtherDirectly
        ));
    }
}

#[test]
fn test_forwarded_operation_suite() {
    let (mut proxy, token, _deployer, admin, payer) = setup();
    let payout = create_test_address("payout");
    let refund = create_test_address("refund");
    let treasury = create_test_address("treasury");

    proxy
        .call(
            payer,
            Call::TopUpClientBalance {
                amount: 1000,
                user_id: "client1".to_string(),
            },
        )
        .unwrap();
    proxy
        .call(
            admin,
            Call::PaymentClientToNative {
                client_id: "client1".to_string(),
                native_id: "native1".to_string(),
                amount: 600,
                session: None,
            },
        )
        .unwrap();
    proxy
        .call(
            admin,
            Call::WithdrawFundsToNative {
                native_id: "native1".to_string(),
                receiver: payout,
                amount: 600,
            },
        )
        .unwrap();
    proxy
        .call(
            admin,
            Call::BackFundsToClient {
                client_id: "client1".to_string(),
                receiver: refund,
                amount: 400,
            },
        )
        .unwrap();

    token.mint(proxy.address(), 50);
    proxy
        .call(
            admin,
            Call::WithdrawTokens {
                receiver: treasury,
                amount: 50,
            },
        )
        .unwrap();

    assert_eq!(token.balance_of(payout), 600);
    assert_eq!(token.balance_of(refund), 400);
    assert_eq!(token.balance_of(treasury), 50);
    assert_eq!(proxy.state().total_tracked(), 0);

    // Sweep emits nothing, the other operations emit one event each
    assert_eq!(proxy.events().len(), 5);
}

#[test]
fn test_failed_forwarded_call_leaves_state_untouched() {
    let (mut proxy, _token, _deployer, admin, payer) = setup();

    proxy
        .call(
            payer,
            Call::TopUpClientBalance {
                amount: 100,
                user_id: "client1".to_string(),
            },
        )
        .unwrap();

    let err = proxy
        .call(
            admin,
            Call::PaymentClientToNative {
                client_id: "client1".to_string(),
                native_id: "native1".to_string(),
                amount: 101,
                session: None,
            },
        )
        .unwrap_err();
    assert!(matches!(err, LedgerError::InsufficientClientBalance));

    assert_eq!(proxy.get_balance("client1").client_balance, 100);
    assert_eq!(proxy.get_balance("native1").native_balance, 0);
    assert_eq!(proxy.events().len(), 2);
}
