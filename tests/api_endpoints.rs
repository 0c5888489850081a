//! Integration tests for the settlements API endpoints
//!
//! Verifies that the REST surface responds with the expected JSON structures
//! and status codes, including the admin-gate and conflict mappings.

use axum_test::TestServer;
use serde_json::{json, Value};
use settlements_control::api::{build_api_router, AppState};
use settlements_control::ledger::Address;
use settlements_control::proxy::{Call, Proxy, SettlementsLogicV1};
use settlements_control::token::{MockToken, TokenContract};
use std::sync::Arc;

fn create_test_address(s: &str) -> Address {
    let mut address = [0u8; 32];
    let bytes = s.as_bytes();
    address[..bytes.len()].copy_from_slice(bytes);
    address
}

struct Harness {
    server: TestServer,
    admin_hex: String,
    payer_hex: String,
}

fn setup() -> Harness {
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

    let app = build_api_router(AppState::new(proxy));
    let server = TestServer::new(app).expect("Failed to create test server");

    Harness {
        server,
        admin_hex: hex::encode(admin),
        payer_hex: hex::encode(payer),
    }
}

#[tokio::test]
async fn test_read_endpoints() {
    let h = setup();

    // /api/health
    let response = h.server.get("/api/health").await;
    assert_eq!(response.status_code(), 200);
    let json: Value = response.json();
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["initialized"], true);
    assert!(json["timestamp"].is_string());

    // /api/admin
    let response = h.server.get("/api/admin").await;
    assert_eq!(response.status_code(), 200);
    let json: Value = response.json();
    assert_eq!(json["admin"], h.admin_hex);

    // /api/balance/:id for an unseen id reads as zero
    let response = h.server.get("/api/balance/unknown").await;
    assert_eq!(response.status_code(), 200);
    let json: Value = response.json();
    assert_eq!(json["client_balance"], 0);
    assert_eq!(json["native_balance"], 0);

    // /api/ledger/stats
    let response = h.server.get("/api/ledger/stats").await;
    assert_eq!(response.status_code(), 200);
    let json: Value = response.json();
    assert_eq!(json["initialized"], true);
    assert_eq!(json["version"], 1);
    assert!(json["events"].is_number());

    // /api/proxy/impl and /api/proxy/admin
    let response = h.server.get("/api/proxy/impl").await;
    assert_eq!(response.status_code(), 200);
    let json: Value = response.json();
    assert_eq!(json["implementation"], 1);

    let response = h.server.get("/api/proxy/admin").await;
    assert_eq!(response.status_code(), 200);
    let json: Value = response.json();
    assert_eq!(json["proxy_admin"], hex::encode(create_test_address("deployer")));

    // /api/stats
    let response = h.server.get("/api/stats").await;
    assert_eq!(response.status_code(), 200);
    let json: Value = response.json();
    assert!(json["total_requests"].is_number());
    assert!(json["successful_requests"].is_number());
    assert!(json["failed_requests"].is_number());
    assert!(json["operations_submitted"].is_number());
    assert!(json["uptime_seconds"].is_number());
}

#[tokio::test]
async fn test_settlement_flow_over_http() {
    let h = setup();
    let payout_hex = hex::encode(create_test_address("payout"));

    // Top-up credits the client and echoes the new balance
    let response = h
        .server
        .post("/api/topup")
        .json(&json!({
            "caller": h.payer_hex,
            "amount": 1000,
            "user_id": "client1"
        }))
        .await;
    assert_eq!(response.status_code(), 200);
    let json: Value = response.json();
    assert_eq!(json["client_balance"], 1000);

    // Admin settles part of it to a native provider
    let response = h
        .server
        .post("/api/payment")
        .json(&json!({
            "caller": h.admin_hex,
            "client_id": "client1",
            "native_id": "native1",
            "amount": 600,
            "session": {
                "session_id": "s1",
                "timestamp": 1700000000u64,
                "minutes_qty": 30
            }
        }))
        .await;
    assert_eq!(response.status_code(), 200);

    // Provider payout
    let response = h
        .server
        .post("/api/withdraw")
        .json(&json!({
            "caller": h.admin_hex,
            "native_id": "native1",
            "receiver": payout_hex,
            "amount": 600
        }))
        .await;
    assert_eq!(response.status_code(), 200);

    let response = h.server.get("/api/balance/client1").await;
    let json: Value = response.json();
    assert_eq!(json["client_balance"], 400);

    let response = h.server.get("/api/balance/native1").await;
    let json: Value = response.json();
    assert_eq!(json["native_balance"], 0);

    // Event feed pagination: Initialized + 3 operations
    let response = h
        .server
        .get("/api/events")
        .add_query_param("page", 0)
        .add_query_param("limit", 2)
        .await;
    assert_eq!(response.status_code(), 200);
    let json: Value = response.json();
    assert_eq!(json["total"], 4);
    assert_eq!(json["events"].as_array().map(|a| a.len()), Some(2));
    assert_eq!(json["events"][0]["event"], "Initialized");

    let response = h
        .server
        .get("/api/events")
        .add_query_param("page", 1)
        .add_query_param("limit", 2)
        .await;
    let json: Value = response.json();
    assert_eq!(json["events"][1]["event"], "WithdrawFundsToNative");
    assert!(json["events"][1]["reciever"].is_string());
}

#[tokio::test]
async fn test_event_pagination_with_extreme_page_stays_up() {
    let h = setup();

    // A page number at the u64 ceiling must yield an empty page, not bring
    // the server down
    let response = h
        .server
        .get("/api/events")
        .add_query_param("page", u64::MAX)
        .add_query_param("limit", 100)
        .await;
    assert_eq!(response.status_code(), 200);
    let json: Value = response.json();
    assert_eq!(json["events"].as_array().map(|a| a.len()), Some(0));
    assert_eq!(json["total"], 1);

    // The server still answers afterwards
    let response = h.server.get("/api/health").await;
    assert_eq!(response.status_code(), 200);
}

#[tokio::test]
async fn test_error_status_mappings() {
    let h = setup();
    let receiver_hex = hex::encode(create_test_address("receiver"));

    // Non-admin settlement attempt: 403
    let response = h
        .server
        .post("/api/payment")
        .json(&json!({
            "caller": h.payer_hex,
            "client_id": "client1",
            "native_id": "native1",
            "amount": 1
        }))
        .await;
    assert_eq!(response.status_code(), 403);
    let json: Value = response.json();
    assert!(json["error"].is_string());

    // Overdraft withdrawal: 409
    let response = h
        .server
        .post("/api/withdraw")
        .json(&json!({
            "caller": h.admin_hex,
            "native_id": "native1",
            "receiver": receiver_hex,
            "amount": 5
        }))
        .await;
    assert_eq!(response.status_code(), 409);

    // Zero-amount top-up: 400
    let response = h
        .server
        .post("/api/topup")
        .json(&json!({
            "caller": h.payer_hex,
            "amount": 0,
            "user_id": "client1"
        }))
        .await;
    assert_eq!(response.status_code(), 400);

    // Malformed caller address: 400
    let response = h
        .server
        .post("/api/topup")
        .json(&json!({
            "caller": "not-hex",
            "amount": 10,
            "user_id": "client1"
        }))
        .await;
    assert_eq!(response.status_code(), 400);

    // Repeated initialize: 409
    let response = h
        .server
        .post("/api/initialize")
        .json(&json!({
            "caller": h.admin_hex,
            "token": hex::encode(create_test_address("token")),
            "admin": h.admin_hex
        }))
        .await;
    assert_eq!(response.status_code(), 409);
}

#[tokio::test]
async fn test_proxy_admin_rotation_over_http() {
    let h = setup();
    let deployer_hex = hex::encode(create_test_address("deployer"));
    let successor_hex = hex::encode(create_test_address("successor"));

    // The ledger admin cannot rotate the proxy admin: 403
    let response = h
        .server
        .post("/api/proxy/admin/change")
        .json(&json!({
            "caller": h.admin_hex,
            "new_admin": successor_hex
        }))
        .await;
    assert_eq!(response.status_code(), 403);

    let response = h
        .server
        .post("/api/proxy/admin/change")
        .json(&json!({
            "caller": deployer_hex,
            "new_admin": successor_hex
        }))
        .await;
    assert_eq!(response.status_code(), 200);

    let response = h.server.get("/api/proxy/admin").await;
    let json: Value = response.json();
    assert_eq!(json["proxy_admin"], successor_hex);
}
