#![forbid(unsafe_code)]
//! Settlements API server
//!
//! Hosts the proxied ledger behind the REST surface. Persists to SQLite and
//! falls back to the in-memory store when the database cannot be opened.

use clap::Parser;
use settlements_control::api::{run_api_server, AppState};
use settlements_control::config::load_config;
use settlements_control::ledger::{Address, ZERO_ADDRESS};
use settlements_control::persistence::{Database, InMemoryStore, Store};
use settlements_control::proxy::{Call, Proxy, SettlementsLogicV1};
use settlements_control::token::{MockToken, TokenContract};
use std::sync::Arc;

/// Custody address the server-hosted proxy holds tokens at.
const PROXY_ADDRESS: Address = [0x10; 32];
/// Address of the development token backend.
const TOKEN_ADDRESS: Address = [0x20; 32];

#[derive(Parser)]
#[command(name = "settlements-server", about = "Settlements ledger API server")]
struct Args {
    /// Override the API port from config.toml
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let config = load_config()?;
    let port = args.port.unwrap_or(config.api.port);

    let store: Box<dyn Store> = match Database::open(&config.database.path) {
        Ok(db) => Box::new(db),
        Err(e) => {
            tracing::warn!(
                path = %config.database.path,
                error = %e,
                "Failed to open database, falling back to in-memory store"
            );
            Box::new(InMemoryStore::new())
        }
    };

    // Development token backend. A production deployment would bind a real
    // token integration here instead.
    let token = Arc::new(MockToken::new(TOKEN_ADDRESS));

    let admin = parse_admin(&config.ledger.admin)?;
    let mut proxy = Proxy::with_store(
        PROXY_ADDRESS,
        admin,
        Box::new(SettlementsLogicV1),
        token.clone(),
        store,
    )?;

    if config.ledger.auto_initialize && !proxy.state().is_initialized() {
        proxy.call(
            admin,
            Call::Initialize {
                token: token.address(),
                admin,
            },
        )?;
        tracing::info!(admin = %hex::encode(admin), "ledger.initialized");
    }

    tracing::info!(
        port,
        initialized = proxy.state().is_initialized(),
        implementation = proxy.get_impl(),
        "settlements-server starting"
    );

    run_api_server(AppState::new(proxy), port).await
}

fn parse_admin(admin_hex: &str) -> Result<Address, Box<dyn std::error::Error>> {
    if admin_hex.is_empty() {
        // No admin configured: the ledger stays uninitialized until an
        // initialize call arrives over the API.
        return Ok(ZERO_ADDRESS);
    }
    let mut admin = [0u8; 32];
    hex::decode_to_slice(admin_hex, &mut admin)
        .map_err(|e| format!("Invalid ledger.admin: {}", e))?;
    Ok(admin)
}
