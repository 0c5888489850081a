//! SettlementsControl - a two-tier settlements ledger behind an upgrade proxy
//!
//! # Architecture
//!
//! The crate is organized into logical modules:
//!
//! ## Ledger Core
//! - [`ledger`] - Balance state and the settlement transitions
//! - [`token`] - Token contract interface the ledger custodies through
//! - [`events`] - Emitted event log consumed by external indexers
//!
//! ## Upgrade Proxy
//! - [`proxy`] - Replaceable logic binding over persistent ledger state
//!
//! ## State Management
//! - [`persistence`] - Database layer (SQLite)
//!
//! ## Integration
//! - [`api`] - REST API surface (feature `api`)
//!
//! ## Configuration & Utilities
//! - [`config`] - Configuration management
//! - [`error`] - Error types

#![forbid(unsafe_code)]

// ============================================================================
// Ledger Core
// ============================================================================
pub mod events;
pub mod ledger;
pub mod token;

// ============================================================================
// Upgrade Proxy
// ============================================================================
pub mod proxy;

// ============================================================================
// State Management
// ============================================================================
pub mod persistence;

// ============================================================================
// Integration
// ============================================================================
#[cfg(feature = "api")]
pub mod api;

// ============================================================================
// Configuration & Utilities
// ============================================================================
pub mod config;
pub mod error;
