//! perp-agent: decision execution and risk accounting for a simulated
//! leveraged perpetual-futures trading agent
//!
//! This library provides the core components for:
//! - Parsing and validating oracle decisions
//! - Risk policy checks with leverage and size clamping
//! - A margin ledger with fees and realized/unrealized PnL
//! - Exit plan monitoring (stop-loss, take-profit, invalidation)
//! - Risk and behavioral metrics
//! - The per-symbol cycle orchestrator
//! - Market data, oracle and persistence adapters
//! - Logging and Prometheus metrics

pub mod analytics;
pub mod cli;
pub mod config;
pub mod decision;
pub mod engine;
pub mod exit;
pub mod feed;
pub mod ledger;
pub mod oracle;
pub mod risk;
pub mod store;
pub mod telemetry;
