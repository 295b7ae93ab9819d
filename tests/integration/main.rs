//! Integration tests

mod config_test;
mod cycle_test;
mod ledger_test;
mod support;
