pub mod artifacts;
pub mod backtester;
pub mod commands;
pub mod config;
pub mod data_context;
pub mod engine;
pub mod error;
pub mod models;
pub mod performance;
pub mod run_status;
pub mod symbols;
pub mod trading_rules;
