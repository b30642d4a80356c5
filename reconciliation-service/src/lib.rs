//! Reconciliation Service - ledger vs. bank statement matching by UTR.

pub mod config;
pub mod handlers;
pub mod models;
pub mod services;
pub mod startup;
