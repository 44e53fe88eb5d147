//! Configuration module for the transfer orchestrator
//!
//! Provides the CLI argument grammar and the closed `TransferOptions` record
//! derived from it.

mod settings;

pub use settings::*;
