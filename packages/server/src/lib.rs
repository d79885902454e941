// Engagement API - request handlers over the engagement core
//
// Resolves the caller identity, evaluates the access policy, calls the ledger
// or the cascade planner, and maps their outcomes to HTTP responses.

pub mod config;
pub mod policy;
pub mod server;

pub use config::*;
