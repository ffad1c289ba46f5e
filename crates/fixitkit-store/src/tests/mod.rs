//! Scenario tests for the record stores.
//!
//! Every test runs a real [`SessionProvider`](fixitkit_auth::SessionProvider)
//! against the in-memory auth and record backends, with row-level security
//! switched on in the record backend.
//!
//! - `harness.rs`: shared setup
//! - `mood_uniqueness.rs`: one check-in per user and day
//! - `letters.rs`: writing, burning and deleting letters
//! - `isolation.rs`: records never cross from one user to the next
//! - `failure.rs`: failed calls leave the list untouched
//! - `gate.rs`: anonymous writes never reach the network
//! - `ownership.rs`: rows owned by someone else are refused
//! - `concurrency.rs`: calls on one store run in order


mod concurrency;
mod failure;
mod mood_uniqueness;
mod ownership;
