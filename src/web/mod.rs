//! Web gate: the unlock prompt served over HTTP.
//!
//! The gate exists only until the vault unlocks; after the handoff it is
//! drained and closed by the launcher.

mod server;

pub use server::{GateServer, start_server};
