//! Wingo - round-based prediction game engine.
//!
//! Several independent duration tracks (30s, 1min, 3min, 5min) each produce a
//! new outcome every period; users wager on a digit, a color or big/small
//! against the open period and are paid out when it settles. The engine
//! covers deterministic period derivation, outcome generation with an
//! operator override, the wager ledger, idempotent settlement and the
//! balance/turnover ledger. Everything else (auth, deposit approval, admin
//! CRUD) is an external collaborator behind the store seam.

pub mod api;
pub mod config;
pub mod errors;
pub mod events;
pub mod game;
pub mod metrics;
pub mod scheduler;
pub mod store;

pub use errors::{EngineError, EngineResult};
