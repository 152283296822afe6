//! Wire types shared between `vellum-core` and the reference front door.
//!
//! These types mirror the JSON shapes fixed by the collaborative-edit protocol:
//! opaque identifiers, the per-change wire format, and the framed request/response/
//! event envelope the reference socket server speaks. Nothing here is transport-specific;
//! `vellum-server` is the only crate that knows about sockets.

pub mod types;

pub use types::*;
